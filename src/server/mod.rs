pub mod error;
pub mod handlers;

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use axum::Router;
use axum::routing::get;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::trace::TraceLayer;

use crate::repo::{RepoError, RepoResult, TodoRepository};
use handlers::{create_todo, delete_todo, list_todos, update_todo};

pub const TODOS_PATH: &str = "/api/todos";

/// Shared handle to the store. Requests are independent; the mutex only
/// serializes access to the single connection.
#[derive(Clone)]
pub struct AppState {
    repo: Arc<Mutex<Box<dyn TodoRepository>>>,
}

impl AppState {
    pub fn new(repo: impl TodoRepository + 'static) -> Self {
        let repo: Box<dyn TodoRepository> = Box::new(repo);
        Self {
            repo: Arc::new(Mutex::new(repo)),
        }
    }

    /// Runs `f` against the store on the blocking pool.
    pub async fn with_repo<T, F>(&self, f: F) -> RepoResult<T>
    where
        F: FnOnce(&mut dyn TodoRepository) -> RepoResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let repo = Arc::clone(&self.repo);
        tokio::task::spawn_blocking(move || {
            let mut guard = repo
                .lock()
                .map_err(|_| RepoError::Unavailable("store lock poisoned".to_string()))?;
            f(&mut **guard)
        })
        .await
        .map_err(|e| RepoError::Unavailable(e.to_string()))?
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route(
            TODOS_PATH,
            get(list_todos)
                .post(create_todo)
                .put(update_todo)
                .delete(delete_todo),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn serve(addr: SocketAddr, state: AppState) -> Result<()> {
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    match listener.local_addr() {
        Ok(local) => tracing::info!("listening on http://{local}{TODOS_PATH}"),
        Err(error) => tracing::warn!(%error, "could not determine local address"),
    }

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    tracing::info!("server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(error) = signal::ctrl_c().await {
            tracing::warn!(%error, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(error) => {
                tracing::warn!(%error, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("shutdown signal received");
}
