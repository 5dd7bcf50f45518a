use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::json;
use thiserror::Error;

use crate::domain::todo::{Todo, TodoId};
use crate::server::error::ErrorBody;
use crate::server::handlers::Deleted;

pub const DEFAULT_URL: &str = "http://127.0.0.1:3000/api/todos";

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("server returned {status}: {message}")]
    Server { status: u16, message: String },
}

/// The four task operations as seen from the list view.
#[async_trait]
pub trait TodoApi: Send + Sync {
    async fn list(&self) -> Result<Vec<Todo>, ClientError>;
    async fn create(&self, task: &str) -> Result<Todo, ClientError>;
    async fn update(&self, id: TodoId, completed: bool) -> Result<Todo, ClientError>;
    async fn delete(&self, id: TodoId) -> Result<String, ClientError>;
}

pub struct HttpTodoApi {
    http: reqwest::Client,
    url: String,
}

impl HttpTodoApi {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            url: url.into(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl TodoApi for HttpTodoApi {
    async fn list(&self) -> Result<Vec<Todo>, ClientError> {
        decode(self.http.get(&self.url).send().await?).await
    }

    async fn create(&self, task: &str) -> Result<Todo, ClientError> {
        let response = self
            .http
            .post(&self.url)
            .json(&json!({ "task": task }))
            .send()
            .await?;
        decode(response).await
    }

    async fn update(&self, id: TodoId, completed: bool) -> Result<Todo, ClientError> {
        let response = self
            .http
            .put(&self.url)
            .json(&json!({ "id": id, "completed": completed }))
            .send()
            .await?;
        decode(response).await
    }

    async fn delete(&self, id: TodoId) -> Result<String, ClientError> {
        let response = self
            .http
            .delete(&self.url)
            .json(&json!({ "id": id }))
            .send()
            .await?;
        let deleted: Deleted = decode(response).await?;
        Ok(deleted.message)
    }
}

async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response.json().await?);
    }
    let message = match response.json::<ErrorBody>().await {
        Ok(body) => body.error,
        Err(_) => status
            .canonical_reason()
            .unwrap_or("unknown error")
            .to_string(),
    };
    Err(ClientError::Server {
        status: status.as_u16(),
        message,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repo::memory::InMemoryTodoRepo;
    use crate::server::{AppState, TODOS_PATH, router};

    async fn spawn_server() -> HttpTodoApi {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = router(AppState::new(InMemoryTodoRepo::default()));
        tokio::spawn(async move { axum::serve(listener, app).await });
        HttpTodoApi::new(format!("http://{addr}{TODOS_PATH}"))
    }

    #[tokio::test]
    async fn talks_to_a_live_server() {
        let api = spawn_server().await;

        let milk = api.create("Buy milk").await.unwrap();
        assert!(!milk.completed);
        assert_eq!(api.list().await.unwrap(), vec![milk.clone()]);

        let done = api.update(milk.id, true).await.unwrap();
        assert!(done.completed);

        let message = api.delete(milk.id).await.unwrap();
        assert_eq!(message, "Todo deleted successfully");
        assert!(api.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn surfaces_server_error_message() {
        let api = spawn_server().await;
        let err = api.delete(12345).await.unwrap_err();
        match err {
            ClientError::Server { status, message } => {
                assert_eq!(status, 500);
                assert_eq!(message, "Failed to delete todo");
            }
            other => panic!("expected server error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unreachable_server_is_a_transport_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let api = HttpTodoApi::new(format!("http://{addr}{TODOS_PATH}"));
        assert!(matches!(api.list().await, Err(ClientError::Transport(_))));
    }
}
