use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Deserializer, Serialize};

use super::AppState;
use super::error::ApiError;
use crate::domain::todo::{Todo, TodoId};
use crate::repo::RepoError;

pub const DELETED_MESSAGE: &str = "Todo deleted successfully";

#[derive(Debug, Deserialize)]
pub struct CreateTodo {
    #[serde(alias = "description")]
    pub task: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateTodo {
    #[serde(deserialize_with = "coerce_id")]
    pub id: TodoId,
    pub completed: bool,
}

#[derive(Debug, Deserialize)]
pub struct DeleteTodo {
    #[serde(deserialize_with = "coerce_id")]
    pub id: TodoId,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Deleted {
    pub message: String,
}

pub async fn list_todos(State(state): State<AppState>) -> Result<Json<Vec<Todo>>, ApiError> {
    let todos = state
        .with_repo(|repo| repo.all())
        .await
        .map_err(store_failed(ApiError::Fetch))?;
    Ok(Json(todos))
}

pub async fn create_todo(
    State(state): State<AppState>,
    payload: Bytes,
) -> Result<Json<Todo>, ApiError> {
    let CreateTodo { task } = body(&payload, ApiError::Create)?;
    let todo = state
        .with_repo(move |repo| repo.create(task))
        .await
        .map_err(store_failed(ApiError::Create))?;
    tracing::info!(id = todo.id, "created todo");
    Ok(Json(todo))
}

pub async fn update_todo(
    State(state): State<AppState>,
    payload: Bytes,
) -> Result<Json<Todo>, ApiError> {
    let UpdateTodo { id, completed } = body(&payload, ApiError::Update)?;
    let todo = state
        .with_repo(move |repo| repo.set_completed(id, completed))
        .await
        .map_err(store_failed(ApiError::Update))?;
    tracing::info!(id, completed, "updated todo");
    Ok(Json(todo))
}

pub async fn delete_todo(
    State(state): State<AppState>,
    payload: Bytes,
) -> Result<Json<Deleted>, ApiError> {
    let DeleteTodo { id } = body(&payload, ApiError::Delete)?;
    state
        .with_repo(move |repo| repo.delete(id))
        .await
        .map_err(store_failed(ApiError::Delete))?;
    tracing::info!(id, "deleted todo");
    Ok(Json(Deleted {
        message: DELETED_MESSAGE.to_string(),
    }))
}

/// Parses the body as JSON whatever its `Content-Type`.
fn body<T: DeserializeOwned>(payload: &[u8], op: ApiError) -> Result<T, ApiError> {
    serde_json::from_slice(payload).map_err(|error| {
        tracing::warn!(%error, "rejected request body");
        op
    })
}

fn store_failed(op: ApiError) -> impl FnOnce(RepoError) -> ApiError {
    move |error| {
        match &error {
            RepoError::NotFound(_) => tracing::warn!(%error, "{}", op.message()),
            _ => tracing::error!(%error, "{}", op.message()),
        }
        op
    }
}

/// Accepts `7`, `7.0` or `"7"`.
fn coerce_id<'de, D>(deserializer: D) -> Result<TodoId, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Int(i64),
        Float(f64),
        Text(String),
    }

    match RawId::deserialize(deserializer)? {
        RawId::Int(id) => Ok(id),
        // i64::MAX as f64 rounds up to 2^63, so the upper bound is exclusive.
        RawId::Float(f)
            if f.fract() == 0.0 && f >= TodoId::MIN as f64 && f < TodoId::MAX as f64 =>
        {
            Ok(f as TodoId)
        }
        RawId::Float(f) => Err(D::Error::custom(format!("id {f} is not an integer"))),
        RawId::Text(s) => s
            .trim()
            .parse()
            .map_err(|_| D::Error::custom(format!("id {s:?} is not an integer"))),
    }
}
