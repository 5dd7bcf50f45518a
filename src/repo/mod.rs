use thiserror::Error;

use crate::domain::todo::{Todo, TodoId};

pub mod memory;
pub mod sqlite;

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("todo {0} not found")]
    NotFound(TodoId),

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

pub type RepoResult<T> = Result<T, RepoError>;

/// Typed access to the task table.
///
/// `all` returns the most recently created task first. Ids handed out by
/// `create` are never reused, even after the task is deleted.
pub trait TodoRepository: Send {
    fn all(&self) -> RepoResult<Vec<Todo>>;
    fn create(&mut self, task: String) -> RepoResult<Todo>;
    fn set_completed(&mut self, id: TodoId, completed: bool) -> RepoResult<Todo>;
    fn delete(&mut self, id: TodoId) -> RepoResult<Todo>;
}
