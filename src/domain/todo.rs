use serde::{Deserialize, Serialize};

pub type TodoId = i64;

/// A single task. `id` is assigned by the store and never changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Todo {
    pub id: TodoId,
    pub task: String,
    pub completed: bool,
}

impl Todo {
    pub fn new(id: TodoId, task: impl Into<String>) -> Self {
        Self {
            id,
            task: task.into(),
            completed: false,
        }
    }
}
