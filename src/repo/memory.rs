use std::collections::VecDeque;

use super::{RepoError, RepoResult, TodoRepository};
use crate::domain::todo::{Todo, TodoId};

/// Newest first; `next_id` only ever grows.
#[derive(Debug)]
pub struct InMemoryTodoRepo {
    items: VecDeque<Todo>,
    next_id: TodoId,
}

impl Default for InMemoryTodoRepo {
    fn default() -> Self {
        Self {
            items: VecDeque::new(),
            next_id: 1,
        }
    }
}

impl InMemoryTodoRepo {
    pub fn with_seed<I, S>(seed: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut repo = Self::default();
        for task in seed {
            repo.push(task.into());
        }
        repo
    }

    fn push(&mut self, task: String) -> Todo {
        let todo = Todo::new(self.next_id, task);
        self.next_id += 1;
        self.items.push_front(todo.clone());
        todo
    }
}

impl TodoRepository for InMemoryTodoRepo {
    fn all(&self) -> RepoResult<Vec<Todo>> {
        Ok(self.items.iter().cloned().collect())
    }

    fn create(&mut self, task: String) -> RepoResult<Todo> {
        Ok(self.push(task))
    }

    fn set_completed(&mut self, id: TodoId, completed: bool) -> RepoResult<Todo> {
        for todo in &mut self.items {
            if todo.id == id {
                todo.completed = completed;
                return Ok(todo.clone());
            }
        }
        Err(RepoError::NotFound(id))
    }

    fn delete(&mut self, id: TodoId) -> RepoResult<Todo> {
        let pos = self
            .items
            .iter()
            .position(|t| t.id == id)
            .ok_or(RepoError::NotFound(id))?;
        self.items.remove(pos).ok_or(RepoError::NotFound(id))
    }
}
