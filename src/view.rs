use std::collections::BTreeMap;

use crate::client::ClientError;
use crate::domain::todo::{Todo, TodoId};

pub const FETCH_FAILED: &str = "Failed to fetch todos";
pub const ADD_FAILED: &str = "Failed to add todo";
pub const UPDATE_FAILED: &str = "Failed to update todo";
pub const DELETE_FAILED: &str = "Failed to delete todo";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    /// Fetch the whole list and replace the cache.
    Load,
    /// Replace the draft text of the next task.
    Edit(String),
    Add,
    Toggle(TodoId),
    Delete(TodoId),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    List,
    Create { task: String },
    Update { id: TodoId, completed: bool },
    Delete { id: TodoId },
}

/// Compensating change for an optimistic update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rollback {
    SetCompleted { id: TodoId, completed: bool },
    Reinsert(Todo),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub request: Request,
    pub rollback: Option<Rollback>,
}

impl Command {
    fn plain(request: Request) -> Self {
        Self {
            request,
            rollback: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    Listed(Vec<Todo>),
    Created(Todo),
    Updated(Todo),
    Deleted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Info(String),
    Success(String),
    Failure(String),
}

impl Notice {
    pub fn text(&self) -> &str {
        match self {
            Notice::Info(s) | Notice::Success(s) | Notice::Failure(s) => s,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pending {
    Toggle { completed: bool },
    Delete,
}

/// Client-side task list. Transitions take and return the value; see
/// [`TodoView::apply`] and [`TodoView::settle`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TodoView {
    todos: Vec<Todo>,
    draft: String,
    adding: bool,
    loading: bool,
    in_flight: BTreeMap<TodoId, Pending>,
    // Changes the server confirmed while a list request was out; `None` is a
    // delete. A list served earlier would not contain them.
    confirmed_during_load: BTreeMap<TodoId, Option<Todo>>,
}

impl TodoView {
    pub fn todos(&self) -> &[Todo] {
        &self.todos
    }

    pub fn draft(&self) -> &str {
        &self.draft
    }

    pub fn is_adding(&self) -> bool {
        self.adding
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn is_in_flight(&self, id: TodoId) -> bool {
        self.in_flight.contains_key(&id)
    }

    pub fn apply(mut self, intent: Intent) -> (Self, Option<Command>) {
        let command = match intent {
            Intent::Load => self.begin_load(),
            Intent::Edit(draft) => {
                self.draft = draft;
                None
            }
            Intent::Add => self.begin_add(),
            Intent::Toggle(id) => self.begin_toggle(id),
            Intent::Delete(id) => self.begin_delete(id),
        };
        (self, command)
    }

    /// Folds a finished request back into the view. A response of the wrong
    /// kind for the request is handled like a failure.
    pub fn settle(
        mut self,
        command: Command,
        result: Result<Response, ClientError>,
    ) -> (Self, Option<Notice>) {
        let Command { request, rollback } = command;
        let notice = match (request, result) {
            (Request::List, Ok(Response::Listed(todos))) => {
                self.loading = false;
                self.replace_cache(todos);
                None
            }
            (Request::List, _) => {
                self.loading = false;
                self.confirmed_during_load.clear();
                Some(Notice::Failure(FETCH_FAILED.into()))
            }
            (Request::Create { .. }, Ok(Response::Created(todo))) => {
                self.adding = false;
                self.confirm(todo.id, Some(todo.clone()));
                self.todos.insert(0, todo);
                self.draft.clear();
                Some(Notice::Success("Todo added successfully".into()))
            }
            (Request::Create { .. }, _) => {
                self.adding = false;
                Some(Notice::Failure(ADD_FAILED.into()))
            }
            (Request::Update { id, .. }, Ok(Response::Updated(todo))) => {
                self.in_flight.remove(&id);
                let message = if todo.completed {
                    "Todo completed successfully"
                } else {
                    "Todo reopened"
                };
                self.confirm(todo.id, Some(todo.clone()));
                if let Some(slot) = self.todos.iter_mut().find(|t| t.id == todo.id) {
                    *slot = todo;
                }
                Some(Notice::Success(message.into()))
            }
            (Request::Update { id, .. }, _) => {
                self.in_flight.remove(&id);
                self.undo(rollback);
                Some(Notice::Failure(UPDATE_FAILED.into()))
            }
            (Request::Delete { id }, Ok(Response::Deleted)) => {
                self.in_flight.remove(&id);
                self.confirm(id, None);
                self.todos.retain(|t| t.id != id);
                Some(Notice::Success("Todo deleted successfully".into()))
            }
            (Request::Delete { id }, _) => {
                self.in_flight.remove(&id);
                self.undo(rollback);
                Some(Notice::Failure(DELETE_FAILED.into()))
            }
        };
        (self, notice)
    }

    fn confirm(&mut self, id: TodoId, todo: Option<Todo>) {
        if self.loading {
            self.confirmed_during_load.insert(id, todo);
        }
    }

    /// Takes a fresh list from the server, keeping changes it cannot know
    /// about yet: those confirmed after it was requested and those still in
    /// flight.
    fn replace_cache(&mut self, todos: Vec<Todo>) {
        self.todos = todos;
        for (id, todo) in std::mem::take(&mut self.confirmed_during_load) {
            self.todos.retain(|t| t.id != id);
            if let Some(todo) = todo {
                self.insert_ordered(todo);
            }
        }
        for (&id, pending) in &self.in_flight {
            match *pending {
                Pending::Delete => self.todos.retain(|t| t.id != id),
                Pending::Toggle { completed } => {
                    if let Some(todo) = self.todos.iter_mut().find(|t| t.id == id) {
                        todo.completed = completed;
                    }
                }
            }
        }
    }

    fn insert_ordered(&mut self, todo: Todo) {
        // Keep the list newest-first.
        let pos = self
            .todos
            .iter()
            .position(|t| t.id < todo.id)
            .unwrap_or(self.todos.len());
        self.todos.insert(pos, todo);
    }

    fn begin_load(&mut self) -> Option<Command> {
        if self.loading {
            return None;
        }
        self.loading = true;
        Some(Command::plain(Request::List))
    }

    fn begin_add(&mut self) -> Option<Command> {
        let task = self.draft.trim();
        if task.is_empty() || self.adding {
            return None;
        }
        let task = task.to_owned();
        self.adding = true;
        Some(Command::plain(Request::Create { task }))
    }

    fn begin_toggle(&mut self, id: TodoId) -> Option<Command> {
        if self.in_flight.contains_key(&id) {
            return None;
        }
        let todo = self.todos.iter_mut().find(|t| t.id == id)?;
        let previous = todo.completed;
        todo.completed = !previous;
        self.in_flight.insert(
            id,
            Pending::Toggle {
                completed: !previous,
            },
        );
        Some(Command {
            request: Request::Update {
                id,
                completed: !previous,
            },
            rollback: Some(Rollback::SetCompleted {
                id,
                completed: previous,
            }),
        })
    }

    fn begin_delete(&mut self, id: TodoId) -> Option<Command> {
        if self.in_flight.contains_key(&id) {
            return None;
        }
        let pos = self.todos.iter().position(|t| t.id == id)?;
        let removed = self.todos.remove(pos);
        self.in_flight.insert(id, Pending::Delete);
        Some(Command {
            request: Request::Delete { id },
            rollback: Some(Rollback::Reinsert(removed)),
        })
    }

    fn undo(&mut self, rollback: Option<Rollback>) {
        match rollback {
            Some(Rollback::SetCompleted { id, completed }) => {
                if let Some(todo) = self.todos.iter_mut().find(|t| t.id == id) {
                    todo.completed = completed;
                }
            }
            Some(Rollback::Reinsert(todo)) => {
                if self.todos.iter().any(|t| t.id == todo.id) {
                    return;
                }
                self.insert_ordered(todo);
            }
            None => {}
        }
    }
}
