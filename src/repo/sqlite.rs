use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension, Row, params};

use super::{RepoError, RepoResult, TodoRepository};
use crate::domain::todo::{Todo, TodoId};

pub struct SqliteTodoRepo {
    conn: Connection,
}

impl SqliteTodoRepo {
    pub fn open_default() -> Result<Self> {
        let path = default_db_path()?;
        Self::open(path)
    }

    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create db dir {}", parent.display()))?;
        }
        let conn =
            Connection::open(path).with_context(|| format!("failed to open db {}", path.display()))?;
        init_schema(&conn)?;
        tracing::info!(path = %path.display(), "opened sqlite store");
        Ok(Self { conn })
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("failed to open in-memory db")?;
        init_schema(&conn)?;
        Ok(Self { conn })
    }
}

impl TodoRepository for SqliteTodoRepo {
    fn all(&self) -> RepoResult<Vec<Todo>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, task, completed FROM todos ORDER BY id DESC")?;
        let rows = stmt.query_map([], row_to_todo)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn create(&mut self, task: String) -> RepoResult<Todo> {
        self.conn.execute(
            "INSERT INTO todos (task, completed) VALUES (?1, 0)",
            params![task],
        )?;
        Ok(Todo::new(self.conn.last_insert_rowid(), task))
    }

    fn set_completed(&mut self, id: TodoId, completed: bool) -> RepoResult<Todo> {
        let changed = self.conn.execute(
            "UPDATE todos SET completed = ?1 WHERE id = ?2",
            params![completed, id],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound(id));
        }
        fetch_todo(&self.conn, id)?.ok_or(RepoError::NotFound(id))
    }

    fn delete(&mut self, id: TodoId) -> RepoResult<Todo> {
        let todo = fetch_todo(&self.conn, id)?.ok_or(RepoError::NotFound(id))?;
        self.conn
            .execute("DELETE FROM todos WHERE id = ?1", params![id])?;
        Ok(todo)
    }
}

fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
PRAGMA journal_mode=WAL;
CREATE TABLE IF NOT EXISTS todos (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  task TEXT NOT NULL,
  completed INTEGER NOT NULL DEFAULT 0
);
"#,
    )
    .context("failed to initialize schema")?;
    Ok(())
}

fn row_to_todo(row: &Row) -> rusqlite::Result<Todo> {
    Ok(Todo {
        id: row.get("id")?,
        task: row.get("task")?,
        completed: row.get("completed")?,
    })
}

fn fetch_todo(conn: &Connection, id: TodoId) -> rusqlite::Result<Option<Todo>> {
    conn.query_row(
        "SELECT id, task, completed FROM todos WHERE id = ?1",
        params![id],
        row_to_todo,
    )
    .optional()
}

fn default_db_path() -> Result<PathBuf> {
    let base = dirs::data_dir().context("failed to resolve data dir")?;
    Ok(base.join("tasklist").join("todos.sqlite"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sqlite_repo_crud() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        let mut repo = SqliteTodoRepo::open(tmp.path()).unwrap();

        let milk = repo.create("Buy milk".to_string()).unwrap();
        let bread = repo.create("Buy bread".to_string()).unwrap();
        assert!(!milk.completed);
        assert!(bread.id > milk.id);
        assert_eq!(repo.all().unwrap(), vec![bread.clone(), milk.clone()]);

        let done = repo.set_completed(milk.id, true).unwrap();
        assert!(done.completed);
        assert_eq!(done.task, "Buy milk");
        assert_eq!(done.id, milk.id);

        assert_eq!(repo.delete(bread.id).unwrap(), bread);
        assert_eq!(repo.all().unwrap(), vec![done]);
    }

    #[test]
    fn unknown_ids_fail_without_touching_rows() {
        let mut repo = SqliteTodoRepo::open_in_memory().unwrap();
        let todo = repo.create("keep me".to_string()).unwrap();

        assert!(matches!(
            repo.set_completed(todo.id + 1, true),
            Err(RepoError::NotFound(_))
        ));
        assert!(matches!(repo.delete(todo.id + 1), Err(RepoError::NotFound(_))));
        assert_eq!(repo.all().unwrap(), vec![todo.clone()]);

        repo.delete(todo.id).unwrap();
        assert!(matches!(repo.delete(todo.id), Err(RepoError::NotFound(_))));
    }

    #[test]
    fn ids_survive_reopen_and_are_not_reused() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        let first = {
            let mut repo = SqliteTodoRepo::open(tmp.path()).unwrap();
            let todo = repo.create("a".to_string()).unwrap();
            repo.delete(todo.id).unwrap();
            todo
        };

        let mut repo = SqliteTodoRepo::open(tmp.path()).unwrap();
        let second = repo.create("b".to_string()).unwrap();
        assert!(second.id > first.id);
    }
}
