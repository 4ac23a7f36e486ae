//! SQLite-backed document store.
//!
//! Documents live in a single table:
//!
//! ```sql
//! CREATE TABLE instances (id TEXT PRIMARY KEY, data JSON NOT NULL)
//! ```
//!
//! The same database file is read and written by the external interpreter,
//! so the connection uses WAL journaling and waits out lock conflicts for up
//! to the configured busy timeout instead of failing immediately.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};

use crate::{BackendError, DocumentStore};

pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const CREATE_TABLE: &str =
    "CREATE TABLE IF NOT EXISTS instances (id TEXT PRIMARY KEY, data JSON NOT NULL)";

pub struct SqliteStore {
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
}

impl SqliteStore {
    /// Open (creating if needed) the database file at `path`.
    pub fn open(path: impl AsRef<Path>, busy_timeout: Duration) -> Result<Self, BackendError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        log::debug!("Opening document store {}...", path.display());
        let conn = Connection::open(path)?;
        conn.busy_timeout(busy_timeout)?;
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| {
            row.get::<_, String>(0)
        })?;
        conn.execute(CREATE_TABLE, [])?;

        Ok(Self {
            conn: Mutex::new(conn),
            path: Some(path.to_path_buf()),
        })
    }

    /// A private in-memory database, mostly useful for tests.
    pub fn open_in_memory() -> Result<Self, BackendError> {
        let conn = Connection::open_in_memory()?;
        conn.execute(CREATE_TABLE, [])?;
        Ok(Self {
            conn: Mutex::new(conn),
            path: None,
        })
    }

    /// Database file path, `None` for in-memory stores.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

impl DocumentStore for SqliteStore {
    fn get(&self, id: &str) -> Result<Option<String>, BackendError> {
        let conn = self.conn.lock();
        let document = conn
            .query_row(
                "SELECT data FROM instances WHERE id = ?1",
                params![id],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(document)
    }

    fn put(&self, id: &str, document: &str) -> Result<(), BackendError> {
        log::debug!("Writing instance {}...", id);
        let conn = self.conn.lock();
        conn.execute(
            "INSERT OR REPLACE INTO instances (id, data) VALUES (?1, json(?2))",
            params![id, document],
        )?;
        Ok(())
    }

    fn delete(&self, id: &str) -> Result<(), BackendError> {
        let conn = self.conn.lock();
        conn.execute("DELETE FROM instances WHERE id = ?1", params![id])?;
        Ok(())
    }

    fn find_by_class(&self, class: &str) -> Result<Vec<String>, BackendError> {
        let conn = self.conn.lock();
        let mut statement =
            conn.prepare("SELECT id FROM instances WHERE json_extract(data, '$.class') = ?1")?;
        let ids = statement
            .query_map(params![class], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ids)
    }

    fn close(self) -> Result<(), BackendError> {
        log::debug!("Closing document store...");
        self.conn
            .into_inner()
            .close()
            .map_err(|(_, error)| BackendError::from(error))
    }
}
