//! Database connection management

use crate::error::Result;
use rusqlite::Connection;
use std::path::{Path, PathBuf};

use super::migrations;

/// One tenant's SQLite database
pub struct Database {
    conn: Connection,
    path: Option<PathBuf>,
    schema_version: i32,
}

impl Database {
    /// Open a database at the given path, creating it if it doesn't exist
    ///
    /// Runs migrations automatically.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let conn = Connection::open(&path)?;
        Self::init(conn, Some(path))
    }

    /// Open an in-memory database (useful for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init(conn, None)
    }

    fn init(mut conn: Connection, path: Option<PathBuf>) -> Result<Self> {
        Self::configure(&conn, path.is_some())?;
        let schema_version = migrations::run(&mut conn)?;
        Ok(Self {
            conn,
            path,
            schema_version,
        })
    }

    /// Configure `SQLite` for a durable local queue
    fn configure(conn: &Connection, on_disk: bool) -> Result<()> {
        if on_disk {
            // WAL keeps readers from blocking the writer; not meaningful in memory
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |_| Ok(()))?;
        }
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        Ok(())
    }

    /// Schema version reached after migrations ran
    pub const fn schema_version(&self) -> i32 {
        self.schema_version
    }

    /// File backing this database, `None` for in-memory databases
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Get a reference to the underlying connection
    pub const fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Close the connection, surfacing any error `SQLite` reports on close
    pub fn close(self) -> Result<()> {
        self.conn.close().map_err(|(_, error)| error.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_open_in_memory() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.path().is_none());
        assert_eq!(db.schema_version(), migrations::CURRENT_VERSION);
    }

    #[test]
    fn test_open_on_disk_survives_reopen() {
        let tmp = tempdir().unwrap();
        let db_path = tmp.path().join("tenant.db");

        let db = Database::open(&db_path).unwrap();
        db.connection()
            .execute("INSERT INTO tenant_meta (key, value) VALUES ('probe', 'x')", [])
            .unwrap();
        db.close().unwrap();

        let reopened = Database::open(&db_path).unwrap();
        let value: String = reopened
            .connection()
            .query_row("SELECT value FROM tenant_meta WHERE key = 'probe'", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(value, "x");
        assert_eq!(reopened.path(), Some(db_path.as_path()));
    }
}
