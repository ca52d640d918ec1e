//! Session storage: generated reports keyed by company name, and the
//! ordered list of previously searched companies.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};

use rusqlite::{params, Connection, OptionalExtension};

use scout_core::Error;

/// Report cache plus search history.
///
/// Re-reading a stored report never triggers extraction or a model call; a
/// report only changes when the pipeline runs for that name again.
pub trait SessionStore: Send + Sync {
    fn get(&self, name: &str) -> Result<Option<String>, Error>;

    /// Store (or replace) the report for `name`.
    fn put(&self, name: &str, report: &str) -> Result<(), Error>;

    /// Append `name` to the history unless it is already present.
    fn append_history(&self, name: &str) -> Result<(), Error>;

    /// History in insertion order.
    fn list_history(&self) -> Result<Vec<String>, Error>;
}

// =============================================================================
// In-memory store
// =============================================================================

#[derive(Default)]
struct MemoryState {
    reports: HashMap<String, String>,
    history: Vec<String>,
}

/// Store that lives for the duration of the process.
#[derive(Default)]
pub struct MemorySessionStore {
    state: Mutex<MemoryState>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> Result<MutexGuard<'_, MemoryState>, Error> {
        self.state
            .lock()
            .map_err(|_| Error::store("session state lock poisoned"))
    }
}

impl SessionStore for MemorySessionStore {
    fn get(&self, name: &str) -> Result<Option<String>, Error> {
        Ok(self.state()?.reports.get(name).cloned())
    }

    fn put(&self, name: &str, report: &str) -> Result<(), Error> {
        self.state()?
            .reports
            .insert(name.to_string(), report.to_string());
        Ok(())
    }

    fn append_history(&self, name: &str) -> Result<(), Error> {
        let mut state = self.state()?;
        if !state.history.iter().any(|n| n == name) {
            state.history.push(name.to_string());
        }
        Ok(())
    }

    fn list_history(&self) -> Result<Vec<String>, Error> {
        Ok(self.state()?.history.clone())
    }
}

// =============================================================================
// SQLite store
// =============================================================================

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS reports (
        company TEXT PRIMARY KEY,
        report TEXT NOT NULL,
        generated_at TEXT DEFAULT CURRENT_TIMESTAMP
    );
    CREATE TABLE IF NOT EXISTS history (
        position INTEGER PRIMARY KEY AUTOINCREMENT,
        company TEXT NOT NULL UNIQUE
    );
";

/// Store persisted to a SQLite database so history survives restarts.
pub struct SqliteSessionStore {
    conn: Mutex<Connection>,
}

impl SqliteSessionStore {
    pub fn new(db_path: impl Into<PathBuf>) -> Result<Self, Error> {
        let path = db_path.into();

        // Create parent directories if needed
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| Error::store(format!("Failed to create directory: {}", e)))?;
        }

        let conn = Connection::open(&path)
            .map_err(|e| Error::store(format!("Failed to open database: {}", e)))?;
        Self::with_connection(conn)
    }

    pub fn in_memory() -> Result<Self, Error> {
        let conn = Connection::open_in_memory()
            .map_err(|e| Error::store(format!("Failed to create in-memory database: {}", e)))?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self, Error> {
        conn.execute_batch(SCHEMA)
            .map_err(|e| Error::store(format!("Failed to create tables: {}", e)))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, Error> {
        self.conn
            .lock()
            .map_err(|_| Error::store("database lock poisoned"))
    }

    /// When the stored report for `name` was generated (UTC, SQLite format).
    pub fn generated_at(&self, name: &str) -> Result<Option<String>, Error> {
        self.conn()?
            .query_row(
                "SELECT generated_at FROM reports WHERE company = ?",
                params![name],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| Error::store(e.to_string()))
    }
}

impl SessionStore for SqliteSessionStore {
    fn get(&self, name: &str) -> Result<Option<String>, Error> {
        self.conn()?
            .query_row(
                "SELECT report FROM reports WHERE company = ?",
                params![name],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| Error::store(e.to_string()))
    }

    fn put(&self, name: &str, report: &str) -> Result<(), Error> {
        self.conn()?
            .execute(
                "INSERT OR REPLACE INTO reports (company, report, generated_at) \
                 VALUES (?, ?, CURRENT_TIMESTAMP)",
                params![name, report],
            )
            .map_err(|e| Error::store(format!("Failed to save report: {}", e)))?;
        Ok(())
    }

    fn append_history(&self, name: &str) -> Result<(), Error> {
        self.conn()?
            .execute(
                "INSERT OR IGNORE INTO history (company) VALUES (?)",
                params![name],
            )
            .map_err(|e| Error::store(format!("Failed to update history: {}", e)))?;
        Ok(())
    }

    fn list_history(&self) -> Result<Vec<String>, Error> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT company FROM history ORDER BY position")
            .map_err(|e| Error::store(e.to_string()))?;

        let names = stmt
            .query_map([], |row| row.get(0))
            .map_err(|e| Error::store(e.to_string()))?
            .collect::<Result<Vec<String>, _>>()
            .map_err(|e| Error::store(e.to_string()))?;

        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exercise_store(store: &dyn SessionStore) {
        assert_eq!(store.get("Acme").unwrap(), None);

        store.put("Acme", "## Company Overview\n- Acme").unwrap();
        assert_eq!(
            store.get("Acme").unwrap().as_deref(),
            Some("## Company Overview\n- Acme")
        );

        store.put("Acme", "rerun").unwrap();
        assert_eq!(store.get("Acme").unwrap().as_deref(), Some("rerun"));
    }

    fn exercise_history(store: &dyn SessionStore) {
        store.append_history("Acme").unwrap();
        store.append_history("Globex").unwrap();
        store.append_history("Acme").unwrap();
        store.append_history("Initech").unwrap();

        assert_eq!(
            store.list_history().unwrap(),
            vec!["Acme", "Globex", "Initech"]
        );
    }

    #[test]
    fn test_memory_store_reports() {
        exercise_store(&MemorySessionStore::new());
    }

    #[test]
    fn test_memory_store_history_dedup() {
        exercise_history(&MemorySessionStore::new());
    }

    #[test]
    fn test_sqlite_store_reports() {
        exercise_store(&SqliteSessionStore::in_memory().unwrap());
    }

    #[test]
    fn test_sqlite_store_history_dedup() {
        exercise_history(&SqliteSessionStore::in_memory().unwrap());
    }

    #[test]
    fn test_sqlite_store_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("sessions.db");

        {
            let store = SqliteSessionStore::new(&path).unwrap();
            store.append_history("Acme").unwrap();
            store.put("Acme", "report").unwrap();
            assert!(store.generated_at("Acme").unwrap().is_some());
        }

        let reopened = SqliteSessionStore::new(&path).unwrap();
        assert_eq!(reopened.list_history().unwrap(), vec!["Acme"]);
        assert_eq!(reopened.get("Acme").unwrap().as_deref(), Some("report"));
        assert_eq!(reopened.generated_at("Globex").unwrap(), None);
    }
}
