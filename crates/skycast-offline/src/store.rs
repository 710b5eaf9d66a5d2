//! SQLite-backed key/value store shared by the app and worker contexts.
//!
//! Both contexts read and write the same keys; routing every access
//! through one connection keeps them from diverging.

use parking_lot::Mutex;
use rusqlite::{params, Connection};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

/// Recent-search list: JSON array of city names, most recent first.
pub const KEY_RECENT_SEARCHES: &str = "recentSearches";

/// Offline queue: JSON array of queued weather requests.
pub const KEY_PENDING_REQUESTS: &str = "pendingWeatherRequests";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    Open(String),

    #[error("Query failed: {0}")]
    Query(#[from] rusqlite::Error),

    #[error("Corrupt value under '{key}': {source}")]
    Decode {
        key: String,
        source: serde_json::Error,
    },

    #[error("Failed to encode value: {0}")]
    Encode(serde_json::Error),
}

/// Handle to the shared store. Cheap to clone; all clones use the
/// same connection.
#[derive(Clone)]
pub struct SharedStore {
    conn: Arc<Mutex<Connection>>,
}

impl SharedStore {
    /// Open (or create) the store at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::Open(e.to_string()))?;
        }
        let conn = Connection::open(path).map_err(|e| StoreError::Open(e.to_string()))?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Create an in-memory store (tests, ephemeral runs).
    pub fn in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().map_err(|e| StoreError::Open(e.to_string()))?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<(), StoreError> {
        self.conn.lock().execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            );
            "#,
        )?;
        Ok(())
    }

    /// Read and decode the value under `key`, if present.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StoreError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT value FROM kv WHERE key = ?1")?;
        let mut rows = stmt.query(params![key])?;

        match rows.next()? {
            Some(row) => {
                let raw: String = row.get(0)?;
                let value = serde_json::from_str(&raw).map_err(|source| StoreError::Decode {
                    key: key.to_string(),
                    source,
                })?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    /// Read the list under `key`, defaulting to empty when absent.
    pub fn get_list<T: DeserializeOwned>(&self, key: &str) -> Result<Vec<T>, StoreError> {
        Ok(self.get::<Vec<T>>(key)?.unwrap_or_default())
    }

    /// Encode and write `value` under `key`, replacing any previous value.
    pub fn put<T: Serialize>(&self, key: &str, value: &T) -> Result<(), StoreError> {
        let raw = serde_json::to_string(value).map_err(StoreError::Encode)?;
        let now = chrono::Utc::now().timestamp_millis();
        self.conn.lock().execute(
            "INSERT OR REPLACE INTO kv (key, value, updated_at) VALUES (?1, ?2, ?3)",
            params![key, raw, now],
        )?;
        Ok(())
    }

    /// Delete the value under `key`. Missing keys are not an error.
    pub fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.conn
            .lock()
            .execute("DELETE FROM kv WHERE key = ?1", params![key])?;
        Ok(())
    }
}
