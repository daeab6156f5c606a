//! Identity store: the persisted `code ⇄ secret` mapping.
//!
//! Both directions are unique: a code never maps to two secrets and a secret
//! never maps to two codes. `insert` reports a collision instead of
//! overwriting so the caller can mint fresh identifiers.

use std::path::Path;
use std::sync::Mutex;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::RelayError;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Either the secret or the code is already taken.
    #[error("identifier already in use")]
    Conflict,
    #[error(transparent)]
    Backend(#[from] RelayError),
}

pub trait IdentityStore: Send + Sync {
    fn code_for_secret(&self, secret: &str) -> Result<Option<String>, RelayError>;
    fn secret_for_code(&self, code: &str) -> Result<Option<String>, RelayError>;
    fn insert(&self, secret: &str, code: &str) -> Result<(), StoreError>;
}

// ── SQLite ────────────────────────────────────────────────────────────────────

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS identities (
    secret     TEXT PRIMARY KEY NOT NULL,
    code       TEXT UNIQUE NOT NULL,
    created_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
);
";

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self, RelayError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                RelayError::StoreUnavailable(format!("cannot create {}: {e}", parent.display()))
            })?;
        }
        Self::from_connection(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self, RelayError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, RelayError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lookup(&self, sql: &str, key: &str) -> Result<Option<String>, RelayError> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| RelayError::StoreUnavailable("lock poisoned".into()))?;
        let value = conn
            .query_row(sql, params![key], |row| row.get(0))
            .optional()?;
        Ok(value)
    }
}

impl IdentityStore for SqliteStore {
    fn code_for_secret(&self, secret: &str) -> Result<Option<String>, RelayError> {
        self.lookup("SELECT code FROM identities WHERE secret = ?1", secret)
    }

    fn secret_for_code(&self, code: &str) -> Result<Option<String>, RelayError> {
        self.lookup("SELECT secret FROM identities WHERE code = ?1", code)
    }

    fn insert(&self, secret: &str, code: &str) -> Result<(), StoreError> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| RelayError::StoreUnavailable("lock poisoned".into()))?;
        match conn.execute(
            "INSERT INTO identities (secret, code) VALUES (?1, ?2)",
            params![secret, code],
        ) {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(StoreError::Conflict)
            }
            Err(e) => Err(RelayError::from(e).into()),
        }
    }
}

// ── Memory ────────────────────────────────────────────────────────────────────

/// Process-lifetime store. Codes do not survive a restart.
#[derive(Default)]
pub struct MemoryStore {
    code_by_secret: DashMap<String, String>,
    secret_by_code: DashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl IdentityStore for MemoryStore {
    fn code_for_secret(&self, secret: &str) -> Result<Option<String>, RelayError> {
        Ok(self.code_by_secret.get(secret).map(|c| c.value().clone()))
    }

    fn secret_for_code(&self, code: &str) -> Result<Option<String>, RelayError> {
        Ok(self.secret_by_code.get(code).map(|s| s.value().clone()))
    }

    fn insert(&self, secret: &str, code: &str) -> Result<(), StoreError> {
        // Claim the code first; it is the direction receivers look up.
        match self.secret_by_code.entry(code.to_string()) {
            Entry::Occupied(_) => return Err(StoreError::Conflict),
            Entry::Vacant(v) => {
                v.insert(secret.to_string());
            }
        }
        match self.code_by_secret.entry(secret.to_string()) {
            Entry::Occupied(_) => {
                self.secret_by_code.remove(code);
                Err(StoreError::Conflict)
            }
            Entry::Vacant(v) => {
                v.insert(code.to_string());
                Ok(())
            }
        }
    }
}
