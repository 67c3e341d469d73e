//! SQLite persistence for users, detection runs, defect records and the
//! model registry.
//!
//! rusqlite is blocking, so the connection lives behind a mutex and every
//! call from a handler goes through [`Store::call`], which runs the closure
//! on tokio's blocking pool.

pub mod detections;
pub mod models;
pub mod stats;
pub mod types;
pub mod users;

use std::{
    path::Path,
    sync::{Arc, Mutex},
};

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::Connection;
use tracing::info;

use crate::error::{AppError, Result};

pub use types::*;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    email TEXT NOT NULL UNIQUE COLLATE NOCASE,
    password_hash TEXT NOT NULL,
    avatar BLOB,
    avatar_mime TEXT,
    avatar_size INTEGER,
    role TEXT NOT NULL DEFAULT 'user' CHECK (role IN ('user', 'admin')),
    active INTEGER NOT NULL DEFAULT 1,
    last_login TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS detections (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    original_image BLOB NOT NULL,
    original_image_type TEXT NOT NULL,
    result_image BLOB,
    defect_count INTEGER NOT NULL DEFAULT 0,
    average_confidence REAL NOT NULL DEFAULT 0,
    detection_time INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_detections_user_created ON detections(user_id, created_at DESC);

CREATE TABLE IF NOT EXISTS defects (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    detection_id INTEGER NOT NULL REFERENCES detections(id) ON DELETE CASCADE,
    defect_type TEXT NOT NULL,
    class_id INTEGER NOT NULL,
    x_center REAL NOT NULL,
    y_center REAL NOT NULL,
    width REAL NOT NULL,
    height REAL NOT NULL,
    confidence REAL NOT NULL,
    thumbnail BLOB
);
CREATE INDEX IF NOT EXISTS idx_defects_detection ON defects(detection_id);
CREATE INDEX IF NOT EXISTS idx_defects_type ON defects(defect_type);

CREATE TABLE IF NOT EXISTS detection_models (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    model_name TEXT NOT NULL,
    model_version TEXT NOT NULL,
    model_file TEXT NOT NULL,
    is_active INTEGER NOT NULL DEFAULT 0,
    uploaded_by INTEGER REFERENCES users(id) ON DELETE SET NULL,
    uploaded_at TEXT NOT NULL
);
";

/// Shared handle to the database.
#[derive(Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
}

impl Store {
    /// Open or create the database file, creating the parent directory if needed.
    pub fn open(db_path: &Path) -> anyhow::Result<Self> {
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(db_path)?;
        migrate(&conn)?;
        info!("Opened detection database at {:?}", db_path);
        Ok(Self::from_connection(conn))
    }

    pub fn open_in_memory() -> anyhow::Result<Self> {
        let conn = Connection::open_in_memory()?;
        migrate(&conn)?;
        Ok(Self::from_connection(conn))
    }

    fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    /// Run `f` against the connection on the blocking pool.
    pub async fn call<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn
                .lock()
                .map_err(|_| AppError::internal("database connection lock poisoned"))?;
            f(&mut guard)
        })
        .await?
    }
}

/// Create tables and indexes if they don't exist.
pub fn migrate(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.execute_batch(SCHEMA)
}

/// Current time in the stored timestamp format.
pub fn now() -> String {
    timestamp(Utc::now())
}

/// RFC 3339 UTC with millisecond precision; sorts lexicographically.
pub fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}
