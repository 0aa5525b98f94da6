//! SQLite-backed app-ops ledger.
//!
//! Durable counterpart of the in-memory ledger. One row per explicitly set
//! `(uid, package, op)`; resetting a key to [`AppOpMode::Default`] deletes
//! its row. Each row records the uid that last wrote it.
//!
//! # Schema
//!
//! ```sql
//! CREATE TABLE app_ops (
//!     uid         INTEGER NOT NULL,
//!     package     TEXT    NOT NULL,
//!     op          TEXT    NOT NULL,
//!     mode        INTEGER NOT NULL,
//!     modified_by INTEGER NOT NULL,
//!     PRIMARY KEY (uid, package, op)
//! )
//! ```

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use ecm_core::identity::Binder;
use ecm_core::platform::{
    AppOpMode, AppOpsStore, PlatformError, PlatformResult, Uid, enforce_app_ops_access,
};
use rusqlite::{Connection, OptionalExtension, params};
use tracing::debug;

/// App-ops ledger stored in SQLite.
#[derive(Debug, Clone)]
pub struct SqliteAppOpsStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteAppOpsStore {
    /// Opens (or creates) the database at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or the schema
    /// cannot be created.
    pub fn open(path: &Path) -> rusqlite::Result<Self> {
        let conn = Connection::open(path)?;
        Self::init_schema(&conn)?;
        debug!(path = %path.display(), "opened app-ops database");
        Ok(Self::from_connection(conn))
    }

    /// A private in-memory database.
    ///
    /// # Errors
    ///
    /// Returns an error if the schema cannot be created.
    pub fn in_memory() -> rusqlite::Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_schema(&conn)?;
        Ok(Self::from_connection(conn))
    }

    fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS app_ops (
                uid INTEGER NOT NULL,
                package TEXT NOT NULL,
                op TEXT NOT NULL,
                mode INTEGER NOT NULL,
                modified_by INTEGER NOT NULL,
                PRIMARY KEY (uid, package, op)
            )",
            [],
        )?;
        Ok(())
    }

    fn lock(&self) -> PlatformResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| PlatformError::Storage("app-ops connection lock poisoned".to_string()))
    }

    /// The uid that last wrote `op` for `(uid, package)`, if the key is set.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the query fails.
    pub fn modified_by(&self, op: &str, uid: Uid, package: &str) -> PlatformResult<Option<Uid>> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT modified_by FROM app_ops WHERE uid = ?1 AND package = ?2 AND op = ?3",
            params![uid.0, package, op],
            |row| row.get::<_, u32>(0),
        )
        .optional()
        .map(|writer| writer.map(Uid))
        .map_err(storage_error)
    }

    /// Number of explicitly set keys.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the query fails.
    pub fn len(&self) -> PlatformResult<usize> {
        let conn = self.lock()?;
        conn.query_row("SELECT COUNT(*) FROM app_ops", [], |row| row.get::<_, i64>(0))
            .map(|count| usize::try_from(count).unwrap_or(0))
            .map_err(storage_error)
    }

    /// Whether no key is set.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the query fails.
    pub fn is_empty(&self) -> PlatformResult<bool> {
        Ok(self.len()? == 0)
    }
}

fn storage_error(err: rusqlite::Error) -> PlatformError {
    PlatformError::Storage(err.to_string())
}

impl AppOpsStore for SqliteAppOpsStore {
    fn unsafe_check_op_raw(&self, op: &str, uid: Uid, package: &str) -> PlatformResult<AppOpMode> {
        enforce_app_ops_access(Binder::calling_uid(), uid, false)?;
        let conn = self.lock()?;
        let mode = conn
            .query_row(
                "SELECT mode FROM app_ops WHERE uid = ?1 AND package = ?2 AND op = ?3",
                params![uid.0, package, op],
                |row| row.get::<_, i32>(0),
            )
            .optional()
            .map_err(storage_error)?;
        mode.map_or(Ok(AppOpMode::Default), AppOpMode::try_from)
    }

    fn set_mode(&self, op: &str, uid: Uid, package: &str, mode: AppOpMode) -> PlatformResult<()> {
        let writer = Binder::calling_uid();
        enforce_app_ops_access(writer, uid, true)?;
        let conn = self.lock()?;
        if mode == AppOpMode::Default {
            conn.execute(
                "DELETE FROM app_ops WHERE uid = ?1 AND package = ?2 AND op = ?3",
                params![uid.0, package, op],
            )
        } else {
            conn.execute(
                "INSERT INTO app_ops (uid, package, op, mode, modified_by)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT (uid, package, op)
                 DO UPDATE SET mode = excluded.mode, modified_by = excluded.modified_by",
                params![uid.0, package, op, mode.as_i32(), writer.0],
            )
        }
        .map_err(storage_error)?;
        Ok(())
    }
}
