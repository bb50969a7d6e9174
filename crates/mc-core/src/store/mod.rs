//! Persistence using SQLite
//!
//! One connection guarded by a mutex. Every public method takes the lock once,
//! so each call is atomic with respect to other writers of the same entity.
//! Multi-entity operations (a task update and its notifications) are separate
//! calls and carry no cross-entity transaction.

mod activities;
mod agents;
mod decisions;
mod notifications;
mod policies;
mod tasks;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::Connection;
use rusqlite::types::Type;
use std::path::Path;
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

use crate::{Error, Result};

/// SQLite-backed store for agents, tasks, notifications, decisions, policies
/// and the activity feed
pub struct Store {
    conn: Mutex<Connection>,
}

impl Store {
    /// Open (or create) a store at the given database path
    pub fn new(db_path: &str) -> Result<Self> {
        if let Some(parent) = Path::new(db_path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(db_path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_tables()?;
        debug!(path = db_path, "store opened");
        Ok(store)
    }

    /// Create an in-memory store (for testing)
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_tables()?;
        Ok(store)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| Error::Other("store connection lock poisoned".to_string()))
    }

    /// Initialize database tables
    fn init_tables(&self) -> Result<()> {
        let conn = self.conn()?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS agents (
                id TEXT PRIMARY KEY,
                session_key TEXT NOT NULL UNIQUE,
                name TEXT NOT NULL,
                emoji TEXT,
                role TEXT NOT NULL,
                description TEXT,
                status TEXT NOT NULL,
                current_task_id TEXT,
                last_seen_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS tasks (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                description TEXT NOT NULL,
                status TEXT NOT NULL,
                priority TEXT NOT NULL,
                assignee_ids TEXT NOT NULL,
                created_by TEXT,
                due_at TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                completed_at TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_tasks_status ON tasks(status);

            CREATE TABLE IF NOT EXISTS notifications (
                id TEXT PRIMARY KEY,
                target_agent_id TEXT NOT NULL,
                from_agent_id TEXT,
                kind TEXT NOT NULL,
                title TEXT NOT NULL,
                content TEXT NOT NULL,
                reference_id TEXT,
                reference_kind TEXT,
                read INTEGER NOT NULL DEFAULT 0,
                delivered INTEGER NOT NULL DEFAULT 0,
                delivery_attempts INTEGER NOT NULL DEFAULT 0,
                last_ping_at TEXT,
                acknowledged_at TEXT,
                read_at TEXT,
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_notifications_target ON notifications(target_agent_id);
            CREATE INDEX IF NOT EXISTS idx_notifications_delivered ON notifications(delivered);
            CREATE INDEX IF NOT EXISTS idx_notifications_reference ON notifications(reference_id);

            CREATE TABLE IF NOT EXISTS router_decisions (
                id TEXT PRIMARY KEY,
                message_id TEXT NOT NULL,
                targets TEXT NOT NULL,
                reasoning TEXT NOT NULL,
                model TEXT NOT NULL,
                cost REAL NOT NULL,
                triggered INTEGER NOT NULL,
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_router_decisions_created ON router_decisions(created_at);

            CREATE TABLE IF NOT EXISTS policies (
                name TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                description TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS activities (
                id TEXT PRIMARY KEY,
                kind TEXT NOT NULL,
                agent_id TEXT,
                message TEXT NOT NULL,
                target_id TEXT,
                target_kind TEXT,
                detail TEXT,
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_activities_created ON activities(created_at);",
        )?;

        Ok(())
    }
}

/// Fixed-width RFC3339 so stored timestamps sort lexically
pub(crate) fn ts(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_ts(idx: usize, value: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

pub(crate) fn parse_opt_ts(idx: usize, value: Option<String>) -> rusqlite::Result<Option<DateTime<Utc>>> {
    value.map(|v| parse_ts(idx, &v)).transpose()
}

pub(crate) fn parse_enum<T>(idx: usize, value: &str) -> rusqlite::Result<T>
where
    T: FromStr<Err = Error>,
{
    value
        .parse()
        .map_err(|e: Error| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

pub(crate) fn parse_json<T>(idx: usize, value: &str) -> rusqlite::Result<T>
where
    T: serde::de::DeserializeOwned,
{
    serde_json::from_str(value)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

pub(crate) fn new_id() -> String {
    uuid::Uuid::now_v7().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_open_on_disk_creates_parent() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("mc.db");
        let store = Store::new(path.to_str().unwrap());
        assert!(store.is_ok());
        assert!(path.exists());
    }

    #[test]
    fn test_init_is_idempotent() {
        let store = Store::in_memory().unwrap();
        assert!(store.init_tables().is_ok());
    }

    #[test]
    fn test_ts_round_trip() {
        let now = Utc::now();
        let parsed = parse_ts(0, &ts(&now)).unwrap();
        assert_eq!(parsed.timestamp_micros(), now.timestamp_micros());
    }
}
