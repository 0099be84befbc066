use std::sync::Mutex;

use chrono::Utc;
use common::err::CResult;
use common::err::decode_error::ReError;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

const CREATE_TABLE_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS sync_task (
    id INTEGER UNIQUE NOT NULL,
    status TEXT NOT NULL,
    settings TEXT NOT NULL,
    error_text TEXT,
    date_create TEXT NOT NULL,
    date_update TEXT NOT NULL
)
"#;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskStatus {
    Started,
    Success,
    Error,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Started => "started",
            TaskStatus::Success => "success",
            TaskStatus::Error => "error",
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRecord {
    pub id: i64,
    pub status: String,
    pub settings: String,
    pub error_text: Option<String>,
    pub date_create: String,
    pub date_update: String,
}

/// Embedded single-file task store tracking a dump's `started` / `success` / `error`
/// lifecycle, backing `GET /sync/{id}` and the CLI's own status polling.
pub struct TaskStore {
    conn: Mutex<Connection>,
}

impl TaskStore {
    pub fn open<P: AsRef<std::path::Path>>(path: P) -> CResult<Self> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(std::time::Duration::from_millis(5000))?;
        conn.execute(CREATE_TABLE_SQL, [])?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    pub fn open_in_memory() -> CResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute(CREATE_TABLE_SQL, [])?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    pub fn insert_started(&self, id: i64, settings_json: &str) -> CResult<()> {
        let now = Utc::now().to_rfc3339();
        let conn = self.conn.lock().map_err(|e| ReError::String(e.to_string()))?;
        conn.execute(
            "INSERT INTO sync_task (id, status, settings, error_text, date_create, date_update) VALUES (?1, ?2, ?3, NULL, ?4, ?4)",
            params![id, TaskStatus::Started.as_str(), settings_json, now],
        )?;
        Ok(())
    }

    pub fn mark_success(&self, id: i64) -> CResult<()> {
        self.update_terminal(id, TaskStatus::Success, None)
    }

    pub fn mark_error(&self, id: i64, error_text: &str) -> CResult<()> {
        self.update_terminal(id, TaskStatus::Error, Some(error_text))
    }

    fn update_terminal(&self, id: i64, status: TaskStatus, error_text: Option<&str>) -> CResult<()> {
        let now = Utc::now().to_rfc3339();
        let conn = self.conn.lock().map_err(|e| ReError::String(e.to_string()))?;
        conn.execute(
            "UPDATE sync_task SET status = ?1, error_text = ?2, date_update = ?3 WHERE id = ?4",
            params![status.as_str(), error_text, now, id],
        )?;
        Ok(())
    }

    pub fn get_status(&self, id: i64) -> CResult<Option<TaskRecord>> {
        let conn = self.conn.lock().map_err(|e| ReError::String(e.to_string()))?;
        let record = conn
            .query_row(
                "SELECT id, status, settings, error_text, date_create, date_update FROM sync_task WHERE id = ?1",
                params![id],
                |row| {
                    Ok(TaskRecord {
                        id: row.get(0)?,
                        status: row.get(1)?,
                        settings: row.get(2)?,
                        error_text: row.get(3)?,
                        date_create: row.get(4)?,
                        date_update: row.get(5)?,
                    })
                },
            )
            .optional()?;
        Ok(record)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn started_task_round_trips_to_success() {
        let store = TaskStore::open_in_memory().unwrap();
        store.insert_started(1, "{\"worker_count\":4}").unwrap();

        let record = store.get_status(1).unwrap().unwrap();
        assert_eq!(record.status, "started");
        assert!(record.error_text.is_none());

        store.mark_success(1).unwrap();
        let record = store.get_status(1).unwrap().unwrap();
        assert_eq!(record.status, "success");
    }

    #[test]
    fn started_task_round_trips_to_error() {
        let store = TaskStore::open_in_memory().unwrap();
        store.insert_started(2, "{}").unwrap();

        store.mark_error(2, "connection refused").unwrap();
        let record = store.get_status(2).unwrap().unwrap();
        assert_eq!(record.status, "error");
        assert_eq!(record.error_text.as_deref(), Some("connection refused"));
    }

    #[test]
    fn unknown_task_returns_none() {
        let store = TaskStore::open_in_memory().unwrap();
        assert!(store.get_status(999).unwrap().is_none());
    }
}
