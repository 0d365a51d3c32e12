//! teamsight-store: SQLite persistence for visit sessions.
//!
//! One row per session. Shirt colors are stored as a JSON array of
//! `{color, rating}` objects and timestamps as RFC 3339 strings, so a row
//! reads the same as the session document the daemon logs.

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};
use std::path::{Path, PathBuf};
use teamsight_core::{Session, SessionStore, SessionUpdate, ShirtColor};
use thiserror::Error;
use tokio_rusqlite::Connection;

const SESSIONS_TABLE: &str = "perceived_sessions";

/// `$XDG_DATA_HOME/teamsight/sessions.db`, falling back to
/// `~/.local/share/teamsight/sessions.db`.
pub fn default_db_path() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".local/share")
        })
        .join("teamsight")
        .join("sessions.db")
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] tokio_rusqlite::Error),
    #[error("shirt colors: {0}")]
    Json(#[from] serde_json::Error),
    #[error("bad timestamp {value:?}: {source}")]
    Timestamp {
        value: String,
        source: chrono::ParseError,
    },
    #[error("session not found: {0}")]
    NotFound(String),
    #[error("session already closed: {0}")]
    AlreadyClosed(String),
    #[error("cannot create store directory: {0}")]
    Io(#[from] std::io::Error),
}

/// Raw row as read from SQLite, before JSON/timestamp decoding.
struct SessionRow {
    id: String,
    device_id: String,
    perceived_team: String,
    shirt_colors: String,
    start_time: String,
    end_time: Option<String>,
}

impl SessionRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            device_id: row.get(1)?,
            perceived_team: row.get(2)?,
            shirt_colors: row.get(3)?,
            start_time: row.get(4)?,
            end_time: row.get(5)?,
        })
    }

    fn decode(self) -> Result<Session, StoreError> {
        let shirt_colors: Vec<ShirtColor> = serde_json::from_str(&self.shirt_colors)?;
        Ok(Session {
            id: self.id,
            device_id: self.device_id,
            perceived_team: self.perceived_team,
            shirt_colors,
            start_time: parse_timestamp(&self.start_time)?,
            end_time: self.end_time.as_deref().map(parse_timestamp).transpose()?,
        })
    }
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|source| StoreError::Timestamp {
            value: value.to_string(),
            source,
        })
}

/// Session store backed by a single SQLite database file.
#[derive(Clone)]
pub struct SqliteSessionStore {
    conn: Connection,
}

impl SqliteSessionStore {
    /// Open (creating if needed) the database at `path` and ensure the schema.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path).await?;
        let store = Self { conn };
        store.ensure_schema().await?;
        tracing::info!(path = %path.display(), "session store opened");
        Ok(store)
    }

    /// In-memory store, used by tests and dry runs.
    pub async fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().await?;
        let store = Self { conn };
        store.ensure_schema().await?;
        Ok(store)
    }

    async fn ensure_schema(&self) -> Result<(), StoreError> {
        self.conn
            .call(|conn| {
                conn.execute_batch(&format!(
                    r#"
                    PRAGMA journal_mode=WAL;

                    CREATE TABLE IF NOT EXISTS {SESSIONS_TABLE} (
                      id TEXT PRIMARY KEY,
                      device_id TEXT NOT NULL,
                      perceived_team TEXT NOT NULL,
                      shirt_colors TEXT NOT NULL,
                      start_time TEXT NOT NULL,
                      end_time TEXT
                    );

                    CREATE INDEX IF NOT EXISTS idx_sessions_start ON {SESSIONS_TABLE}(start_time);
                    "#
                ))?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    pub async fn insert_session(&self, session: &Session) -> Result<(), StoreError> {
        let shirt_colors = serde_json::to_string(&session.shirt_colors)?;
        let id = session.id.clone();
        let device_id = session.device_id.clone();
        let team = session.perceived_team.clone();
        let start_time = session.start_time.to_rfc3339();
        let end_time = session.end_time.map(|t| t.to_rfc3339());

        self.conn
            .call(move |conn| {
                conn.execute(
                    &format!(
                        "INSERT INTO {SESSIONS_TABLE}
                         (id, device_id, perceived_team, shirt_colors, start_time, end_time)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6)"
                    ),
                    params![id, device_id, team, shirt_colors, start_time, end_time],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    /// Set the end time of an open session. The end time is write-once:
    /// fails with `AlreadyClosed` if one is set, `NotFound` for an unknown id.
    pub async fn set_end_time(&self, id: &str, end_time: DateTime<Utc>) -> Result<(), StoreError> {
        let key = id.to_string();
        let value = end_time.to_rfc3339();
        let (changed, exists) = self
            .conn
            .call(move |conn| {
                let n = conn.execute(
                    &format!(
                        "UPDATE {SESSIONS_TABLE} SET end_time = ?1 WHERE id = ?2 AND end_time IS NULL"
                    ),
                    params![value, key],
                )?;
                if n > 0 {
                    return Ok((n, true));
                }
                let count: i64 = conn.query_row(
                    &format!("SELECT count(*) FROM {SESSIONS_TABLE} WHERE id = ?1"),
                    params![key],
                    |row| row.get(0),
                )?;
                Ok((n, count > 0))
            })
            .await?;

        match (changed, exists) {
            (0, true) => Err(StoreError::AlreadyClosed(id.to_string())),
            (0, false) => Err(StoreError::NotFound(id.to_string())),
            _ => Ok(()),
        }
    }

    pub async fn get(&self, id: &str) -> Result<Option<Session>, StoreError> {
        let key = id.to_string();
        let row = self
            .conn
            .call(move |conn| {
                let row = conn
                    .query_row(
                        &format!(
                            "SELECT id, device_id, perceived_team, shirt_colors, start_time, end_time
                             FROM {SESSIONS_TABLE} WHERE id = ?1"
                        ),
                        params![key],
                        SessionRow::from_row,
                    )
                    .optional()?;
                Ok(row)
            })
            .await?;
        row.map(SessionRow::decode).transpose()
    }

    /// Most recent sessions first.
    pub async fn list(&self, limit: usize) -> Result<Vec<Session>, StoreError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        self.query_sessions(
            format!(
                "SELECT id, device_id, perceived_team, shirt_colors, start_time, end_time
                 FROM {SESSIONS_TABLE} ORDER BY start_time DESC LIMIT {limit}"
            ),
        )
        .await
    }

    /// Sessions without an end time, most recent first.
    pub async fn list_open(&self) -> Result<Vec<Session>, StoreError> {
        self.query_sessions(format!(
            "SELECT id, device_id, perceived_team, shirt_colors, start_time, end_time
             FROM {SESSIONS_TABLE} WHERE end_time IS NULL ORDER BY start_time DESC"
        ))
        .await
    }

    async fn query_sessions(&self, sql: String) -> Result<Vec<Session>, StoreError> {
        let rows = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt
                    .query_map([], SessionRow::from_row)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                Ok(rows)
            })
            .await?;
        rows.into_iter().map(SessionRow::decode).collect()
    }

    /// Healthy when the connection answers and the sessions table exists.
    pub async fn is_healthy(&self) -> bool {
        let result = self
            .conn
            .call(|conn| {
                let count: i64 = conn.query_row(
                    "SELECT count(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
                    params![SESSIONS_TABLE],
                    |row| row.get(0),
                )?;
                Ok(count)
            })
            .await;

        match result {
            Ok(1) => true,
            Ok(_) => {
                tracing::warn!(table = SESSIONS_TABLE, "sessions table missing");
                false
            }
            Err(err) => {
                tracing::warn!(error = %err, "store health check failed");
                false
            }
        }
    }
}

impl SessionStore for SqliteSessionStore {
    type Error = StoreError;

    async fn insert(&self, session: &Session) -> Result<(), StoreError> {
        self.insert_session(session).await
    }

    async fn update(&self, id: &str, update: SessionUpdate) -> Result<(), StoreError> {
        self.set_end_time(id, update.end_time).await
    }

    async fn health_check(&self) -> bool {
        self.is_healthy().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use teamsight_core::ColorName;

    fn t(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 9, 19, minute, 0).unwrap()
    }

    fn session(id: &str, start: DateTime<Utc>) -> Session {
        Session {
            id: id.into(),
            device_id: "999".into(),
            perceived_team: "ucla".into(),
            shirt_colors: vec![
                ShirtColor { color: ColorName::Blue, rating: 0.7 },
                ShirtColor { color: ColorName::White, rating: 0.3 },
            ],
            start_time: start,
            end_time: None,
        }
    }

    #[tokio::test]
    async fn test_fresh_store_is_healthy() {
        let store = SqliteSessionStore::open_in_memory().await.unwrap();
        assert!(store.is_healthy().await);
        assert!(store.health_check().await);
    }

    #[tokio::test]
    async fn test_insert_then_get() {
        let store = SqliteSessionStore::open_in_memory().await.unwrap();
        let s = session("a", t(0));
        store.insert(&s).await.unwrap();

        let loaded = store.get("a").await.unwrap().unwrap();
        assert_eq!(loaded, s);
        assert!(store.get("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_id_rejected() {
        let store = SqliteSessionStore::open_in_memory().await.unwrap();
        store.insert(&session("a", t(0))).await.unwrap();
        assert!(store.insert(&session("a", t(1))).await.is_err());
    }

    #[tokio::test]
    async fn test_update_sets_end_time() {
        let store = SqliteSessionStore::open_in_memory().await.unwrap();
        store.insert(&session("a", t(0))).await.unwrap();

        let end = t(0) + Duration::seconds(95);
        store.update("a", SessionUpdate { end_time: end }).await.unwrap();

        let loaded = store.get("a").await.unwrap().unwrap();
        assert_eq!(loaded.end_time, Some(end));
        assert_eq!(loaded.start_time, t(0));
        assert_eq!(loaded.perceived_team, "ucla");
    }

    #[tokio::test]
    async fn test_update_unknown_id_is_not_found() {
        let store = SqliteSessionStore::open_in_memory().await.unwrap();
        let err = store
            .update("ghost", SessionUpdate { end_time: t(5) })
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(id) if id == "ghost"));
    }

    #[tokio::test]
    async fn test_end_time_is_write_once() {
        let store = SqliteSessionStore::open_in_memory().await.unwrap();
        store.insert(&session("a", t(0))).await.unwrap();
        store.update("a", SessionUpdate { end_time: t(3) }).await.unwrap();

        let err = store
            .update("a", SessionUpdate { end_time: t(9) })
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::AlreadyClosed(id) if id == "a"));

        let loaded = store.get("a").await.unwrap().unwrap();
        assert_eq!(loaded.end_time, Some(t(3)));
    }

    #[tokio::test]
    async fn test_list_orders_recent_first_and_limits() {
        let store = SqliteSessionStore::open_in_memory().await.unwrap();
        for (i, id) in ["a", "b", "c"].iter().enumerate() {
            store.insert(&session(id, t(i as u32))).await.unwrap();
        }

        let all = store.list(10).await.unwrap();
        let ids: Vec<&str> = all.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "b", "a"]);

        assert_eq!(store.list(2).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_list_open_excludes_closed() {
        let store = SqliteSessionStore::open_in_memory().await.unwrap();
        store.insert(&session("a", t(0))).await.unwrap();
        store.insert(&session("b", t(1))).await.unwrap();
        store.update("a", SessionUpdate { end_time: t(2) }).await.unwrap();

        let open = store.list_open().await.unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].id, "b");
    }

    #[tokio::test]
    async fn test_open_creates_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("sessions.db");
        let store = SqliteSessionStore::open(&path).await.unwrap();
        assert!(store.is_healthy().await);
        assert!(path.exists());
    }
}
