//! Session synchronization with the record store and notification endpoint.

use crate::types::{Session, SessionUpdate, ShirtColor};
use chrono::{DateTime, Utc};
use std::future::Future;
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("store write failed: {0}")]
    Store(String),
    #[error("session {0} has no end time to persist")]
    StillOpen(String),
}

/// Durable session records.
pub trait SessionStore {
    type Error: std::error::Error + Send + Sync + 'static;

    fn insert(&self, session: &Session) -> impl Future<Output = Result<(), Self::Error>> + Send;

    fn update(
        &self,
        id: &str,
        update: SessionUpdate,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// True when the store is reachable and ready for writes.
    fn health_check(&self) -> impl Future<Output = bool> + Send;
}

/// Best-effort "someone arrived" signal carrying the team label.
pub trait Notifier {
    type Error: std::error::Error + Send + Sync + 'static;

    fn notify(&self, team: &str) -> impl Future<Output = Result<(), Self::Error>> + Send;
}

/// Opens and closes session records on presence transitions.
///
/// Failures are logged and never roll back the in-memory session: the frame
/// loop carries on as if the write succeeded.
pub struct SessionSynchronizer<S, N> {
    store: S,
    notifier: N,
    device_id: String,
}

impl<S: SessionStore, N: Notifier> SessionSynchronizer<S, N> {
    pub fn new(store: S, notifier: N, device_id: impl Into<String>) -> Self {
        Self {
            store,
            notifier,
            device_id: device_id.into(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn notifier(&self) -> &N {
        &self.notifier
    }

    /// Create a session for an arrival, notify, and insert it.
    pub async fn open(
        &self,
        team: &str,
        shirt_colors: Vec<ShirtColor>,
        now: DateTime<Utc>,
    ) -> Session {
        let session = Session {
            id: Uuid::new_v4().to_string(),
            device_id: self.device_id.clone(),
            perceived_team: team.to_string(),
            shirt_colors,
            start_time: now,
            end_time: None,
        };

        if let Err(err) = self.notifier.notify(team).await {
            tracing::warn!(team, error = %err, "arrival notification failed");
        }

        match self.store.insert(&session).await {
            Ok(()) => tracing::info!(
                session_id = %session.id,
                team,
                colors = session.shirt_colors.len(),
                "session opened"
            ),
            Err(err) => tracing::error!(
                session_id = %session.id,
                error = %err,
                "session insert failed; continuing with unpersisted session"
            ),
        }

        session
    }

    /// Persist the end time of a closed session.
    pub async fn close(&self, session: &Session) -> Result<(), SyncError> {
        let Some(end_time) = session.end_time else {
            tracing::warn!(session_id = %session.id, "close requested for open session");
            return Err(SyncError::StillOpen(session.id.clone()));
        };

        match self.store.update(&session.id, SessionUpdate { end_time }).await {
            Ok(()) => {
                tracing::info!(
                    session_id = %session.id,
                    duration_ms = (end_time - session.start_time).num_milliseconds(),
                    "session closed"
                );
                Ok(())
            }
            Err(err) => {
                tracing::error!(session_id = %session.id, error = %err, "session update failed");
                Err(SyncError::Store(err.to_string()))
            }
        }
    }
}
