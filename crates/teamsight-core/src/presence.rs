//! Presence debouncing.
//!
//! A saturating "frames without a face" counter turns the flickering
//! per-frame detector signal into session arrivals and departures. The
//! counter starts saturated, so the first face ever seen is an arrival.
//!
//! ```text
//!              face                          face
//!   Absent ──────────► Tracking(0) ◄─────────────── Tracking(n < T)
//!  (streak ≥ T)  arrival     │ no face: n += 1             │
//!      ▲                     └─────────────────────────────┘
//!      └──────────── n reaches T: close the open session
//! ```

use crate::types::Session;
use chrono::{DateTime, Utc};

pub const DEFAULT_ABSENCE_THRESHOLD: u32 = 10;

/// What the frame loop must do after a transition.
#[derive(Debug, Clone, PartialEq)]
pub enum PresenceEvent {
    /// A face appeared after a settled absence: open a new session.
    Arrived,
    /// The absence settled: persist the end time of this session.
    Departed(Session),
}

/// Result of one transition.
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub state: PresenceState,
    pub event: Option<PresenceEvent>,
}

/// Debouncer state, owned and threaded through the frame loop.
#[derive(Debug, Clone, PartialEq)]
pub struct PresenceState {
    threshold: u32,
    no_face_streak: u32,
    current_session: Option<Session>,
}

impl PresenceState {
    /// Start settled-absent with no session. A threshold of 0 is raised to 1.
    pub fn new(threshold: u32) -> Self {
        let threshold = threshold.max(1);
        Self {
            threshold,
            no_face_streak: threshold,
            current_session: None,
        }
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    pub fn no_face_streak(&self) -> u32 {
        self.no_face_streak
    }

    pub fn current_session(&self) -> Option<&Session> {
        self.current_session.as_ref()
    }

    /// True once `threshold` consecutive empty frames have been seen.
    pub fn is_settled_absent(&self) -> bool {
        self.no_face_streak >= self.threshold
    }

    /// Record the session opened for an arrival.
    pub fn with_session(mut self, session: Session) -> Self {
        self.current_session = Some(session);
        self
    }

    /// Advance by one frame.
    ///
    /// A face after a settled absence is an arrival; a face during tracking
    /// is a continuation. Either way the streak resets. An empty frame bumps
    /// the streak (saturating at the threshold); once settled, an open
    /// session is closed with `end_time = now`. The close fires at most once
    /// per session because it is guarded by `end_time`.
    pub fn step(mut self, face_present: bool, now: DateTime<Utc>) -> Step {
        if face_present {
            let event = self.is_settled_absent().then_some(PresenceEvent::Arrived);
            self.no_face_streak = 0;
            return Step { state: self, event };
        }

        if !self.is_settled_absent() {
            self.no_face_streak = (self.no_face_streak + 1).min(self.threshold);
        }

        let event = if self.is_settled_absent() {
            self.close_open_session(now).map(PresenceEvent::Departed)
        } else {
            None
        };

        Step { state: self, event }
    }

    fn close_open_session(&mut self, now: DateTime<Utc>) -> Option<Session> {
        let session = self.current_session.as_mut()?;
        if session.end_time.is_some() {
            return None;
        }
        session.end_time = Some(now);
        Some(session.clone())
    }
}

impl Default for PresenceState {
    fn default() -> Self {
        Self::new(DEFAULT_ABSENCE_THRESHOLD)
    }
}
