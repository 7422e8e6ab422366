use chrono::{DateTime, Utc};
use tracing::{debug, info};

use super::session::CompletedSession;

/// Edge detector state; `Tracking` always carries its start time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Idle,
    Tracking { start: DateTime<Utc> },
}

/// Outcome of feeding one probe result to the tracker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Rising edge: the target appeared
    Started(DateTime<Utc>),
    /// Falling edge: the target disappeared, closing a session
    Ended(CompletedSession),
}

/// Two-state machine turning presence samples into sessions
#[derive(Debug, Default)]
pub struct SessionTracker {
    state: SessionState,
}

impl SessionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_tracking(&self) -> bool {
        matches!(self.state, SessionState::Tracking { .. })
    }

    /// Start time of the open session, if any
    pub fn session_start(&self) -> Option<DateTime<Utc>> {
        match self.state {
            SessionState::Tracking { start } => Some(start),
            SessionState::Idle => None,
        }
    }

    /// Feed one probe result observed at `now`
    ///
    /// The transition is committed before it is returned, so whatever the
    /// caller does with it cannot leave the tracker half-updated.
    pub fn observe(&mut self, present: bool, now: DateTime<Utc>) -> Option<Transition> {
        match (self.state, present) {
            (SessionState::Idle, true) => {
                self.state = SessionState::Tracking { start: now };
                info!("Session started at {}", now);
                Some(Transition::Started(now))
            }
            (SessionState::Tracking { start }, false) => {
                self.state = SessionState::Idle;
                info!("Session ended at {} (started {})", now, start);
                Some(Transition::Ended(CompletedSession::new(start, now)))
            }
            _ => {
                debug!("No transition (present: {}, state: {:?})", present, self.state);
                None
            }
        }
    }

    /// Close the open session at `now`, leaving the tracker idle
    pub fn close_open_session(&mut self, now: DateTime<Utc>) -> Option<CompletedSession> {
        match std::mem::take(&mut self.state) {
            SessionState::Tracking { start } => Some(CompletedSession::new(start, now)),
            SessionState::Idle => None,
        }
    }
}
