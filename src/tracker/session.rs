use chrono::{DateTime, Duration, Utc};
use std::fmt;

use crate::error::SessionError;

/// Prefix of every calendar event title
pub const TITLE_PREFIX: &str = "Coding time";

/// One closed editor session, as captured by the edge detector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompletedSession {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl CompletedSession {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// Elapsed time, rejecting zero and negative measurements
    pub fn duration(&self) -> Result<Duration, SessionError> {
        let duration = self.end - self.start;
        if duration <= Duration::zero() {
            return Err(SessionError::InvalidMeasurement {
                start: self.start,
                end: self.end,
            });
        }
        Ok(duration)
    }

    /// Calendar title for this session, e.g. `Coding time: 1h 45m`
    pub fn title(&self) -> Result<String, SessionError> {
        self.duration().map(format_duration_label)
    }
}

impl fmt::Display for CompletedSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} to {}", self.start, self.end)
    }
}

/// Whole hours and remaining whole minutes; seconds are truncated
pub fn format_duration_label(duration: Duration) -> String {
    let total_secs = duration.num_seconds().max(0);
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;

    if hours > 0 {
        format!("{TITLE_PREFIX}: {hours}h {minutes}m")
    } else {
        format!("{TITLE_PREFIX}: {minutes}m")
    }
}
