use chrono::{DateTime, Utc};
use std::path::PathBuf;
use thiserror::Error;

/// Failure to read the OS process table.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("process enumeration is not supported on this platform")]
    Unsupported,

    #[error("process table came back empty")]
    EmptyProcessTable,

    #[error("process enumeration failed: {0}")]
    Other(String),
}

/// Failure while obtaining or refreshing calendar credentials.
///
/// Any of these leaves the tracker unable to record sessions, so the
/// service loop treats them as fatal.
#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("client secrets file not found: {}", .0.display())]
    MissingClientSecrets(PathBuf),

    #[error("invalid client secrets file {}: {reason}", .path.display())]
    InvalidClientSecrets { path: PathBuf, reason: String },

    #[error("token cache error: {0}")]
    TokenCache(String),

    #[error("token refresh rejected ({status}): {body}")]
    RefreshRejected { status: u16, body: String },

    #[error("no refresh token available and interactive authorization is disabled")]
    AuthorizationRequired,

    #[error("authorization was denied: {0}")]
    AuthorizationDenied(String),

    #[error("authorization redirect state did not match")]
    StateMismatch,

    #[error("authorization flow failed: {0}")]
    Flow(String),

    #[error("calendar rejected freshly refreshed credentials")]
    StillUnauthorized,
}

/// Failure of a calendar event insert.
#[derive(Debug, Error)]
pub enum CalendarError {
    #[error("calendar request timed out")]
    Timeout,

    #[error("calendar request failed: {0}")]
    Network(String),

    #[error("calendar rejected event ({status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("unexpected calendar response: {0}")]
    InvalidResponse(String),

    #[error(transparent)]
    Credentials(#[from] CredentialError),
}

impl CalendarError {
    /// Whether this failure makes further inserts pointless.
    pub fn is_fatal(&self) -> bool {
        matches!(self, CalendarError::Credentials(_))
    }
}

impl From<reqwest::Error> for CalendarError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            CalendarError::Timeout
        } else if err.is_decode() {
            CalendarError::InvalidResponse(err.to_string())
        } else {
            CalendarError::Network(err.to_string())
        }
    }
}

/// Rejected session measurement.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session end {end} is not after start {start}")]
    InvalidMeasurement {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
}

/// Errors that stop the tracker loop.
#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("calendar credentials unusable: {0}")]
    Credentials(#[from] CredentialError),

    #[error("signal registration failed: {0}")]
    Signals(String),

    #[error("system service failure: {0}")]
    System(String),
}
