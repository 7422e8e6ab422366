pub mod client;
pub mod oauth;
pub mod pending;
pub mod types;

pub use client::GoogleCalendarClient;
pub use oauth::{ClientSecrets, OAuthAuthenticator, StoredToken};
pub use pending::{PendingEventStore, ResubmitReport};
pub use types::{CreatedEvent, EventRequest, EventTime, PendingEvent};

use crate::error::CalendarError;

/// Trait for calendar writes - abstracts the remote API for testability
pub trait CalendarBackend {
    /// Insert one event and return what the calendar created
    fn insert_event(&self, event: &EventRequest) -> Result<CreatedEvent, CalendarError>;
}
