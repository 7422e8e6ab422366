pub mod calendar;
pub mod config;
pub mod error;
pub mod logging;
pub mod notifications;
pub mod service;
pub mod system;
pub mod tracker;

pub use calendar::{CalendarBackend, CreatedEvent, EventRequest, PendingEventStore};
pub use config::Config;
pub use error::{CalendarError, CredentialError, ProbeError, SessionError, TrackerError};
pub use notifications::{NotificationManager, NotificationSender};
pub use service::{EmitOutcome, SessionTrackerService};
pub use system::{FileSystemInterface, ProcessTableInterface, SystemServiceInterface};
pub use tracker::{CompletedSession, PresenceProbe, SessionTracker, Transition};

#[cfg(any(test, feature = "test-mocks"))]
pub use notifications::TestNotificationSender;
#[cfg(any(test, feature = "test-mocks"))]
pub use system::{MockCalendar, MockCalendarMode, MockFileSystem, MockProcessTable, MockSystemService};
