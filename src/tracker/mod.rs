pub mod probe;
pub mod session;
pub mod state;

pub use probe::PresenceProbe;
pub use session::{CompletedSession, TITLE_PREFIX, format_duration_label};
pub use state::{SessionState, SessionTracker, Transition};
