pub mod loader;
pub mod types;

pub use loader::ConfigLoader;
pub use types::{
    ActivityLogConfig, CalendarConfig, Config, GeneralConfig, LoggingSettings,
    NotificationConfig, SessionConfig, ShutdownPolicy,
};
