use anyhow::Result;
use chrono::{DateTime, Utc};
use std::path::Path;

use crate::error::ProbeError;

/// Trait for process table queries - abstracts sysinfo for testability
pub trait ProcessTableInterface {
    /// Names of every process currently running
    ///
    /// An error means the table could not be read; it must never be
    /// reported as an empty list.
    fn process_names(&mut self) -> Result<Vec<String>, ProbeError>;
}

/// Trait for file system operations - abstracts std::fs for testability
pub trait FileSystemInterface {
    /// Read the entire contents of a file
    fn read_file(&self, path: &Path) -> Result<String>;

    /// Replace the contents of a file
    fn write_file(&self, path: &Path, content: &str) -> Result<()>;

    /// Append one line to a file, creating it if needed
    ///
    /// The file is opened and closed within the call.
    fn append_line(&self, path: &Path, line: &str) -> Result<()>;

    /// Check if a file exists
    fn file_exists(&self, path: &Path) -> bool;

    /// Create a directory and all of its parents
    fn create_dir_all(&self, path: &Path) -> Result<()>;
}

/// Trait for system service operations - abstracts signals, sleeping and the clock
pub trait SystemServiceInterface {
    /// Register handlers for SIGTERM and SIGINT
    fn register_signal_handlers(&self) -> Result<()>;

    /// Check if the service should continue running
    /// Returns false once a termination signal has been received
    fn should_continue_running(&self) -> bool;

    /// Sleep for the specified number of milliseconds
    /// Returns early when a termination signal arrives
    fn sleep_ms(&self, milliseconds: u64) -> Result<()>;

    /// Current wall-clock time
    fn now(&self) -> DateTime<Utc>;

    /// Get the process ID of the current service
    fn get_process_id(&self) -> u32;
}
