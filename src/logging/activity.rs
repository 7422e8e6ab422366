use anyhow::Result;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::system::FileSystemInterface;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f+00:00";

/// User-facing append-only log, one `<UTC timestamp> - <message>` line per entry
///
/// Every write opens, appends and closes the file; no handle is held.
pub struct ActivityLog<F: FileSystemInterface> {
    file_system: F,
    path: PathBuf,
}

impl<F: FileSystemInterface> ActivityLog<F> {
    pub fn new(file_system: F, path: PathBuf) -> Self {
        Self { file_system, path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Make sure the parent directory exists
    pub fn prepare(&self) -> Result<()> {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => {
                self.file_system.create_dir_all(parent)
            }
            _ => Ok(()),
        }
    }

    pub fn record(&self, at: DateTime<Utc>, message: &str) -> Result<()> {
        let line = format_line(at, message);
        debug!("Activity: {}", line);
        self.file_system.append_line(&self.path, &line)
    }
}

pub fn format_line(at: DateTime<Utc>, message: &str) -> String {
    format!("{} - {}", at.format(TIMESTAMP_FORMAT), message)
}
