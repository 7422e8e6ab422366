use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use signal_hook::consts::{SIGINT, SIGTERM};
use signal_hook::flag;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use sysinfo::{ProcessRefreshKind, ProcessesToUpdate, System};
use tracing::{debug, info};

use crate::error::ProbeError;
use crate::system::traits::{FileSystemInterface, ProcessTableInterface, SystemServiceInterface};

/// Longest uninterrupted stretch of a sleep before the shutdown flag is rechecked
const SLEEP_SLICE_MS: u64 = 250;

/// Production implementation of ProcessTableInterface using sysinfo
pub struct SysinfoProcessTable {
    system: System,
}

impl SysinfoProcessTable {
    pub fn new() -> Self {
        Self {
            system: System::new(),
        }
    }
}

impl ProcessTableInterface for SysinfoProcessTable {
    fn process_names(&mut self) -> Result<Vec<String>, ProbeError> {
        if !sysinfo::IS_SUPPORTED_SYSTEM {
            return Err(ProbeError::Unsupported);
        }

        // everything() so names are populated on macOS as well
        self.system
            .refresh_processes_specifics(ProcessesToUpdate::All, ProcessRefreshKind::everything());

        let names: Vec<String> = self
            .system
            .processes()
            .values()
            .map(|process| process.name().to_string_lossy().into_owned())
            .collect();

        // We are running, so an empty table means the read failed
        if names.is_empty() {
            return Err(ProbeError::EmptyProcessTable);
        }

        debug!("Enumerated {} processes", names.len());
        Ok(names)
    }
}

/// Production implementation of FileSystemInterface using std::fs
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardFileSystem;

impl FileSystemInterface for StandardFileSystem {
    fn read_file(&self, path: &Path) -> Result<String> {
        std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read file: {}", path.display()))
    }

    fn write_file(&self, path: &Path, content: &str) -> Result<()> {
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write file: {}", path.display()))
    }

    fn append_line(&self, path: &Path, line: &str) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("Failed to open file for append: {}", path.display()))?;
        writeln!(file, "{line}")
            .with_context(|| format!("Failed to append to file: {}", path.display()))
    }

    fn file_exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn create_dir_all(&self, path: &Path) -> Result<()> {
        std::fs::create_dir_all(path)
            .with_context(|| format!("Failed to create directory: {}", path.display()))
    }
}

/// Production implementation of SystemServiceInterface
pub struct NativeSystemService {
    shutdown_requested: Arc<AtomicBool>,
}

impl NativeSystemService {
    pub fn new() -> Self {
        Self {
            shutdown_requested: Arc::new(AtomicBool::new(false)),
        }
    }
}

impl SystemServiceInterface for NativeSystemService {
    fn register_signal_handlers(&self) -> Result<()> {
        info!("Registering signal handlers for SIGTERM, SIGINT");

        flag::register(SIGTERM, Arc::clone(&self.shutdown_requested))?;
        flag::register(SIGINT, Arc::clone(&self.shutdown_requested))?;

        info!("Signal handlers registered successfully");
        Ok(())
    }

    fn should_continue_running(&self) -> bool {
        !self.shutdown_requested.load(Ordering::Relaxed)
    }

    fn sleep_ms(&self, milliseconds: u64) -> Result<()> {
        let mut remaining = milliseconds;
        while remaining > 0 && self.should_continue_running() {
            let slice = remaining.min(SLEEP_SLICE_MS);
            std::thread::sleep(Duration::from_millis(slice));
            remaining -= slice;
        }
        Ok(())
    }

    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn get_process_id(&self) -> u32 {
        std::process::id()
    }
}

impl Default for SysinfoProcessTable {
    fn default() -> Self {
        Self::new()
    }
}

impl Default for NativeSystemService {
    fn default() -> Self {
        Self::new()
    }
}
