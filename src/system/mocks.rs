use anyhow::Result;
use chrono::{DateTime, Duration, TimeZone, Utc};
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::calendar::{CalendarBackend, CreatedEvent, EventRequest};
use crate::error::{CalendarError, CredentialError, ProbeError};
use crate::system::traits::{FileSystemInterface, ProcessTableInterface, SystemServiceInterface};

/// One scripted answer from the mock process table
#[derive(Debug, Clone)]
pub enum ProcessSnapshot {
    Running(Vec<String>),
    Failure(String),
}

/// Mock process table for testing - replays scripted snapshots in order
///
/// Once the script is exhausted the last successful snapshot is repeated.
#[derive(Clone, Default)]
pub struct MockProcessTable {
    pub script: Arc<Mutex<VecDeque<ProcessSnapshot>>>,
    pub current: Arc<Mutex<Vec<String>>>,
    pub calls: Arc<AtomicUsize>,
}

impl MockProcessTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a snapshot listing the given process names
    pub fn push_running(&self, names: &[&str]) {
        self.script.lock().unwrap().push_back(ProcessSnapshot::Running(
            names.iter().map(|n| n.to_string()).collect(),
        ));
    }

    /// Queue an enumeration failure
    pub fn push_failure(&self, reason: &str) {
        self.script
            .lock()
            .unwrap()
            .push_back(ProcessSnapshot::Failure(reason.to_string()));
    }

    /// Queue one snapshot per entry: `true` includes the target name, `false` omits it
    pub fn push_presence_sequence(&self, target: &str, sequence: &[bool]) {
        for &present in sequence {
            if present {
                self.push_running(&["launchd", target, "zsh"]);
            } else {
                self.push_running(&["launchd", "zsh"]);
            }
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }
}

impl ProcessTableInterface for MockProcessTable {
    fn process_names(&mut self) -> Result<Vec<String>, ProbeError> {
        self.calls.fetch_add(1, Ordering::Relaxed);

        match self.script.lock().unwrap().pop_front() {
            Some(ProcessSnapshot::Running(names)) => {
                *self.current.lock().unwrap() = names.clone();
                Ok(names)
            }
            Some(ProcessSnapshot::Failure(reason)) => Err(ProbeError::Other(reason)),
            None => Ok(self.current.lock().unwrap().clone()),
        }
    }
}

/// Mock file system for testing - provides controllable file operations
#[derive(Clone, Default)]
pub struct MockFileSystem {
    pub files: Arc<Mutex<HashMap<PathBuf, String>>>,
    pub read_calls: Arc<Mutex<Vec<PathBuf>>>,
    pub write_calls: Arc<Mutex<Vec<(PathBuf, String)>>>,
    pub append_calls: Arc<Mutex<Vec<(PathBuf, String)>>>,
    pub directory_creation_calls: Arc<Mutex<Vec<PathBuf>>>,
    pub should_fail_read: Arc<AtomicBool>,
    pub should_fail_write: Arc<AtomicBool>,
    pub should_fail_append: Arc<AtomicBool>,
    pub should_fail_create_dir: Arc<AtomicBool>,
}

impl MockFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a file to the mock file system
    pub fn add_file<P: AsRef<Path>>(&self, path: P, content: String) {
        self.files
            .lock()
            .unwrap()
            .insert(path.as_ref().to_path_buf(), content);
    }

    /// Current content of a file, if present
    pub fn file_content<P: AsRef<Path>>(&self, path: P) -> Option<String> {
        self.files.lock().unwrap().get(path.as_ref()).cloned()
    }

    /// Lines of a file, empty when the file does not exist
    pub fn file_lines<P: AsRef<Path>>(&self, path: P) -> Vec<String> {
        self.file_content(path)
            .map(|content| content.lines().map(str::to_string).collect())
            .unwrap_or_default()
    }

    pub fn get_write_calls(&self) -> Vec<(PathBuf, String)> {
        self.write_calls.lock().unwrap().clone()
    }

    pub fn get_append_calls(&self) -> Vec<(PathBuf, String)> {
        self.append_calls.lock().unwrap().clone()
    }

    pub fn get_directory_creation_calls(&self) -> Vec<PathBuf> {
        self.directory_creation_calls.lock().unwrap().clone()
    }

    pub fn set_read_failure(&self, should_fail: bool) {
        self.should_fail_read.store(should_fail, Ordering::Relaxed);
    }

    pub fn set_write_failure(&self, should_fail: bool) {
        self.should_fail_write.store(should_fail, Ordering::Relaxed);
    }

    pub fn set_append_failure(&self, should_fail: bool) {
        self.should_fail_append.store(should_fail, Ordering::Relaxed);
    }

    pub fn set_create_dir_failure(&self, should_fail: bool) {
        self.should_fail_create_dir
            .store(should_fail, Ordering::Relaxed);
    }
}

impl FileSystemInterface for MockFileSystem {
    fn read_file(&self, path: &Path) -> Result<String> {
        self.read_calls.lock().unwrap().push(path.to_path_buf());

        if self.should_fail_read.load(Ordering::Relaxed) {
            return Err(anyhow::anyhow!("Mock read failure"));
        }

        self.files
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("File not found: {}", path.display()))
    }

    fn write_file(&self, path: &Path, content: &str) -> Result<()> {
        self.write_calls
            .lock()
            .unwrap()
            .push((path.to_path_buf(), content.to_string()));

        if self.should_fail_write.load(Ordering::Relaxed) {
            return Err(anyhow::anyhow!("Mock write failure"));
        }

        self.files
            .lock()
            .unwrap()
            .insert(path.to_path_buf(), content.to_string());
        Ok(())
    }

    fn append_line(&self, path: &Path, line: &str) -> Result<()> {
        self.append_calls
            .lock()
            .unwrap()
            .push((path.to_path_buf(), line.to_string()));

        if self.should_fail_append.load(Ordering::Relaxed) {
            return Err(anyhow::anyhow!("Mock append failure"));
        }

        let mut files = self.files.lock().unwrap();
        let content = files.entry(path.to_path_buf()).or_default();
        content.push_str(line);
        content.push('\n');
        Ok(())
    }

    fn file_exists(&self, path: &Path) -> bool {
        self.files.lock().unwrap().contains_key(path)
    }

    fn create_dir_all(&self, path: &Path) -> Result<()> {
        self.directory_creation_calls
            .lock()
            .unwrap()
            .push(path.to_path_buf());

        if self.should_fail_create_dir.load(Ordering::Relaxed) {
            return Err(anyhow::anyhow!("Mock create directory failure"));
        }

        Ok(())
    }
}

/// Mock system service for testing - virtual clock and scripted lifetime
///
/// `sleep_ms` advances the clock instead of sleeping.
#[derive(Clone)]
pub struct MockSystemService {
    pub should_run: Arc<AtomicBool>,
    pub remaining_iterations: Arc<Mutex<Option<usize>>>,
    pub signal_handler_registered: Arc<AtomicBool>,
    pub should_fail_signal_registration: Arc<AtomicBool>,
    pub sleep_calls: Arc<Mutex<Vec<u64>>>,
    pub clock: Arc<Mutex<DateTime<Utc>>>,
}

impl MockSystemService {
    pub fn new() -> Self {
        Self::starting_at(Utc.with_ymd_and_hms(2024, 1, 15, 9, 0, 0).unwrap())
    }

    pub fn starting_at(start: DateTime<Utc>) -> Self {
        Self {
            should_run: Arc::new(AtomicBool::new(true)),
            remaining_iterations: Arc::new(Mutex::new(None)),
            signal_handler_registered: Arc::new(AtomicBool::new(false)),
            should_fail_signal_registration: Arc::new(AtomicBool::new(false)),
            sleep_calls: Arc::new(Mutex::new(Vec::new())),
            clock: Arc::new(Mutex::new(start)),
        }
    }

    /// Stop the service (simulate signal reception)
    pub fn stop_service(&self) {
        self.should_run.store(false, Ordering::Relaxed);
    }

    /// Let the loop run exactly `iterations` times before reporting shutdown
    pub fn stop_after_iterations(&self, iterations: usize) {
        *self.remaining_iterations.lock().unwrap() = Some(iterations);
    }

    pub fn are_signal_handlers_registered(&self) -> bool {
        self.signal_handler_registered.load(Ordering::Relaxed)
    }

    pub fn set_signal_registration_failure(&self, should_fail: bool) {
        self.should_fail_signal_registration
            .store(should_fail, Ordering::Relaxed);
    }

    pub fn get_sleep_calls(&self) -> Vec<u64> {
        self.sleep_calls.lock().unwrap().clone()
    }

    /// Move the virtual clock to an arbitrary instant, backwards included
    pub fn set_time(&self, time: DateTime<Utc>) {
        *self.clock.lock().unwrap() = time;
    }

    pub fn advance(&self, by: Duration) {
        let mut clock = self.clock.lock().unwrap();
        *clock += by;
    }
}

impl SystemServiceInterface for MockSystemService {
    fn register_signal_handlers(&self) -> Result<()> {
        if self.should_fail_signal_registration.load(Ordering::Relaxed) {
            return Err(anyhow::anyhow!("Mock signal registration failure"));
        }

        self.signal_handler_registered
            .store(true, Ordering::Relaxed);
        Ok(())
    }

    fn should_continue_running(&self) -> bool {
        if !self.should_run.load(Ordering::Relaxed) {
            return false;
        }

        let mut remaining = self.remaining_iterations.lock().unwrap();
        match remaining.as_mut() {
            Some(0) => false,
            Some(n) => {
                *n -= 1;
                true
            }
            None => true,
        }
    }

    fn sleep_ms(&self, milliseconds: u64) -> Result<()> {
        self.sleep_calls.lock().unwrap().push(milliseconds);
        self.advance(Duration::milliseconds(milliseconds as i64));
        Ok(())
    }

    fn now(&self) -> DateTime<Utc> {
        *self.clock.lock().unwrap()
    }

    fn get_process_id(&self) -> u32 {
        12345
    }
}

impl Default for MockSystemService {
    fn default() -> Self {
        Self::new()
    }
}

/// How the mock calendar answers the next insert
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockCalendarMode {
    Accept,
    Timeout,
    Reject,
    CredentialFailure,
}

/// Mock calendar for testing - records inserts and fails on demand
#[derive(Clone)]
pub struct MockCalendar {
    pub inserted: Arc<Mutex<Vec<EventRequest>>>,
    pub attempts: Arc<AtomicUsize>,
    pub mode: Arc<Mutex<MockCalendarMode>>,
}

impl MockCalendar {
    pub fn new() -> Self {
        Self {
            inserted: Arc::new(Mutex::new(Vec::new())),
            attempts: Arc::new(AtomicUsize::new(0)),
            mode: Arc::new(Mutex::new(MockCalendarMode::Accept)),
        }
    }

    pub fn set_mode(&self, mode: MockCalendarMode) {
        *self.mode.lock().unwrap() = mode;
    }

    /// Events the calendar accepted, in insertion order
    pub fn inserted_events(&self) -> Vec<EventRequest> {
        self.inserted.lock().unwrap().clone()
    }

    pub fn attempt_count(&self) -> usize {
        self.attempts.load(Ordering::Relaxed)
    }
}

impl CalendarBackend for MockCalendar {
    fn insert_event(&self, event: &EventRequest) -> Result<CreatedEvent, CalendarError> {
        let attempt = self.attempts.fetch_add(1, Ordering::Relaxed) + 1;

        match *self.mode.lock().unwrap() {
            MockCalendarMode::Accept => {
                self.inserted.lock().unwrap().push(event.clone());
                Ok(CreatedEvent {
                    id: format!("evt{attempt}"),
                    html_link: Some(format!(
                        "https://calendar.example.com/event?eid=evt{attempt}"
                    )),
                })
            }
            MockCalendarMode::Timeout => Err(CalendarError::Timeout),
            MockCalendarMode::Reject => Err(CalendarError::Rejected {
                status: 500,
                body: "backend error".to_string(),
            }),
            MockCalendarMode::CredentialFailure => {
                Err(CalendarError::Credentials(CredentialError::RefreshRejected {
                    status: 400,
                    body: "invalid_grant".to_string(),
                }))
            }
        }
    }
}

impl Default for MockCalendar {
    fn default() -> Self {
        Self::new()
    }
}
