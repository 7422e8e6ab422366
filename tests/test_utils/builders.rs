//! Test utility builders for creating tracker configurations and services
//!
//! Individual methods may not be used by all tests, so dead code warnings are suppressed.

#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use coding_time_tracker::config::{Config, ShutdownPolicy};
use coding_time_tracker::{
    MockCalendar, MockFileSystem, MockProcessTable, MockSystemService, SessionTrackerService,
    TestNotificationSender,
};
use std::path::PathBuf;

pub const ACTIVITY_LOG: &str = "/test/data/vscode_tracker.log";
pub const PENDING_EVENTS: &str = "/test/data/pending_events.jsonl";

/// A fixed instant on 2024-01-15
pub fn at(hour: u32, minute: u32, second: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 15, hour, minute, second)
        .unwrap()
}

/// Builder for creating test Config instances
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        let mut config = Config::default();
        config.activity_log.path = Some(PathBuf::from(ACTIVITY_LOG));
        config.activity_log.pending_events_path = Some(PathBuf::from(PENDING_EVENTS));
        config.logging.file_output = false;
        Self { config }
    }

    pub fn poll_interval_secs(mut self, secs: u64) -> Self {
        self.config.general.poll_interval_secs = secs;
        self
    }

    pub fn target(mut self, target: &str) -> Self {
        self.config.general.target_process = target.to_string();
        self
    }

    pub fn app_label(mut self, label: &str) -> Self {
        self.config.general.app_label = label.to_string();
        self
    }

    pub fn on_shutdown(mut self, policy: ShutdownPolicy) -> Self {
        self.config.session.on_shutdown = policy;
        self
    }

    pub fn notifications_enabled(mut self, enabled: bool) -> Self {
        self.config.notifications.enabled = enabled;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

pub type MockTrackerService = SessionTrackerService<
    MockProcessTable,
    MockFileSystem,
    MockSystemService,
    MockCalendar,
    TestNotificationSender,
>;

/// Test fixture that creates a complete tracker environment from mocks
pub struct TrackerFixture {
    pub process_table: MockProcessTable,
    pub file_system: MockFileSystem,
    pub system_service: MockSystemService,
    pub calendar: MockCalendar,
    pub notifications: TestNotificationSender,
    pub config: Config,
}

impl TrackerFixture {
    pub fn new(config: Config) -> Self {
        Self {
            process_table: MockProcessTable::new(),
            file_system: MockFileSystem::new(),
            system_service: MockSystemService::starting_at(at(9, 0, 0)),
            calendar: MockCalendar::new(),
            notifications: TestNotificationSender::new(),
            config,
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(ConfigBuilder::new().build())
    }

    /// Queue probe answers for the configured target
    pub fn script(&self, sequence: &[bool]) {
        self.process_table
            .push_presence_sequence(&self.config.general.target_process, sequence);
    }

    pub fn create_service(&self) -> MockTrackerService {
        SessionTrackerService::new(
            self.process_table.clone(),
            self.file_system.clone(),
            self.system_service.clone(),
            self.calendar.clone(),
            self.notifications.clone(),
            self.config.clone(),
        )
        .expect("Failed to create test service")
    }

    /// Run the full service for exactly `iterations` loop passes
    pub fn run(&self, iterations: usize) -> MockTrackerService {
        self.system_service.stop_after_iterations(iterations);
        let mut service = self.create_service();
        service.start().expect("tracker loop failed");
        service
    }

    pub fn activity_lines(&self) -> Vec<String> {
        self.file_system.file_lines(ACTIVITY_LOG)
    }

    pub fn pending_lines(&self) -> Vec<String> {
        self.file_system.file_lines(PENDING_EVENTS)
    }
}
