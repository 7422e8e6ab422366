use anyhow::Result;
use tracing::{error, info, warn};

use super::emitter::{EmitOutcome, EventEmitter};
use crate::calendar::{CalendarBackend, GoogleCalendarClient, PendingEventStore};
use crate::config::{Config, ShutdownPolicy};
use crate::error::TrackerError;
use crate::logging::ActivityLog;
use crate::notifications::{DesktopNotificationSender, NotificationManager, NotificationSender};
use crate::system::{
    FileSystemInterface, NativeSystemService, ProcessTableInterface, StandardFileSystem,
    SysinfoProcessTable, SystemServiceInterface,
};
use crate::tracker::{PresenceProbe, SessionTracker, Transition};

/// The polling loop: probe, detect edges, emit sessions, sleep
pub struct SessionTrackerService<
    P: ProcessTableInterface,
    F: FileSystemInterface,
    S: SystemServiceInterface,
    C: CalendarBackend,
    N: NotificationSender,
> {
    probe: PresenceProbe<P>,
    tracker: SessionTracker,
    activity_log: ActivityLog<F>,
    emitter: EventEmitter<F, C, N>,
    system_service: S,
    config: Config,
    iterations: u64,
}

impl<P, F, S, C, N> SessionTrackerService<P, F, S, C, N>
where
    P: ProcessTableInterface,
    F: FileSystemInterface + Clone,
    S: SystemServiceInterface,
    C: CalendarBackend,
    N: NotificationSender,
{
    pub fn new(
        process_table: P,
        file_system: F,
        system_service: S,
        calendar: C,
        sender: N,
        config: Config,
    ) -> Result<Self> {
        let activity_log = ActivityLog::new(file_system.clone(), config.activity_log_path()?);
        let emitter = EventEmitter::new(
            calendar,
            NotificationManager::with_sender(&config, sender),
            ActivityLog::new(file_system.clone(), config.activity_log_path()?),
            PendingEventStore::new(file_system, config.pending_events_path()?),
            config.clone(),
        );

        Ok(Self {
            probe: PresenceProbe::new(process_table, &config.general.target_process),
            tracker: SessionTracker::new(),
            activity_log,
            emitter,
            system_service,
            config,
            iterations: 0,
        })
    }

    /// Register signals, announce startup and run until shutdown
    pub fn start(&mut self) -> Result<(), TrackerError> {
        info!(
            "Starting session tracker for '{}' (pid {})",
            self.probe.target(),
            self.system_service.get_process_id()
        );

        self.system_service
            .register_signal_handlers()
            .map_err(|e| TrackerError::Signals(e.to_string()))?;

        if let Err(e) = self.activity_log.prepare() {
            warn!("Could not prepare activity log directory: {}", e);
        }
        if let Err(e) = self.emitter.notifications().tracking_started() {
            warn!("Startup notification failed: {}", e);
        }

        self.run_main_loop()?;
        self.shutdown()
    }

    fn run_main_loop(&mut self) -> Result<(), TrackerError> {
        info!(
            "Entering main loop, polling every {}s",
            self.config.general.poll_interval_secs
        );

        while self.system_service.should_continue_running() {
            self.run_iteration()?;

            self.system_service
                .sleep_ms(self.config.poll_interval().as_millis() as u64)
                .map_err(|e| TrackerError::System(e.to_string()))?;
        }

        info!("Main loop exited after {} iterations", self.iterations);
        Ok(())
    }

    /// One probe and its consequences
    ///
    /// Probe failures skip the iteration; only credential failures are returned.
    pub fn run_iteration(&mut self) -> Result<(), TrackerError> {
        self.iterations += 1;

        let present = match self.probe.is_target_running() {
            Ok(present) => present,
            Err(e) => {
                error!("Probe failed, skipping iteration {}: {}", self.iterations, e);
                return Ok(());
            }
        };

        let now = self.system_service.now();
        self.log_activity(now, &format!("{} running: {}", self.config.general.app_label, present));

        match self.tracker.observe(present, now) {
            Some(Transition::Started(start)) => {
                info!("{} opened at {}", self.config.general.app_label, start);
            }
            Some(Transition::Ended(session)) => {
                info!("{} closed at {}", self.config.general.app_label, session.end);
                self.emitter.emit(&session, now)?;
            }
            None => {}
        }
        Ok(())
    }

    /// Apply the open-session policy
    pub fn shutdown(&mut self) -> Result<(), TrackerError> {
        let now = self.system_service.now();
        let Some(session) = self.tracker.close_open_session(now) else {
            info!("Session tracker stopped");
            return Ok(());
        };

        match self.config.session.on_shutdown {
            ShutdownPolicy::Flush => {
                info!("Flushing open session {} on shutdown", session);
                if let EmitOutcome::Saved { reason } = self.emitter.emit(&session, now)? {
                    warn!("Flushed session saved for resubmission: {}", reason);
                }
            }
            ShutdownPolicy::Discard => {
                warn!("Discarding open session started at {}", session.start);
            }
        }

        info!("Session tracker stopped");
        Ok(())
    }

    fn log_activity(&self, now: chrono::DateTime<chrono::Utc>, message: &str) {
        if let Err(e) = self.activity_log.record(now, message) {
            warn!(
                "Could not write activity log {}: {}",
                self.activity_log.path().display(),
                e
            );
        }
    }

    pub fn tracker(&self) -> &SessionTracker {
        &self.tracker
    }

    pub fn iterations(&self) -> u64 {
        self.iterations
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}

pub type ProductionTrackerService = SessionTrackerService<
    SysinfoProcessTable,
    StandardFileSystem,
    NativeSystemService,
    GoogleCalendarClient,
    DesktopNotificationSender,
>;

// Convenience constructor for production use
impl ProductionTrackerService {
    /// Authorizes the calendar up front, interactively if no token is cached
    pub fn new_production(config: Config) -> Result<Self> {
        let calendar = GoogleCalendarClient::from_config(&config)?;
        calendar.authorize(true)?;

        Self::new(
            SysinfoProcessTable::new(),
            StandardFileSystem,
            NativeSystemService::new(),
            calendar,
            DesktopNotificationSender,
            config,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notifications::TestNotificationSender;
    use crate::system::{MockCalendar, MockFileSystem, MockProcessTable, MockSystemService};
    use std::path::PathBuf;

    fn config() -> Config {
        let mut config = Config::default();
        config.activity_log.path = Some(PathBuf::from("/data/activity.log"));
        config.activity_log.pending_events_path = Some(PathBuf::from("/data/pending.jsonl"));
        config
    }

    #[test]
    fn test_iteration_counts_and_logs_probe() {
        let table = MockProcessTable::new();
        table.push_running(&["code"]);
        let fs = MockFileSystem::new();
        let mut service = SessionTrackerService::new(
            table,
            fs.clone(),
            MockSystemService::new(),
            MockCalendar::new(),
            TestNotificationSender::new(),
            config(),
        )
        .unwrap();

        service.run_iteration().unwrap();

        assert_eq!(service.iterations(), 1);
        assert!(service.tracker().is_tracking());
        let lines = fs.file_lines("/data/activity.log");
        assert_eq!(lines.len(), 1);
        assert!(lines[0].ends_with(" - VS Code running: true"));
    }

    #[test]
    fn test_signal_registration_failure_stops_start() {
        let system = MockSystemService::new();
        system.set_signal_registration_failure(true);
        let mut service = SessionTrackerService::new(
            MockProcessTable::new(),
            MockFileSystem::new(),
            system,
            MockCalendar::new(),
            TestNotificationSender::new(),
            config(),
        )
        .unwrap();

        assert!(matches!(service.start(), Err(TrackerError::Signals(_))));
        assert_eq!(service.iterations(), 0);
    }
}
