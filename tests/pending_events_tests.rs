use coding_time_tracker::calendar::PendingEventStore;
use coding_time_tracker::config::Config;
use coding_time_tracker::system::StandardFileSystem;
use coding_time_tracker::{
    MockCalendar, MockCalendarMode, MockProcessTable, MockSystemService, SessionTrackerService,
    TestNotificationSender,
};
use std::path::Path;
use tempfile::TempDir;

mod test_utils;
use test_utils::at;

fn config_in(dir: &Path) -> Config {
    let mut config = Config::default();
    config.activity_log.path = Some(dir.join("data").join("vscode_tracker.log"));
    config.activity_log.pending_events_path = Some(dir.join("data").join("pending_events.jsonl"));
    config.logging.file_output = false;
    config
}

/// Run the tracker over real files with the calendar unavailable
fn run_offline(dir: &Path, calendar: &MockCalendar, sequence: &[bool]) {
    let config = config_in(dir);
    let table = MockProcessTable::new();
    table.push_presence_sequence(&config.general.target_process, sequence);
    let system = MockSystemService::starting_at(at(9, 0, 0));
    system.stop_after_iterations(sequence.len());

    calendar.set_mode(MockCalendarMode::Timeout);
    let mut service = SessionTrackerService::new(
        table,
        StandardFileSystem,
        system,
        calendar.clone(),
        TestNotificationSender::new(),
        config,
    )
    .unwrap();
    service.start().unwrap();
}

#[test]
fn test_failed_inserts_survive_on_disk() {
    let dir = TempDir::new().unwrap();
    let calendar = MockCalendar::new();

    run_offline(dir.path(), &calendar, &[true, false, true, true, false]);

    let config = config_in(dir.path());
    let store = PendingEventStore::new(StandardFileSystem, config.pending_events_path().unwrap());
    let pending = store.load().unwrap();
    assert_eq!(pending.len(), 2);
    assert_eq!(pending[0].event.summary, "Coding time: 1m");
    assert_eq!(pending[1].event.summary, "Coding time: 2m");
    assert_eq!(pending[1].event.start.date_time, at(9, 2, 0));
    assert_eq!(pending[1].failed_at, at(9, 4, 0));

    let log = std::fs::read_to_string(config.activity_log_path().unwrap()).unwrap();
    assert_eq!(log.lines().count(), 5 + 2);
    assert_eq!(log.matches("Event creation failed").count(), 2);
}

#[test]
fn test_resubmit_drains_store_once_calendar_is_back() {
    let dir = TempDir::new().unwrap();
    let calendar = MockCalendar::new();
    run_offline(dir.path(), &calendar, &[true, false, true, false]);

    calendar.set_mode(MockCalendarMode::Accept);
    let config = config_in(dir.path());
    let store = PendingEventStore::new(StandardFileSystem, config.pending_events_path().unwrap());
    let report = store.resubmit(&calendar).unwrap();

    assert_eq!(report.created.len(), 2);
    assert_eq!(report.remaining, 0);
    assert!(report.fatal.is_none());
    assert!(store.load().unwrap().is_empty());

    let inserted = calendar.inserted_events();
    assert_eq!(inserted.len(), 2);
    assert_eq!(inserted[0].start.date_time, at(9, 0, 0));
    assert_eq!(inserted[1].start.date_time, at(9, 2, 0));
}

#[test]
fn test_resubmit_keeps_everything_on_credential_failure() {
    let dir = TempDir::new().unwrap();
    let calendar = MockCalendar::new();
    run_offline(dir.path(), &calendar, &[true, false, true, false]);

    calendar.set_mode(MockCalendarMode::CredentialFailure);
    let config = config_in(dir.path());
    let store = PendingEventStore::new(StandardFileSystem, config.pending_events_path().unwrap());
    let report = store.resubmit(&calendar).unwrap();

    assert!(report.created.is_empty());
    assert_eq!(report.remaining, 2);
    assert!(report.fatal.is_some_and(|e| e.is_fatal()));
    assert_eq!(store.load().unwrap().len(), 2);
}
