use coding_time_tracker::config::{Config, ShutdownPolicy};
use std::fs;
use tempfile::TempDir;

#[test]
fn test_missing_config_is_created_with_defaults() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("config.toml");
    let path_str = path.to_str().unwrap();

    let config = Config::load(Some(path_str)).unwrap();

    assert!(path.exists());
    assert_eq!(config.general.poll_interval_secs, 60);
    assert_eq!(config.general.target_process, "code");
    assert_eq!(config.calendar.calendar_id, "primary");

    let written = fs::read_to_string(&path).unwrap();
    assert!(written.contains("[general]"));
    assert!(written.contains("poll_interval_secs = 60"));
}

#[test]
fn test_saved_config_is_loaded_back() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    let path_str = path.to_str().unwrap();

    let mut config = Config::default();
    config.general.poll_interval_secs = 30;
    config.general.target_process = "zed".to_string();
    config.calendar.color_id = "3".to_string();
    config.session.on_shutdown = ShutdownPolicy::Flush;
    config.save(Some(path_str)).unwrap();

    let loaded = Config::load(Some(path_str)).unwrap();
    assert_eq!(loaded.general.poll_interval_secs, 30);
    assert_eq!(loaded.general.target_process, "zed");
    assert_eq!(loaded.calendar.color_id, "3");
    assert_eq!(loaded.session.on_shutdown, ShutdownPolicy::Flush);
}

#[test]
fn test_hand_written_partial_config() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(
        &path,
        r#"
[general]
poll_interval_secs = 10

[session]
on_shutdown = "flush"

[activity_log]
path = "/tmp/activity.log"
"#,
    )
    .unwrap();

    let config = Config::load(Some(path.to_str().unwrap())).unwrap();

    assert_eq!(config.general.poll_interval_secs, 10);
    assert_eq!(config.general.app_label, "VS Code");
    assert_eq!(config.session.on_shutdown, ShutdownPolicy::Flush);
    assert_eq!(
        config.activity_log_path().unwrap(),
        std::path::PathBuf::from("/tmp/activity.log")
    );
    assert!(config.validate().is_ok());
}

#[test]
fn test_invalid_policy_is_a_parse_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, "[session]\non_shutdown = \"later\"\n").unwrap();

    assert!(Config::load(Some(path.to_str().unwrap())).is_err());
}

#[test]
fn test_validation_of_loaded_values() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, "[calendar]\nrequest_timeout_secs = 0\n").unwrap();

    let config = Config::load(Some(path.to_str().unwrap())).unwrap();
    let err = config.validate().unwrap_err();
    assert!(err.to_string().contains("request_timeout_secs"));
}
