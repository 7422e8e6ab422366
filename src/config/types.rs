use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use super::loader::ConfigLoader;

const APP_DIR: &str = "coding-time-tracker";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,

    #[serde(default)]
    pub calendar: CalendarConfig,

    #[serde(default)]
    pub notifications: NotificationConfig,

    #[serde(default)]
    pub activity_log: ActivityLogConfig,

    #[serde(default)]
    pub session: SessionConfig,

    #[serde(default)]
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    pub poll_interval_secs: u64,
    /// Matched case-insensitively as a substring of each process name
    pub target_process: String,
    /// Human name of the tracked application, used in log lines
    pub app_label: String,
    pub log_level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CalendarConfig {
    pub calendar_id: String,
    pub event_description: String,
    pub color_id: String,
    pub request_timeout_secs: u64,
    pub credentials_path: Option<PathBuf>,
    pub token_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    pub enabled: bool,
    pub title: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ActivityLogConfig {
    pub path: Option<PathBuf>,
    pub pending_events_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub on_shutdown: ShutdownPolicy,
}

/// What happens to a session that is still open when the tracker stops
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShutdownPolicy {
    #[default]
    Discard,
    Flush,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub file_output: bool,
    pub json_format: bool,
    pub log_dir: Option<PathBuf>,
    pub keep_days: u64,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 60,
            target_process: "code".to_string(),
            app_label: "VS Code".to_string(),
            log_level: "info".to_string(),
        }
    }
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self {
            calendar_id: "primary".to_string(),
            event_description: "Time spent using VS Code".to_string(),
            color_id: "7".to_string(), // Peacock
            request_timeout_secs: 30,
            credentials_path: None,
            token_path: None,
        }
    }
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            title: "VS Code Tracker".to_string(),
            timeout_secs: 3,
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            file_output: true,
            json_format: false,
            log_dir: None,
            keep_days: 14,
        }
    }
}

impl Config {
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let path = match config_path {
            Some(path) => PathBuf::from(path),
            None => ConfigLoader::default_config_path()?,
        };

        ConfigLoader::new_production(path).load_config()
    }

    pub fn save(&self, config_path: Option<&str>) -> Result<()> {
        let path = match config_path {
            Some(path) => PathBuf::from(path),
            None => ConfigLoader::default_config_path()?,
        };

        ConfigLoader::new_production(path).save_config(self)
    }

    /// Reject values the tracker cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.general.poll_interval_secs == 0 {
            bail!("general.poll_interval_secs must be greater than zero");
        }
        if self.general.target_process.trim().is_empty() {
            bail!("general.target_process must not be empty");
        }
        if self.calendar.calendar_id.trim().is_empty() {
            bail!("calendar.calendar_id must not be empty");
        }
        if self.calendar.request_timeout_secs == 0 {
            bail!("calendar.request_timeout_secs must be greater than zero");
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.general.poll_interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.calendar.request_timeout_secs)
    }

    pub fn credentials_path(&self) -> Result<PathBuf> {
        resolve(&self.calendar.credentials_path, config_dir, "credentials.json")
    }

    pub fn token_path(&self) -> Result<PathBuf> {
        resolve(&self.calendar.token_path, config_dir, "token.json")
    }

    pub fn activity_log_path(&self) -> Result<PathBuf> {
        resolve(&self.activity_log.path, data_dir, "vscode_tracker.log")
    }

    pub fn pending_events_path(&self) -> Result<PathBuf> {
        resolve(
            &self.activity_log.pending_events_path,
            data_dir,
            "pending_events.jsonl",
        )
    }
}

fn resolve(
    configured: &Option<PathBuf>,
    base: fn() -> Result<PathBuf>,
    file_name: &str,
) -> Result<PathBuf> {
    match configured {
        Some(path) => Ok(path.clone()),
        None => Ok(base()?.join(file_name)),
    }
}

fn config_dir() -> Result<PathBuf> {
    let home_dir = dirs::home_dir().context("Failed to get home directory")?;
    Ok(home_dir.join(".config").join(APP_DIR))
}

/// Directory for the activity log, pending events and rotated diagnostics
pub fn data_dir() -> Result<PathBuf> {
    let home_dir = dirs::home_dir().context("Failed to get home directory")?;
    Ok(home_dir.join(".local/share").join(APP_DIR))
}
