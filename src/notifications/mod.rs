use anyhow::Result;
use std::time::Duration;
use tracing::{debug, error, info};

use crate::config::Config;
use crate::tracker::CompletedSession;

/// Trait for sending notifications - allows for testing without system calls
pub trait NotificationSender {
    /// `timeout` is a display hint; backends that cannot honour it ignore it
    fn send(&self, title: &str, body: &str, timeout: Duration) -> Result<()>;
}

/// Production notification sender using the platform's notification tool
#[derive(Debug, Clone, Copy, Default)]
pub struct DesktopNotificationSender;

impl NotificationSender for DesktopNotificationSender {
    fn send(&self, title: &str, body: &str, timeout: Duration) -> Result<()> {
        send_native_notification(title, body, timeout)
    }
}

/// Test notification sender that records instead of displaying
#[cfg(any(test, feature = "test-mocks"))]
#[derive(Clone, Default)]
pub struct TestNotificationSender {
    pub sent_notifications: std::sync::Arc<std::sync::Mutex<Vec<(String, String)>>>,
    pub should_fail: std::sync::Arc<std::sync::atomic::AtomicBool>,
}

#[cfg(any(test, feature = "test-mocks"))]
impl TestNotificationSender {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_sent_notifications(&self) -> Vec<(String, String)> {
        self.sent_notifications.lock().unwrap().clone()
    }

    /// Simulate an unavailable notification backend
    pub fn set_failure(&self, should_fail: bool) {
        self.should_fail
            .store(should_fail, std::sync::atomic::Ordering::Relaxed);
    }

    pub fn clear(&self) {
        self.sent_notifications.lock().unwrap().clear();
    }
}

#[cfg(any(test, feature = "test-mocks"))]
impl NotificationSender for TestNotificationSender {
    fn send(&self, title: &str, body: &str, _timeout: Duration) -> Result<()> {
        if self.should_fail.load(std::sync::atomic::Ordering::Relaxed) {
            return Err(anyhow::anyhow!("Mock notification backend unavailable"));
        }
        debug!("Test notification: {} - {}", title, body);
        self.sent_notifications
            .lock()
            .unwrap()
            .push((title.to_string(), body.to_string()));
        Ok(())
    }
}

pub type DefaultNotificationManager = NotificationManager<DesktopNotificationSender>;

/// Formats and sends the tracker's desktop notifications
pub struct NotificationManager<T: NotificationSender = DesktopNotificationSender> {
    enabled: bool,
    title: String,
    timeout: Duration,
    app_label: String,
    sender: T,
}

impl DefaultNotificationManager {
    pub fn desktop(config: &Config) -> Self {
        Self::with_sender(config, DesktopNotificationSender)
    }
}

impl<T: NotificationSender> NotificationManager<T> {
    pub fn with_sender(config: &Config, sender: T) -> Self {
        Self {
            enabled: config.notifications.enabled,
            title: config.notifications.title.clone(),
            timeout: Duration::from_secs(config.notifications.timeout_secs),
            app_label: config.general.app_label.clone(),
            sender,
        }
    }

    /// Sent once when the tracker loop starts
    pub fn tracking_started(&self) -> Result<()> {
        let body = format!("{} usage tracking has started.", self.app_label);
        self.send_notification(&body)
    }

    /// Sent after a session was written to the calendar
    pub fn session_recorded(&self, label: &str, session: &CompletedSession) -> Result<()> {
        let body = format!(
            "Event created: {} from {} to {}",
            label, session.start, session.end
        );
        self.send_notification(&body)?;

        info!("Sent session recorded notification: {}", label);
        Ok(())
    }

    /// Sent when the calendar insert failed and the event was kept for later
    pub fn session_not_recorded(&self, label: &str, session: &CompletedSession) -> Result<()> {
        let body = format!(
            "Could not create event: {} from {} to {}. Saved for resubmission.",
            label, session.start, session.end
        );
        self.send_notification(&body)
    }

    fn send_notification(&self, body: &str) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }

        debug!("Sending notification: {} - {}", self.title, body);
        self.sender.send(&self.title, body, self.timeout)?;
        debug!("Successfully sent notification: {}", self.title);
        Ok(())
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Test notification (for debugging); sent even when notifications are disabled
    pub fn test_notification(&self) -> Result<()> {
        info!("Sending test notification...");

        let body = "Notification system is working correctly!";
        if let Err(e) = self.sender.send(&self.title, body, self.timeout) {
            error!("Failed to send notification: {}", e);
            error!("Check that Do Not Disturb is off and the notification tool is installed");
            return Err(anyhow::anyhow!("Failed to send notification: {}", e));
        }

        info!("Test notification sent successfully");
        Ok(())
    }
}

#[cfg(target_os = "macos")]
fn send_native_notification(title: &str, body: &str, _timeout: Duration) -> Result<()> {
    use std::process::Command;

    // Notification Center decides how long banners stay up
    let script = format!(
        "display notification {} with title {}",
        applescript_string(body),
        applescript_string(title)
    );

    let output = Command::new("osascript").args(["-e", &script]).output()?;

    if output.status.success() {
        Ok(())
    } else {
        let error = String::from_utf8_lossy(&output.stderr);
        Err(anyhow::anyhow!("osascript failed: {}", error))
    }
}

/// Quote `text` as an AppleScript string literal
#[cfg(any(target_os = "macos", test))]
fn applescript_string(text: &str) -> String {
    format!("\"{}\"", text.replace('\\', "\\\\").replace('"', "\\\""))
}

#[cfg(all(unix, not(target_os = "macos")))]
fn send_native_notification(title: &str, body: &str, timeout: Duration) -> Result<()> {
    use std::process::Command;

    let output = Command::new("notify-send")
        .arg("-t")
        .arg(timeout.as_millis().to_string())
        .arg(title)
        .arg(body)
        .output()?;

    if output.status.success() {
        Ok(())
    } else {
        let error = String::from_utf8_lossy(&output.stderr);
        Err(anyhow::anyhow!("notify-send failed: {}", error))
    }
}

#[cfg(not(unix))]
fn send_native_notification(_title: &str, _body: &str, _timeout: Duration) -> Result<()> {
    Err(anyhow::anyhow!(
        "desktop notifications are not supported on this platform"
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn session() -> CompletedSession {
        CompletedSession::new(
            Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 1, 1, 11, 45, 30).unwrap(),
        )
    }

    #[test]
    fn test_session_recorded_message() {
        let sender = TestNotificationSender::new();
        let manager = NotificationManager::with_sender(&Config::default(), sender.clone());

        manager
            .session_recorded("Coding time: 1h 45m", &session())
            .unwrap();

        let sent = sender.get_sent_notifications();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "VS Code Tracker");
        assert_eq!(
            sent[0].1,
            "Event created: Coding time: 1h 45m from 2024-01-01 10:00:00 UTC to 2024-01-01 11:45:30 UTC"
        );
    }

    #[test]
    fn test_disabled_manager_sends_nothing() {
        let mut config = Config::default();
        config.notifications.enabled = false;
        let sender = TestNotificationSender::new();
        let manager = NotificationManager::with_sender(&config, sender.clone());

        assert!(!manager.is_enabled());
        manager.tracking_started().unwrap();
        assert!(sender.get_sent_notifications().is_empty());
    }

    #[test]
    fn test_backend_failure_is_reported() {
        let sender = TestNotificationSender::new();
        sender.set_failure(true);
        let manager = NotificationManager::with_sender(&Config::default(), sender);

        assert!(manager.tracking_started().is_err());
        assert!(manager.test_notification().is_err());
    }

    #[test]
    fn test_tracking_started_uses_app_label() {
        let mut config = Config::default();
        config.general.app_label = "Zed".to_string();
        let sender = TestNotificationSender::new();
        let manager = NotificationManager::with_sender(&config, sender.clone());

        manager.tracking_started().unwrap();
        assert_eq!(
            sender.get_sent_notifications()[0].1,
            "Zed usage tracking has started."
        );
    }

    #[test]
    fn test_cleared_sender_starts_over() {
        let sender = TestNotificationSender::new();
        let manager = NotificationManager::with_sender(&Config::default(), sender.clone());

        manager.tracking_started().unwrap();
        sender.clear();
        manager.session_recorded("Coding time: 5m", &session()).unwrap();

        let sent = sender.get_sent_notifications();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].1.starts_with("Event created: Coding time: 5m"));
    }

    #[test]
    fn test_applescript_string_escapes_quotes_and_backslashes() {
        assert_eq!(applescript_string("plain"), r#""plain""#);
        assert_eq!(applescript_string(r#"say "hi""#), r#""say \"hi\"""#);
        assert_eq!(applescript_string(r"C:\temp\"), r#""C:\\temp\\""#);
    }
}
