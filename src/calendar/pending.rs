use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

use super::{CalendarBackend, CreatedEvent, EventRequest, PendingEvent};
use crate::error::CalendarError;
use crate::system::FileSystemInterface;

/// Failed inserts, one JSON object per line, awaiting `resubmit`
pub struct PendingEventStore<F: FileSystemInterface> {
    file_system: F,
    path: PathBuf,
}

/// Outcome of one resubmission pass
#[derive(Debug, Default)]
pub struct ResubmitReport {
    pub created: Vec<CreatedEvent>,
    pub remaining: usize,
    /// Lines that could not be parsed; they stay in the file untouched
    pub unreadable: usize,
    /// Set when a credential failure cut the pass short
    pub fatal: Option<CalendarError>,
}

/// The store as read at one point in time
struct Snapshot {
    raw: String,
    events: Vec<PendingEvent>,
    unreadable: Vec<String>,
}

impl<F: FileSystemInterface> PendingEventStore<F> {
    pub fn new(file_system: F, path: PathBuf) -> Self {
        Self { file_system, path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one failed event
    pub fn push(&self, event: &EventRequest, reason: &str, failed_at: DateTime<Utc>) -> Result<()> {
        let pending = PendingEvent {
            event: event.clone(),
            failed_at,
            reason: reason.to_string(),
        };
        let line = serde_json::to_string(&pending).context("Failed to serialize pending event")?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                self.file_system.create_dir_all(parent)?;
            }
        }
        self.file_system.append_line(&self.path, &line)
    }

    /// All stored events; unparseable lines are skipped with a warning
    pub fn load(&self) -> Result<Vec<PendingEvent>> {
        Ok(self.snapshot()?.events)
    }

    fn read_raw(&self) -> Result<String> {
        if !self.file_system.file_exists(&self.path) {
            return Ok(String::new());
        }
        self.file_system.read_file(&self.path)
    }

    fn snapshot(&self) -> Result<Snapshot> {
        let raw = self.read_raw()?;
        let mut events = Vec::new();
        let mut unreadable = Vec::new();

        for (index, line) in raw.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<PendingEvent>(line) {
                Ok(event) => events.push(event),
                Err(e) => {
                    warn!(
                        "Skipping malformed pending event on line {} of {}: {}",
                        index + 1,
                        self.path.display(),
                        e
                    );
                    unreadable.push(line.to_string());
                }
            }
        }

        Ok(Snapshot {
            raw,
            events,
            unreadable,
        })
    }

    /// Lines written by someone else (usually the running tracker) after `raw` was read
    fn appended_since(&self, raw: &str) -> Result<Vec<String>> {
        let current = self.read_raw()?;
        let appended = match current.strip_prefix(raw) {
            Some(rest) => rest
                .lines()
                .filter(|line| !line.trim().is_empty())
                .map(str::to_string)
                .collect(),
            None => {
                warn!(
                    "{} was rewritten during resubmission, keeping unseen lines",
                    self.path.display()
                );
                let seen: HashSet<&str> = raw.lines().collect();
                current
                    .lines()
                    .filter(|line| !line.trim().is_empty() && !seen.contains(line))
                    .map(str::to_string)
                    .collect()
            }
        };
        Ok(appended)
    }

    /// Try every stored event again, keeping the ones that still fail
    ///
    /// Unparseable lines and events appended while the pass runs are kept.
    pub fn resubmit<C: CalendarBackend>(&self, calendar: &C) -> Result<ResubmitReport> {
        let snapshot = self.snapshot()?;
        let mut report = ResubmitReport {
            unreadable: snapshot.unreadable.len(),
            ..ResubmitReport::default()
        };
        let mut still_pending = Vec::new();

        let mut queue = snapshot.events.into_iter();
        for item in queue.by_ref() {
            match calendar.insert_event(&item.event) {
                Ok(created) => {
                    info!(
                        "Resubmitted '{}' ({}): {}",
                        item.event.summary,
                        item.event.session(),
                        created.reference()
                    );
                    report.created.push(created);
                }
                Err(e) if e.is_fatal() => {
                    error!("Stopping resubmission: {}", e);
                    still_pending.push(item);
                    report.fatal = Some(e);
                    break;
                }
                Err(e) => {
                    warn!("Resubmission of '{}' failed: {}", item.event.summary, e);
                    still_pending.push(PendingEvent {
                        reason: e.to_string(),
                        ..item
                    });
                }
            }
        }
        still_pending.extend(queue);
        report.remaining = still_pending.len();

        let mut lines = Vec::with_capacity(still_pending.len() + snapshot.unreadable.len());
        for event in &still_pending {
            lines.push(serde_json::to_string(event).context("Failed to serialize pending event")?);
        }
        lines.extend(snapshot.unreadable);

        let appended = self.appended_since(&snapshot.raw)?;
        if !appended.is_empty() {
            info!("Keeping {} events saved during resubmission", appended.len());
            report.remaining += appended.len();
        }
        lines.extend(appended);

        if lines.is_empty() && !self.file_system.file_exists(&self.path) {
            return Ok(report);
        }
        let mut content = lines.join("\n");
        if !content.is_empty() {
            content.push('\n');
        }
        self.file_system.write_file(&self.path, &content)?;
        Ok(report)
    }
}
