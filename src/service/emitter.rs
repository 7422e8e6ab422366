use chrono::{DateTime, Utc};
use tracing::{error, info, warn};

use crate::calendar::{CalendarBackend, CreatedEvent, EventRequest, PendingEventStore};
use crate::config::Config;
use crate::error::{CalendarError, CredentialError, SessionError};
use crate::logging::ActivityLog;
use crate::notifications::{NotificationManager, NotificationSender};
use crate::system::FileSystemInterface;
use crate::tracker::CompletedSession;

/// What happened to one completed session
#[derive(Debug)]
pub enum EmitOutcome {
    Created(CreatedEvent),
    /// The insert failed; the event is in the pending store
    Saved { reason: String },
    /// The measurement was rejected; nothing was sent
    Skipped,
}

/// Turns a completed session into a calendar event, a log line and a notification
///
/// The three side effects are attempted independently; only a credential
/// failure is reported back to the caller.
pub struct EventEmitter<F: FileSystemInterface, C: CalendarBackend, N: NotificationSender> {
    calendar: C,
    notifications: NotificationManager<N>,
    activity_log: ActivityLog<F>,
    pending: PendingEventStore<F>,
    config: Config,
}

impl<F: FileSystemInterface, C: CalendarBackend, N: NotificationSender> EventEmitter<F, C, N> {
    pub fn new(
        calendar: C,
        notifications: NotificationManager<N>,
        activity_log: ActivityLog<F>,
        pending: PendingEventStore<F>,
        config: Config,
    ) -> Self {
        Self {
            calendar,
            notifications,
            activity_log,
            pending,
            config,
        }
    }

    pub fn notifications(&self) -> &NotificationManager<N> {
        &self.notifications
    }

    pub fn emit(
        &self,
        session: &CompletedSession,
        now: DateTime<Utc>,
    ) -> Result<EmitOutcome, CredentialError> {
        let request = match EventRequest::from_session(session, &self.config) {
            Ok(request) => request,
            Err(SessionError::InvalidMeasurement { start, end }) => {
                warn!("Skipping session with non-positive duration: {} to {}", start, end);
                self.log(
                    now,
                    &format!("Skipped session with invalid duration: start {start}, end {end}"),
                );
                return Ok(EmitOutcome::Skipped);
            }
        };

        match self.calendar.insert_event(&request) {
            Ok(created) => {
                info!("Recorded '{}' for {}", request.summary, session);
                self.log(now, &format!("Event created: {}", created.reference()));
                if let Err(e) = self.notifications.session_recorded(&request.summary, session) {
                    warn!("Notification failed: {}", e);
                }
                Ok(EmitOutcome::Created(created))
            }
            Err(e) => {
                let reason = e.to_string();
                error!("Could not create event for {}: {}", session, reason);

                if let Err(store_err) = self.pending.push(&request, &reason, now) {
                    error!(
                        "Could not save pending event to {}: {}",
                        self.pending.path().display(),
                        store_err
                    );
                }
                self.log(
                    now,
                    &format!(
                        "Event creation failed for {} from {} to {}: {}",
                        request.summary, session.start, session.end, reason
                    ),
                );
                if let Err(notify_err) = self
                    .notifications
                    .session_not_recorded(&request.summary, session)
                {
                    warn!("Notification failed: {}", notify_err);
                }

                match e {
                    CalendarError::Credentials(credential_error) => Err(credential_error),
                    _ => Ok(EmitOutcome::Saved { reason }),
                }
            }
        }
    }

    fn log(&self, now: DateTime<Utc>, message: &str) {
        if let Err(e) = self.activity_log.record(now, message) {
            warn!(
                "Could not write activity log {}: {}",
                self.activity_log.path().display(),
                e
            );
        }
    }
}
