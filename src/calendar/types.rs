use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::SessionError;
use crate::tracker::CompletedSession;

/// Body of an events.insert request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventRequest {
    pub summary: String,
    pub description: String,
    pub start: EventTime,
    pub end: EventTime,
    pub color_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventTime {
    pub date_time: DateTime<Utc>,
    pub time_zone: String,
}

impl EventTime {
    pub fn utc(date_time: DateTime<Utc>) -> Self {
        Self {
            date_time,
            time_zone: "UTC".to_string(),
        }
    }
}

impl EventRequest {
    /// Build the calendar entry for a session; invalid measurements are refused
    pub fn from_session(session: &CompletedSession, config: &Config) -> Result<Self, SessionError> {
        let summary = session.title()?;
        Ok(Self {
            summary,
            description: config.calendar.event_description.clone(),
            start: EventTime::utc(session.start),
            end: EventTime::utc(session.end),
            color_id: config.calendar.color_id.clone(),
        })
    }

    pub fn session(&self) -> CompletedSession {
        CompletedSession::new(self.start.date_time, self.end.date_time)
    }
}

/// The parts of the events.insert response the tracker uses
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedEvent {
    pub id: String,
    #[serde(default)]
    pub html_link: Option<String>,
}

impl CreatedEvent {
    /// Link for the activity log, falling back to the event id
    pub fn reference(&self) -> &str {
        self.html_link.as_deref().unwrap_or(&self.id)
    }
}

/// An event whose insert failed, kept for `resubmit`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingEvent {
    pub event: EventRequest,
    pub failed_at: DateTime<Utc>,
    pub reason: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn session() -> CompletedSession {
        CompletedSession::new(
            Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 1, 1, 11, 45, 30).unwrap(),
        )
    }

    #[test]
    fn test_request_matches_calendar_wire_format() {
        let request = EventRequest::from_session(&session(), &Config::default()).unwrap();
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(json["summary"], "Coding time: 1h 45m");
        assert_eq!(json["description"], "Time spent using VS Code");
        assert_eq!(json["colorId"], "7");
        assert_eq!(json["start"]["dateTime"], "2024-01-01T10:00:00Z");
        assert_eq!(json["start"]["timeZone"], "UTC");
        assert_eq!(json["end"]["dateTime"], "2024-01-01T11:45:30Z");
    }

    #[test]
    fn test_request_refuses_invalid_session() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap();
        let backwards = CompletedSession::new(start, start);
        assert!(EventRequest::from_session(&backwards, &Config::default()).is_err());
    }

    #[test]
    fn test_created_event_parses_google_response() {
        let body = r#"{
            "kind": "calendar#event",
            "id": "abc123",
            "htmlLink": "https://www.google.com/calendar/event?eid=abc123",
            "status": "confirmed"
        }"#;
        let created: CreatedEvent = serde_json::from_str(body).unwrap();
        assert_eq!(created.id, "abc123");
        assert_eq!(
            created.reference(),
            "https://www.google.com/calendar/event?eid=abc123"
        );
    }

    #[test]
    fn test_reference_falls_back_to_id() {
        let created: CreatedEvent = serde_json::from_str(r#"{"id": "abc123"}"#).unwrap();
        assert_eq!(created.reference(), "abc123");
    }
}
