use reqwest::StatusCode;
use reqwest::blocking::{Client, Response};
use std::path::PathBuf;
#[cfg(any(test, feature = "test-mocks"))]
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use super::oauth::{ClientSecrets, OAuthAuthenticator};
use super::{CalendarBackend, CreatedEvent, EventRequest};
use crate::config::Config;
use crate::error::{CalendarError, CredentialError};

const API_BASE: &str = "https://www.googleapis.com/calendar/v3";
const USER_AGENT: &str = concat!("coding-time-tracker/", env!("CARGO_PKG_VERSION"));

/// Google Calendar v3 events.insert over a bounded-time HTTP client
pub struct GoogleCalendarClient {
    http: Client,
    auth: OAuthAuthenticator,
    calendar_id: String,
    api_base: String,
}

impl GoogleCalendarClient {
    /// Build the client from config; does not touch the network
    pub fn from_config(config: &Config) -> Result<Self, CalendarError> {
        let credentials_path = config
            .credentials_path()
            .map_err(|e| CredentialError::TokenCache(e.to_string()))?;
        let token_path = config
            .token_path()
            .map_err(|e| CredentialError::TokenCache(e.to_string()))?;
        let secrets = ClientSecrets::load(&credentials_path)?;

        let http = Client::builder()
            .timeout(config.request_timeout())
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self::assemble(
            http,
            secrets,
            token_path,
            &config.calendar.calendar_id,
            API_BASE,
        ))
    }

    /// Client against arbitrary endpoints, bypassing any configured proxy
    #[cfg(any(test, feature = "test-mocks"))]
    pub fn with_endpoints(
        api_base: &str,
        calendar_id: &str,
        secrets: ClientSecrets,
        token_path: PathBuf,
        timeout: Duration,
    ) -> Result<Self, CalendarError> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .no_proxy()
            .build()?;

        Ok(Self::assemble(http, secrets, token_path, calendar_id, api_base))
    }

    fn assemble(
        http: Client,
        secrets: ClientSecrets,
        token_path: PathBuf,
        calendar_id: &str,
        api_base: &str,
    ) -> Self {
        Self {
            auth: OAuthAuthenticator::new(secrets, token_path, http.clone()),
            http,
            calendar_id: calendar_id.to_string(),
            api_base: api_base.to_string(),
        }
    }

    /// Load, refresh or interactively obtain credentials
    pub fn authorize(&self, allow_interactive: bool) -> Result<(), CalendarError> {
        self.auth.ensure_authorized(allow_interactive)
    }

    fn events_url(&self) -> Result<Url, CalendarError> {
        events_url(&self.api_base, &self.calendar_id)
    }

    fn post_event(&self, url: &Url, token: &str, event: &EventRequest) -> Result<Response, CalendarError> {
        debug!("POST {}", url);
        Ok(self
            .http
            .post(url.clone())
            .bearer_auth(token)
            .json(event)
            .send()?)
    }
}

/// `{base}/calendars/{id}/events`, with the id percent-encoded
pub fn events_url(api_base: &str, calendar_id: &str) -> Result<Url, CalendarError> {
    let mut url = Url::parse(api_base)
        .map_err(|e| CalendarError::InvalidResponse(format!("bad API base URL: {e}")))?;
    url.path_segments_mut()
        .map_err(|_| CalendarError::InvalidResponse("API base URL cannot have a path".to_string()))?
        .pop_if_empty()
        .extend(["calendars", calendar_id, "events"]);
    Ok(url)
}

impl CalendarBackend for GoogleCalendarClient {
    fn insert_event(&self, event: &EventRequest) -> Result<CreatedEvent, CalendarError> {
        let url = self.events_url()?;

        let token = self.auth.access_token()?;
        let mut response = self.post_event(&url, &token, event)?;

        if response.status() == StatusCode::UNAUTHORIZED {
            warn!("Calendar rejected access token, refreshing once");
            let token = self.auth.force_refresh()?;
            response = self.post_event(&url, &token, event)?;
            if response.status() == StatusCode::UNAUTHORIZED {
                return Err(CredentialError::StillUnauthorized.into());
            }
        }

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(CalendarError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let created: CreatedEvent = response.json()?;
        info!("Created calendar event {}", created.id);
        Ok(created)
    }
}
