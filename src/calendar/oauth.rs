//! OAuth2 installed-app credentials for the calendar API.
//!
//! Client secrets come from Google's `credentials.json`; the resulting token
//! is cached as JSON and refreshed when it is within a minute of expiry.
//! Without a usable token the loopback authorization flow runs: the consent
//! URL is printed (and opened when possible) and the redirect is caught on
//! an ephemeral port on 127.0.0.1.

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use rand::distributions::Alphanumeric;
use reqwest::StatusCode;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use std::io::{BufRead, BufReader, ErrorKind, Write};
use std::net::TcpListener;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{CalendarError, CredentialError};

pub const CALENDAR_SCOPE: &str = "https://www.googleapis.com/auth/calendar";

const DEFAULT_AUTH_URI: &str = "https://accounts.google.com/o/oauth2/auth";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Tokens this close to expiry are refreshed before use
const EXPIRY_MARGIN_SECS: i64 = 60;

/// Redirects that carry neither a code nor an error (favicon and the like)
/// tolerated before the flow gives up
const MAX_STRAY_REQUESTS: usize = 16;

/// How long an accepted connection may stay silent before it counts as stray
const REQUEST_READ_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ClientSecrets {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default = "default_auth_uri")]
    pub auth_uri: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_auth_uri() -> String {
    DEFAULT_AUTH_URI.to_string()
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

#[derive(Deserialize)]
struct ClientSecretsFile {
    installed: Option<ClientSecrets>,
    web: Option<ClientSecrets>,
}

impl ClientSecrets {
    pub fn load(path: &Path) -> Result<Self, CredentialError> {
        if !path.exists() {
            return Err(CredentialError::MissingClientSecrets(path.to_path_buf()));
        }
        let content =
            std::fs::read_to_string(path).map_err(|e| CredentialError::InvalidClientSecrets {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        Self::parse(&content, path)
    }

    pub fn parse(content: &str, path: &Path) -> Result<Self, CredentialError> {
        let invalid = |reason: String| CredentialError::InvalidClientSecrets {
            path: path.to_path_buf(),
            reason,
        };

        let file: ClientSecretsFile =
            serde_json::from_str(content).map_err(|e| invalid(e.to_string()))?;
        file.installed
            .or(file.web)
            .ok_or_else(|| invalid("expected an \"installed\" or \"web\" client".to_string()))
    }
}

/// Token cache entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredToken {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    pub expires_at: DateTime<Utc>,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default = "default_token_type")]
    pub token_type: String,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

impl StoredToken {
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        self.expires_at - now > Duration::seconds(EXPIRY_MARGIN_SECS)
    }
}

#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub expires_in: i64,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
}

impl TokenResponse {
    /// Refresh responses usually omit the refresh token; keep the previous one then
    pub fn into_token(self, now: DateTime<Utc>, previous_refresh: Option<String>) -> StoredToken {
        StoredToken {
            access_token: self.access_token,
            refresh_token: self.refresh_token.or(previous_refresh),
            expires_at: now + Duration::seconds(self.expires_in),
            scope: self.scope,
            token_type: self.token_type.unwrap_or_else(default_token_type),
        }
    }
}

/// Consent page URL for the loopback flow
pub fn authorization_url(
    secrets: &ClientSecrets,
    redirect_uri: &str,
    state: &str,
) -> Result<Url, CredentialError> {
    Url::parse_with_params(
        &secrets.auth_uri,
        &[
            ("client_id", secrets.client_id.as_str()),
            ("redirect_uri", redirect_uri),
            ("response_type", "code"),
            ("scope", CALENDAR_SCOPE),
            ("access_type", "offline"),
            ("prompt", "consent"),
            ("state", state),
        ],
    )
    .map_err(|e| CredentialError::Flow(format!("invalid auth_uri: {e}")))
}

/// Extract the authorization code from a redirect request line
///
/// Returns `Ok(None)` for requests that are not the redirect.
pub fn parse_redirect(request_line: &str, expected_state: &str) -> Result<Option<String>, CredentialError> {
    let Some(target) = request_line.split_whitespace().nth(1) else {
        return Ok(None);
    };
    let url = Url::parse(&format!("http://127.0.0.1{target}"))
        .map_err(|e| CredentialError::Flow(format!("malformed redirect: {e}")))?;

    let mut code = None;
    let mut state = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "error" => return Err(CredentialError::AuthorizationDenied(value.into_owned())),
            "code" => code = Some(value.into_owned()),
            "state" => state = Some(value.into_owned()),
            _ => {}
        }
    }

    match code {
        Some(code) if state.as_deref() == Some(expected_state) => Ok(Some(code)),
        Some(_) => Err(CredentialError::StateMismatch),
        None => Ok(None),
    }
}

fn random_state() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(32)
        .map(char::from)
        .collect()
}

/// Holds the current token and keeps it usable
pub struct OAuthAuthenticator {
    secrets: ClientSecrets,
    token_path: PathBuf,
    http: Client,
    token: Mutex<Option<StoredToken>>,
}

impl OAuthAuthenticator {
    pub fn new(secrets: ClientSecrets, token_path: PathBuf, http: Client) -> Self {
        Self {
            secrets,
            token_path,
            http,
            token: Mutex::new(None),
        }
    }

    /// Make sure a valid token is available, running the browser flow if allowed
    pub fn ensure_authorized(&self, allow_interactive: bool) -> Result<(), CalendarError> {
        let cached = match self.current()? {
            Some(token) => Some(token),
            None => self.load_cached(),
        };

        let token = match cached {
            Some(token) if token.is_fresh(Utc::now()) => {
                debug!("Using cached calendar token");
                token
            }
            Some(StoredToken {
                refresh_token: Some(refresh_token),
                ..
            }) => self.refresh(&refresh_token)?,
            _ if allow_interactive => self.authorize_interactive()?,
            _ => return Err(CredentialError::AuthorizationRequired.into()),
        };

        self.store(token)
    }

    /// A usable access token, refreshed if it is about to expire
    pub fn access_token(&self) -> Result<String, CalendarError> {
        match self.current()? {
            Some(token) if token.is_fresh(Utc::now()) => Ok(token.access_token),
            _ => {
                self.ensure_authorized(false)?;
                self.cached_access_token()
            }
        }
    }

    /// Refresh regardless of expiry, after the API rejected the current token
    pub fn force_refresh(&self) -> Result<String, CalendarError> {
        let refresh_token = self
            .current()?
            .and_then(|token| token.refresh_token)
            .ok_or(CredentialError::AuthorizationRequired)?;
        let token = self.refresh(&refresh_token)?;
        self.store(token)?;
        self.cached_access_token()
    }

    fn cached_access_token(&self) -> Result<String, CalendarError> {
        self.current()?
            .map(|token| token.access_token)
            .ok_or_else(|| CredentialError::AuthorizationRequired.into())
    }

    fn current(&self) -> Result<Option<StoredToken>, CredentialError> {
        self.token
            .lock()
            .map(|guard| guard.clone())
            .map_err(|_| CredentialError::TokenCache("token lock poisoned".to_string()))
    }

    fn load_cached(&self) -> Option<StoredToken> {
        let content = std::fs::read_to_string(&self.token_path).ok()?;
        match serde_json::from_str(&content) {
            Ok(token) => Some(token),
            Err(e) => {
                warn!(
                    "Ignoring unreadable token cache {}: {}",
                    self.token_path.display(),
                    e
                );
                None
            }
        }
    }

    fn store(&self, token: StoredToken) -> Result<(), CalendarError> {
        save_token(&self.token_path, &token)?;
        let mut guard = self
            .token
            .lock()
            .map_err(|_| CredentialError::TokenCache("token lock poisoned".to_string()))?;
        *guard = Some(token);
        Ok(())
    }

    fn refresh(&self, refresh_token: &str) -> Result<StoredToken, CalendarError> {
        info!("Refreshing calendar access token");

        let response = self
            .http
            .post(&self.secrets.token_uri)
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
                ("client_id", self.secrets.client_id.as_str()),
                ("client_secret", self.secrets.client_secret.as_str()),
            ])
            .send()?;

        let status = response.status();
        if status == StatusCode::BAD_REQUEST || status == StatusCode::UNAUTHORIZED {
            let body = response.text().unwrap_or_default();
            return Err(CredentialError::RefreshRejected {
                status: status.as_u16(),
                body,
            }
            .into());
        }
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(CalendarError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: TokenResponse = response.json()?;
        Ok(parsed.into_token(Utc::now(), Some(refresh_token.to_string())))
    }

    fn authorize_interactive(&self) -> Result<StoredToken, CalendarError> {
        let flow_error = |e: std::io::Error| CredentialError::Flow(e.to_string());

        let listener = TcpListener::bind(("127.0.0.1", 0)).map_err(flow_error)?;
        let port = listener.local_addr().map_err(flow_error)?.port();
        let redirect_uri = format!("http://127.0.0.1:{port}/");
        let state = random_state();
        let url = authorization_url(&self.secrets, &redirect_uri, &state)?;

        println!("Authorize calendar access by visiting:\n\n{url}\n");
        open_in_browser(url.as_str());
        info!("Waiting for authorization redirect on port {}", port);

        let code = wait_for_code(&listener, &state, REQUEST_READ_TIMEOUT)?;
        self.exchange_code(&code, &redirect_uri)
    }

    fn exchange_code(&self, code: &str, redirect_uri: &str) -> Result<StoredToken, CalendarError> {
        let response = self
            .http
            .post(&self.secrets.token_uri)
            .form(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", redirect_uri),
                ("client_id", self.secrets.client_id.as_str()),
                ("client_secret", self.secrets.client_secret.as_str()),
            ])
            .send()?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(CredentialError::Flow(format!(
                "code exchange failed ({}): {}",
                status.as_u16(),
                body
            ))
            .into());
        }

        let parsed: TokenResponse = response.json()?;
        info!("Calendar authorization complete");
        Ok(parsed.into_token(Utc::now(), None))
    }
}

fn wait_for_code(
    listener: &TcpListener,
    state: &str,
    read_timeout: std::time::Duration,
) -> Result<String, CredentialError> {
    for _ in 0..MAX_STRAY_REQUESTS {
        let (mut stream, _) = listener
            .accept()
            .map_err(|e| CredentialError::Flow(e.to_string()))?;
        stream
            .set_read_timeout(Some(read_timeout))
            .map_err(|e| CredentialError::Flow(e.to_string()))?;

        // Browsers open speculative connections that never send a request
        let mut request_line = String::new();
        match BufReader::new(&stream).read_line(&mut request_line) {
            Ok(_) => {}
            Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                debug!("Dropping silent connection on the redirect port");
                continue;
            }
            Err(e) => return Err(CredentialError::Flow(e.to_string())),
        }

        let outcome = parse_redirect(&request_line, state);
        let (status, body) = match &outcome {
            Ok(Some(_)) => ("200 OK", "Authorization complete. You can close this window."),
            Ok(None) => ("404 Not Found", "Not found."),
            Err(_) => ("400 Bad Request", "Authorization failed. Check the terminal."),
        };
        let response = format!(
            "HTTP/1.1 {status}\r\nContent-Type: text/plain; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );
        if let Err(e) = stream.write_all(response.as_bytes()) {
            debug!("Could not answer browser: {}", e);
        }

        if let Some(code) = outcome? {
            return Ok(code);
        }
    }

    Err(CredentialError::Flow(
        "no authorization redirect received".to_string(),
    ))
}

fn save_token(path: &Path, token: &StoredToken) -> Result<(), CredentialError> {
    let cache_error = |e: std::io::Error| CredentialError::TokenCache(e.to_string());

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(cache_error)?;
    }
    let content = serde_json::to_string_pretty(token)
        .map_err(|e| CredentialError::TokenCache(e.to_string()))?;
    std::fs::write(path, content).map_err(cache_error)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
            .map_err(cache_error)?;
    }

    debug!("Saved calendar token to {}", path.display());
    Ok(())
}

fn open_in_browser(url: &str) {
    #[cfg(target_os = "macos")]
    let opener = "open";
    #[cfg(not(target_os = "macos"))]
    let opener = "xdg-open";

    if let Err(e) = std::process::Command::new(opener).arg(url).spawn() {
        debug!("Could not launch browser with {}: {}", opener, e);
    }
}
