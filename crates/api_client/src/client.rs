//! Management API HTTP client.
//!
//! Blocking reqwest client (no Tokio runtime required). Every request is a
//! signed GET against the single API endpoint.

use std::fmt;
use std::thread;
use std::time::Duration;

use log::{debug, warn};
use url::Url;

use volmon_config::{ApiCredentials, RunSettings, Secret};
use volmon_recon::{ExistenceOracle, OracleError};

use crate::signing;

pub const USER_AGENT: &str = concat!("volmon/", env!("CARGO_PKG_VERSION"));

/// Error code the platform uses for invalid parameter values, including ids
/// that match no entity.
const PARAM_ERROR: u16 = 431;

/// Error type for API operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// Base URL could not be parsed
    InvalidUrl(String),
    /// HTTP client could not be constructed
    Client(String),
    /// Transport failure or timeout
    Network(String),
    /// Credentials or signature rejected (401, 403, 432)
    NotAuthorized(String),
    /// Any other non-success status, with the platform's errortext
    Http { status: u16, message: String },
    /// Body is not the expected JSON
    Parse(String),
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::InvalidUrl(msg) => write!(f, "Invalid API URL: {}", msg),
            ApiError::Client(msg) => write!(f, "HTTP client error: {}", msg),
            ApiError::Network(msg) => write!(f, "Network error: {}", msg),
            ApiError::NotAuthorized(msg) => write!(f, "Not authorized: {}", msg),
            ApiError::Http { status, message } => write!(f, "HTTP {}: {}", status, message),
            ApiError::Parse(msg) => write!(f, "Parse error: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

impl From<ApiError> for OracleError {
    fn from(e: ApiError) -> Self {
        match e {
            ApiError::Network(msg) => OracleError::Network(msg),
            ApiError::NotAuthorized(msg) => OracleError::NotAuthorized(msg),
            ApiError::Http { status, message } => OracleError::Http { status, message },
            ApiError::Parse(msg) => OracleError::Parse(msg),
            ApiError::InvalidUrl(msg) | ApiError::Client(msg) => OracleError::Network(msg),
        }
    }
}

/// Transport knobs.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub timeout: Duration,
    /// Extra attempts for 429/5xx/network failures. Zero means each request
    /// is sent exactly once.
    pub retries: u32,
    /// First retry delay; doubles per attempt.
    pub backoff: Duration,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            retries: 0,
            backoff: Duration::from_secs(1),
        }
    }
}

impl ClientOptions {
    pub fn from_settings(settings: &RunSettings) -> Self {
        Self {
            timeout: Duration::from_secs(settings.timeout_secs),
            retries: settings.retries,
            ..Self::default()
        }
    }
}

/// Management API client (blocking).
#[derive(Debug, Clone)]
pub struct CloudStackClient {
    http: reqwest::blocking::Client,
    endpoint: Url,
    api_key: String,
    secret_key: Secret,
    options: ClientOptions,
}

impl CloudStackClient {
    pub fn new(creds: &ApiCredentials, options: ClientOptions) -> Result<Self, ApiError> {
        let endpoint = Url::parse(&creds.url)
            .map_err(|e| ApiError::InvalidUrl(format!("{}: {}", creds.url, e)))?;
        if endpoint.cannot_be_a_base() || !matches!(endpoint.scheme(), "http" | "https") {
            return Err(ApiError::InvalidUrl(format!("{}: expected an http(s) URL", creds.url)));
        }

        let http = reqwest::blocking::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(options.timeout)
            .build()
            .map_err(|e| ApiError::Client(e.to_string()))?;

        Ok(Self {
            http,
            endpoint,
            api_key: creds.api_key.clone(),
            secret_key: creds.secret_key.clone(),
            options,
        })
    }

    pub fn endpoint(&self) -> &str {
        self.endpoint.as_str()
    }

    /// Signed request URL for `command`. Any query already present on the
    /// endpoint is replaced.
    pub fn signed_url(&self, command: &str, params: &[(&str, &str)]) -> String {
        let mut base = self.endpoint.clone();
        base.set_query(None);
        base.set_fragment(None);
        format!(
            "{}?{}",
            base,
            signing::signed_query(command, params, &self.api_key, self.secret_key.expose())
        )
    }

    /// Issue `command` and return the decoded JSON body.
    ///
    /// 401/403/432 and other 4xx fail immediately; 429, 5xx and transport
    /// errors are retried up to `options.retries` times with doubling
    /// backoff.
    pub fn request(&self, command: &str, params: &[(&str, &str)]) -> Result<serde_json::Value, ApiError> {
        let url = self.signed_url(command, params);
        let retries = self.options.retries;
        let mut backoff = self.options.backoff;

        for attempt in 0..=retries {
            let last = attempt == retries;

            let resp = match self.http.get(&url).send() {
                Ok(resp) => resp,
                Err(e) => {
                    let msg = if e.is_timeout() {
                        format!("{} timed out: {}", command, e)
                    } else {
                        format!("{}: {}", command, e)
                    };
                    if last {
                        return Err(ApiError::Network(msg));
                    }
                    warn!("retry {}/{} in {:?} ({})", attempt + 1, retries, backoff, msg);
                    thread::sleep(backoff);
                    backoff *= 2;
                    continue;
                }
            };

            let status = resp.status().as_u16();

            // Retryable: 429, 5xx
            if status == 429 || status >= 500 {
                if last {
                    let body = resp.text().unwrap_or_default();
                    return Err(ApiError::Http { status, message: error_text(&body, status) });
                }
                let wait = if status == 429 {
                    resp.headers()
                        .get("retry-after")
                        .and_then(|v| v.to_str().ok())
                        .and_then(|v| v.parse::<u64>().ok())
                        .map(Duration::from_secs)
                        .unwrap_or(backoff)
                } else {
                    backoff
                };
                warn!("retry {}/{} in {:?} (HTTP {})", attempt + 1, retries, wait, status);
                thread::sleep(wait);
                backoff *= 2;
                continue;
            }

            let body = resp
                .text()
                .map_err(|e| ApiError::Network(format!("reading {} response: {}", command, e)))?;

            if status == 401 || status == 403 || status == 432 {
                return Err(ApiError::NotAuthorized(error_text(&body, status)));
            }
            if status >= 400 {
                return Err(ApiError::Http { status, message: error_text(&body, status) });
            }

            let trimmed = body.trim_start_matches('\u{feff}');
            return serde_json::from_str(trimmed).map_err(|e| {
                ApiError::Parse(format!(
                    "{} response: {} (body: {})",
                    command,
                    e,
                    &trimmed[..floor_char_boundary(trimmed, 200)],
                ))
            });
        }

        unreachable!("the final attempt always returns")
    }

    /// Volumes matching `params`. An empty or missing `volume` array is an
    /// empty list.
    pub fn list_volumes(&self, params: &[(&str, &str)]) -> Result<Vec<serde_json::Value>, ApiError> {
        let body = self.request("listVolumes", params)?;
        let response = body
            .get("listvolumesresponse")
            .ok_or_else(|| ApiError::Parse("missing listvolumesresponse".to_string()))?;

        match response.get("volume") {
            None | Some(serde_json::Value::Null) => Ok(Vec::new()),
            Some(serde_json::Value::Array(items)) => Ok(items.clone()),
            Some(other) => Err(ApiError::Parse(format!("volume is not an array: {}", other))),
        }
    }

    /// Whether the platform reports a volume with this uuid, across all
    /// accounts visible to the key.
    pub fn volume_exists(&self, uuid: &str) -> Result<bool, ApiError> {
        match self.list_volumes(&[("listall", "true"), ("id", uuid)]) {
            Ok(volumes) => {
                debug!("listVolumes id={} -> {} result(s)", uuid, volumes.len());
                Ok(!volumes.is_empty())
            }
            // The platform rejects ids it cannot resolve instead of returning
            // an empty list.
            Err(ApiError::Http { status: PARAM_ERROR, message })
                if is_unknown_entity(&message, uuid) =>
            {
                debug!("listVolumes id={} -> unknown entity", uuid);
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }
}

impl ExistenceOracle for CloudStackClient {
    fn exists(&self, external_id: &str) -> Result<bool, OracleError> {
        self.volume_exists(external_id).map_err(OracleError::from)
    }
}

// ── Helpers ─────────────────────────────────────────────────────────

/// The platform wraps errors as `{"<command>response": {"errortext": ...}}`.
fn error_text(body: &str, status: u16) -> String {
    let parsed: serde_json::Value = match serde_json::from_str(body) {
        Ok(v) => v,
        Err(_) => {
            let text = body.trim();
            return if text.is_empty() {
                format!("HTTP {}", status)
            } else {
                text[..floor_char_boundary(text, 200)].to_string()
            };
        }
    };

    parsed
        .as_object()
        .and_then(|obj| {
            obj.values()
                .find_map(|v| v.get("errortext").and_then(|t| t.as_str()))
                .or_else(|| obj.get("errortext").and_then(|t| t.as_str()))
        })
        .map(str::to_string)
        .unwrap_or_else(|| format!("HTTP {}", status))
}

/// True when a 431 rejects the looked-up id itself. "Unable to find" only
/// counts when it names the id; other lookups (domain, account) can fail
/// with the same wording.
fn is_unknown_entity(message: &str, uuid: &str) -> bool {
    let lower = message.to_lowercase();
    lower.contains("entity does not exist")
        || (lower.contains("unable to find") && lower.contains(&uuid.to_lowercase()))
}

fn floor_char_boundary(s: &str, max: usize) -> usize {
    if s.len() <= max {
        return s.len();
    }
    let mut idx = max;
    while !s.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

#[cfg(test)]
mod tests {
    use super::*;

    fn creds(url: &str) -> ApiCredentials {
        ApiCredentials {
            url: url.to_string(),
            api_key: "key".to_string(),
            secret_key: Secret::new("secret"),
        }
    }

    #[test]
    fn rejects_non_http_url() {
        let err = CloudStackClient::new(&creds("ftp://cloud/api"), ClientOptions::default()).unwrap_err();
        assert!(matches!(err, ApiError::InvalidUrl(_)));
        let err = CloudStackClient::new(&creds("not a url"), ClientOptions::default()).unwrap_err();
        assert!(matches!(err, ApiError::InvalidUrl(_)));
    }

    #[test]
    fn signed_url_replaces_existing_query() {
        let client =
            CloudStackClient::new(&creds("http://cloud.lab:8080/client/api?x=1"), ClientOptions::default())
                .unwrap();
        let url = client.signed_url("listVolumes", &[("name", "my vol")]);
        assert_eq!(
            url,
            "http://cloud.lab:8080/client/api?apiKey=key&command=listVolumes&name=my%20vol\
             &response=json&signature=Ex8nCisCXDD2i1ZNFdKewcpr%2F7A%3D"
        );
    }

    #[test]
    fn error_text_from_wrapped_response() {
        let body = r#"{"listvolumesresponse":{"uuidList":[],"errorcode":431,"errortext":"bad id"}}"#;
        assert_eq!(error_text(body, 431), "bad id");
        assert_eq!(error_text("", 502), "HTTP 502");
        assert_eq!(error_text("<html>gateway</html>", 502), "<html>gateway</html>");
    }

    #[test]
    fn api_errors_map_to_oracle_errors() {
        assert_eq!(
            OracleError::from(ApiError::NotAuthorized("x".into())),
            OracleError::NotAuthorized("x".into())
        );
        assert_eq!(
            OracleError::from(ApiError::Http { status: 530, message: "m".into() }),
            OracleError::Http { status: 530, message: "m".into() }
        );
    }

    #[test]
    fn unknown_entity_needs_the_id_for_unable_to_find() {
        let id = "3B0A4C2E-1F0E";
        assert!(is_unknown_entity("Invalid parameter id value, or entity does not exist", id));
        assert!(is_unknown_entity("Unable to find volume by id 3b0a4c2e-1f0e", id));
        assert!(!is_unknown_entity("Unable to find domain by id 7", id));
        assert!(!is_unknown_entity("Unknown parameter listall", id));
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        let s = "é".repeat(150);
        let cut = floor_char_boundary(&s, 201);
        assert!(s.is_char_boundary(cut));
        assert_eq!(cut, 200);
    }

    #[test]
    fn options_from_settings() {
        let settings = RunSettings { timeout_secs: 5, retries: 2, ..RunSettings::default() };
        let opts = ClientOptions::from_settings(&settings);
        assert_eq!(opts.timeout, Duration::from_secs(5));
        assert_eq!(opts.retries, 2);
    }
}
