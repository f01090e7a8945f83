#![forbid(unsafe_code)]

use std::collections::BTreeMap;
use std::env;
use std::fmt;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use serde_json::Value;

use crate::identity::BearerToken;

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8000/api";
const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 15_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    /// 401/403, or no usable token.
    Unauthorized,
    HttpStatus(u16),
    Timeout,
    Tls,
    Dns,
    Connection,
    Transport,
    JsonParse,
}

impl TransportErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unauthorized => "unauthorized",
            Self::HttpStatus(_) => "http_non_2xx",
            Self::Timeout => "timeout",
            Self::Tls => "tls",
            Self::Dns => "dns",
            Self::Connection => "connection",
            Self::Transport => "transport",
            Self::JsonParse => "json_parse",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportError {
    pub endpoint: String,
    pub kind: TransportErrorKind,
}

impl TransportError {
    pub fn new(endpoint: impl Into<String>, kind: TransportErrorKind) -> Self {
        Self {
            endpoint: endpoint.into(),
            kind,
        }
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            TransportErrorKind::HttpStatus(status) => write!(
                f,
                "endpoint={} error={} status={status}",
                self.endpoint,
                self.kind.as_str()
            ),
            kind => write!(f, "endpoint={} error={}", self.endpoint, kind.as_str()),
        }
    }
}

impl std::error::Error for TransportError {}

/// Read-only JSON access to the REST API.
pub trait ApiTransport: Send + Sync {
    fn get_json(
        &self,
        path: &str,
        query: &[(&str, &str)],
        token: &BearerToken,
    ) -> Result<Value, TransportError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpTransportConfig {
    pub base_url: String,
    pub connect_timeout_ms: u64,
    pub request_timeout_ms: u64,
    pub user_agent: String,
}

impl HttpTransportConfig {
    pub fn mvp_v1() -> Self {
        Self {
            base_url: DEFAULT_API_BASE_URL.to_string(),
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            user_agent: format!("engage/{}", env!("CARGO_PKG_VERSION")),
        }
    }

    pub fn from_env() -> Self {
        let mut config = Self::mvp_v1();
        if let Some(base_url) = env::var("ENGAGE_API_BASE_URL")
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
        {
            config.base_url = base_url;
        }
        config.connect_timeout_ms = env_ms("ENGAGE_HTTP_CONNECT_TIMEOUT_MS", 100..=120_000)
            .unwrap_or(config.connect_timeout_ms);
        config.request_timeout_ms = env_ms("ENGAGE_HTTP_TIMEOUT_MS", 100..=300_000)
            .unwrap_or(config.request_timeout_ms);
        config
    }

    pub fn url_for(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

fn env_ms(name: &str, range: std::ops::RangeInclusive<u64>) -> Option<u64> {
    env::var(name)
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .filter(|v| range.contains(v))
}

#[derive(Debug, Clone)]
pub struct UreqTransport {
    config: HttpTransportConfig,
    agent: ureq::Agent,
}

impl UreqTransport {
    pub fn new(config: HttpTransportConfig) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(Duration::from_millis(config.connect_timeout_ms))
            .timeout_read(Duration::from_millis(config.request_timeout_ms))
            .timeout_write(Duration::from_millis(config.request_timeout_ms))
            .user_agent(&config.user_agent)
            .build();
        Self { config, agent }
    }

    pub fn config(&self) -> &HttpTransportConfig {
        &self.config
    }
}

impl ApiTransport for UreqTransport {
    fn get_json(
        &self,
        path: &str,
        query: &[(&str, &str)],
        token: &BearerToken,
    ) -> Result<Value, TransportError> {
        let mut request = self
            .agent
            .get(&self.config.url_for(path))
            .set("Accept", "application/json")
            .set("Authorization", &token.authorization_header());
        for (name, value) in query {
            request = request.query(name, value);
        }
        let response = request.call().map_err(|e| transport_error_from_ureq(path, e))?;
        serde_json::from_reader(response.into_reader())
            .map_err(|_| TransportError::new(path, TransportErrorKind::JsonParse))
    }
}

fn transport_error_from_ureq(endpoint: &str, err: ureq::Error) -> TransportError {
    match err {
        ureq::Error::Status(401, _) | ureq::Error::Status(403, _) => {
            TransportError::new(endpoint, TransportErrorKind::Unauthorized)
        }
        ureq::Error::Status(status, _) => {
            TransportError::new(endpoint, TransportErrorKind::HttpStatus(status))
        }
        ureq::Error::Transport(transport) => {
            let combined = format!("{:?} {}", transport.kind(), transport);
            TransportError::new(endpoint, classify_transport_error_kind(&combined))
        }
    }
}

fn classify_transport_error_kind(raw: &str) -> TransportErrorKind {
    let lower = raw.to_ascii_lowercase();
    if lower.contains("timeout") || lower.contains("timed out") {
        TransportErrorKind::Timeout
    } else if lower.contains("tls") || lower.contains("ssl") {
        TransportErrorKind::Tls
    } else if lower.contains("dns") {
        TransportErrorKind::Dns
    } else if lower.contains("connection") || lower.contains("connect") {
        TransportErrorKind::Connection
    } else {
        TransportErrorKind::Transport
    }
}

/// Canned responses keyed by path, for offline runs and tests. Query
/// parameters are recorded but do not affect routing.
#[derive(Debug, Default)]
pub struct FixtureTransport {
    responses: BTreeMap<String, Result<Value, TransportErrorKind>>,
    calls: Mutex<Vec<String>>,
}

impl FixtureTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_json(mut self, path: &str, body: Value) -> Self {
        self.responses.insert(path.to_string(), Ok(body));
        self
    }

    pub fn with_error(mut self, path: &str, kind: TransportErrorKind) -> Self {
        self.responses.insert(path.to_string(), Err(kind));
        self
    }

    /// `path?name=value&...` for every call so far, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl ApiTransport for FixtureTransport {
    fn get_json(
        &self,
        path: &str,
        query: &[(&str, &str)],
        _token: &BearerToken,
    ) -> Result<Value, TransportError> {
        let rendered = if query.is_empty() {
            path.to_string()
        } else {
            let pairs: Vec<String> = query.iter().map(|(k, v)| format!("{k}={v}")).collect();
            format!("{path}?{}", pairs.join("&"))
        };
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(rendered);
        match self.responses.get(path) {
            Some(Ok(body)) => Ok(body.clone()),
            Some(Err(kind)) => Err(TransportError::new(path, *kind)),
            None => Err(TransportError::new(path, TransportErrorKind::HttpStatus(404))),
        }
    }
}
