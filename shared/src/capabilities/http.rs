//! HTTP on both sides of the core.
//!
//! The core talks crux_http's `Http<Event>` and reads answers as
//! [`HttpReply`]. The shell turns each `crux_http::protocol::HttpRequest`
//! into a [`TransportRequest`] for the host's [`HttpTransport`] and hands the
//! answer back as a `crux_http::protocol::HttpResult`.

use async_trait::async_trait;
use crux_http::protocol::{HttpRequest, HttpResponse, HttpResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use url::Url;

use crate::{CAPTCHA_TIMEOUT, CLAIM_TIMEOUT};

pub const MAX_URL_LENGTH: usize = 2048;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ValidatedUrl(String);

impl ValidatedUrl {
    pub fn new(url: impl Into<String>) -> Result<Self, HttpError> {
        let url = url.into();
        let parsed = Self::validate(&url)?;
        Ok(Self(parsed.to_string()))
    }

    /// Builds `base` with `params` appended as an encoded query string.
    pub fn with_query(base: &str, params: &[(&str, &str)]) -> Result<Self, HttpError> {
        Self::validate(base)?;
        let parsed = Url::parse_with_params(base, params).map_err(|e| HttpError::InvalidUrl {
            url: Self::truncate_url(base),
            reason: e.to_string(),
        })?;
        Ok(Self(parsed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn validate(url: &str) -> Result<Url, HttpError> {
        if url.trim().is_empty() {
            return Err(HttpError::InvalidUrl {
                url: url.to_string(),
                reason: "URL cannot be empty".to_string(),
            });
        }

        if url.len() > MAX_URL_LENGTH {
            return Err(HttpError::InvalidUrl {
                url: Self::truncate_url(url),
                reason: format!("URL exceeds maximum length of {MAX_URL_LENGTH} bytes"),
            });
        }

        let parsed = Url::parse(url).map_err(|e| HttpError::InvalidUrl {
            url: Self::truncate_url(url),
            reason: e.to_string(),
        })?;

        let scheme = parsed.scheme().to_lowercase();
        if scheme != "http" && scheme != "https" {
            return Err(HttpError::InvalidUrl {
                url: Self::truncate_url(url),
                reason: format!("invalid scheme '{scheme}', only 'http' and 'https' are allowed"),
            });
        }

        if parsed.host_str().is_none() {
            return Err(HttpError::InvalidUrl {
                url: Self::truncate_url(url),
                reason: "URL must have a host".to_string(),
            });
        }

        if !parsed.username().is_empty() || parsed.password().is_some() {
            return Err(HttpError::InvalidUrl {
                url: Self::truncate_url(url),
                reason: "credentials in URL are not allowed".to_string(),
            });
        }

        Ok(parsed)
    }

    fn truncate_url(url: &str) -> String {
        if url.chars().count() <= 100 {
            url.to_string()
        } else {
            format!("{}...", url.chars().take(100).collect::<String>())
        }
    }
}

#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
pub enum HttpError {
    #[error("invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("{message}")]
    Network { message: String },

    #[error("timeout after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },
}

// --- Core side ---

/// What the core keeps of an HTTP answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum HttpReply {
    /// The server answered, whatever the status.
    Answered { status: u16, body: String },
    /// Nothing usable came back.
    Failed { message: String },
}

impl HttpReply {
    pub fn ok(body: impl Into<String>) -> Self {
        Self::Answered {
            status: 200,
            body: body.into(),
        }
    }
}

impl From<crux_http::Result<crux_http::Response<Vec<u8>>>> for HttpReply {
    fn from(result: crux_http::Result<crux_http::Response<Vec<u8>>>) -> Self {
        match result {
            Ok(mut response) => {
                let status: u16 = response.status().into();
                let body = response
                    .take_body()
                    .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
                    .unwrap_or_default();
                HttpReply::Answered { status, body }
            }
            Err(e) => HttpReply::Failed {
                message: e.to_string(),
            },
        }
    }
}

// --- Shell side ---

/// What a request is for. Decides signing and the timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestKind {
    /// Signed claim against the rewards endpoint.
    Claim,
    /// Unauthenticated challenge fetch.
    Captcha,
}

impl RequestKind {
    pub fn timeout(self) -> Duration {
        match self {
            RequestKind::Claim => CLAIM_TIMEOUT,
            RequestKind::Captcha => CAPTCHA_TIMEOUT,
        }
    }

    pub fn is_signed(self) -> bool {
        matches!(self, RequestKind::Claim)
    }
}

/// A request as the host transport sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportRequest {
    kind: RequestKind,
    method: String,
    url: String,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
}

impl TransportRequest {
    pub fn from_protocol(request: &HttpRequest, kind: RequestKind) -> Self {
        Self {
            kind,
            method: request.method.clone(),
            url: request.url.clone(),
            headers: request
                .headers
                .iter()
                .map(|h| (h.name.clone(), h.value.clone()))
                .collect(),
            body: request.body.clone(),
        }
    }

    pub fn kind(&self) -> RequestKind {
        self.kind
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn json_body(&self) -> Option<serde_json::Value> {
        serde_json::from_slice(&self.body).ok()
    }

    /// Asks the transport to sign the request with the player's identity.
    pub fn is_signed(&self) -> bool {
        self.kind.is_signed()
    }

    pub fn timeout(&self) -> Duration {
        self.kind.timeout()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    status: u16,
    body: Vec<u8>,
}

impl TransportResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn ok(body: impl Into<Vec<u8>>) -> Self {
        Self::new(200, body)
    }

    pub fn status(&self) -> u16 {
        self.status
    }
}

pub type TransportResult = Result<TransportResponse, HttpError>;

/// Converts a transport answer into what crux_http expects back.
pub fn into_protocol(result: TransportResult) -> HttpResult {
    match result {
        Ok(response) => HttpResult::Ok(
            HttpResponse::status(response.status)
                .body(response.body)
                .build(),
        ),
        Err(e) => HttpResult::Err(crux_http::Error::Io(e.to_string())),
    }
}

/// The network. The host decides how signed requests are signed; any status
/// code with a body comes back as `Ok`.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn execute(&self, request: TransportRequest) -> TransportResult;
}
