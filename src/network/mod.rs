use std::{fmt, time::Duration};

use anyhow::{Context, Result};
use reqwest::{
    StatusCode,
    header::{ACCEPT, CONTENT_TYPE, HeaderMap},
};
use tracing::{debug, warn};

use crate::config::ApiConfig;

mod lookup;

pub use lookup::{CategorizationResult, FALLBACK_CATEGORY, LookupRequest, LookupResponse};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Client for the external URL categorization API.
#[derive(Clone)]
pub struct Categorizer {
    client: reqwest::Client,
    endpoint: reqwest::Url,
    token: String,
}

/// Raw outcome of one lookup call, before any decoding.
#[derive(Debug)]
pub struct RawLookup {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: String,
}

impl Categorizer {
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .connect_timeout(CONNECT_TIMEOUT.min(config.timeout))
            .build()
            .context("failed to build http client")?;

        Ok(Self {
            client,
            endpoint: config.url.clone(),
            token: config.token.clone(),
        })
    }

    pub fn endpoint(&self) -> &reqwest::Url {
        &self.endpoint
    }

    /// Categorize a validated hostname. Never fails: transport and decode
    /// problems come back as `QueryFailed`.
    pub async fn classify(&self, hostname: &str) -> CategorizationResult {
        let request = LookupRequest::for_hostname(hostname);
        let raw = match self.send(&request).await {
            Ok(raw) => raw,
            Err(err) => {
                warn!(hostname, error = %err, "categorization request failed");
                return CategorizationResult::QueryFailed(err.to_string());
            }
        };

        if !raw.status.is_success() {
            // Still decode: the API sometimes pairs odd statuses with a usable body.
            warn!(
                hostname,
                upstream_status = raw.status.as_u16(),
                "categorization api returned non-success status"
            );
        }

        match serde_json::from_str::<LookupResponse>(&raw.body) {
            Ok(response) => {
                let result = CategorizationResult::from_response(&response);
                debug!(hostname, ?result, "categorization response decoded");
                result
            }
            Err(err) => {
                let err = LookupError::Decode(err);
                warn!(hostname, error = %err, "failed to parse categorization response");
                CategorizationResult::QueryFailed(err.to_string())
            }
        }
    }

    /// Send one lookup and return status and body untouched.
    pub async fn send(&self, request: &LookupRequest) -> Result<RawLookup, LookupError> {
        let payload = serde_json::to_vec(request).map_err(LookupError::Encode)?;
        let response = self
            .client
            .post(self.endpoint.clone())
            .header(ACCEPT, "application/json")
            .header(CONTENT_TYPE, "application/json")
            .bearer_auth(&self.token)
            .body(payload)
            .send()
            .await
            .map_err(LookupError::from_transport)?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response.text().await.map_err(LookupError::from_transport)?;
        Ok(RawLookup {
            status,
            headers,
            body,
        })
    }
}

#[derive(Debug)]
pub enum LookupError {
    Encode(serde_json::Error),
    Timeout(reqwest::Error),
    Transport(reqwest::Error),
    Decode(serde_json::Error),
}

impl LookupError {
    fn from_transport(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(err)
        } else {
            Self::Transport(err)
        }
    }
}

impl fmt::Display for LookupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Encode(err) => write!(f, "failed to encode lookup request: {err}"),
            Self::Timeout(err) => write!(f, "lookup timed out: {err}"),
            Self::Transport(err) => write!(f, "lookup transport error: {err}"),
            Self::Decode(err) => write!(f, "malformed lookup response: {err}"),
        }
    }
}

impl std::error::Error for LookupError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Encode(err) | Self::Decode(err) => Some(err),
            Self::Timeout(err) | Self::Transport(err) => Some(err),
        }
    }
}
