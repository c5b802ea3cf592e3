use crate::config::IdentityConfig;
use crate::error::{AppError, AppResult};
use crate::identity::{IdentityLookupError, IdentityProvider};
use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, error};

/// An id the provider may send as a JSON string or number
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawId {
    Text(String),
    Number(u64),
}

impl RawId {
    fn into_string(self) -> String {
        match self {
            Self::Text(s) => s,
            Self::Number(n) => n.to_string(),
        }
    }
}

/// Response from `GET <base>/xuid/{gamertag}`
#[derive(Debug, Deserialize)]
struct XuidResponse {
    #[serde(default)]
    xuid: Option<RawId>,
}

/// Response from `GET <base>/gamertag/{xuid}`
#[derive(Debug, Deserialize)]
struct GamertagResponse {
    #[serde(default)]
    gamertag: Option<String>,
}

/// HTTP client for the Xbox identity provider
pub struct IdentityClient {
    http: Client,
    base_url: Url,
}

impl std::fmt::Debug for IdentityClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityClient")
            .field("base_url", &self.base_url.as_str())
            .finish_non_exhaustive()
    }
}

impl IdentityClient {
    /// Create a new identity client from config
    pub fn new(config: &IdentityConfig) -> AppResult<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        let base_url = Url::parse(config.base_url.trim_end_matches('/'))
            .map_err(|e| AppError::internal(format!("Invalid identity base url: {}", e)))?;
        if base_url.cannot_be_a_base() {
            return Err(AppError::internal("Identity base url cannot carry a path"));
        }

        Ok(Self { http, base_url })
    }

    /// Build `<base>/<kind>/<value>` with `value` percent-encoded as one segment.
    fn endpoint(&self, kind: &str, value: &str) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push(kind).push(value);
        }
        url
    }

    async fn fetch<T: DeserializeOwned>(&self, url: Url) -> Result<T, IdentityLookupError> {
        debug!("Identity lookup: {}", url);

        let response = self.http.get(url.clone()).send().await.map_err(|e| {
            error!("Identity request to {} failed: {}", url, e);
            classify(e)
        })?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(IdentityLookupError::NotFound);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("Identity provider returned {}: {}", status, body);
            return Err(IdentityLookupError::Transport(format!("provider returned {}", status)));
        }

        response.json::<T>().await.map_err(|e| {
            error!("Failed to parse identity response: {}", e);
            classify(e)
        })
    }
}

fn classify(e: reqwest::Error) -> IdentityLookupError {
    if e.is_timeout() {
        IdentityLookupError::Timeout
    } else {
        IdentityLookupError::Transport(e.to_string())
    }
}

#[async_trait]
impl IdentityProvider for IdentityClient {
    async fn resolve_id(&self, claimed_name: &str) -> Result<String, IdentityLookupError> {
        let response: XuidResponse = self.fetch(self.endpoint("xuid", claimed_name)).await?;
        response
            .xuid
            .map(RawId::into_string)
            .filter(|id| !id.is_empty())
            .ok_or(IdentityLookupError::NotFound)
    }

    async fn resolve_canonical_name(&self, opaque_id: &str) -> Result<String, IdentityLookupError> {
        let response: GamertagResponse = self.fetch(self.endpoint("gamertag", opaque_id)).await?;
        response
            .gamertag
            .filter(|name| !name.is_empty())
            .ok_or(IdentityLookupError::NotFound)
    }
}
