//! Resource fetching for request payloads

use std::time::Duration;

use base64::{engine::general_purpose::STANDARD, Engine};
use tracing::debug;

use crate::error::{E2eError, E2eResult};

const FETCH_TIMEOUT: Duration = Duration::from_secs(10);
const FALLBACK_CONTENT_TYPE: &str = "image/jpeg";

/// Downloads small binary resources and encodes them as data URIs.
///
/// Single attempt, no retry: a transient failure surfaces immediately as
/// [`E2eError::Fetch`] and the caller decides what it means.
#[derive(Clone)]
pub struct ResourceFetcher {
    client: reqwest::Client,
}

impl ResourceFetcher {
    pub fn new() -> E2eResult<Self> {
        Self::with_timeout(FETCH_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> E2eResult<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    /// Fetch `url` and return `data:<content-type>;base64,<bytes>`
    pub async fn fetch_encoded_resource(&self, url: &str) -> E2eResult<String> {
        let fetch_err = |reason: String| E2eError::Fetch {
            url: url.to_string(),
            reason,
        };

        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| fetch_err(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(fetch_err(format!("HTTP {}", status)));
        }

        let mime = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .unwrap_or(FALLBACK_CONTENT_TYPE)
            .to_string();

        let bytes = resp.bytes().await.map_err(|e| fetch_err(e.to_string()))?;
        debug!("Fetched {} ({} bytes, {})", url, bytes.len(), mime);

        Ok(encode_data_uri(&mime, &bytes))
    }
}

pub fn encode_data_uri(mime: &str, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", mime, STANDARD.encode(bytes))
}
