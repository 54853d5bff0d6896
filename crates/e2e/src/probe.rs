//! Readiness probing for the backend under test

use std::time::{Duration, Instant};

use reqwest::header::HeaderMap;
use serde::{Deserialize, Serialize};
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::error::{E2eError, E2eResult};

const ATTEMPT_TIMEOUT: Duration = Duration::from_secs(2);
const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Response signature of a service that is not the backend.
///
/// A response matches when header `header` is present and its value
/// contains `contains`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerSignature {
    pub header: String,
    pub contains: String,
}

impl ServerSignature {
    /// macOS AirPlay receiver, which answers 403 on common high ports
    pub fn airplay() -> Self {
        Self {
            header: "Server".to_string(),
            contains: "AirTunes".to_string(),
        }
    }

    pub fn matches(&self, headers: &HeaderMap) -> bool {
        headers
            .get_all(self.header.as_str())
            .iter()
            .filter_map(|v| v.to_str().ok())
            .any(|v| v.contains(&self.contains))
    }
}

/// Polls a URL until something other than an excluded service answers
pub struct Prober {
    client: reqwest::Client,
    excluded: Vec<ServerSignature>,
    interval: Duration,
}

impl Prober {
    pub fn new(excluded: Vec<ServerSignature>) -> E2eResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(ATTEMPT_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            excluded,
            interval: POLL_INTERVAL,
        })
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Block until `url` answers as the backend or `timeout` elapses.
    ///
    /// Any response counts, whatever its status, unless it carries an
    /// excluded signature.
    pub async fn wait_until_ready(&self, url: &str, timeout: Duration) -> E2eResult<()> {
        let start = Instant::now();
        let mut attempts = 0usize;

        while start.elapsed() < timeout {
            attempts += 1;

            match self.client.get(url).send().await {
                Ok(resp) => match self.excluded.iter().find(|s| s.matches(resp.headers())) {
                    None => {
                        debug!("{} answered {} after {} attempt(s)", url, resp.status(), attempts);
                        return Ok(());
                    }
                    Some(sig) => {
                        if attempts == 1 {
                            warn!(
                                "Port occupied by an unrelated service ({}: {}); waiting for the backend",
                                sig.header, sig.contains
                            );
                        }
                    }
                },
                Err(e) => {
                    if attempts == 1 {
                        info!("Waiting for server to start...");
                    }
                    // Connection refused is expected while the server is starting
                    if !e.is_connect() && !e.is_timeout() {
                        warn!("Readiness probe error: {}", e);
                    }
                }
            }

            sleep(self.interval).await;
        }

        Err(E2eError::ReadinessTimeout {
            url: url.to_string(),
            elapsed: start.elapsed(),
        })
    }
}
