//! Harness configuration

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{E2eError, E2eResult};
use crate::probe::ServerSignature;

/// Fixed high port for the spawned backend. Dynamic binding may be blocked
/// in sandboxed environments, so the port is not negotiated.
pub const DEFAULT_PORT: u16 = 51888;

/// Top-level harness configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Already-running backend; skips build, spawn and teardown
    pub external_base_url: Option<String>,

    /// Port injected into the spawned backend
    pub port: u16,

    /// Whether the backend's API key was found; only used for a warning
    pub api_key_present: bool,

    /// Where archived scenario outputs are written
    pub artifacts_dir: PathBuf,

    /// How to build and run the backend
    pub service: ServiceConfig,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            external_base_url: None,
            port: DEFAULT_PORT,
            api_key_present: false,
            artifacts_dir: PathBuf::from("artifacts"),
            service: ServiceConfig::default(),
        }
    }
}

/// Build/spawn configuration for a locally managed backend
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Directory the build and start commands run in
    pub working_dir: PathBuf,

    /// Opaque build step, run once before spawning
    pub build_command: Vec<String>,

    /// Command that starts the compiled backend
    pub start_command: Vec<String>,

    /// Environment variable carrying the port
    pub port_env: String,

    /// Host used to form the base URL
    pub host: String,

    pub readiness_timeout_secs: u64,

    pub grace_period_secs: u64,

    /// Responses matching any of these are never treated as ready
    pub excluded_signatures: Vec<ServerSignature>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            working_dir: PathBuf::from("."),
            build_command: vec!["npm".into(), "run".into(), "build".into()],
            start_command: vec!["node".into(), "dist/server.js".into()],
            port_env: "PORT".to_string(),
            host: "localhost".to_string(),
            readiness_timeout_secs: 120,
            grace_period_secs: 5,
            excluded_signatures: vec![ServerSignature::airplay()],
        }
    }
}

impl ServiceConfig {
    pub fn readiness_timeout(&self) -> Duration {
        Duration::from_secs(self.readiness_timeout_secs)
    }

    pub fn grace_period(&self) -> Duration {
        Duration::from_secs(self.grace_period_secs)
    }
}

impl HarnessConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> E2eResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations that cannot produce a service
    pub fn validate(&self) -> E2eResult<()> {
        if self.external_base_url.is_some() {
            return Ok(());
        }
        if self.port == 0 {
            return Err(E2eError::Config("port must be non-zero".into()));
        }
        if self.service.start_command.is_empty() {
            return Err(E2eError::Config("service.start_command is empty".into()));
        }
        Ok(())
    }

    /// External base URL without a trailing slash, if configured
    pub fn external_base_url(&self) -> Option<&str> {
        self.external_base_url
            .as_deref()
            .map(|url| url.trim_end_matches('/'))
    }

    /// Base URL the spawned backend will listen on
    pub fn local_base_url(&self) -> String {
        format!("http://{}:{}", self.service.host, self.port)
    }
}
