//! Error types for E2E orchestration

use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum E2eError {
    #[error("Build failed: `{command}` exited with {status}\n{output}")]
    BuildFailed {
        command: String,
        status: String,
        output: String,
    },

    #[error("Server failed to start: {0}")]
    SpawnFailed(String),

    #[error("Server {url} did not become ready within {elapsed:?}")]
    ReadinessTimeout { url: String, elapsed: Duration },

    #[error("Failed to fetch {url}: {reason}")]
    Fetch { url: String, reason: String },

    #[error("Assertion failed: {0}")]
    Assertion(String),

    #[error("Unresolved payload placeholder: {{{{{0}}}}}")]
    UnresolvedPlaceholder(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Unexpected error: {0}")]
    Unexpected(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl E2eError {
    /// Whether this error prevents any scenario from running meaningfully.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            E2eError::BuildFailed { .. }
                | E2eError::SpawnFailed(_)
                | E2eError::ReadinessTimeout { .. }
                | E2eError::Config(_)
        )
    }
}

pub type E2eResult<T> = Result<T, E2eError>;
