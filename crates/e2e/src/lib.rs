//! VAAS E2E Test Orchestrator
//!
//! This crate drives the mood embedding backend end to end:
//! - Builds and spawns the backend as a subprocess (or binds to a running one)
//! - Probes readiness, rejecting unrelated services that hold the port
//! - Executes an ordered list of HTTP/JSON scenarios
//! - Archives generated markup with a metadata sidecar
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    E2E Orchestrator (Rust)                  │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ServiceHandle::acquire(config) -> ServiceHandle            │
//! │    ├── build step (opaque, fail fast)                       │
//! │    ├── spawn child with PORT injected                       │
//! │    └── Prober::wait_until_ready(url, timeout)               │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ScenarioRunner::run(base_url, scenarios) -> RunSummary     │
//! │    ├── resolve payload ({{var}}, fetch_images)              │
//! │    ├── POST/GET endpoint, check status + field              │
//! │    ├── ArtifactRecorder::record(...) for archived output    │
//! │    └── Verdict { passed, diagnostic? }                      │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ServiceHandle::stop()  (also on Drop)                      │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod artifact;
pub mod config;
pub mod error;
pub mod fetch;
pub mod probe;
pub mod report;
pub mod runner;
pub mod scenario;
pub mod server;
pub mod suite;

pub use artifact::ArtifactRecorder;
pub use config::HarnessConfig;
pub use error::{E2eError, E2eResult};
pub use runner::{RunSummary, ScenarioRunner, Verdict};
pub use scenario::Scenario;
pub use server::ServiceHandle;

use tracing::warn;

/// Acquire the service, run `scenarios` against it and tear it down.
///
/// Only run-level failures (build, spawn, readiness, config) surface as
/// `Err`; scenario failures are counted in the returned summary.
pub async fn run_suite(
    config: &HarnessConfig,
    scenarios: &[Scenario],
) -> E2eResult<RunSummary> {
    let recorder = ArtifactRecorder::new(&config.artifacts_dir);
    let sample_html = recorder.load_or_seed_fixture(suite::SAMPLE_HTML_FIXTURE, suite::SAMPLE_HTML)?;

    let service = ServiceHandle::acquire(config).await?;

    if !config.api_key_present {
        warn!("OPENAI_API_KEY not found in environment - scenarios may fail due to authentication");
    }

    let runner = ScenarioRunner::new(recorder)?
        .with_var(suite::SAMPLE_HTML_VAR, serde_json::Value::String(sample_html));
    Ok(run_on_service(service, &runner, scenarios).await)
}

/// Run `scenarios` against an acquired service, then stop it.
///
/// A teardown failure is logged; the summary of a finished run is kept.
pub async fn run_on_service(
    mut service: ServiceHandle,
    runner: &ScenarioRunner,
    scenarios: &[Scenario],
) -> RunSummary {
    let summary = runner.run(service.base_url(), scenarios).await;

    if let Err(e) = service.stop() {
        warn!("Server teardown failed after {} scenario(s): {}", summary.total, e);
    }
    summary
}
