//! Scenario runner - executes scenarios in order and aggregates verdicts

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use futures::FutureExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::artifact::{ArtifactEntry, ArtifactRecorder};
use crate::error::{E2eError, E2eResult};
use crate::fetch::ResourceFetcher;
use crate::report;
use crate::scenario::{append_images, resolve_placeholders, Method, Scenario};

/// The backend may do expensive model work per request
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Response bodies kept in diagnostics are cut to this many characters
pub const BODY_TRUNCATE_CHARS: usize = 2048;

/// Outcome of one scenario execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Verdict {
    pub name: String,
    pub passed: bool,
    pub duration_ms: u64,
    /// Present only when the scenario failed
    pub diagnostic: Option<DiagnosticRecord>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// A payload resource could not be fetched
    Fetch,
    /// Status or response field did not match expectations
    Assertion,
    /// Anything else, including panics inside the scenario
    Unexpected,
}

impl FailureKind {
    fn of(err: &E2eError) -> Self {
        match err {
            E2eError::Fetch { .. } => FailureKind::Fetch,
            E2eError::Assertion(_) => FailureKind::Assertion,
            _ => FailureKind::Unexpected,
        }
    }
}

/// Everything needed to understand a failure without re-running it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosticRecord {
    pub kind: FailureKind,
    pub method: String,
    pub url: String,
    pub payload: Value,
    /// `None` when no response was received
    pub status: Option<u16>,
    pub headers: Vec<(String, String)>,
    /// Truncated to [`BODY_TRUNCATE_CHARS`]
    pub body: Option<String>,
    pub error: String,
}

/// Aggregate of one run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub duration_ms: u64,
    pub verdicts: Vec<Verdict>,
}

impl RunSummary {
    fn push(&mut self, verdict: Verdict) {
        self.total += 1;
        if verdict.passed {
            self.passed += 1;
        } else {
            self.failed += 1;
        }
        self.verdicts.push(verdict);
    }

    pub fn is_success(&self) -> bool {
        self.failed == 0
    }

    pub fn verdict(&self, name: &str) -> Option<&Verdict> {
        self.verdicts.iter().find(|v| v.name == name)
    }

    /// Write the summary as pretty JSON
    pub fn write_json(&self, path: &Path) -> E2eResult<PathBuf> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        info!("Results written to: {}", path.display());
        Ok(path.to_path_buf())
    }
}

/// What was sent and received so far; turned into a diagnostic on failure
#[derive(Default)]
struct Exchange {
    url: String,
    payload: Value,
    status: Option<u16>,
    headers: Vec<(String, String)>,
    body: Option<String>,
}

impl Exchange {
    fn into_diagnostic(self, kind: FailureKind, method: Method, error: String) -> DiagnosticRecord {
        DiagnosticRecord {
            kind,
            method: method.as_str().to_string(),
            url: self.url,
            payload: self.payload,
            status: self.status,
            headers: self.headers,
            body: self.body.map(|b| truncate_chars(&b, BODY_TRUNCATE_CHARS)),
            error,
        }
    }
}

/// Executes scenarios strictly in order against one base URL
pub struct ScenarioRunner {
    client: reqwest::Client,
    fetcher: ResourceFetcher,
    recorder: ArtifactRecorder,
    /// Seed variables available to every run
    vars: HashMap<String, Value>,
}

impl ScenarioRunner {
    pub fn new(recorder: ArtifactRecorder) -> E2eResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            fetcher: ResourceFetcher::new()?,
            recorder,
            vars: HashMap::new(),
        })
    }

    pub fn with_var(mut self, name: &str, value: Value) -> Self {
        self.vars.insert(name.to_string(), value);
        self
    }

    /// Run every scenario in order. A failing scenario never stops the run.
    pub async fn run(&self, base_url: &str, scenarios: &[Scenario]) -> RunSummary {
        let start = Instant::now();
        let base_url = base_url.trim_end_matches('/');
        let mut vars = self.vars.clone();
        let mut summary = RunSummary::default();

        info!("Running {} scenario(s) against {}", scenarios.len(), base_url);

        for scenario in scenarios {
            let verdict = self.run_scenario(base_url, scenario, &mut vars).await;
            report::print_verdict(&verdict);
            summary.push(verdict);
        }

        summary.duration_ms = start.elapsed().as_millis() as u64;
        summary
    }

    /// Run one scenario, converting errors and panics into a failed verdict
    pub async fn run_scenario(
        &self,
        base_url: &str,
        scenario: &Scenario,
        vars: &mut HashMap<String, Value>,
    ) -> Verdict {
        let start = Instant::now();
        debug!("Running scenario: {}", scenario.name);

        let mut exchange = Exchange {
            url: format!("{}{}", base_url, scenario.endpoint),
            payload: scenario.payload.clone(),
            ..Default::default()
        };

        let outcome = AssertUnwindSafe(self.execute(scenario, vars, &mut exchange))
            .catch_unwind()
            .await;

        let failure = match outcome {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some((FailureKind::of(&e), e.to_string())),
            Err(panic) => Some((
                FailureKind::Unexpected,
                format!("scenario panicked: {}", panic_message(panic.as_ref())),
            )),
        };

        Verdict {
            name: scenario.name.clone(),
            passed: failure.is_none(),
            duration_ms: start.elapsed().as_millis() as u64,
            diagnostic: failure
                .map(|(kind, error)| exchange.into_diagnostic(kind, scenario.method, error)),
        }
    }

    async fn execute(
        &self,
        scenario: &Scenario,
        vars: &mut HashMap<String, Value>,
        exchange: &mut Exchange,
    ) -> E2eResult<()> {
        let mut payload = resolve_placeholders(&scenario.payload, vars)?;

        let mut images = Vec::with_capacity(scenario.fetch_images.len());
        for url in &scenario.fetch_images {
            images.push(self.fetcher.fetch_encoded_resource(url).await?);
        }
        append_images(&mut payload, images)?;
        exchange.payload = payload.clone();

        let request = match scenario.method {
            Method::Post => self.client.post(&exchange.url).json(&payload),
            Method::Get => self.client.get(&exchange.url),
        };
        let resp = request.send().await?;

        let status = resp.status().as_u16();
        exchange.status = Some(status);
        exchange.headers = resp
            .headers()
            .iter()
            .map(|(k, v)| (k.to_string(), String::from_utf8_lossy(v.as_bytes()).into_owned()))
            .collect();
        let body: &str = exchange.body.insert(resp.text().await?);

        if status != scenario.expected_status {
            return Err(E2eError::Assertion(format!(
                "expected HTTP {}, got {}",
                scenario.expected_status, status
            )));
        }

        if !scenario.expects_success() {
            return Ok(());
        }

        let data: Value = serde_json::from_str(body).map_err(|e| {
            E2eError::Assertion(format!("response body is not valid JSON: {}", e))
        })?;

        if let Some(field) = &scenario.expect_field {
            let value = data
                .get(field)
                .and_then(Value::as_str)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| E2eError::Assertion(format!("missing/empty {}", field)))?;

            debug!("{} input: {}", scenario.name, payload);
            debug!("{} output ({}): {}", scenario.name, field, truncate_chars(value, 200));

            if scenario.archive {
                self.recorder.record(&ArtifactEntry {
                    scenario: &scenario.name,
                    endpoint: &scenario.endpoint,
                    payload: &payload,
                    output: value,
                })?;
            }
        }

        if let Some(capture) = &scenario.capture {
            let value = data.get(&capture.field).cloned().ok_or_else(|| {
                E2eError::Assertion(format!("missing {} to capture", capture.field))
            })?;
            vars.insert(capture.var.clone(), value);
        }

        Ok(())
    }
}

/// Cut `s` to at most `max` characters, on a char boundary
pub fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_chars_respects_boundaries() {
        assert_eq!(truncate_chars("hello", 10), "hello");
        assert_eq!(truncate_chars("hello", 3), "hel");
        assert_eq!(truncate_chars("héllo wörld", 2), "hé");
        assert_eq!(truncate_chars("", 0), "");
    }

    #[test]
    fn test_summary_counts() {
        let mut summary = RunSummary::default();
        summary.push(Verdict {
            name: "a".into(),
            passed: true,
            duration_ms: 1,
            diagnostic: None,
        });
        assert!(summary.is_success());

        summary.push(Verdict {
            name: "b".into(),
            passed: false,
            duration_ms: 1,
            diagnostic: None,
        });
        assert_eq!((summary.total, summary.passed, summary.failed), (2, 1, 1));
        assert!(!summary.is_success());
        assert!(summary.verdict("b").is_some());
    }

    #[test]
    fn test_failure_kind_mapping() {
        let fetch = E2eError::Fetch {
            url: "u".into(),
            reason: "r".into(),
        };
        assert_eq!(FailureKind::of(&fetch), FailureKind::Fetch);
        assert_eq!(
            FailureKind::of(&E2eError::Assertion("x".into())),
            FailureKind::Assertion
        );
        assert_eq!(
            FailureKind::of(&E2eError::UnresolvedPlaceholder("v".into())),
            FailureKind::Unexpected
        );
    }

    #[test]
    fn test_write_json() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("results/run.json");
        let summary = RunSummary {
            total: 1,
            passed: 1,
            ..Default::default()
        };
        summary.write_json(&path).unwrap();
        let loaded: RunSummary =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(loaded.passed, 1);
    }
}
