//! Artifact recording for archived scenario outputs
//!
//! Each archived scenario produces up to three write-once files sharing a
//! `{slug}_{timestamp}` stem:
//! - `_input.html` or `_input.url`, depending on what the payload carried
//! - `_output.html`, the validated response field
//! - `.json`, a metadata sidecar with the payload minus inline markup
//!
//! Timestamps have millisecond precision, and files are opened with
//! `create_new`, so an existing artifact is never overwritten.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tracing::info;

use crate::error::E2eResult;

const TIMESTAMP_FORMAT: &str = "%Y%m%dT%H%M%S%3fZ";

/// What the payload contributed as the scenario's input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactInput {
    /// Inline markup, archived verbatim
    Html(String),
    /// A source locator, archived as text
    Url(String),
    None,
}

impl ArtifactInput {
    /// Inline `html` takes precedence over a `url` reference
    pub fn from_payload(payload: &Value) -> Self {
        if let Some(html) = payload.get("html").and_then(Value::as_str) {
            return ArtifactInput::Html(html.to_string());
        }
        if let Some(url) = payload.get("url").and_then(Value::as_str) {
            return ArtifactInput::Url(url.to_string());
        }
        ArtifactInput::None
    }

    fn extension(&self) -> Option<&'static str> {
        match self {
            ArtifactInput::Html(_) => Some("html"),
            ArtifactInput::Url(_) => Some("url"),
            ArtifactInput::None => None,
        }
    }

    fn content(&self) -> &str {
        match self {
            ArtifactInput::Html(s) | ArtifactInput::Url(s) => s,
            ArtifactInput::None => "",
        }
    }
}

/// One archived scenario execution
#[derive(Debug, Clone)]
pub struct ArtifactEntry<'a> {
    pub scenario: &'a str,
    pub endpoint: &'a str,
    pub payload: &'a Value,
    pub output: &'a str,
}

#[derive(Debug, Serialize)]
struct ArtifactMetadata<'a> {
    name: &'a str,
    endpoint: &'a str,
    payload: Value,
    timestamp: &'a str,
}

/// Paths written for one artifact
#[derive(Debug, Clone)]
pub struct ArtifactPaths {
    pub input: Option<PathBuf>,
    pub output: PathBuf,
    pub metadata: PathBuf,
}

pub struct ArtifactRecorder {
    dir: PathBuf,
}

impl ArtifactRecorder {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Record `entry` stamped with the current UTC time
    pub fn record(&self, entry: &ArtifactEntry<'_>) -> E2eResult<ArtifactPaths> {
        self.record_at(entry, Utc::now())
    }

    pub fn record_at(
        &self,
        entry: &ArtifactEntry<'_>,
        at: DateTime<Utc>,
    ) -> E2eResult<ArtifactPaths> {
        std::fs::create_dir_all(&self.dir)?;

        let timestamp = at.format(TIMESTAMP_FORMAT).to_string();
        let stem = format!("{}_{}", slugify(entry.scenario), timestamp);

        let input = ArtifactInput::from_payload(entry.payload);
        let input_path = match input.extension() {
            Some(ext) => {
                let path = self.dir.join(format!("{}_input.{}", stem, ext));
                write_new(&path, input.content())?;
                Some(path)
            }
            None => None,
        };

        let output_path = self.dir.join(format!("{}_output.html", stem));
        write_new(&output_path, entry.output)?;

        let metadata = ArtifactMetadata {
            name: entry.scenario,
            endpoint: entry.endpoint,
            payload: redact_payload(entry.payload),
            timestamp: &timestamp,
        };
        let metadata_path = self.dir.join(format!("{}.json", stem));
        write_new(&metadata_path, &serde_json::to_string_pretty(&metadata)?)?;

        info!("Artifacts written: {}", output_path.display());

        Ok(ArtifactPaths {
            input: input_path,
            output: output_path,
            metadata: metadata_path,
        })
    }

    /// Read fixture `name` from the artifact directory, seeding it with
    /// `default` when absent.
    pub fn load_or_seed_fixture(&self, name: &str, default: &str) -> E2eResult<String> {
        let path = self.dir.join(name);
        if path.exists() {
            return Ok(std::fs::read_to_string(&path)?);
        }
        std::fs::create_dir_all(&self.dir)?;
        std::fs::write(&path, default)?;
        Ok(default.to_string())
    }
}

/// Lowercase `name` and collapse runs of unsafe characters into `_`
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut in_run = false;
    for c in name.to_lowercase().chars() {
        if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
            slug.push(c);
            in_run = false;
        } else if !in_run {
            slug.push('_');
            in_run = true;
        }
    }
    slug
}

/// Payload copy for the sidecar; inline markup is already in `_input.html`
fn redact_payload(payload: &Value) -> Value {
    match payload {
        Value::Object(map) => Value::Object(
            map.iter()
                .filter(|(k, _)| k.as_str() != "html")
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        ),
        other => other.clone(),
    }
}

fn write_new(path: &Path, content: &str) -> std::io::Result<()> {
    let mut file = OpenOptions::new().write(true).create_new(true).open(path)?;
    file.write_all(content.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;
    use test_case::test_case;

    #[test_case("Transform HTML", "transform_html")]
    #[test_case("Mixed (text+url+image)", "mixed_text_url_image_")]
    #[test_case("Negative (empty body)", "negative_empty_body_")]
    #[test_case("already-safe_name", "already-safe_name")]
    #[test_case("Café au lait", "caf_au_lait")]
    #[test_case("a_ (b)", "a__b_")]
    fn test_slugify(name: &str, expected: &str) {
        assert_eq!(slugify(name), expected);
    }

    #[test]
    fn test_input_precedence() {
        let both = json!({"html": "<p/>", "url": "https://example.com"});
        assert_eq!(ArtifactInput::from_payload(&both), ArtifactInput::Html("<p/>".into()));

        let url = json!({"url": "https://example.com", "aesthetic_name": "apple_style"});
        assert_eq!(
            ArtifactInput::from_payload(&url),
            ArtifactInput::Url("https://example.com".into())
        );

        assert_eq!(ArtifactInput::from_payload(&json!({})), ArtifactInput::None);
    }

    #[test]
    fn test_record_html_payload() {
        let tmp = tempfile::tempdir().unwrap();
        let recorder = ArtifactRecorder::new(tmp.path().join("artifacts"));
        let payload = json!({"html": "<html>in</html>", "aesthetic": "0.1,0.2"});
        let at = Utc.with_ymd_and_hms(2026, 10, 15, 12, 30, 5).unwrap();

        let paths = recorder
            .record_at(
                &ArtifactEntry {
                    scenario: "Transform HTML",
                    endpoint: "/api/transform",
                    payload: &payload,
                    output: "<html>out</html>",
                },
                at,
            )
            .unwrap();

        let input = paths.input.unwrap();
        assert!(input.ends_with("transform_html_20261015T123005000Z_input.html"));
        assert_eq!(std::fs::read_to_string(&input).unwrap(), "<html>in</html>");
        assert_eq!(
            std::fs::read_to_string(&paths.output).unwrap(),
            "<html>out</html>"
        );

        let meta: Value =
            serde_json::from_str(&std::fs::read_to_string(&paths.metadata).unwrap()).unwrap();
        assert_eq!(
            meta,
            json!({
                "name": "Transform HTML",
                "endpoint": "/api/transform",
                "payload": {"aesthetic": "0.1,0.2"},
                "timestamp": "20261015T123005000Z"
            })
        );
    }

    #[test]
    fn test_record_url_payload() {
        let tmp = tempfile::tempdir().unwrap();
        let recorder = ArtifactRecorder::new(tmp.path());
        let payload = json!({"url": "https://www.berkshirehathaway.com", "aesthetic_name": "apple_style"});

        let paths = recorder
            .record(&ArtifactEntry {
                scenario: "Transform URL",
                endpoint: "/api/transform-url",
                payload: &payload,
                output: "<html/>",
            })
            .unwrap();

        let input = paths.input.unwrap();
        assert_eq!(input.extension().unwrap(), "url");
        assert_eq!(
            std::fs::read_to_string(input).unwrap(),
            "https://www.berkshirehathaway.com"
        );
    }

    #[test]
    fn test_distinct_timestamps_never_overwrite() {
        let tmp = tempfile::tempdir().unwrap();
        let recorder = ArtifactRecorder::new(tmp.path());
        let payload = json!({"html": "<p/>"});
        let entry = |output: &'static str| ArtifactEntry {
            scenario: "Transform HTML",
            endpoint: "/api/transform",
            payload: &payload,
            output,
        };
        let first = Utc.with_ymd_and_hms(2026, 10, 15, 12, 0, 0).unwrap();
        let second = first + chrono::Duration::milliseconds(1);

        let a = recorder.record_at(&entry("first"), first).unwrap();
        let b = recorder.record_at(&entry("second"), second).unwrap();

        assert_ne!(a.output, b.output);
        assert_eq!(std::fs::read_to_string(&a.output).unwrap(), "first");
        assert_eq!(std::fs::read_to_string(&b.output).unwrap(), "second");
        assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 6);

        // Same (slug, timestamp) is refused rather than overwritten
        assert!(recorder.record_at(&entry("third"), first).is_err());
        assert_eq!(std::fs::read_to_string(&a.output).unwrap(), "first");
    }

    #[test]
    fn test_fixture_seeded_once() {
        let tmp = tempfile::tempdir().unwrap();
        let recorder = ArtifactRecorder::new(tmp.path().join("artifacts"));

        let seeded = recorder.load_or_seed_fixture("dummy_site.html", "<p>default</p>").unwrap();
        assert_eq!(seeded, "<p>default</p>");

        std::fs::write(recorder.dir().join("dummy_site.html"), "<p>custom</p>").unwrap();
        let loaded = recorder.load_or_seed_fixture("dummy_site.html", "<p>default</p>").unwrap();
        assert_eq!(loaded, "<p>custom</p>");
    }
}
