//! Scenario model and declarative YAML scenario files

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{E2eError, E2eResult};

pub const DEFAULT_ENDPOINT: &str = "/api/mood";
pub const DEFAULT_EXPECT_FIELD: &str = "aesthetic_embedding";

/// A single request/expectation pair executed against the backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    /// Unique name for this scenario
    pub name: String,

    #[serde(default)]
    pub method: Method,

    /// Route relative to the base URL
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// JSON body (ignored for GET). Strings of the form `{{var}}` are
    /// replaced by run variables before sending.
    #[serde(default = "empty_object")]
    pub payload: Value,

    #[serde(default = "default_status")]
    pub expected_status: u16,

    /// Response field that must be a non-empty string; `null` disables
    #[serde(default = "default_expect_field")]
    pub expect_field: Option<String>,

    /// Archive the validated field as an artifact
    #[serde(default)]
    pub archive: bool,

    /// Image URLs fetched and appended to `payload.images` as data URIs
    #[serde(default)]
    pub fetch_images: Vec<String>,

    /// Store a response field as a run variable after a pass
    #[serde(default)]
    pub capture: Option<Capture>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Method {
    #[default]
    Post,
    Get,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Post => "POST",
            Method::Get => "GET",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capture {
    /// Response field to read
    pub field: String,
    /// Run variable to store it under
    pub var: String,
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}

fn empty_object() -> Value {
    Value::Object(Default::default())
}

fn default_status() -> u16 {
    200
}

fn default_expect_field() -> Option<String> {
    Some(DEFAULT_EXPECT_FIELD.to_string())
}

impl Scenario {
    /// POST to the analysis endpoint expecting a non-empty embedding
    pub fn analyze(name: &str, payload: Value) -> Self {
        Self {
            name: name.to_string(),
            method: Method::Post,
            endpoint: default_endpoint(),
            payload,
            expected_status: default_status(),
            expect_field: default_expect_field(),
            archive: false,
            fetch_images: Vec::new(),
            capture: None,
        }
    }

    /// GET `endpoint`, expecting `field` to be a non-empty string
    pub fn retrieve(name: &str, endpoint: &str, field: &str) -> Self {
        Self {
            method: Method::Get,
            endpoint: endpoint.to_string(),
            payload: Value::Null,
            expect_field: Some(field.to_string()),
            ..Self::analyze(name, Value::Null)
        }
    }

    /// POST to a transform endpoint; the returned markup is archived
    pub fn transform(name: &str, endpoint: &str, payload: Value) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            expect_field: Some("html".to_string()),
            archive: true,
            ..Self::analyze(name, payload)
        }
    }

    pub fn expect_status(mut self, status: u16) -> Self {
        self.expected_status = status;
        self
    }

    pub fn with_images(mut self, urls: &[&str]) -> Self {
        self.fetch_images = urls.iter().map(|u| u.to_string()).collect();
        self
    }

    pub fn capture(mut self, field: &str, var: &str) -> Self {
        self.capture = Some(Capture {
            field: field.to_string(),
            var: var.to_string(),
        });
        self
    }

    /// Whether the success path applies (body parsed, field validated)
    pub fn expects_success(&self) -> bool {
        self.expected_status == 200
    }
}

/// Replace every `{{var}}` string in `payload` with the variable's value
pub fn resolve_placeholders(payload: &Value, vars: &HashMap<String, Value>) -> E2eResult<Value> {
    match payload {
        Value::String(s) => match placeholder_name(s) {
            Some(name) => vars
                .get(name)
                .cloned()
                .ok_or_else(|| E2eError::UnresolvedPlaceholder(name.to_string())),
            None => Ok(payload.clone()),
        },
        Value::Array(items) => items
            .iter()
            .map(|item| resolve_placeholders(item, vars))
            .collect::<E2eResult<Vec<_>>>()
            .map(Value::Array),
        Value::Object(map) => {
            let mut resolved = serde_json::Map::with_capacity(map.len());
            for (key, value) in map {
                resolved.insert(key.clone(), resolve_placeholders(value, vars)?);
            }
            Ok(Value::Object(resolved))
        }
        _ => Ok(payload.clone()),
    }
}

fn placeholder_name(s: &str) -> Option<&str> {
    s.strip_prefix("{{")
        .and_then(|rest| rest.strip_suffix("}}"))
        .map(str::trim)
        .filter(|name| !name.is_empty())
}

/// Append fetched images to `payload.images`, creating the array if needed
pub fn append_images(payload: &mut Value, images: Vec<String>) -> E2eResult<()> {
    if images.is_empty() {
        return Ok(());
    }
    let map = payload.as_object_mut().ok_or_else(|| {
        E2eError::Unexpected("fetch_images requires an object payload".into())
    })?;
    let entry = map
        .entry("images")
        .or_insert_with(|| Value::Array(Vec::new()));
    let list = entry.as_array_mut().ok_or_else(|| {
        E2eError::Unexpected("payload.images is not an array".into())
    })?;
    list.extend(images.into_iter().map(Value::String));
    Ok(())
}

/// A YAML file holding an ordered scenario list
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioFile {
    pub scenarios: Vec<Scenario>,
}

impl ScenarioFile {
    /// Parse a scenario list from a YAML string
    pub fn from_yaml(yaml: &str) -> E2eResult<Vec<Scenario>> {
        let file: Self = serde_yaml::from_str(yaml)?;
        Ok(file.scenarios)
    }

    /// Parse a scenario list from a YAML file
    pub fn from_file(path: &Path) -> E2eResult<Vec<Scenario>> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }
}
