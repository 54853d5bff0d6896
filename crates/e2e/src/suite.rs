//! Built-in scenario suite for the mood embedding backend
//!
//! Order matters: the save scenarios create the named aesthetics that the
//! retrieve and transform scenarios use later.

use serde_json::json;

use crate::scenario::Scenario;

/// Random 200x200 JPEG
pub const SAMPLE_IMAGE_URL: &str = "https://picsum.photos/200";

/// Page transformed by the "Transform HTML" scenario
pub const SAMPLE_HTML_FIXTURE: &str = "dummy_site.html";
pub const SAMPLE_HTML_VAR: &str = "sample_html";
pub const SAMPLE_HTML: &str = r#"<!DOCTYPE html>
<html>
<head><title>Dummy</title></head>
<body>
  <h1>Hello world</h1>
  <p>This is a demo page.</p>
</body>
</html>"#;

pub const SAVED_EMBEDDING_VAR: &str = "saved_embedding";

pub fn default_scenarios() -> Vec<Scenario> {
    vec![
        Scenario::analyze("Text-only", json!({"texts": ["elegant minimalist magazine"]})),
        Scenario::analyze("URL-only", json!({"urls": ["https://www.apple.com"]})),
        Scenario::analyze(
            "Save apple aesthetic",
            json!({"urls": ["https://www.apple.com"], "name": "apple_style"}),
        ),
        Scenario::analyze(
            "Mixed (text+url+image)",
            json!({
                "texts": ["playful retro arcade vibes"],
                "urls": ["https://getbootstrap.com"],
            }),
        )
        .with_images(&[SAMPLE_IMAGE_URL]),
        Scenario::analyze(
            "Bulk multi-item payload",
            json!({
                "texts": [
                    "monochrome editorial style",
                    "neon cyberpunk nightscape",
                    "warm rustic farmhouse aesthetic",
                ],
                "urls": ["https://tailwindcss.com", "https://vercel.com"],
            }),
        )
        .with_images(&[SAMPLE_IMAGE_URL, SAMPLE_IMAGE_URL, SAMPLE_IMAGE_URL]),
        Scenario::analyze(
            "Save aesthetic",
            json!({
                "texts": ["sleek minimalist magazine layout, monochrome palette"],
                "name": "magazine_style",
            }),
        ),
        Scenario::retrieve(
            "Retrieve saved aesthetic",
            "/api/aesthetic/magazine_style",
            "embedding",
        )
        .capture("embedding", SAVED_EMBEDDING_VAR),
        Scenario::transform(
            "Transform HTML",
            "/api/transform",
            json!({
                "html": format!("{{{{{}}}}}", SAMPLE_HTML_VAR),
                "aesthetic": format!("{{{{{}}}}}", SAVED_EMBEDDING_VAR),
            }),
        ),
        Scenario::transform(
            "Transform URL",
            "/api/transform-url",
            json!({
                "url": "https://www.berkshirehathaway.com",
                "aesthetic_name": "apple_style",
            }),
        ),
        Scenario::analyze("Negative (empty body)", json!({})).expect_status(400),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenario::Method;

    #[test]
    fn test_save_precedes_retrieve_precedes_transform() {
        let scenarios = default_scenarios();
        let pos = |name: &str| scenarios.iter().position(|s| s.name == name).unwrap();

        assert!(pos("Save apple aesthetic") < pos("Transform URL"));
        assert!(pos("Save aesthetic") < pos("Retrieve saved aesthetic"));
        assert!(pos("Retrieve saved aesthetic") < pos("Transform HTML"));
    }

    #[test]
    fn test_transform_html_uses_placeholders() {
        let scenarios = default_scenarios();
        let transform = scenarios.iter().find(|s| s.name == "Transform HTML").unwrap();
        assert_eq!(transform.payload["html"], "{{sample_html}}");
        assert_eq!(transform.payload["aesthetic"], "{{saved_embedding}}");
        assert!(transform.archive);
    }

    #[test]
    fn test_negative_scenario_sends_empty_body() {
        let scenarios = default_scenarios();
        let negative = scenarios.last().unwrap();
        assert_eq!(negative.payload, json!({}));
        assert_eq!(negative.expected_status, 400);
        assert_eq!(negative.method, Method::Post);
    }

    #[test]
    fn test_names_unique() {
        let scenarios = default_scenarios();
        let mut names: Vec<_> = scenarios.iter().map(|s| s.name.as_str()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), scenarios.len());
    }
}
