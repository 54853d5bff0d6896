//! Console output for verdicts and run summaries

use std::fmt::Write;

use colored::Colorize;
use serde_json::Value;

use crate::runner::{truncate_chars, DiagnosticRecord, RunSummary, Verdict};

/// Encoded characters of a data URI kept in a payload dump
const DATA_URI_PREVIEW_CHARS: usize = 32;

/// Print one verdict line, followed by a diagnostic dump on failure
pub fn print_verdict(verdict: &Verdict) {
    println!("{}", render_verdict(verdict));
    if let Some(diagnostic) = &verdict.diagnostic {
        println!("{}", render_diagnostic(diagnostic));
    }
}

pub fn print_summary(summary: &RunSummary) {
    println!();
    println!("{}", render_summary(summary));
}

pub fn render_verdict(verdict: &Verdict) -> String {
    let mark = if verdict.passed {
        "✓".green()
    } else {
        "✗".red()
    };
    format!("{:<35} … {} ({} ms)", verdict.name, mark, verdict.duration_ms)
}

pub fn render_diagnostic(diagnostic: &DiagnosticRecord) -> String {
    let mut out = String::new();
    let payload =
        serde_json::to_string_pretty(&abbreviate_data_uris(&diagnostic.payload)).unwrap_or_default();

    // Writing into a String cannot fail
    let _ = writeln!(out, "----- Diagnostic info -----");
    let _ = writeln!(out, "Request: {} {}", diagnostic.method, diagnostic.url);
    let _ = writeln!(out, "Failure: {:?}", diagnostic.kind);
    let _ = writeln!(out, "Payload:");
    let _ = writeln!(out, "{}", payload);
    match diagnostic.status {
        Some(status) => {
            let _ = writeln!(out, "Status: {}", status);
        }
        None => {
            let _ = writeln!(out, "Status: <no response>");
        }
    }
    if !diagnostic.headers.is_empty() {
        let _ = writeln!(out, "Headers:");
        for (name, value) in &diagnostic.headers {
            let _ = writeln!(out, "  {}: {}", name, value);
        }
    }
    if let Some(body) = &diagnostic.body {
        let _ = writeln!(out, "Body (truncated to 2k):");
        let _ = writeln!(out, "{}", body);
    }
    let _ = writeln!(out, "Error:");
    let _ = writeln!(out, "{}", diagnostic.error.red());
    let _ = write!(out, "---------------------------");
    out
}

/// Copy of `payload` with every long `data:` URI cut to a short preview.
///
/// All other values are kept verbatim so the dump shows the full request.
pub fn abbreviate_data_uris(payload: &Value) -> Value {
    match payload {
        Value::String(s) if s.starts_with("data:") => {
            let Some((header, encoded)) = s.split_once(',') else {
                return payload.clone();
            };
            let total = encoded.chars().count();
            if total <= DATA_URI_PREVIEW_CHARS {
                return payload.clone();
            }
            Value::String(format!(
                "{},{}... ({} chars)",
                header,
                truncate_chars(encoded, DATA_URI_PREVIEW_CHARS),
                total
            ))
        }
        Value::Array(items) => Value::Array(items.iter().map(abbreviate_data_uris).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), abbreviate_data_uris(v)))
                .collect(),
        ),
        other => other.clone(),
    }
}

pub fn render_summary(summary: &RunSummary) -> String {
    if summary.is_success() {
        format!("All {} scenarios passed ✅", summary.passed)
            .green()
            .to_string()
    } else {
        format!("{} passed, {} failed ❌", summary.passed, summary.failed)
            .red()
            .to_string()
    }
}
