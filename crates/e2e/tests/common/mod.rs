//! In-process stand-in for the mood embedding backend
//!
//! Implements the HTTP contract the harness drives, plus a few routes that
//! misbehave on purpose.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::net::TcpListener;

pub const EMBEDDING: &str = "0.12,0.98,0.33";
pub const STYLED_HTML: &str = "<html><body style=\"font-family: serif\">styled</body></html>";
pub const PNG_BYTES: &[u8] = b"\x89PNG\r\n\x1a\n";

type Saved = Arc<Mutex<HashMap<String, String>>>;

async fn root() -> &'static str {
    "mood backend"
}

async fn mood(State(saved): State<Saved>, Json(body): Json<Value>) -> Response {
    let has_input = ["texts", "urls", "images"].iter().any(|k| {
        body.get(*k)
            .and_then(Value::as_array)
            .map(|a| !a.is_empty())
            .unwrap_or(false)
    });
    if !has_input {
        return (StatusCode::BAD_REQUEST, Json(json!({"error": "empty request"}))).into_response();
    }
    if let Some(name) = body.get("name").and_then(Value::as_str) {
        saved
            .lock()
            .unwrap()
            .insert(name.to_string(), EMBEDDING.to_string());
    }
    Json(json!({ "aesthetic_embedding": EMBEDDING })).into_response()
}

async fn aesthetic(State(saved): State<Saved>, Path(name): Path<String>) -> Response {
    match saved.lock().unwrap().get(&name) {
        Some(embedding) => Json(json!({ "embedding": embedding })).into_response(),
        None => (StatusCode::NOT_FOUND, Json(json!({"error": "unknown aesthetic"}))).into_response(),
    }
}

async fn transform(Json(body): Json<Value>) -> Response {
    let html = body.get("html").and_then(Value::as_str).unwrap_or_default();
    let aesthetic = body.get("aesthetic").and_then(Value::as_str).unwrap_or_default();
    if html.is_empty() || aesthetic.is_empty() {
        return StatusCode::BAD_REQUEST.into_response();
    }
    Json(json!({ "html": STYLED_HTML })).into_response()
}

async fn transform_url(State(saved): State<Saved>, Json(body): Json<Value>) -> Response {
    let known = body
        .get("aesthetic_name")
        .and_then(Value::as_str)
        .map(|name| saved.lock().unwrap().contains_key(name))
        .unwrap_or(false);
    if body.get("url").is_none() || !known {
        return StatusCode::BAD_REQUEST.into_response();
    }
    Json(json!({ "html": STYLED_HTML })).into_response()
}

async fn broken() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        [("x-request-id", "req-42")],
        "model backend exploded",
    )
        .into_response()
}

async fn verbose() -> Response {
    (StatusCode::INTERNAL_SERVER_ERROR, "é".repeat(5000)).into_response()
}

async fn blank_field() -> Json<Value> {
    Json(json!({ "aesthetic_embedding": "   " }))
}

async fn not_json() -> &'static str {
    "definitely not json"
}

async fn lenient() -> Json<Value> {
    Json(json!({ "aesthetic_embedding": EMBEDDING }))
}

async fn image() -> Response {
    ([(header::CONTENT_TYPE, "image/png")], PNG_BYTES).into_response()
}

async fn untyped_image() -> Response {
    Response::new(Body::from(PNG_BYTES))
}

async fn missing_image() -> StatusCode {
    StatusCode::NOT_FOUND
}

pub fn backend() -> Router {
    Router::new()
        .route("/", get(root))
        .route("/api/mood", post(mood))
        .route("/api/aesthetic/:name", get(aesthetic))
        .route("/api/transform", post(transform))
        .route("/api/transform-url", post(transform_url))
        .route("/api/broken", post(broken))
        .route("/api/verbose", post(verbose))
        .route("/api/blank-field", post(blank_field))
        .route("/api/not-json", post(not_json))
        .route("/api/lenient", post(lenient))
        .route("/img/sample.png", get(image))
        .route("/img/untyped", get(untyped_image))
        .route("/img/missing", get(missing_image))
        .with_state(Saved::default())
}

/// Answers everything the way a macOS AirPlay receiver does
pub fn airplay() -> Router {
    Router::new().fallback(|| async {
        (StatusCode::FORBIDDEN, [(header::SERVER, "AirTunes/595.13.1")], "")
    })
}

/// Serve `router` on an ephemeral port and return its base URL
pub async fn serve(router: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}

/// A base URL nothing is listening on
pub async fn closed_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", addr)
}
