//! SSR Bridge Integration Tests
//!
//! Drive the real `ssr-worker` binary through `BridgeClient`, using the
//! bundles under `tests/fixtures/`.

use serde_json::json;
use ssrbridge_client::{BridgeClient, ClientConfig};
use ssrbridge_common::{BridgeError, RenderError};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use tempfile::TempDir;

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn config(bundle: impl Into<PathBuf>) -> ClientConfig {
    ClientConfig::new(env!("CARGO_BIN_EXE_ssr-worker"), bundle)
        .with_request_timeout(Duration::from_secs(10))
}

fn client(name: &str) -> BridgeClient {
    BridgeClient::new(config(fixture(name))).unwrap()
}

fn render_error(result: Result<ssrbridge_common::RenderedPage, BridgeError>) -> RenderError {
    match result {
        Err(BridgeError::Render(e)) => e,
        other => panic!("expected a render failure, got {:?}", other),
    }
}

// ============================================================================
// Rendering
// ============================================================================

#[tokio::test]
async fn test_reference_bundle_renders_home_page() {
    let client = client("ssr.js");

    let page = client
        .send(json!({"component": "Home", "props": {"name": "Ada"}}))
        .await
        .unwrap();

    assert_eq!(
        page.head,
        vec![
            "<title>Home</title>".to_string(),
            "<meta name=\"test\" content=\"true\">".to_string(),
        ]
    );
    assert!(page.body.contains("data-component=\"Home\""));
    assert!(page.body.contains(r#"{"name":"Ada"}"#));

    let status = client.shutdown().await.unwrap().unwrap();
    assert!(status.success());
}

#[tokio::test]
async fn test_async_render_waits_for_timers() {
    let client = client("slow.js");

    for component in ["A", "B", "C"] {
        let page = client.send(json!({"component": component})).await.unwrap();
        assert_eq!(page.body, format!("<div>slow {component}</div>"));
    }
    assert_eq!(client.restart_count(), 0);
}

#[tokio::test]
async fn test_default_export_is_used() {
    let client = client("default_export.js");

    let page = client.send(json!({"component": "About"})).await.unwrap();
    assert_eq!(page.head, vec!["<title>About</title>".to_string()]);
    assert_eq!(page.body, "<main>default</main>");
}

#[tokio::test]
async fn test_es_module_bundle_renders() {
    let client = client("esm.mjs");

    let page = client.send(json!({"component": "Docs"})).await.unwrap();
    assert_eq!(page.head, vec!["<title>Docs</title>".to_string()]);
    assert_eq!(page.body, "<main>esm Docs</main>");
}

#[tokio::test]
async fn test_production_worker_renders() {
    let client = BridgeClient::new(config(fixture("ssr.js")).production(true)).unwrap();

    let page = client.send(json!({"component": "Home"})).await.unwrap();
    assert!(page.body.contains("data-component=\"Home\""));
}

// ============================================================================
// Render Errors
// ============================================================================

#[tokio::test]
async fn test_missing_bundle_is_module_not_found() {
    let missing = fixture("does_not_exist.js");
    let client = BridgeClient::new(config(&missing)).unwrap();

    let err = render_error(client.send(json!({"component": "Home"})).await);
    assert_eq!(err, RenderError::ModuleNotFound(missing.display().to_string()));
}

#[tokio::test]
async fn test_bundle_without_render_is_no_render_export() {
    let client = client("no_render.js");

    let err = render_error(client.send(json!({})).await);
    assert!(matches!(err, RenderError::NoRenderExport(path) if path.ends_with("no_render.js")));
}

#[tokio::test]
async fn test_thrown_error_is_render_failed() {
    let client = client("throws.js");

    let err = render_error(client.send(json!({})).await);
    assert_eq!(err, RenderError::RenderFailed("boom".into()));
}

#[tokio::test]
async fn test_missing_page_is_render_failed() {
    let client = client("ssr.js");

    let err = render_error(client.send(serde_json::Value::Null).await);
    assert!(matches!(err, RenderError::RenderFailed(_)));

    let page = client.send(json!({"component": "Home"})).await.unwrap();
    assert!(page.body.contains("Home"));
}

#[tokio::test]
async fn test_malformed_result_keeps_worker_answering() {
    let client = client("malformed.js");

    for _ in 0..2 {
        let err = render_error(client.send(json!({"component": "Home"})).await);
        let RenderError::RenderFailed(message) = err else {
            panic!("expected RenderFailed");
        };
        assert!(message.contains("head is not an array"));
    }
    assert!(client.is_running().await);
    assert_eq!(client.restart_count(), 0);
}

// ============================================================================
// Timeouts and Restarts
// ============================================================================

#[tokio::test]
async fn test_hanging_render_times_out_and_worker_restarts() {
    let config = config(fixture("hang.js")).with_request_timeout(Duration::from_millis(500));
    let client = BridgeClient::new(config).unwrap();

    let result = client.send(json!({"hang": true})).await;
    assert!(matches!(result, Err(BridgeError::Timeout(500))));
    assert!(!client.is_running().await);

    let page = client.send(json!({})).await.unwrap();
    assert_eq!(page.body, "<div>awake</div>");
    assert_eq!(client.restart_count(), 1);
}

// ============================================================================
// Caching Policy
// ============================================================================

fn write_versioned_bundle(dir: &TempDir, version: &str) -> PathBuf {
    fs::write(
        dir.path().join("label.js"),
        format!("module.exports = {{ label: \"{version}\" }};"),
    )
    .unwrap();

    let entry = dir.path().join("ssr.js");
    fs::write(
        &entry,
        "const { label } = require('./label');\n\
         module.exports.render = (page) => ({ head: [], body: label + ':' + page.n });\n",
    )
    .unwrap();
    entry
}

#[tokio::test]
async fn test_development_picks_up_dependency_edits() {
    let dir = TempDir::new().unwrap();
    let entry = write_versioned_bundle(&dir, "v1");
    let client = BridgeClient::new(config(&entry)).unwrap();

    assert_eq!(client.send(json!({"n": 1})).await.unwrap().body, "v1:1");

    write_versioned_bundle(&dir, "v2");
    assert_eq!(client.send(json!({"n": 2})).await.unwrap().body, "v2:2");
}

#[tokio::test]
async fn test_production_ignores_edits() {
    let dir = TempDir::new().unwrap();
    let entry = write_versioned_bundle(&dir, "v1");
    let client = BridgeClient::new(config(&entry).production(true)).unwrap();

    assert_eq!(client.send(json!({"n": 1})).await.unwrap().body, "v1:1");

    write_versioned_bundle(&dir, "v2");
    assert_eq!(client.send(json!({"n": 2})).await.unwrap().body, "v1:2");
}

// ============================================================================
// Frame Limits
// ============================================================================

#[tokio::test]
async fn test_large_body_round_trips() {
    let client = client("large_valid.js");

    let page = client.send(json!({})).await.unwrap();
    assert_eq!(page.head, vec!["<title>Large</title>".to_string()]);
    assert_eq!(page.body.len(), 900_000 + "<div></div>".len());
}

#[tokio::test]
async fn test_over_limit_result_is_render_failed() {
    let client = client("oversized.js");

    let err = render_error(client.send(json!({})).await);
    let RenderError::RenderFailed(message) = err else {
        panic!("expected RenderFailed");
    };
    assert!(message.contains("frame limit"));
    assert!(client.is_running().await);
}
