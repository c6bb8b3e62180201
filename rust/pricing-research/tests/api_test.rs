//! HTTP surface over scripted collaborators.

mod common;

use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use axum_test::TestServer;
use serde_json::{json, Value};

use common::{competitor_url, fast_settings, Harness};
use pricing_research::config::AppConfig;
use pricing_research::research::ResearchSettings;
use pricing_research::server::router;
use pricing_research::AppState;

fn server(harness: &Harness) -> TestServer {
    let state = AppState {
        config: Arc::new(AppConfig::default()),
        orchestrator: Arc::new(harness.orchestrator(fast_settings())),
    };
    TestServer::new(router(state)).unwrap()
}

fn body(user_id: &str, reanalyze: bool) -> Value {
    json!({
        "product_url": "https://shop.example/x",
        "product_title": "Silk Tie",
        "countries": ["US", "MX"],
        "user_id": user_id,
        "reanalyze": reanalyze,
    })
}

#[tokio::test]
async fn test_health() {
    let harness = Harness::new();
    let server = server(&harness);

    let response = server.get("/health").await;
    response.assert_status_ok();
    let health: Value = response.json();
    assert_eq!(health["status"], "ok");

    // Default configuration carries no credentials.
    let ready: Value = server.get("/ready").await.json();
    assert_eq!(ready["status"], "degraded");
    assert_eq!(ready["credentials"]["search"], false);
}

#[tokio::test]
async fn test_research_then_cached_response() {
    let harness = Harness::new();
    let server = server(&harness);

    let response = server.post("/research").json(&body("u1", false)).await;
    response.assert_status_ok();
    let first: Value = response.json();
    assert_eq!(first["status"], "created");
    assert_eq!(first["message"], "Product analysis conducted successfully.");
    assert_eq!(first["url"], "https://shop.example/x");
    assert_eq!(first["title"], "Silk Tie");
    assert_eq!(first["competitor_analysis"].as_array().unwrap().len(), 4);
    assert_eq!(first["country_pricing_analysis"][1]["country"], "MX");
    assert!(first["product_id"].as_i64().unwrap() > 0);
    assert!(first["scrape_details"].as_str().unwrap().starts_with("summary of page"));
    assert!(first["analysis"].as_str().unwrap().contains("Country: US"));

    let calls = harness.external_calls();
    let second: Value = server.post("/research").json(&body("u1", false)).await.json();
    assert_eq!(second["status"], "already_exists");
    assert_eq!(
        second["message"],
        "Product analysis already exists. Click 'Reanalyze' to update the analysis."
    );
    assert_eq!(second["product_id"], first["product_id"]);
    assert_eq!(second["analysis"], first["analysis"]);
    assert_eq!(harness.external_calls(), calls);

    let third: Value = server.post("/research").json(&body("u1", true)).await.json();
    assert_eq!(third["status"], "updated");
    assert_eq!(third["product_id"], first["product_id"]);
}

#[tokio::test]
async fn test_malformed_body_is_validation_error() {
    let harness = Harness::new();
    let server = server(&harness);

    let response = server
        .post("/research")
        .json(&json!({ "product_url": "https://shop.example/x" }))
        .await;
    response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
    let error: Value = response.json();
    assert_eq!(error["status"], "error");
    assert_eq!(error["kind"], "validation_error");
    assert_eq!(error["stage"], "validation");

    let mut blank_user = body("", false);
    blank_user["user_id"] = json!("  ");
    let response = server.post("/research").json(&blank_user).await;
    response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(harness.external_calls(), 0);
}

#[tokio::test]
async fn test_upstream_failure_is_structured() {
    let harness = Harness::new();
    harness.renderer.fail_always(&competitor_url("US", 1), 403);
    let server = server(&harness);

    let response = server.post("/research").json(&body("u1", false)).await;
    response.assert_status(StatusCode::BAD_GATEWAY);
    let error: Value = response.json();
    assert_eq!(error["kind"], "upstream_unavailable");
    assert_eq!(error["stage"], "render");
    assert_eq!(error["country"], "US");
    assert_eq!(error["upstream_status"], 403);
    assert_eq!(harness.store.inserts(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_slow_run_reports_cancellation_before_http_timeout() {
    let harness = Harness::new();
    harness.renderer.set_delay(Duration::from_secs(30));
    let config = AppConfig::default();
    let state = AppState {
        orchestrator: Arc::new(harness.orchestrator(ResearchSettings {
            deadline: config.run_deadline(),
            ..fast_settings()
        })),
        config: Arc::new(config),
    };
    let server = TestServer::new(router(state)).unwrap();

    // 21 renders at 30s each outlast the 590s deadline but not the 600s timeout.
    let countries = ["US", "MX", "JP", "DE", "FR", "IT", "ES", "GB", "CA", "AU"];
    let mut request = body("u1", false);
    request["countries"] = json!(countries);

    let response = server.post("/research").json(&request).await;
    response.assert_status(StatusCode::GATEWAY_TIMEOUT);
    let error: Value = response.json();
    assert_eq!(error["kind"], "cancelled");
    assert!(error["detail"].as_str().unwrap().contains("deadline exceeded"));
    assert_eq!(harness.store.inserts(), 0);
}

#[tokio::test]
async fn test_list_and_get_products() {
    let harness = Harness::new();
    let server = server(&harness);

    let created: Value = server.post("/research").json(&body("u1", false)).await.json();
    let id = created["product_id"].as_i64().unwrap();

    let listed: Value = server.get("/research/u1").await.json();
    let listed = listed.as_array().unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0]["id"], id);
    assert_eq!(listed[0]["user_id"], "u1");

    let empty: Value = server.get("/research/u2").await.json();
    assert!(empty.as_array().unwrap().is_empty());

    let product: Value = server.get(&format!("/products/{id}")).await.json();
    assert_eq!(product["url"], "https://shop.example/x");

    let missing = server.get("/products/999").await;
    missing.assert_status(StatusCode::NOT_FOUND);
    let error: Value = missing.json();
    assert_eq!(error["kind"], "not_found");
}
