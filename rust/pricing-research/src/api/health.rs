//! Health check endpoints.

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::AppState;

/// Create the health router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
}

/// Health check response.
#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

/// Basic health check.
async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Readiness check response.
#[derive(Debug, Serialize)]
struct ReadinessResponse {
    status: &'static str,
    credentials: CredentialStatus,
}

/// Which collaborator credentials are configured.
#[derive(Debug, Serialize)]
struct CredentialStatus {
    llm: bool,
    search: bool,
    renderer: bool,
}

/// Readiness check. Reports configuration only; upstreams are not probed.
async fn readiness_check(State(state): State<AppState>) -> Json<ReadinessResponse> {
    let config = &state.config;
    let credentials = CredentialStatus {
        llm: config.llm.api_key.is_some(),
        search: config.search.api_key.is_some(),
        renderer: config.renderer.token.is_some(),
    };
    let ready = credentials.llm && credentials.search && credentials.renderer;
    Json(ReadinessResponse {
        status: if ready { "ready" } else { "degraded" },
        credentials,
    })
}
