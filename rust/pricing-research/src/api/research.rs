//! Research API endpoints.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    routing::{get, post},
    Json, Router,
};

use crate::domain::{ProductRecord, ResearchRequest, ResearchResponse};
use crate::error::{ResearchError, ResearchResult};
use crate::AppState;

/// Create the research router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/research", post(run_research))
        .route("/research/{user_id}", get(list_products))
        .route("/products/{id}", get(get_product))
}

/// Run research for one product, or return the stored result.
async fn run_research(
    State(state): State<AppState>,
    payload: Result<Json<ResearchRequest>, JsonRejection>,
) -> ResearchResult<Json<ResearchResponse>> {
    let Json(request) =
        payload.map_err(|rejection| ResearchError::validation("body", rejection.body_text()))?;

    let outcome = state.orchestrator.run(request).await?;
    Ok(Json(ResearchResponse::from(outcome)))
}

/// Records previously computed for a user, oldest first.
async fn list_products(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> ResearchResult<Json<Vec<ProductRecord>>> {
    let records = state.orchestrator.list_products(&user_id).await?;
    Ok(Json(records))
}

/// One record by store-assigned id.
async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ResearchResult<Json<ProductRecord>> {
    let record = state.orchestrator.get_product(id).await?;
    Ok(Json(record))
}
