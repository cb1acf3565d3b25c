use axum::{Json, extract::State};

use textbin_types::api::HealthResponse;

use crate::state::AppState;

/// GET /v1/healthcheck
pub async fn healthcheck(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "available".into(),
        environment: state.environment.clone(),
        version: env!("CARGO_PKG_VERSION").into(),
    })
}
