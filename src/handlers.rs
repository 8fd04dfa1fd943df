use crate::error::ApiError;
use crate::models::{HelloResponse, PageGroup, RecommendationResponse};
use crate::pipeline;
use crate::state::AppState;
use axum::{
    Json,
    body::{Body, Bytes},
    extract::{Request, State},
    response::Response,
};
use std::sync::Arc;
use tracing::warn;

pub async fn hello() -> Json<HelloResponse> {
    Json(HelloResponse {
        hello: "murecom-gw4reader".to_string(),
    })
}

/// `POST /murecom`. The body is decoded as JSON whatever its content type.
pub async fn murecom(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<RecommendationResponse>, ApiError> {
    let pages: PageGroup = serde_json::from_slice(&body).map_err(|e| {
        warn!(error = %e, "murecom: bad request body");
        ApiError::BadRequest(e.to_string())
    })?;

    let response = pipeline::recommend_for_pages(&state, &pages).await?;
    Ok(Json(response))
}

/// `GET /audioproxy/{proxyName}/{filepath...}`
pub async fn audio_proxy(
    State(state): State<Arc<AppState>>,
    req: Request<Body>,
) -> Result<Response, ApiError> {
    state.forwarder.forward(&state.audio_proxies, req).await
}

pub async fn not_found() -> ApiError {
    ApiError::NotFound
}
