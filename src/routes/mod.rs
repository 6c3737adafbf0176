use axum::{
    http::StatusCode,
    middleware,
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    db::Cache,
    error::{AppError, AppResult},
    middleware::request_id::{make_span_with_request_id, request_id_middleware},
    services::RecommendationEngine,
};

pub mod ai;
pub mod recommendations;
pub mod stats;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<RecommendationEngine>,
    /// Read-through cache for non-personalized lists, when Redis is configured
    pub cache: Option<Cache>,
    pub cache_ttl: u64,
}

impl AppState {
    pub fn new(engine: RecommendationEngine, cache: Option<Cache>, cache_ttl: u64) -> Self {
        Self {
            engine: Arc::new(engine),
            cache,
            cache_ttl,
        }
    }
}

/// Creates the application router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .nest("/api", api_routes())
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(middleware::from_fn(request_id_middleware))
                .layer(TraceLayer::new_for_http().make_span_with(make_span_with_request_id))
                .layer(CorsLayer::permissive()),
        )
}

/// API routes under /api
fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/recommendations", get(recommendations::personalized))
        .route(
            "/recommendations/similar/:book_id",
            get(recommendations::similar),
        )
        .route("/recommendations/trending", get(recommendations::trending))
        .route(
            "/recommendations/genre/:genre_id",
            get(recommendations::by_genre),
        )
        .route(
            "/recommendations/new-releases",
            get(recommendations::new_releases),
        )
        .route(
            "/ai/books/:book_id/recommendations",
            get(ai::book_recommendations),
        )
        .route("/stats", get(stats::platform_stats))
}

/// Health check endpoint
async fn health_check() -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(json!({ "status": "healthy" })))
}

/// Parses a numeric path id, rejecting anything else as invalid input
pub(crate) fn parse_id(raw: &str, what: &str) -> AppResult<i64> {
    raw.parse::<i64>()
        .map_err(|_| AppError::InvalidInput(format!("Invalid {} id: {}", what, raw)))
}
