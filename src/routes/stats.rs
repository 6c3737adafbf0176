use axum::{extract::State, Json};

use crate::{
    error::AppResult,
    models::{ApiResponse, PlatformStats},
    routes::AppState,
};

pub async fn platform_stats(
    State(state): State<AppState>,
) -> AppResult<Json<ApiResponse<PlatformStats>>> {
    let stats = state.engine.platform_stats().await?;
    Ok(Json(ApiResponse::item(stats)))
}
