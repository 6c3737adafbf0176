use axum::{
    extract::{Path, Query, State},
    Json,
};

use crate::{
    error::AppResult,
    models::{ApiResponse, Recommendation},
    routes::{parse_id, recommendations::LimitQuery, AppState},
};

/// AI picks for readers of a given book, trending books when the AI is unavailable
pub async fn book_recommendations(
    State(state): State<AppState>,
    Path(book_id): Path<String>,
    Query(query): Query<LimitQuery>,
) -> AppResult<Json<ApiResponse<Vec<Recommendation>>>> {
    let book_id = parse_id(&book_id, "book")?;
    let limit = query.resolve()?;
    let recommendations = state
        .engine
        .ai_recommendations_for_book(book_id, limit)
        .await?;
    Ok(Json(ApiResponse::list(recommendations)))
}
