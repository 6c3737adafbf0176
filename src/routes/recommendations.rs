use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use chrono::{Datelike, Utc};
use serde::Deserialize;
use std::future::Future;

use crate::{
    cached,
    db::CacheKey,
    error::{AppError, AppResult},
    middleware::{auth::AuthUser, request_id::RequestId},
    models::{ApiResponse, Recommendation},
    routes::{parse_id, AppState},
};

pub const DEFAULT_LIMIT: usize = 10;
pub const MAX_LIMIT: usize = 50;

type RecommendationList = Json<ApiResponse<Vec<Recommendation>>>;

#[derive(Debug, Default, Deserialize)]
pub struct LimitQuery {
    limit: Option<String>,
}

impl LimitQuery {
    /// `limit` defaults to 10 and must lie within 1..=50
    pub fn resolve(&self) -> AppResult<usize> {
        let Some(raw) = self.limit.as_deref() else {
            return Ok(DEFAULT_LIMIT);
        };
        match raw.trim().parse::<usize>() {
            Ok(limit) if (1..=MAX_LIMIT).contains(&limit) => Ok(limit),
            _ => Err(AppError::InvalidInput(format!(
                "limit must be an integer between 1 and {}",
                MAX_LIMIT
            ))),
        }
    }
}

/// Serves from the cache when one is configured, filling it on a miss
///
/// An unreachable cache degrades to computing the list directly.
async fn cached_list<F>(state: &AppState, key: CacheKey, fetch: F) -> AppResult<Vec<Recommendation>>
where
    F: Future<Output = AppResult<Vec<Recommendation>>>,
{
    match &state.cache {
        Some(cache) => cached!(cache, key, state.cache_ttl, fetch),
        None => fetch.await,
    }
}

/// Personalized recommendations for the authenticated reader
pub async fn personalized(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    AuthUser(user_id): AuthUser,
    Query(query): Query<LimitQuery>,
) -> AppResult<RecommendationList> {
    let limit = query.resolve()?;

    tracing::info!(
        request_id = %request_id,
        user_id,
        limit,
        "Generating personalized recommendations"
    );

    let recommendations = state.engine.generate_recommendations(user_id, limit).await?;
    Ok(Json(ApiResponse::list(recommendations)))
}

pub async fn similar(
    State(state): State<AppState>,
    Path(book_id): Path<String>,
    Query(query): Query<LimitQuery>,
) -> AppResult<RecommendationList> {
    let book_id = parse_id(&book_id, "book")?;
    let limit = query.resolve()?;
    let recommendations = state.engine.similar_books(book_id, limit).await?;
    Ok(Json(ApiResponse::list(recommendations)))
}

pub async fn trending(
    State(state): State<AppState>,
    Query(query): Query<LimitQuery>,
) -> AppResult<RecommendationList> {
    let limit = query.resolve()?;
    let key = CacheKey::Trending {
        window_days: state.engine.settings().trending_window_days,
        limit,
    };
    let recommendations = cached_list(&state, key, state.engine.trending(limit)).await?;
    Ok(Json(ApiResponse::list(recommendations)))
}

pub async fn by_genre(
    State(state): State<AppState>,
    Path(genre_id): Path<String>,
    Query(query): Query<LimitQuery>,
) -> AppResult<RecommendationList> {
    let genre_id = parse_id(&genre_id, "genre")?;
    let limit = query.resolve()?;
    let key = CacheKey::GenrePopular { genre_id, limit };
    let recommendations =
        cached_list(&state, key, state.engine.by_genre(genre_id, limit)).await?;
    Ok(Json(ApiResponse::list(recommendations)))
}

pub async fn new_releases(
    State(state): State<AppState>,
    Query(query): Query<LimitQuery>,
) -> AppResult<RecommendationList> {
    let limit = query.resolve()?;
    let key = CacheKey::NewReleases {
        year: Utc::now().year(),
        limit,
    };
    let recommendations = cached_list(&state, key, state.engine.new_releases(limit)).await?;
    Ok(Json(ApiResponse::list(recommendations)))
}
