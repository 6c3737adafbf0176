//! Books with review activity inside a trailing window.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;

use crate::{
    db::CatalogStore,
    error::AppResult,
    models::{BookId, BookRecord, RecentActivity, Recommendation},
    services::rating,
};

pub const CONFIDENCE: f64 = 0.8;
pub const DEFAULT_WINDOW_DAYS: i64 = 30;

/// Which caller asked; only the reason text differs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrendingContext {
    /// Platform-wide trending list
    Platform,
    /// Fallback when a per-book request could not be personalized
    Book,
}

impl TrendingContext {
    pub fn reason(self) -> &'static str {
        match self {
            TrendingContext::Platform => "Trending recently",
            TrendingContext::Book => "Trending based on recent reviews",
        }
    }
}

/// Trending books as of `now`
pub async fn trending(
    store: &dyn CatalogStore,
    now: DateTime<Utc>,
    window_days: i64,
    limit: usize,
    context: TrendingContext,
) -> AppResult<Vec<Recommendation>> {
    let since = now - Duration::days(window_days);
    let activity = store.recent_review_counts(since).await?;
    if activity.is_empty() {
        return Ok(Vec::new());
    }

    let ids: Vec<BookId> = activity.iter().map(|a| a.book_id).collect();
    let books = store.books_by_ids(&ids).await?;

    tracing::debug!(
        window_days,
        active_books = activity.len(),
        "Ranking trending books"
    );

    Ok(rank(&activity, books, limit, context))
}

/// Orders by all-time review count, descending
///
/// `trendingScore` is computed and attached but does not affect the order.
/// Ties keep the order of `activity`.
pub fn rank(
    activity: &[RecentActivity],
    books: Vec<BookRecord>,
    limit: usize,
    context: TrendingContext,
) -> Vec<Recommendation> {
    let mut books: HashMap<BookId, BookRecord> = books.into_iter().map(|b| (b.id, b)).collect();

    let mut ranked: Vec<Recommendation> = activity
        .iter()
        .filter(|a| a.recent_reviews > 0)
        .filter_map(|a| {
            let book = books.remove(&a.book_id)?;
            let total = book.total_reviews();
            let score = rating::trending_score(a.recent_reviews as usize, total);
            Some(
                Recommendation::from_book(&book, context.reason(), CONFIDENCE)
                    .with_trending_score(score),
            )
        })
        .collect();

    ranked.sort_by(|a, b| b.total_reviews.cmp(&a.total_reviews));
    ranked.truncate(limit);
    ranked
}
