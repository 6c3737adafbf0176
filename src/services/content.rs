//! Content-based suggestions: other books sharing a genre with a reference book.

use crate::{
    db::CatalogStore,
    error::AppResult,
    models::{BookId, BookRecord, Recommendation},
};

pub const REASON: &str = "Similar genre and themes";
pub const CONFIDENCE: f64 = 0.6;

/// Books sharing at least one genre with `book_id`, newest first
///
/// An unknown book or one without genres yields an empty list.
pub async fn similar_books(
    store: &dyn CatalogStore,
    book_id: BookId,
    limit: usize,
) -> AppResult<Vec<Recommendation>> {
    let genre_ids = match store.book_genre_ids(book_id).await? {
        Some(ids) if !ids.is_empty() => ids,
        Some(_) => {
            tracing::debug!(book_id, "Reference book has no genres");
            return Ok(Vec::new());
        }
        None => {
            tracing::debug!(book_id, "Reference book not found");
            return Ok(Vec::new());
        }
    };

    let candidates = store.books_sharing_genres(&genre_ids, book_id).await?;
    Ok(rank(candidates, book_id, limit))
}

/// Orders by `created_at` descending; similarity strength and rating are ignored
pub fn rank(mut candidates: Vec<BookRecord>, reference: BookId, limit: usize) -> Vec<Recommendation> {
    candidates.retain(|b| b.id != reference);
    candidates.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    candidates
        .iter()
        .take(limit)
        .map(|b| Recommendation::from_book(b, REASON, CONFIDENCE))
        .collect()
}
