//! Genre-popularity and new-release lists.

use crate::{
    db::CatalogStore,
    error::AppResult,
    models::{BookRecord, GenreId, Recommendation},
};

pub const GENRE_REASON: &str = "Popular in this genre";
pub const GENRE_CONFIDENCE: f64 = 0.7;
pub const NEW_RELEASE_REASON: &str = "Recently published";
pub const NEW_RELEASE_CONFIDENCE: f64 = 0.6;

/// Most-reviewed books tagged with `genre_id`; unknown genres yield nothing
pub async fn popular_in_genre(
    store: &dyn CatalogStore,
    genre_id: GenreId,
    limit: usize,
) -> AppResult<Vec<Recommendation>> {
    let books = store.books_in_genre(genre_id).await?;
    Ok(rank_by_popularity(books, limit))
}

/// Books published this year or last, newest publication year first
pub async fn new_releases(
    store: &dyn CatalogStore,
    current_year: i32,
    limit: usize,
) -> AppResult<Vec<Recommendation>> {
    let books = store.books_published_since(current_year - 1).await?;
    Ok(rank_new_releases(books, current_year, limit))
}

pub fn rank_by_popularity(mut books: Vec<BookRecord>, limit: usize) -> Vec<Recommendation> {
    books.sort_by(|a, b| b.total_reviews().cmp(&a.total_reviews()));
    books
        .iter()
        .take(limit)
        .map(|b| Recommendation::from_book(b, GENRE_REASON, GENRE_CONFIDENCE))
        .collect()
}

pub fn rank_new_releases(
    mut books: Vec<BookRecord>,
    current_year: i32,
    limit: usize,
) -> Vec<Recommendation> {
    books.retain(|b| b.published_year.is_some_and(|year| year >= current_year - 1));
    books.sort_by(|a, b| b.published_year.cmp(&a.published_year));
    books
        .iter()
        .take(limit)
        .map(|b| Recommendation::from_book(b, NEW_RELEASE_REASON, NEW_RELEASE_CONFIDENCE))
        .collect()
}
