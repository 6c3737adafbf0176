use chrono::{DateTime, Utc};

use crate::{
    error::AppResult,
    models::{
        BookId, BookRecord, FavoriteBook, GenreId, PeerReview, RecentActivity, UserId, UserReview,
    },
};

/// Read-only access to the catalog and reading history
///
/// One method per query the scorers need, each returning typed rows so no
/// scoring code ever sees storage-shaped data.
#[async_trait::async_trait]
pub trait CatalogStore: Send + Sync {
    /// The user's reviews with each book's author and genres
    async fn user_reviews(&self, user_id: UserId) -> AppResult<Vec<UserReview>>;

    async fn user_favorites(&self, user_id: UserId) -> AppResult<Vec<FavoriteBook>>;

    /// Reviews of any of `book_ids` written by someone other than `exclude_user`
    async fn reviews_of_books(
        &self,
        book_ids: &[BookId],
        exclude_user: UserId,
    ) -> AppResult<Vec<PeerReview>>;

    async fn reviews_by_users(&self, user_ids: &[UserId]) -> AppResult<Vec<PeerReview>>;

    /// Books by id in ascending id order; unknown ids are skipped
    async fn books_by_ids(&self, book_ids: &[BookId]) -> AppResult<Vec<BookRecord>>;

    async fn find_book(&self, book_id: BookId) -> AppResult<Option<BookRecord>>;

    /// Genre ids of a book, or `None` if the book does not exist
    async fn book_genre_ids(&self, book_id: BookId) -> AppResult<Option<Vec<GenreId>>>;

    /// Books other than `exclude_book` tagged with any of `genre_ids`, newest first
    async fn books_sharing_genres(
        &self,
        genre_ids: &[GenreId],
        exclude_book: BookId,
    ) -> AppResult<Vec<BookRecord>>;

    /// Per-book review counts for reviews created at or after `since`, by ascending book id
    async fn recent_review_counts(&self, since: DateTime<Utc>) -> AppResult<Vec<RecentActivity>>;

    async fn books_in_genre(&self, genre_id: GenreId) -> AppResult<Vec<BookRecord>>;

    async fn books_published_since(&self, year: i32) -> AppResult<Vec<BookRecord>>;

    /// Most-reviewed books outside `exclude`, used as the AI's menu
    async fn candidate_pool(&self, exclude: &[BookId], limit: usize)
        -> AppResult<Vec<BookRecord>>;

    async fn count_books(&self) -> AppResult<i64>;

    async fn count_reviews(&self) -> AppResult<i64>;

    async fn count_users(&self) -> AppResult<i64>;

    async fn count_genres(&self) -> AppResult<i64>;
}
