use chrono::{DateTime, Utc};
use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::{
    db::CatalogStore,
    error::AppResult,
    models::{
        BookId, BookRecord, FavoriteBook, GenreId, PeerReview, RecentActivity, UserId, UserReview,
    },
};

/// Creates a PostgreSQL connection pool
///
/// Establishes a pool of database connections for efficient reuse.
/// The pool automatically manages connection lifecycle and limits.
pub async fn create_pool(database_url: &str) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await?;

    Ok(pool)
}

/// Book columns plus aggregated genre names and ratings
const BOOK_SELECT: &str = r#"
    SELECT b.id, b.title, b.author, b.description, b.cover_image_url, b.published_year,
           b.price::FLOAT8 AS price, b.created_at,
           ARRAY(
               SELECT g.name FROM book_genres bg
               JOIN genres g ON g.id = bg.genre_id
               WHERE bg.book_id = b.id
               ORDER BY g.name
           ) AS genres,
           ARRAY(
               SELECT r.rating::INT4 FROM reviews r
               WHERE r.book_id = b.id
               ORDER BY r.id
           ) AS ratings
    FROM books b
"#;

const GENRE_NAMES: &str = r#"
    ARRAY(
        SELECT g.name FROM book_genres bg
        JOIN genres g ON g.id = bg.genre_id
        WHERE bg.book_id = b.id
        ORDER BY g.name
    ) AS genres
"#;

/// [`CatalogStore`] backed by the relational schema in `migrations/`
#[derive(Clone)]
pub struct PgCatalogStore {
    pool: PgPool,
}

impl PgCatalogStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl CatalogStore for PgCatalogStore {
    async fn user_reviews(&self, user_id: UserId) -> AppResult<Vec<UserReview>> {
        let sql = format!(
            r#"
            SELECT r.book_id, r.rating::INT4 AS rating, b.author, {GENRE_NAMES}
            FROM reviews r
            JOIN books b ON b.id = r.book_id
            WHERE r.user_id = $1
            ORDER BY r.created_at, r.id
            "#
        );
        let rows = sqlx::query_as::<_, UserReview>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn user_favorites(&self, user_id: UserId) -> AppResult<Vec<FavoriteBook>> {
        let sql = format!(
            r#"
            SELECT f.book_id, b.author, {GENRE_NAMES}
            FROM user_favorites f
            JOIN books b ON b.id = f.book_id
            WHERE f.user_id = $1
            ORDER BY f.created_at, f.id
            "#
        );
        let rows = sqlx::query_as::<_, FavoriteBook>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn reviews_of_books(
        &self,
        book_ids: &[BookId],
        exclude_user: UserId,
    ) -> AppResult<Vec<PeerReview>> {
        let rows = sqlx::query_as::<_, PeerReview>(
            r#"
            SELECT user_id, book_id, rating::INT4 AS rating
            FROM reviews
            WHERE book_id = ANY($1) AND user_id <> $2
            ORDER BY id
            "#,
        )
        .bind(book_ids)
        .bind(exclude_user)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn reviews_by_users(&self, user_ids: &[UserId]) -> AppResult<Vec<PeerReview>> {
        let rows = sqlx::query_as::<_, PeerReview>(
            r#"
            SELECT user_id, book_id, rating::INT4 AS rating
            FROM reviews
            WHERE user_id = ANY($1)
            ORDER BY id
            "#,
        )
        .bind(user_ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn books_by_ids(&self, book_ids: &[BookId]) -> AppResult<Vec<BookRecord>> {
        let sql = format!("{BOOK_SELECT} WHERE b.id = ANY($1) ORDER BY b.id");
        let rows = sqlx::query_as::<_, BookRecord>(&sql)
            .bind(book_ids)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn find_book(&self, book_id: BookId) -> AppResult<Option<BookRecord>> {
        let sql = format!("{BOOK_SELECT} WHERE b.id = $1");
        let row = sqlx::query_as::<_, BookRecord>(&sql)
            .bind(book_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn book_genre_ids(&self, book_id: BookId) -> AppResult<Option<Vec<GenreId>>> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM books WHERE id = $1)")
            .bind(book_id)
            .fetch_one(&self.pool)
            .await?;
        if !exists {
            return Ok(None);
        }

        let genre_ids: Vec<GenreId> = sqlx::query_scalar(
            "SELECT genre_id FROM book_genres WHERE book_id = $1 ORDER BY genre_id",
        )
        .bind(book_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(Some(genre_ids))
    }

    async fn books_sharing_genres(
        &self,
        genre_ids: &[GenreId],
        exclude_book: BookId,
    ) -> AppResult<Vec<BookRecord>> {
        let sql = format!(
            r#"
            {BOOK_SELECT}
            WHERE b.id <> $2
              AND EXISTS (
                  SELECT 1 FROM book_genres bg
                  WHERE bg.book_id = b.id AND bg.genre_id = ANY($1)
              )
            ORDER BY b.created_at DESC, b.id
            "#
        );
        let rows = sqlx::query_as::<_, BookRecord>(&sql)
            .bind(genre_ids)
            .bind(exclude_book)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn recent_review_counts(&self, since: DateTime<Utc>) -> AppResult<Vec<RecentActivity>> {
        let rows = sqlx::query_as::<_, RecentActivity>(
            r#"
            SELECT book_id, COUNT(*) AS recent_reviews
            FROM reviews
            WHERE created_at >= $1
            GROUP BY book_id
            ORDER BY book_id
            "#,
        )
        .bind(since)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn books_in_genre(&self, genre_id: GenreId) -> AppResult<Vec<BookRecord>> {
        let sql = format!(
            r#"
            {BOOK_SELECT}
            WHERE EXISTS (
                SELECT 1 FROM book_genres bg
                WHERE bg.book_id = b.id AND bg.genre_id = $1
            )
            ORDER BY b.id
            "#
        );
        let rows = sqlx::query_as::<_, BookRecord>(&sql)
            .bind(genre_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn books_published_since(&self, year: i32) -> AppResult<Vec<BookRecord>> {
        let sql = format!(
            "{BOOK_SELECT} WHERE b.published_year >= $1 ORDER BY b.published_year DESC, b.id"
        );
        let rows = sqlx::query_as::<_, BookRecord>(&sql)
            .bind(year)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn candidate_pool(
        &self,
        exclude: &[BookId],
        limit: usize,
    ) -> AppResult<Vec<BookRecord>> {
        let sql = format!(
            r#"
            {BOOK_SELECT}
            WHERE NOT (b.id = ANY($1))
            ORDER BY (SELECT COUNT(*) FROM reviews r WHERE r.book_id = b.id) DESC, b.id
            LIMIT $2
            "#
        );
        let rows = sqlx::query_as::<_, BookRecord>(&sql)
            .bind(exclude)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn count_books(&self) -> AppResult<i64> {
        Ok(sqlx::query_scalar("SELECT COUNT(*) FROM books")
            .fetch_one(&self.pool)
            .await?)
    }

    async fn count_reviews(&self) -> AppResult<i64> {
        Ok(sqlx::query_scalar("SELECT COUNT(*) FROM reviews")
            .fetch_one(&self.pool)
            .await?)
    }

    async fn count_users(&self) -> AppResult<i64> {
        Ok(sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?)
    }

    async fn count_genres(&self) -> AppResult<i64> {
        Ok(sqlx::query_scalar("SELECT COUNT(*) FROM genres")
            .fetch_one(&self.pool)
            .await?)
    }
}
