//! In-process [`CatalogStore`] for tests and local runs without PostgreSQL.

use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use tokio::sync::RwLock;

use crate::{
    db::CatalogStore,
    error::{AppError, AppResult},
    models::{
        BookId, BookRecord, FavoriteBook, GenreId, PeerReview, RecentActivity, UserId, UserReview,
    },
};

/// Book to insert into an [`InMemoryCatalog`]
#[derive(Debug, Clone)]
pub struct NewBook {
    pub title: String,
    pub author: String,
    pub description: Option<String>,
    pub cover_image_url: Option<String>,
    pub published_year: Option<i32>,
    pub price: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub genre_ids: Vec<GenreId>,
}

impl NewBook {
    pub fn new(title: impl Into<String>, author: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            author: author.into(),
            description: None,
            cover_image_url: None,
            published_year: None,
            price: None,
            created_at: Utc::now(),
            genre_ids: Vec::new(),
        }
    }

    pub fn genres(mut self, genre_ids: &[GenreId]) -> Self {
        self.genre_ids = genre_ids.to_vec();
        self
    }

    pub fn published(mut self, year: i32) -> Self {
        self.published_year = Some(year);
        self
    }

    pub fn added_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }
}

struct StoredReview {
    user_id: UserId,
    book_id: BookId,
    rating: i32,
    created_at: DateTime<Utc>,
}

#[derive(Default)]
struct CatalogData {
    genres: BTreeMap<GenreId, String>,
    books: BTreeMap<BookId, NewBook>,
    users: BTreeSet<UserId>,
    reviews: Vec<StoredReview>,
    favorites: Vec<(UserId, BookId)>,
}

impl CatalogData {
    fn record(&self, id: BookId, book: &NewBook) -> BookRecord {
        let mut genres: Vec<String> = book
            .genre_ids
            .iter()
            .filter_map(|g| self.genres.get(g).cloned())
            .collect();
        genres.sort();

        BookRecord {
            id,
            title: book.title.clone(),
            author: book.author.clone(),
            description: book.description.clone(),
            cover_image_url: book.cover_image_url.clone(),
            published_year: book.published_year,
            price: book.price,
            created_at: book.created_at,
            genres,
            ratings: self
                .reviews
                .iter()
                .filter(|r| r.book_id == id)
                .map(|r| r.rating)
                .collect(),
        }
    }

    fn records_where<F>(&self, predicate: F) -> Vec<BookRecord>
    where
        F: Fn(BookId, &NewBook) -> bool,
    {
        self.books
            .iter()
            .filter(|(id, book)| predicate(**id, *book))
            .map(|(id, book)| self.record(*id, book))
            .collect()
    }

    fn genre_names(&self, book_id: BookId) -> Vec<String> {
        self.books
            .get(&book_id)
            .map(|book| self.record(book_id, book).genres)
            .unwrap_or_default()
    }

    fn author(&self, book_id: BookId) -> String {
        self.books
            .get(&book_id)
            .map(|book| book.author.clone())
            .unwrap_or_default()
    }
}

/// Catalog held in memory behind an async lock
#[derive(Default)]
pub struct InMemoryCatalog {
    data: RwLock<CatalogData>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_genre(&self, name: impl Into<String>) -> AppResult<GenreId> {
        let name = name.into();
        let mut data = self.data.write().await;
        if data.genres.values().any(|existing| *existing == name) {
            return Err(AppError::InvalidInput(format!("Genre {} already exists", name)));
        }
        let id = data.genres.keys().next_back().map_or(1, |last| last + 1);
        data.genres.insert(id, name);
        Ok(id)
    }

    pub async fn add_book(&self, book: NewBook) -> AppResult<BookId> {
        let mut data = self.data.write().await;
        if let Some(missing) = book.genre_ids.iter().find(|g| !data.genres.contains_key(*g)) {
            return Err(AppError::NotFound(format!("Genre {} not found", missing)));
        }
        let id = data.books.keys().next_back().map_or(1, |last| last + 1);
        data.books.insert(id, book);
        Ok(id)
    }

    pub async fn add_user(&self, user_id: UserId) {
        self.data.write().await.users.insert(user_id);
    }

    /// Records a review; one per `(user, book)` and ratings within 1..=5
    pub async fn add_review(
        &self,
        user_id: UserId,
        book_id: BookId,
        rating: i32,
        created_at: DateTime<Utc>,
    ) -> AppResult<()> {
        if !(1..=5).contains(&rating) {
            return Err(AppError::InvalidInput(format!(
                "Rating must be between 1 and 5, got {}",
                rating
            )));
        }
        let mut data = self.data.write().await;
        if !data.books.contains_key(&book_id) {
            return Err(AppError::NotFound(format!("Book {} not found", book_id)));
        }
        if data
            .reviews
            .iter()
            .any(|r| r.user_id == user_id && r.book_id == book_id)
        {
            return Err(AppError::InvalidInput(format!(
                "User {} already reviewed book {}",
                user_id, book_id
            )));
        }
        data.users.insert(user_id);
        data.reviews.push(StoredReview {
            user_id,
            book_id,
            rating,
            created_at,
        });
        Ok(())
    }

    /// Marks a favorite; repeated calls are no-ops
    pub async fn add_favorite(&self, user_id: UserId, book_id: BookId) -> AppResult<()> {
        let mut data = self.data.write().await;
        if !data.books.contains_key(&book_id) {
            return Err(AppError::NotFound(format!("Book {} not found", book_id)));
        }
        data.users.insert(user_id);
        if !data.favorites.contains(&(user_id, book_id)) {
            data.favorites.push((user_id, book_id));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl CatalogStore for InMemoryCatalog {
    async fn user_reviews(&self, user_id: UserId) -> AppResult<Vec<UserReview>> {
        let data = self.data.read().await;
        Ok(data
            .reviews
            .iter()
            .filter(|r| r.user_id == user_id)
            .map(|r| UserReview {
                book_id: r.book_id,
                rating: r.rating,
                author: data.author(r.book_id),
                genres: data.genre_names(r.book_id),
            })
            .collect())
    }

    async fn user_favorites(&self, user_id: UserId) -> AppResult<Vec<FavoriteBook>> {
        let data = self.data.read().await;
        Ok(data
            .favorites
            .iter()
            .filter(|(user, _)| *user == user_id)
            .map(|(_, book_id)| FavoriteBook {
                book_id: *book_id,
                author: data.author(*book_id),
                genres: data.genre_names(*book_id),
            })
            .collect())
    }

    async fn reviews_of_books(
        &self,
        book_ids: &[BookId],
        exclude_user: UserId,
    ) -> AppResult<Vec<PeerReview>> {
        let data = self.data.read().await;
        Ok(data
            .reviews
            .iter()
            .filter(|r| r.user_id != exclude_user && book_ids.contains(&r.book_id))
            .map(|r| PeerReview {
                user_id: r.user_id,
                book_id: r.book_id,
                rating: r.rating,
            })
            .collect())
    }

    async fn reviews_by_users(&self, user_ids: &[UserId]) -> AppResult<Vec<PeerReview>> {
        let data = self.data.read().await;
        Ok(data
            .reviews
            .iter()
            .filter(|r| user_ids.contains(&r.user_id))
            .map(|r| PeerReview {
                user_id: r.user_id,
                book_id: r.book_id,
                rating: r.rating,
            })
            .collect())
    }

    async fn books_by_ids(&self, book_ids: &[BookId]) -> AppResult<Vec<BookRecord>> {
        let data = self.data.read().await;
        Ok(data.records_where(|id, _| book_ids.contains(&id)))
    }

    async fn find_book(&self, book_id: BookId) -> AppResult<Option<BookRecord>> {
        let data = self.data.read().await;
        Ok(data.books.get(&book_id).map(|book| data.record(book_id, book)))
    }

    async fn book_genre_ids(&self, book_id: BookId) -> AppResult<Option<Vec<GenreId>>> {
        let data = self.data.read().await;
        Ok(data.books.get(&book_id).map(|book| {
            let mut ids = book.genre_ids.clone();
            ids.sort_unstable();
            ids.dedup();
            ids
        }))
    }

    async fn books_sharing_genres(
        &self,
        genre_ids: &[GenreId],
        exclude_book: BookId,
    ) -> AppResult<Vec<BookRecord>> {
        let data = self.data.read().await;
        let mut books = data.records_where(|id, book| {
            id != exclude_book && book.genre_ids.iter().any(|g| genre_ids.contains(g))
        });
        books.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(books)
    }

    async fn recent_review_counts(&self, since: DateTime<Utc>) -> AppResult<Vec<RecentActivity>> {
        let data = self.data.read().await;
        let mut counts: BTreeMap<BookId, i64> = BTreeMap::new();
        for review in data.reviews.iter().filter(|r| r.created_at >= since) {
            *counts.entry(review.book_id).or_default() += 1;
        }
        Ok(counts
            .into_iter()
            .map(|(book_id, recent_reviews)| RecentActivity {
                book_id,
                recent_reviews,
            })
            .collect())
    }

    async fn books_in_genre(&self, genre_id: GenreId) -> AppResult<Vec<BookRecord>> {
        let data = self.data.read().await;
        Ok(data.records_where(|_, book| book.genre_ids.contains(&genre_id)))
    }

    async fn books_published_since(&self, year: i32) -> AppResult<Vec<BookRecord>> {
        let data = self.data.read().await;
        let mut books =
            data.records_where(|_, book| book.published_year.is_some_and(|y| y >= year));
        books.sort_by(|a, b| b.published_year.cmp(&a.published_year));
        Ok(books)
    }

    async fn candidate_pool(
        &self,
        exclude: &[BookId],
        limit: usize,
    ) -> AppResult<Vec<BookRecord>> {
        let data = self.data.read().await;
        let mut books = data.records_where(|id, _| !exclude.contains(&id));
        books.sort_by(|a, b| b.total_reviews().cmp(&a.total_reviews()));
        books.truncate(limit);
        Ok(books)
    }

    async fn count_books(&self) -> AppResult<i64> {
        Ok(self.data.read().await.books.len() as i64)
    }

    async fn count_reviews(&self) -> AppResult<i64> {
        Ok(self.data.read().await.reviews.len() as i64)
    }

    async fn count_users(&self) -> AppResult<i64> {
        Ok(self.data.read().await.users.len() as i64)
    }

    async fn count_genres(&self) -> AppResult<i64> {
        Ok(self.data.read().await.genres.len() as i64)
    }
}
