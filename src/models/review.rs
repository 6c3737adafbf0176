use serde::{Deserialize, Serialize};

use super::BookId;

pub type UserId = i64;

/// One of the user's own reviews, joined to the reviewed book's author and genres
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct UserReview {
    pub book_id: BookId,
    pub rating: i32,
    pub author: String,
    pub genres: Vec<String>,
}

/// A book the user marked as favorite
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct FavoriteBook {
    pub book_id: BookId,
    pub author: String,
    pub genres: Vec<String>,
}

/// A bare `(user, book, rating)` triple used for taste overlap
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct PeerReview {
    pub user_id: UserId,
    pub book_id: BookId,
    pub rating: i32,
}

/// Number of reviews a book received inside a trailing window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct RecentActivity {
    pub book_id: BookId,
    pub recent_reviews: i64,
}
