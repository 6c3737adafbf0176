use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::{BookId, BookRecord, UserId};

/// A ranked book suggestion as returned to clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    pub id: BookId,
    pub title: String,
    pub author: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_image_url: Option<String>,
    pub average_rating: f64,
    pub total_reviews: usize,
    #[serde(default)]
    pub genres: Vec<String>,
    pub reason: String,
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_year: Option<i32>,
    /// Informational only, never used for ordering
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trending_score: Option<f64>,
    /// Internal ranking key
    #[serde(skip)]
    pub score: Option<f64>,
}

impl Recommendation {
    pub fn from_book(book: &BookRecord, reason: impl Into<String>, confidence: f64) -> Self {
        Self {
            id: book.id,
            title: book.title.clone(),
            author: book.author.clone(),
            cover_image_url: book.cover_image_url.clone(),
            average_rating: book.average_rating(),
            total_reviews: book.total_reviews(),
            genres: book.genres.clone(),
            reason: reason.into(),
            confidence,
            published_year: book.published_year,
            trending_score: None,
            score: None,
        }
    }

    pub fn with_score(mut self, score: f64) -> Self {
        self.score = Some(score);
        self
    }

    pub fn with_trending_score(mut self, trending_score: f64) -> Self {
        self.trending_score = Some(trending_score);
        self
    }
}

/// Taste summary derived from a user's reviews and favorites; never persisted
#[derive(Debug, Clone, PartialEq)]
pub struct UserProfile {
    pub user_id: UserId,
    pub average_rating_given: f64,
    /// Top five genre names, most frequent first
    pub preferred_genres: Vec<String>,
    /// Top three authors, most frequent first
    pub preferred_authors: Vec<String>,
    /// Reviewed and favorited books; never recommended back
    pub excluded_book_ids: HashSet<BookId>,
}

impl UserProfile {
    pub fn excludes(&self, book_id: BookId) -> bool {
        self.excluded_book_ids.contains(&book_id)
    }
}
