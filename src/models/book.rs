use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::services::rating;

pub type BookId = i64;
pub type GenreId = i64;

/// A catalog book with its genre names and every rating it has received
///
/// Built straight from a store read; the derived statistics are always
/// recomputed from `ratings`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct BookRecord {
    pub id: BookId,
    pub title: String,
    pub author: String,
    pub description: Option<String>,
    pub cover_image_url: Option<String>,
    pub published_year: Option<i32>,
    pub price: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub genres: Vec<String>,
    pub ratings: Vec<i32>,
}

impl BookRecord {
    /// Mean rating rounded to one decimal, 0 when unrated
    pub fn average_rating(&self) -> f64 {
        rating::average_rating(&self.ratings)
    }

    pub fn total_reviews(&self) -> usize {
        self.ratings.len()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Genre {
    pub id: GenreId,
    pub name: String,
}
