use serde::{Deserialize, Serialize};

pub mod book;
pub mod recommendation;
pub mod review;

pub use book::{BookId, BookRecord, Genre, GenreId};
pub use recommendation::{Recommendation, UserProfile};
pub use review::{FavoriteBook, PeerReview, RecentActivity, UserId, UserReview};

/// Success envelope shared by every JSON endpoint
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
}

impl<T> ApiResponse<Vec<T>> {
    /// Wraps a list, reporting its length as `count`
    pub fn list(data: Vec<T>) -> Self {
        let count = data.len();
        Self {
            success: true,
            data,
            count: Some(count),
        }
    }
}

impl<T> ApiResponse<T> {
    pub fn item(data: T) -> Self {
        Self {
            success: true,
            data,
            count: None,
        }
    }
}

/// Platform-wide entity counts
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PlatformStats {
    pub total_books: i64,
    pub total_reviews: i64,
    pub total_users: i64,
    pub total_genres: i64,
}
