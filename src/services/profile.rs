//! Builds a [`UserProfile`] from a user's reviews and favorites.

use std::collections::{HashMap, HashSet};

use crate::{
    db::CatalogStore,
    error::AppResult,
    models::{FavoriteBook, UserId, UserProfile, UserReview},
    services::rating,
};

/// Rating assumed for users who have not reviewed anything yet
pub const DEFAULT_AVERAGE_RATING_GIVEN: f64 = 3.5;

const TOP_GENRES: usize = 5;
const TOP_AUTHORS: usize = 3;

/// Fetches the user's history and derives the profile
///
/// Unknown users get an empty profile rather than an error.
pub async fn build_profile(store: &dyn CatalogStore, user_id: UserId) -> AppResult<UserProfile> {
    let (reviews, favorites) = tokio::try_join!(
        store.user_reviews(user_id),
        store.user_favorites(user_id)
    )?;

    tracing::debug!(
        user_id,
        reviews = reviews.len(),
        favorites = favorites.len(),
        "Building user profile"
    );

    Ok(profile_from_history(user_id, &reviews, &favorites))
}

/// Pure profile derivation
///
/// Genres and authors are tallied once per distinct book across reviews and
/// favorites. Ties keep first-seen order.
pub fn profile_from_history(
    user_id: UserId,
    reviews: &[UserReview],
    favorites: &[FavoriteBook],
) -> UserProfile {
    let ratings: Vec<i32> = reviews.iter().map(|r| r.rating).collect();
    let average_rating_given =
        rating::mean_rating(&ratings).unwrap_or(DEFAULT_AVERAGE_RATING_GIVEN);

    let mut excluded_book_ids = HashSet::new();
    let mut genres = Tally::default();
    let mut authors = Tally::default();

    let books = reviews
        .iter()
        .map(|r| (r.book_id, &r.author, &r.genres))
        .chain(favorites.iter().map(|f| (f.book_id, &f.author, &f.genres)));

    for (book_id, author, book_genres) in books {
        if !excluded_book_ids.insert(book_id) {
            continue;
        }
        authors.add(author);
        for genre in book_genres {
            genres.add(genre);
        }
    }

    UserProfile {
        user_id,
        average_rating_given,
        preferred_genres: genres.top(TOP_GENRES),
        preferred_authors: authors.top(TOP_AUTHORS),
        excluded_book_ids,
    }
}

/// Occurrence counter that remembers first-seen order
#[derive(Default)]
struct Tally {
    order: Vec<String>,
    counts: HashMap<String, usize>,
}

impl Tally {
    fn add(&mut self, key: &str) {
        match self.counts.get_mut(key) {
            Some(count) => *count += 1,
            None => {
                self.order.push(key.to_string());
                self.counts.insert(key.to_string(), 1);
            }
        }
    }

    fn top(mut self, n: usize) -> Vec<String> {
        let counts = &self.counts;
        // stable sort keeps first-seen order among equal counts
        self.order.sort_by(|a, b| counts[b].cmp(&counts[a]));
        self.order.truncate(n);
        self.order
    }
}
