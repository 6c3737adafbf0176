//! Collaborative filtering: books loved by readers whose history overlaps the user's.

use std::collections::{HashMap, HashSet};

use crate::{
    db::CatalogStore,
    error::AppResult,
    models::{BookId, BookRecord, PeerReview, Recommendation, UserId},
    services::rating,
};

pub const REASON: &str = "Recommended by users with similar taste";
pub const CONFIDENCE: f64 = 0.7;

/// Shared books required before another reader counts as similar
const MAX_OVERLAP_REQUIRED: usize = 3;
/// Lowest peer rating that counts as an endorsement
const MIN_PEER_RATING: i32 = 4;

/// Ranks books endorsed by similar users
///
/// Never fails: a query error is logged and reported as no collaborative
/// signal, so an empty result does not mean there are no good matches.
pub async fn recommend(
    store: &dyn CatalogStore,
    user_id: UserId,
    limit: usize,
) -> Vec<Recommendation> {
    match try_recommend(store, user_id, limit).await {
        Ok(recommendations) => recommendations,
        Err(e) => {
            tracing::error!(user_id, error = %e, "Collaborative filtering failed");
            Vec::new()
        }
    }
}

async fn try_recommend(
    store: &dyn CatalogStore,
    user_id: UserId,
    limit: usize,
) -> AppResult<Vec<Recommendation>> {
    let own_reviews = store.user_reviews(user_id).await?;
    if own_reviews.is_empty() {
        return Ok(Vec::new());
    }

    let reviewed: Vec<BookId> = own_reviews.iter().map(|r| r.book_id).collect();
    let overlapping = store.reviews_of_books(&reviewed, user_id).await?;
    let similar = similar_users(&overlapping, required_overlap(reviewed.len()));
    if similar.is_empty() {
        tracing::debug!(user_id, "No similar users found");
        return Ok(Vec::new());
    }

    let favorites = store.user_favorites(user_id).await?;
    let excluded: HashSet<BookId> = reviewed
        .iter()
        .copied()
        .chain(favorites.iter().map(|f| f.book_id))
        .collect();

    let similar_ids: Vec<UserId> = similar.iter().copied().collect();
    let peer_reviews = store.reviews_by_users(&similar_ids).await?;
    let candidate_ids: Vec<BookId> = peer_reviews
        .iter()
        .filter(|r| r.rating >= MIN_PEER_RATING && !excluded.contains(&r.book_id))
        .map(|r| r.book_id)
        .collect::<HashSet<_>>()
        .into_iter()
        .collect();
    if candidate_ids.is_empty() {
        return Ok(Vec::new());
    }

    let books: HashMap<BookId, BookRecord> = store
        .books_by_ids(&candidate_ids)
        .await?
        .into_iter()
        .map(|b| (b.id, b))
        .collect();

    tracing::debug!(
        user_id,
        similar_users = similar.len(),
        candidates = books.len(),
        "Scoring collaborative candidates"
    );

    Ok(rank(&peer_reviews, &similar, &excluded, &books, limit))
}

/// Overlap needed to be similar: `min(3, books the user reviewed)`
pub fn required_overlap(reviewed_books: usize) -> usize {
    reviewed_books.min(MAX_OVERLAP_REQUIRED)
}

/// Users whose reviews cover at least `required` of the given books
pub fn similar_users(overlapping: &[PeerReview], required: usize) -> HashSet<UserId> {
    let mut shared: HashMap<UserId, HashSet<BookId>> = HashMap::new();
    for review in overlapping {
        shared.entry(review.user_id).or_default().insert(review.book_id);
    }
    shared
        .into_iter()
        .filter(|(_, books)| books.len() >= required)
        .map(|(user_id, _)| user_id)
        .collect()
}

/// Scores each qualifying `(book, peer rating)` pair as
/// `rating * (average / 5)`, highest first, one entry per book
pub fn rank(
    peer_reviews: &[PeerReview],
    similar: &HashSet<UserId>,
    excluded: &HashSet<BookId>,
    books: &HashMap<BookId, BookRecord>,
    limit: usize,
) -> Vec<Recommendation> {
    let mut scored: Vec<Recommendation> = peer_reviews
        .iter()
        .filter(|r| similar.contains(&r.user_id))
        .filter(|r| r.rating >= MIN_PEER_RATING && !excluded.contains(&r.book_id))
        .filter_map(|r| {
            let book = books.get(&r.book_id)?;
            let score = rating::collaborative_score(r.rating, book.average_rating());
            Some(Recommendation::from_book(book, REASON, CONFIDENCE).with_score(score))
        })
        .collect();

    scored.sort_by(|a, b| {
        b.score
            .unwrap_or_default()
            .total_cmp(&a.score.unwrap_or_default())
    });

    let mut seen = HashSet::new();
    scored.retain(|rec| seen.insert(rec.id));
    scored.truncate(limit);
    scored
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn book(id: BookId, ratings: Vec<i32>) -> BookRecord {
        BookRecord {
            id,
            title: format!("Book {}", id),
            author: "Author".to_string(),
            description: None,
            cover_image_url: None,
            published_year: None,
            price: None,
            created_at: Utc::now(),
            genres: Vec::new(),
            ratings,
        }
    }

    fn peer(user_id: UserId, book_id: BookId, rating: i32) -> PeerReview {
        PeerReview {
            user_id,
            book_id,
            rating,
        }
    }

    #[test]
    fn test_required_overlap_caps_at_three() {
        assert_eq!(required_overlap(1), 1);
        assert_eq!(required_overlap(2), 2);
        assert_eq!(required_overlap(3), 3);
        assert_eq!(required_overlap(12), 3);
    }

    #[test]
    fn test_similar_users_threshold() {
        let overlapping = vec![
            peer(10, 1, 5),
            peer(10, 2, 3),
            peer(11, 1, 4),
            peer(12, 1, 2),
            peer(12, 2, 5),
            peer(12, 3, 5),
        ];

        let two = similar_users(&overlapping, 2);
        assert_eq!(two, HashSet::from([10, 12]));

        let three = similar_users(&overlapping, 3);
        assert_eq!(three, HashSet::from([12]));
    }

    #[test]
    fn test_rank_scores_by_rating_times_catalog_average() {
        let books = HashMap::from([
            (20, book(20, vec![5, 5])),    // avg 5.0
            (21, book(21, vec![5])),       // avg 5.0
            (22, book(22, vec![3, 2, 3])), // avg 2.7
        ]);
        let peer_reviews = vec![peer(10, 22, 5), peer(10, 20, 4), peer(10, 21, 5)];
        let similar = HashSet::from([10]);

        let ranked = rank(&peer_reviews, &similar, &HashSet::new(), &books, 10);
        let ids: Vec<BookId> = ranked.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![21, 20, 22]);
        assert_eq!(ranked[0].score, Some(5.0));
        assert_eq!(ranked[1].score, Some(4.0));
        assert!((ranked[2].score.unwrap() - 2.7).abs() < 1e-9);
        assert!(ranked.iter().all(|r| r.reason == REASON && r.confidence == CONFIDENCE));
    }

    #[test]
    fn test_rank_drops_low_ratings_excluded_and_dissimilar() {
        let books = HashMap::from([
            (20, book(20, vec![5])),
            (21, book(21, vec![5])),
            (22, book(22, vec![5])),
            (23, book(23, vec![5])),
        ]);
        let peer_reviews = vec![
            peer(10, 20, 3),
            peer(10, 21, 5),
            peer(10, 22, 5),
            peer(99, 23, 5),
        ];
        let similar = HashSet::from([10]);
        let excluded = HashSet::from([22]);

        let ranked = rank(&peer_reviews, &similar, &excluded, &books, 10);
        let ids: Vec<BookId> = ranked.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![21]);
    }

    #[test]
    fn test_rank_keeps_best_instance_of_each_book() {
        let books = HashMap::from([(20, book(20, vec![4, 5])), (21, book(21, vec![5]))]);
        let peer_reviews = vec![peer(10, 20, 4), peer(11, 20, 5), peer(11, 21, 4)];
        let similar = HashSet::from([10, 11]);

        let ranked = rank(&peer_reviews, &similar, &HashSet::new(), &books, 10);
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].id, 20);
        assert!((ranked[0].score.unwrap() - 4.5).abs() < 1e-9);
        assert_eq!(ranked[1].id, 21);
    }

    #[test]
    fn test_rank_truncates() {
        let books: HashMap<BookId, BookRecord> =
            (20..30).map(|id| (id, book(id, vec![5]))).collect();
        let peer_reviews: Vec<PeerReview> = (20..30).map(|id| peer(10, id, 5)).collect();
        let ranked = rank(&peer_reviews, &HashSet::from([10]), &HashSet::new(), &books, 3);
        let ids: Vec<BookId> = ranked.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![20, 21, 22]);
    }
}
