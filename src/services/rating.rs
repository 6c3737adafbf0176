//! Rating arithmetic shared by every scorer.

/// Arithmetic mean of `ratings` rounded half-up to one decimal place, 0 when empty
pub fn average_rating(ratings: &[i32]) -> f64 {
    if ratings.is_empty() {
        return 0.0;
    }
    let mean = ratings.iter().map(|&r| f64::from(r)).sum::<f64>() / ratings.len() as f64;
    // Ratings are positive, so round() (half away from zero) is half-up here
    (mean * 10.0).round() / 10.0
}

/// Unrounded mean, `None` when empty
pub fn mean_rating(ratings: &[i32]) -> Option<f64> {
    if ratings.is_empty() {
        return None;
    }
    Some(ratings.iter().map(|&r| f64::from(r)).sum::<f64>() / ratings.len() as f64)
}

/// `(recent * 2 + total) / (total + 1)`
pub fn trending_score(recent_reviews: usize, total_reviews: usize) -> f64 {
    (recent_reviews as f64 * 2.0 + total_reviews as f64) / (total_reviews as f64 + 1.0)
}

/// Collaborative weight: a peer's rating scaled by the book's catalog average
pub fn collaborative_score(peer_rating: i32, catalog_average: f64) -> f64 {
    f64::from(peer_rating) * (catalog_average / 5.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_average_rating_examples() {
        assert_eq!(average_rating(&[5, 4, 3]), 4.0);
        assert_eq!(average_rating(&[]), 0.0);
        assert_eq!(average_rating(&[5]), 5.0);
    }

    #[test]
    fn test_average_rating_rounds_half_up() {
        // 3.25 -> 3.3
        assert_eq!(average_rating(&[3, 3, 3, 4]), 3.3);
        // 4.666.. -> 4.7
        assert_eq!(average_rating(&[5, 5, 4]), 4.7);
        // 1.333.. -> 1.3
        assert_eq!(average_rating(&[1, 1, 2]), 1.3);
    }

    #[test]
    fn test_mean_rating() {
        assert_eq!(mean_rating(&[]), None);
        assert_eq!(mean_rating(&[4, 5]), Some(4.5));
    }

    #[test]
    fn test_trending_score() {
        // 8 of 10 reviews recent
        assert!((trending_score(8, 10) - 26.0 / 11.0).abs() < 1e-9);
        // 2 of 15 reviews recent
        assert!((trending_score(2, 15) - 19.0 / 16.0).abs() < 1e-9);
        assert!(trending_score(8, 10) > trending_score(2, 15));
    }

    #[test]
    fn test_collaborative_score() {
        assert_eq!(collaborative_score(5, 4.0), 4.0);
        assert_eq!(collaborative_score(4, 5.0), 4.0);
        assert_eq!(collaborative_score(4, 0.0), 0.0);
    }
}
