//! Blending scorer outputs into a single list.

use std::collections::HashSet;

use crate::models::Recommendation;

/// Share of the personalized list reserved for AI picks
const AI_SHARE_TENTHS: usize = 6;
const COLLABORATIVE_SHARE_TENTHS: usize = 4;

/// `(ceil(limit * 0.6), ceil(limit * 0.4))`
pub fn split_limit(limit: usize) -> (usize, usize) {
    (
        limit.saturating_mul(AI_SHARE_TENTHS).div_ceil(10),
        limit.saturating_mul(COLLABORATIVE_SHARE_TENTHS).div_ceil(10),
    )
}

/// Drops later entries for a book already seen; the first instance wins
pub fn dedup_by_book<I>(recommendations: I) -> Vec<Recommendation>
where
    I: IntoIterator<Item = Recommendation>,
{
    let mut seen = HashSet::new();
    recommendations
        .into_iter()
        .filter(|rec| seen.insert(rec.id))
        .collect()
}

/// Concatenates `primary` then `secondary`, dedups and truncates to `limit`
pub fn blend(
    primary: Vec<Recommendation>,
    secondary: Vec<Recommendation>,
    limit: usize,
) -> Vec<Recommendation> {
    let mut merged = dedup_by_book(primary.into_iter().chain(secondary));
    merged.truncate(limit);
    merged
}
