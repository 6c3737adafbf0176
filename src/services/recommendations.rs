use chrono::{Datelike, Utc};
use std::sync::Arc;
use std::time::Duration;

use crate::{
    db::CatalogStore,
    error::{AppError, AppResult},
    models::{BookId, GenreId, PlatformStats, Recommendation, UserId, UserProfile},
    services::{
        ai::{self, AiRequest, AiSeed, AiSuggestion, AiUnavailable, RecommendationAi},
        catalog, collaborative, content, merge, profile,
        trending::{self, TrendingContext},
    },
};

/// Tunables for [`RecommendationEngine`]
#[derive(Debug, Clone, PartialEq)]
pub struct EngineSettings {
    /// Deadline for one AI call
    pub ai_timeout: Duration,
    pub trending_window_days: i64,
    /// How many catalog books are offered to the AI to choose from
    pub ai_candidate_pool: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            ai_timeout: Duration::from_secs(8),
            trending_window_days: trending::DEFAULT_WINDOW_DAYS,
            ai_candidate_pool: 50,
        }
    }
}

/// Why the personalized path was abandoned for the trending fallback
#[derive(Debug, thiserror::Error)]
enum PersonalizationError {
    #[error(transparent)]
    Ai(#[from] AiUnavailable),

    #[error("profile lookup failed: {0}")]
    Store(#[from] AppError),
}

/// Composes the scorers over an injected store and AI collaborator
#[derive(Clone)]
pub struct RecommendationEngine {
    store: Arc<dyn CatalogStore>,
    ai: Arc<dyn RecommendationAi>,
    settings: EngineSettings,
}

impl RecommendationEngine {
    pub fn new(
        store: Arc<dyn CatalogStore>,
        ai: Arc<dyn RecommendationAi>,
        settings: EngineSettings,
    ) -> Self {
        Self {
            store,
            ai,
            settings,
        }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub async fn user_profile(&self, user_id: UserId) -> AppResult<UserProfile> {
        profile::build_profile(self.store.as_ref(), user_id).await
    }

    pub async fn collaborative(&self, user_id: UserId, limit: usize) -> Vec<Recommendation> {
        collaborative::recommend(self.store.as_ref(), user_id, limit).await
    }

    pub async fn similar_books(
        &self,
        book_id: BookId,
        limit: usize,
    ) -> AppResult<Vec<Recommendation>> {
        content::similar_books(self.store.as_ref(), book_id, limit).await
    }

    pub async fn trending(&self, limit: usize) -> AppResult<Vec<Recommendation>> {
        self.trending_in_context(limit, TrendingContext::Platform).await
    }

    pub async fn trending_for_book(&self, limit: usize) -> AppResult<Vec<Recommendation>> {
        self.trending_in_context(limit, TrendingContext::Book).await
    }

    async fn trending_in_context(
        &self,
        limit: usize,
        context: TrendingContext,
    ) -> AppResult<Vec<Recommendation>> {
        trending::trending(
            self.store.as_ref(),
            Utc::now(),
            self.settings.trending_window_days,
            limit,
            context,
        )
        .await
        .inspect_err(|e| tracing::error!(error = %e, "Trending query failed"))
    }

    pub async fn by_genre(
        &self,
        genre_id: GenreId,
        limit: usize,
    ) -> AppResult<Vec<Recommendation>> {
        catalog::popular_in_genre(self.store.as_ref(), genre_id, limit).await
    }

    pub async fn new_releases(&self, limit: usize) -> AppResult<Vec<Recommendation>> {
        catalog::new_releases(self.store.as_ref(), Utc::now().year(), limit).await
    }

    /// Personalized list: AI picks first, then collaborative picks
    ///
    /// Takes `ceil(limit * 0.6)` AI picks and `ceil(limit * 0.4)`
    /// collaborative picks, dedups by book and truncates to `limit`. If the
    /// AI path fails for any reason the whole list is the trending list.
    pub async fn generate_recommendations(
        &self,
        user_id: UserId,
        limit: usize,
    ) -> AppResult<Vec<Recommendation>> {
        let (ai_count, collaborative_count) = merge::split_limit(limit);

        match self.ai_picks(user_id, ai_count).await {
            Ok(ai_picks) => {
                let peer_picks = self.collaborative(user_id, collaborative_count).await;
                tracing::info!(
                    user_id,
                    ai = ai_picks.len(),
                    collaborative = peer_picks.len(),
                    "Blending personalized recommendations"
                );
                Ok(merge::blend(ai_picks, peer_picks, limit))
            }
            Err(PersonalizationError::Store(e)) => {
                tracing::error!(
                    user_id,
                    error = %e,
                    "Reading history query failed, using trending"
                );
                self.trending(limit).await
            }
            Err(PersonalizationError::Ai(e)) => {
                tracing::warn!(
                    user_id,
                    error = %e,
                    "Personalized recommendations unavailable, using trending"
                );
                self.trending(limit).await
            }
        }
    }

    async fn ai_picks(
        &self,
        user_id: UserId,
        wanted: usize,
    ) -> Result<Vec<Recommendation>, PersonalizationError> {
        let profile = self.user_profile(user_id).await?;
        let excluded: Vec<BookId> = profile.excluded_book_ids.iter().copied().collect();
        let candidates = self
            .store
            .candidate_pool(&excluded, self.settings.ai_candidate_pool)
            .await?;

        let request = AiRequest {
            seed: AiSeed::Reader(profile),
            candidates,
            wanted,
        };
        let suggestion = self.ask_ai(&request).await?;
        Ok(ai::select_suggested(&request, &suggestion))
    }

    /// AI picks for readers of `book_id`, trending on AI failure
    pub async fn ai_recommendations_for_book(
        &self,
        book_id: BookId,
        limit: usize,
    ) -> AppResult<Vec<Recommendation>> {
        let book = self
            .store
            .find_book(book_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Book {} not found", book_id)))?;
        let candidates = self
            .store
            .candidate_pool(&[book_id], self.settings.ai_candidate_pool)
            .await?;

        let request = AiRequest {
            seed: AiSeed::Book(book),
            candidates,
            wanted: limit,
        };

        match self.ask_ai(&request).await {
            Ok(suggestion) => Ok(ai::select_suggested(&request, &suggestion)),
            Err(e) => {
                tracing::warn!(book_id, error = %e, "AI unavailable, using trending");
                self.trending_for_book(limit).await
            }
        }
    }

    async fn ask_ai(&self, request: &AiRequest) -> Result<AiSuggestion, AiUnavailable> {
        let deadline = self.settings.ai_timeout;
        tokio::time::timeout(deadline, self.ai.suggest(request))
            .await
            .map_err(|_| AiUnavailable::Timeout(deadline))?
    }

    /// Entity counts, queried concurrently
    pub async fn platform_stats(&self) -> AppResult<PlatformStats> {
        let store = self.store.as_ref();
        let (total_books, total_reviews, total_users, total_genres) = tokio::try_join!(
            store.count_books(),
            store.count_reviews(),
            store.count_users(),
            store.count_genres()
        )?;

        Ok(PlatformStats {
            total_books,
            total_reviews,
            total_users,
            total_genres,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{InMemoryCatalog, NewBook};
    use crate::models::{BookRecord, FavoriteBook, PeerReview, RecentActivity, UserReview};
    use crate::services::ai::{DisabledAi, MockRecommendationAi};
    use chrono::{DateTime, Duration as ChronoDuration};
    use std::collections::HashSet;

    fn ids(recs: &[Recommendation]) -> Vec<BookId> {
        recs.iter().map(|r| r.id).collect()
    }

    fn engine(
        catalog: Arc<InMemoryCatalog>,
        ai: Arc<dyn RecommendationAi>,
    ) -> RecommendationEngine {
        RecommendationEngine::new(catalog, ai, EngineSettings::default())
    }

    /// Readers 1..=3 with overlapping taste over ten books, all reviewed recently
    async fn seeded_catalog() -> (Arc<InMemoryCatalog>, Vec<BookId>) {
        let catalog = Arc::new(InMemoryCatalog::new());
        let fantasy = catalog.add_genre("Fantasy").await.unwrap();
        let mut books = Vec::new();
        for i in 0..10 {
            let book = NewBook::new(format!("Book {}", i), format!("Author {}", i % 3))
                .genres(&[fantasy]);
            let id = catalog.add_book(book).await.unwrap();
            books.push(id);
        }

        let now = Utc::now();
        // reader 1: books 0, 1, 2; favorite 3
        for &b in &books[0..3] {
            catalog.add_review(1, b, 5, now).await.unwrap();
        }
        catalog.add_favorite(1, books[3]).await.unwrap();
        // reader 2 shares 0, 1, 2 and loves 4, 5, 3
        for &b in &books[0..3] {
            catalog.add_review(2, b, 4, now).await.unwrap();
        }
        catalog.add_review(2, books[4], 5, now).await.unwrap();
        catalog.add_review(2, books[5], 4, now).await.unwrap();
        catalog.add_review(2, books[3], 5, now).await.unwrap();
        // reader 3 shares only 0
        catalog.add_review(3, books[0], 3, now).await.unwrap();
        catalog.add_review(3, books[6], 5, now).await.unwrap();

        (catalog, books)
    }

    #[tokio::test]
    async fn test_ai_failure_falls_back_to_trending() {
        let (catalog, _) = seeded_catalog().await;

        let mut ai = MockRecommendationAi::new();
        ai.expect_suggest().times(1).returning(|_| {
            Err(AiUnavailable::Status {
                status: 503,
                body: "overloaded".to_string(),
            })
        });
        let engine = engine(catalog, Arc::new(ai));

        let personalized = engine.generate_recommendations(1, 5).await.unwrap();
        let trending = engine.trending(5).await.unwrap();
        assert_eq!(personalized, trending);
        assert!(personalized.iter().all(|r| r.reason == "Trending recently"));
    }

    #[tokio::test]
    async fn test_ai_success_blends_with_collaborative() {
        let (catalog, books) = seeded_catalog().await;
        let (b7, b8) = (books[7], books[8]);

        let mut ai = MockRecommendationAi::new();
        ai.expect_suggest()
            .withf(|request| request.wanted == 3)
            .times(1)
            .returning(move |_| {
                Ok(AiSuggestion {
                    book_ids: vec![b7, b8],
                    explanation: "Fellow fantasy fans".to_string(),
                })
            });
        let engine = engine(catalog, Arc::new(ai));

        let recs = engine.generate_recommendations(1, 5).await.unwrap();
        // AI picks first, then reader 2's endorsements (book 3 is a favorite, excluded)
        assert_eq!(ids(&recs), vec![b7, b8, books[4], books[5]]);
        assert_eq!(recs[0].reason, "Fellow fantasy fans");
        assert_eq!(recs[2].reason, collaborative::REASON);
    }

    #[tokio::test]
    async fn test_merged_results_never_include_known_books() {
        let (catalog, books) = seeded_catalog().await;
        let known: HashSet<BookId> = books[0..4].iter().copied().collect();
        let suggested = books.clone();

        let mut ai = MockRecommendationAi::new();
        ai.expect_suggest().returning(move |_| {
            Ok(AiSuggestion {
                book_ids: suggested.clone(),
                explanation: String::new(),
            })
        });
        let engine = engine(catalog, Arc::new(ai));

        let recs = engine.generate_recommendations(1, 10).await.unwrap();
        assert!(!recs.is_empty());
        assert!(recs.iter().all(|r| !known.contains(&r.id)));

        let peer = engine.collaborative(1, 10).await;
        assert!(peer.iter().all(|r| !known.contains(&r.id)));
    }

    #[tokio::test]
    async fn test_limit_truncation_keeps_concatenation_order() {
        let (catalog, books) = seeded_catalog().await;
        let suggested: Vec<BookId> = books[6..10].to_vec();

        let mut ai = MockRecommendationAi::new();
        ai.expect_suggest().returning(move |_| {
            Ok(AiSuggestion {
                book_ids: suggested.clone(),
                explanation: String::new(),
            })
        });
        let engine = engine(catalog, Arc::new(ai));

        // limit 3 -> 2 AI picks + 2 collaborative picks, truncated to 3
        let recs = engine.generate_recommendations(1, 3).await.unwrap();
        assert_eq!(recs.len(), 3);
        assert_eq!(ids(&recs), vec![books[6], books[7], books[4]]);
        assert_eq!(recs[2].reason, collaborative::REASON);
    }

    struct SlowAi;

    #[async_trait::async_trait]
    impl RecommendationAi for SlowAi {
        async fn suggest(&self, _request: &AiRequest) -> Result<AiSuggestion, AiUnavailable> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(AiSuggestion {
                book_ids: Vec::new(),
                explanation: String::new(),
            })
        }
    }

    #[tokio::test]
    async fn test_slow_ai_is_treated_as_unavailable() {
        let (catalog, _) = seeded_catalog().await;
        let settings = EngineSettings {
            ai_timeout: Duration::from_millis(20),
            ..EngineSettings::default()
        };
        let engine = RecommendationEngine::new(catalog, Arc::new(SlowAi), settings);

        let recs = engine.generate_recommendations(1, 4).await.unwrap();
        assert_eq!(recs, engine.trending(4).await.unwrap());
    }

    #[tokio::test]
    async fn test_collaborative_overlap_scales_with_history() {
        let catalog = Arc::new(InMemoryCatalog::new());
        let mut books = Vec::new();
        for i in 0..5 {
            books.push(
                catalog
                    .add_book(NewBook::new(format!("Book {}", i), "Author"))
                    .await
                    .unwrap(),
            );
        }
        let now = Utc::now();
        // reader 1 reviewed only two books
        catalog.add_review(1, books[0], 4, now).await.unwrap();
        catalog.add_review(1, books[1], 5, now).await.unwrap();
        // reader 2 overlaps on both
        catalog.add_review(2, books[0], 4, now).await.unwrap();
        catalog.add_review(2, books[1], 4, now).await.unwrap();
        catalog.add_review(2, books[2], 5, now).await.unwrap();
        // reader 3 overlaps on one
        catalog.add_review(3, books[0], 4, now).await.unwrap();
        catalog.add_review(3, books[3], 5, now).await.unwrap();

        let engine = engine(catalog, Arc::new(DisabledAi));
        let recs = engine.collaborative(1, 10).await;
        assert_eq!(ids(&recs), vec![books[2]]);
        assert_eq!(recs[0].confidence, collaborative::CONFIDENCE);

        assert!(engine.collaborative(99, 10).await.is_empty());
    }

    #[tokio::test]
    async fn test_trending_window_orders_by_total_reviews() {
        let catalog = Arc::new(InMemoryCatalog::new());
        let b1 = catalog.add_book(NewBook::new("B1", "A")).await.unwrap();
        let b2 = catalog.add_book(NewBook::new("B2", "A")).await.unwrap();
        let now = Utc::now();
        let old = now - ChronoDuration::days(60);
        let recent = now - ChronoDuration::days(3);

        for user in 0..10 {
            let at = if user < 8 { recent } else { old };
            catalog.add_review(100 + user, b1, 4, at).await.unwrap();
        }
        for user in 0..15 {
            let at = if user < 2 { recent } else { old };
            catalog.add_review(200 + user, b2, 4, at).await.unwrap();
        }

        let engine = engine(catalog, Arc::new(DisabledAi));
        let recs = engine.trending(10).await.unwrap();
        assert_eq!(ids(&recs), vec![b2, b1]);
        assert!(recs[1].trending_score.unwrap() > recs[0].trending_score.unwrap());
        assert_eq!(recs[0].total_reviews, 15);
    }

    #[tokio::test]
    async fn test_similar_books_edge_cases() {
        let catalog = Arc::new(InMemoryCatalog::new());
        let horror = catalog.add_genre("Horror").await.unwrap();
        let now = Utc::now();
        let untagged = catalog.add_book(NewBook::new("Plain", "A")).await.unwrap();
        let king = |title: &str, age_days: i64| {
            NewBook::new(title, "King")
                .genres(&[horror])
                .added_at(now - ChronoDuration::days(age_days))
        };
        let seed = catalog.add_book(king("It", 9)).await.unwrap();
        let older = catalog.add_book(king("Carrie", 5)).await.unwrap();
        let newer = catalog.add_book(king("Misery", 0)).await.unwrap();

        let engine = engine(catalog, Arc::new(DisabledAi));
        assert!(engine.similar_books(untagged, 5).await.unwrap().is_empty());
        assert!(engine.similar_books(999, 5).await.unwrap().is_empty());

        let recs = engine.similar_books(seed, 5).await.unwrap();
        assert_eq!(ids(&recs), vec![newer, older]);
        assert!(recs.iter().all(|r| r.reason == content::REASON));
    }

    #[tokio::test]
    async fn test_ai_for_book_falls_back_with_book_reason() {
        let (catalog, books) = seeded_catalog().await;
        let engine = engine(catalog, Arc::new(DisabledAi));

        let recs = engine.ai_recommendations_for_book(books[0], 3).await.unwrap();
        assert_eq!(recs.len(), 3);
        assert!(recs
            .iter()
            .all(|r| r.reason == "Trending based on recent reviews"));

        let missing = engine.ai_recommendations_for_book(999, 3).await;
        assert!(matches!(missing, Err(AppError::NotFound(_))));
    }

    /// Catalog whose reading-history queries always fail
    struct BrokenHistory(Arc<InMemoryCatalog>);

    #[async_trait::async_trait]
    impl CatalogStore for BrokenHistory {
        async fn user_reviews(&self, _user_id: UserId) -> AppResult<Vec<UserReview>> {
            Err(AppError::Internal("reviews unavailable".to_string()))
        }

        async fn user_favorites(&self, _user_id: UserId) -> AppResult<Vec<FavoriteBook>> {
            Err(AppError::Internal("favorites unavailable".to_string()))
        }

        async fn reviews_of_books(
            &self,
            book_ids: &[BookId],
            exclude_user: UserId,
        ) -> AppResult<Vec<PeerReview>> {
            self.0.reviews_of_books(book_ids, exclude_user).await
        }

        async fn reviews_by_users(&self, user_ids: &[UserId]) -> AppResult<Vec<PeerReview>> {
            self.0.reviews_by_users(user_ids).await
        }

        async fn books_by_ids(&self, book_ids: &[BookId]) -> AppResult<Vec<BookRecord>> {
            self.0.books_by_ids(book_ids).await
        }

        async fn find_book(&self, book_id: BookId) -> AppResult<Option<BookRecord>> {
            self.0.find_book(book_id).await
        }

        async fn book_genre_ids(&self, book_id: BookId) -> AppResult<Option<Vec<GenreId>>> {
            self.0.book_genre_ids(book_id).await
        }

        async fn books_sharing_genres(
            &self,
            genre_ids: &[GenreId],
            exclude_book: BookId,
        ) -> AppResult<Vec<BookRecord>> {
            self.0.books_sharing_genres(genre_ids, exclude_book).await
        }

        async fn recent_review_counts(
            &self,
            since: DateTime<Utc>,
        ) -> AppResult<Vec<RecentActivity>> {
            self.0.recent_review_counts(since).await
        }

        async fn books_in_genre(&self, genre_id: GenreId) -> AppResult<Vec<BookRecord>> {
            self.0.books_in_genre(genre_id).await
        }

        async fn books_published_since(&self, year: i32) -> AppResult<Vec<BookRecord>> {
            self.0.books_published_since(year).await
        }

        async fn candidate_pool(
            &self,
            exclude: &[BookId],
            limit: usize,
        ) -> AppResult<Vec<BookRecord>> {
            self.0.candidate_pool(exclude, limit).await
        }

        async fn count_books(&self) -> AppResult<i64> {
            self.0.count_books().await
        }

        async fn count_reviews(&self) -> AppResult<i64> {
            self.0.count_reviews().await
        }

        async fn count_users(&self) -> AppResult<i64> {
            self.0.count_users().await
        }

        async fn count_genres(&self) -> AppResult<i64> {
            self.0.count_genres().await
        }
    }

    #[tokio::test]
    async fn test_history_failure_is_a_store_error_and_falls_back() {
        let (catalog, _) = seeded_catalog().await;
        let reference = engine(catalog.clone(), Arc::new(DisabledAi));

        let mut ai = MockRecommendationAi::new();
        ai.expect_suggest().never();
        let engine = RecommendationEngine::new(
            Arc::new(BrokenHistory(catalog)),
            Arc::new(ai),
            EngineSettings::default(),
        );

        let picks = engine.ai_picks(1, 3).await;
        assert!(matches!(picks, Err(PersonalizationError::Store(_))));

        let personalized = engine.generate_recommendations(1, 4).await.unwrap();
        assert_eq!(personalized, reference.trending(4).await.unwrap());
    }

    #[tokio::test]
    async fn test_ai_failure_is_classified_as_ai() {
        let (catalog, _) = seeded_catalog().await;
        let engine = engine(catalog, Arc::new(DisabledAi));
        let picks = engine.ai_picks(1, 3).await;
        assert!(matches!(
            picks,
            Err(PersonalizationError::Ai(AiUnavailable::NotConfigured))
        ));
    }

    #[tokio::test]
    async fn test_platform_stats() {
        let (catalog, _) = seeded_catalog().await;
        let engine = engine(catalog, Arc::new(DisabledAi));
        let stats = engine.platform_stats().await.unwrap();
        assert_eq!(
            stats,
            PlatformStats {
                total_books: 10,
                total_reviews: 11,
                total_users: 3,
                total_genres: 1,
            }
        );
    }
}
