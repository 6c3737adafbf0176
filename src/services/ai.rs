//! External language-model collaborator for personalized picks.
//!
//! The model only ever chooses from a menu of catalog books it is given,
//! and every failure surfaces as [`AiUnavailable`] so callers can fall back
//! without inspecting transport details.

use reqwest::Client as HttpClient;
use serde::Deserialize;
use serde_json::json;
use std::collections::HashSet;
use std::fmt::Write;
use std::time::Duration;

use crate::{
    error::AppResult,
    models::{BookId, BookRecord, Recommendation, UserProfile},
};

pub const AI_CONFIDENCE: f64 = 0.9;
pub const DEFAULT_AI_REASON: &str = "Personalized pick based on your reading history";

const SYSTEM_PROMPT: &str = "You are a book recommendation assistant. \
Only recommend books from the provided catalog list, referring to them by id. \
Respond with a JSON object of the form {\"bookIds\": [<id>, ...], \"explanation\": \"<one sentence>\"}.";

/// Why the AI could not be used for this request
#[derive(Debug, thiserror::Error)]
pub enum AiUnavailable {
    #[error("AI provider is not configured")]
    NotConfigured,

    #[error("AI call timed out after {0:?}")]
    Timeout(Duration),

    #[error("AI transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("AI provider returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Malformed AI response: {0}")]
    Malformed(String),
}

/// Whose taste the suggestion should match
#[derive(Debug, Clone, PartialEq)]
pub enum AiSeed {
    Reader(UserProfile),
    Book(BookRecord),
}

#[derive(Debug, Clone, PartialEq)]
pub struct AiRequest {
    pub seed: AiSeed,
    /// Books the model may choose from
    pub candidates: Vec<BookRecord>,
    pub wanted: usize,
}

impl AiRequest {
    /// Whether `book_id` may be recommended for this seed
    pub fn allows(&self, book_id: BookId) -> bool {
        match &self.seed {
            AiSeed::Reader(profile) => !profile.excludes(book_id),
            AiSeed::Book(book) => book.id != book_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiSuggestion {
    pub book_ids: Vec<BookId>,
    #[serde(default)]
    pub explanation: String,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait RecommendationAi: Send + Sync {
    async fn suggest(&self, request: &AiRequest) -> Result<AiSuggestion, AiUnavailable>;
}

/// Stand-in used when no API key is configured
pub struct DisabledAi;

#[async_trait::async_trait]
impl RecommendationAi for DisabledAi {
    async fn suggest(&self, _request: &AiRequest) -> Result<AiSuggestion, AiUnavailable> {
        Err(AiUnavailable::NotConfigured)
    }
}

/// OpenAI-compatible chat-completion client
#[derive(Clone)]
pub struct ChatCompletionAi {
    http_client: HttpClient,
    api_key: String,
    api_url: String,
    model: String,
}

impl ChatCompletionAi {
    pub fn new(
        api_key: String,
        api_url: String,
        model: String,
        timeout: Duration,
    ) -> AppResult<Self> {
        let http_client = HttpClient::builder().timeout(timeout).build()?;
        Ok(Self {
            http_client,
            api_key,
            api_url,
            model,
        })
    }
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

#[async_trait::async_trait]
impl RecommendationAi for ChatCompletionAi {
    async fn suggest(&self, request: &AiRequest) -> Result<AiSuggestion, AiUnavailable> {
        let url = format!("{}/chat/completions", self.api_url.trim_end_matches('/'));
        let body = json!({
            "model": self.model,
            "temperature": 0.7,
            "response_format": { "type": "json_object" },
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": build_prompt(request) },
            ],
        });

        tracing::debug!(
            model = %self.model,
            candidates = request.candidates.len(),
            wanted = request.wanted,
            "Requesting AI recommendations"
        );

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(AiUnavailable::Status { status, body });
        }

        let chat: ChatResponse = response.json().await?;
        let content = chat
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| AiUnavailable::Malformed("response has no content".to_string()))?;

        parse_suggestion(&content)
    }
}

/// Renders the user prompt: the seed's taste followed by the candidate menu
pub fn build_prompt(request: &AiRequest) -> String {
    let mut prompt = String::new();

    match &request.seed {
        AiSeed::Reader(profile) => {
            let _ = writeln!(
                prompt,
                "A reader who rates books {:.1}/5 on average.",
                profile.average_rating_given
            );
            if !profile.preferred_genres.is_empty() {
                let _ = writeln!(
                    prompt,
                    "Favorite genres: {}.",
                    profile.preferred_genres.join(", ")
                );
            }
            if !profile.preferred_authors.is_empty() {
                let _ = writeln!(
                    prompt,
                    "Favorite authors: {}.",
                    profile.preferred_authors.join(", ")
                );
            }
        }
        AiSeed::Book(book) => {
            let _ = writeln!(
                prompt,
                "A reader who enjoyed \"{}\" by {} ({}).",
                book.title,
                book.author,
                book.genres.join(", ")
            );
        }
    }

    let _ = writeln!(
        prompt,
        "Pick the {} best matches from this catalog (id | title | author | genres | rating):",
        request.wanted
    );
    for book in &request.candidates {
        let _ = writeln!(
            prompt,
            "{} | {} | {} | {} | {:.1}",
            book.id,
            book.title,
            book.author,
            book.genres.join(", "),
            book.average_rating()
        );
    }

    prompt
}

/// Parses the model's JSON answer, tolerating code fences and surrounding prose
pub fn parse_suggestion(content: &str) -> Result<AiSuggestion, AiUnavailable> {
    let start = content.find('{');
    let end = content.rfind('}');
    let json = match (start, end) {
        (Some(start), Some(end)) if start < end => &content[start..=end],
        _ => {
            return Err(AiUnavailable::Malformed(
                "no JSON object in response".to_string(),
            ))
        }
    };

    serde_json::from_str(json).map_err(|e| AiUnavailable::Malformed(e.to_string()))
}

/// Maps suggested ids onto the candidate menu, in the model's order
///
/// Unknown, disallowed and repeated ids are dropped.
pub fn select_suggested(request: &AiRequest, suggestion: &AiSuggestion) -> Vec<Recommendation> {
    let explanation = suggestion.explanation.trim();
    let reason = if explanation.is_empty() {
        DEFAULT_AI_REASON
    } else {
        explanation
    };

    let mut seen = HashSet::new();
    suggestion
        .book_ids
        .iter()
        .filter(|id| request.allows(**id) && seen.insert(**id))
        .filter_map(|id| request.candidates.iter().find(|b| b.id == *id))
        .take(request.wanted)
        .map(|book| Recommendation::from_book(book, reason, AI_CONFIDENCE))
        .collect()
}
