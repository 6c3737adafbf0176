pub mod ai;
pub mod catalog;
pub mod collaborative;
pub mod content;
pub mod merge;
pub mod profile;
pub mod rating;
pub mod recommendations;
pub mod trending;

pub use ai::{AiUnavailable, ChatCompletionAi, DisabledAi, RecommendationAi};
pub use recommendations::{EngineSettings, RecommendationEngine};
