// Bridge module - read-side views of the grid for external services
// Seed extraction, skyline encoding, composition and prediction contracts

pub mod compose;
pub mod predict;
pub mod seed;
pub mod skyline;

pub use compose::{CompositionRequest, parse_composition_response};
pub use predict::{
    DEFAULT_TEMPERATURE, DEFAULT_TOP_P, PredictionRequest, PredictionResponse, sample_top_p,
    suggestion_from_token,
};
pub use seed::{continuation_point, extract_events};
pub use skyline::{Token, skyline_tokens, token_ids};

/// Errors raised when a service reply cannot be used
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("Response contains no JSON object")]
    NoJson,

    #[error("Malformed response: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid event {index}: {reason}")]
    InvalidEvent { index: usize, reason: String },

    #[error("Prediction response has no logits")]
    EmptyLogits,

    #[error("Expected {expected} logits, got {found}")]
    VocabularyMismatch { expected: usize, found: usize },

    #[error("Logit {0} is not finite")]
    NonFiniteLogit(usize),

    #[error("Service call failed: {0}")]
    Service(String),
}
