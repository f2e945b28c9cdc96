//! Error types for Synheart Stress

use thiserror::Error;

/// Errors that can occur while training, scoring, or evaluating
#[derive(Debug, Error)]
pub enum StressError {
    #[error("Feature vector has wrong arity: expected {expected} features, got {got}")]
    SchemaMismatch { expected: usize, got: usize },

    #[error("Missing required feature: {0}")]
    MissingFeature(String),

    #[error("Unknown feature: {0}")]
    UnknownFeature(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Sampling error: {0}")]
    Sampling(String),

    #[error("Training failed: {0}")]
    TrainingFailure(String),

    #[error("Scoring failed: {0}")]
    ScoringFailure(String),

    #[error("Evaluation failed: {0}")]
    EvaluationFailure(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl StressError {
    /// Whether the error is a rejected request (caller supplied the wrong fields)
    pub fn is_schema_error(&self) -> bool {
        matches!(
            self,
            StressError::SchemaMismatch { .. }
                | StressError::MissingFeature(_)
                | StressError::UnknownFeature(_)
        )
    }
}
