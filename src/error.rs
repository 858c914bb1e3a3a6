use thiserror::Error;

/// Errors surfaced by the engine to its caller.
///
/// "Insufficient data" and "category not yet tracked" are not errors: they
/// produce low-confidence results instead.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EngineError {
    /// Referenced learner, question, card or category record is absent.
    #[error("not found: {0}")]
    NotFound(String),

    /// Contract violation detected before any computation ran.
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl EngineError {
    pub fn learner_not_found(learner_id: &str) -> Self {
        Self::NotFound(format!("learner {learner_id}"))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
