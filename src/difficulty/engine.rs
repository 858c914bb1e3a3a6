use serde::{Deserialize, Serialize};

use crate::config::DifficultyConfig;
use crate::error::Result;
use crate::store::LearnerStore;
use crate::types::DifficultyAdjustmentResult;

use super::adjustment::DifficultyCalculator;

/// One learner/category pair to compute a next difficulty for.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DifficultyRequest {
    pub learner_id: String,
    pub category: String,
    pub current_difficulty: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    /// Overrides the configured lookback window.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lookback_questions: Option<usize>,
    #[serde(default = "default_true")]
    pub consider_time: bool,
    #[serde(default = "default_true")]
    pub consider_hints: bool,
}

fn default_true() -> bool {
    true
}

impl DifficultyRequest {
    pub fn new(
        learner_id: impl Into<String>,
        category: impl Into<String>,
        current_difficulty: u8,
    ) -> Self {
        Self {
            learner_id: learner_id.into(),
            category: category.into(),
            current_difficulty,
            session_id: None,
            lookback_questions: None,
            consider_time: true,
            consider_hints: true,
        }
    }

    pub fn in_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }
}

/// Per-item result of a batch run. Exactly one of `result` / `error` is set.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchOutcome {
    pub learner_id: String,
    pub category: String,
    pub success: bool,
    #[serde(flatten)]
    pub result: Option<DifficultyAdjustmentResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Store-backed difficulty decisions.
#[derive(Debug, Clone, Default)]
pub struct AdaptiveDifficultyEngine {
    calculator: DifficultyCalculator,
}

impl AdaptiveDifficultyEngine {
    pub fn new(config: DifficultyConfig) -> Self {
        Self {
            calculator: DifficultyCalculator::new(config),
        }
    }

    pub fn calculator(&self) -> &DifficultyCalculator {
        &self.calculator
    }

    pub fn next_difficulty<S: LearnerStore + ?Sized>(
        &self,
        store: &S,
        request: &DifficultyRequest,
    ) -> Result<DifficultyAdjustmentResult> {
        let learner = store.learner(&request.learner_id)?;
        let lookback = request
            .lookback_questions
            .unwrap_or(self.calculator.config().lookback_questions);
        let recent = store.recent_answers(
            &request.learner_id,
            &request.category,
            lookback,
            request.session_id.as_deref(),
        )?;

        let metrics =
            self.calculator
                .performance_metrics(&recent, request.consider_time, request.consider_hints);

        self.calculator.calculate_next_difficulty(
            &metrics,
            learner.mastery(&request.category),
            learner.learning_velocity,
            request.current_difficulty,
            learner.difficulty_preference,
        )
    }

    /// Runs each request independently; a failing item is reported in place
    /// and never aborts the rest.
    pub fn batch_next_difficulty<S: LearnerStore + ?Sized>(
        &self,
        store: &S,
        requests: &[DifficultyRequest],
    ) -> Vec<BatchOutcome> {
        requests
            .iter()
            .map(|request| match self.next_difficulty(store, request) {
                Ok(result) => BatchOutcome {
                    learner_id: request.learner_id.clone(),
                    category: request.category.clone(),
                    success: true,
                    result: Some(result),
                    error: None,
                },
                Err(err) => {
                    tracing::warn!(
                        learner_id = %request.learner_id,
                        category = %request.category,
                        error = %err,
                        "batch difficulty item failed"
                    );
                    BatchOutcome {
                        learner_id: request.learner_id.clone(),
                        category: request.category.clone(),
                        success: false,
                        result: None,
                        error: Some(err.to_string()),
                    }
                }
            })
            .collect()
    }
}
