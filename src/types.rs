use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One answered question, supplied by the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerEvent {
    pub correct: bool,
    pub time_spent_seconds: f64,
    pub hints_used: u32,
    pub category: String,
    pub difficulty: u8,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

impl AnswerEvent {
    pub fn new(
        category: impl Into<String>,
        correct: bool,
        time_spent_seconds: f64,
        difficulty: u8,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            correct,
            time_spent_seconds,
            hints_used: 0,
            category: category.into(),
            difficulty,
            timestamp,
            session_id: None,
        }
    }

    pub fn with_hints(mut self, hints_used: u32) -> Self {
        self.hints_used = hints_used;
        self
    }

    pub fn in_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }
}

/// Rolling mastery of one learner in one category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryMastery {
    /// Composite score 0-100.
    pub level: u8,
    /// 0-1, grows with accuracy and experience.
    pub confidence: f64,
    pub questions_answered: u32,
    pub average_accuracy: f64,
    pub average_time_per_question: f64,
    pub streak_count: u32,
    pub last_assessed: DateTime<Utc>,
}

impl CategoryMastery {
    /// Zeroed record used for the first answer in a category.
    pub fn empty(now: DateTime<Utc>) -> Self {
        Self {
            level: 0,
            confidence: 0.0,
            questions_answered: 0,
            average_accuracy: 0.0,
            average_time_per_question: 0.0,
            streak_count: 0,
            last_assessed: now,
        }
    }
}

pub const DEFAULT_DIFFICULTY_PREFERENCE: u8 = 5;
pub const DEFAULT_LEARNING_VELOCITY: f64 = 1.0;

/// Learner profile; owns its per-category mastery records.
///
/// `category_mastery` has no ordering contract. Code that needs a stable order
/// sorts explicitly.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Learner {
    pub id: String,
    pub difficulty_preference: u8,
    pub learning_velocity: f64,
    pub overall_accuracy: f64,
    pub current_streak: u32,
    pub longest_streak: u32,
    pub total_questions_answered: u32,
    pub total_time_spent: f64,
    pub last_active: DateTime<Utc>,
    #[serde(default)]
    pub category_mastery: HashMap<String, CategoryMastery>,
}

impl Learner {
    pub fn new(id: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            difficulty_preference: DEFAULT_DIFFICULTY_PREFERENCE,
            learning_velocity: DEFAULT_LEARNING_VELOCITY,
            overall_accuracy: 0.0,
            current_streak: 0,
            longest_streak: 0,
            total_questions_answered: 0,
            total_time_spent: 0.0,
            last_active: now,
            category_mastery: HashMap::new(),
        }
    }

    pub fn with_preference(mut self, difficulty_preference: u8) -> Self {
        self.difficulty_preference = difficulty_preference;
        self
    }

    pub fn with_velocity(mut self, learning_velocity: f64) -> Self {
        self.learning_velocity = learning_velocity;
        self
    }

    pub fn mastery(&self, category: &str) -> Option<&CategoryMastery> {
        self.category_mastery.get(category)
    }
}

/// Aggregate over a bounded window of recent answers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceMetrics {
    pub accuracy: f64,
    pub average_time_spent: f64,
    pub average_hints_used: f64,
    /// Positive for a run of correct answers, negative for incorrect ones.
    pub streak: i32,
    /// 0-1, higher is faster.
    pub time_efficiency: f64,
    /// 1 minus the variance of the correctness sequence.
    pub consistency_score: f64,
    pub total_questions: usize,
}

/// How strongly existing category mastery pushes the difficulty up.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MasteryInfluence {
    /// Mastery level normalized to 0-1.
    pub mastery_level: f64,
    pub confidence: f64,
    pub influence: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DifficultyAdjustmentResult {
    pub new_difficulty: u8,
    pub previous_difficulty: u8,
    /// Clamped adjustment before rounding; informational.
    pub adjustment: f64,
    pub reasoning: String,
    pub confidence: f64,
    /// `None` when the insufficient-data fallback produced the result.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub performance_metrics: Option<PerformanceMetrics>,
}

/// Candidate question as seen by the set composer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: String,
    pub categories: Vec<String>,
    pub difficulty: u8,
    #[serde(default)]
    pub times_used: u32,
    pub created_at: DateTime<Utc>,
}

impl Question {
    pub fn in_category(&self, category: &str) -> bool {
        self.categories.iter().any(|c| c == category)
    }
}
