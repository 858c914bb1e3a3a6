use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MasteryConfig {
    pub accuracy_weight: f64,
    pub streak_points: f64,
    pub max_consistency_points: f64,
    pub max_speed_points: f64,
    /// Seconds of average answer time that cost one speed point.
    pub seconds_per_speed_point: f64,
    /// Answers needed before confidence stops being discounted.
    pub full_confidence_answers: u32,
    pub weak_threshold: u8,
    pub strong_threshold: u8,
}

impl Default for MasteryConfig {
    fn default() -> Self {
        Self {
            accuracy_weight: 60.0,
            streak_points: 2.0,
            max_consistency_points: 25.0,
            max_speed_points: 15.0,
            seconds_per_speed_point: 10.0,
            full_confidence_answers: 20,
            weak_threshold: 60,
            strong_threshold: 80,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DifficultyConfig {
    pub high_accuracy_threshold: f64,
    pub low_accuracy_threshold: f64,
    pub very_high_accuracy_threshold: f64,
    pub very_low_accuracy_threshold: f64,
    pub min_questions_for_adjustment: usize,
    pub max_difficulty_change: f64,
    pub fast_answer_threshold: f64,
    pub slow_answer_threshold: f64,
    pub streak_bonus_threshold: i32,
    pub streak_penalty_threshold: i32,
    pub mastery_influence_factor: f64,
    pub velocity_adjustment_factor: f64,
    pub max_deviation: u8,
    pub strong_signal_deviation: u8,
    pub strong_signal_threshold: f64,
    /// Recent answers considered per decision.
    pub lookback_questions: usize,
    /// Data points at which confidence from sample size saturates.
    pub confidence_saturation: usize,
}

impl Default for DifficultyConfig {
    fn default() -> Self {
        Self {
            high_accuracy_threshold: 0.8,
            low_accuracy_threshold: 0.5,
            very_high_accuracy_threshold: 0.9,
            very_low_accuracy_threshold: 0.3,
            min_questions_for_adjustment: 3,
            max_difficulty_change: 2.0,
            fast_answer_threshold: 30.0,
            slow_answer_threshold: 120.0,
            streak_bonus_threshold: 5,
            streak_penalty_threshold: 3,
            mastery_influence_factor: 0.3,
            velocity_adjustment_factor: 0.2,
            max_deviation: 2,
            strong_signal_deviation: 3,
            strong_signal_threshold: 1.5,
            lookback_questions: 5,
            confidence_saturation: 8,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulerConfig {
    pub initial_interval_days: f64,
    pub second_interval_days: f64,
    pub initial_ease_factor: f64,
    pub min_ease_factor: f64,
    pub max_ease_factor: f64,
    pub min_interval_days: f64,
    pub max_interval_days: f64,
    /// Share of the interval kept after a failed review.
    pub failure_interval_factor: f64,
    pub fast_response_seconds: f64,
    pub fast_response_multiplier: f64,
    pub slow_response_seconds: f64,
    pub slow_response_multiplier: f64,
    pub retire_repetitions: u32,
    pub retire_ease_factor: f64,
    pub retire_consecutive_correct: u32,
    pub reset_ease_penalty: f64,
    pub max_priority: u8,
    /// Days overdue at which urgency saturates.
    pub full_urgency_days: f64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            initial_interval_days: 1.0,
            second_interval_days: 6.0,
            initial_ease_factor: 2.5,
            min_ease_factor: 1.3,
            max_ease_factor: 4.0,
            min_interval_days: 0.1,
            max_interval_days: 365.0,
            failure_interval_factor: 0.2,
            fast_response_seconds: 10.0,
            fast_response_multiplier: 1.1,
            slow_response_seconds: 120.0,
            slow_response_multiplier: 0.9,
            retire_repetitions: 8,
            retire_ease_factor: 3.0,
            retire_consecutive_correct: 5,
            reset_ease_penalty: 0.2,
            max_priority: 5,
            full_urgency_days: 7.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetRatios {
    pub weak_area: f64,
    pub review: f64,
    pub new_content: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComposerConfig {
    pub default_ratios: SetRatios,
    /// Used when the learner has more than `many_weak_areas` weak categories.
    pub weak_focus_ratios: SetRatios,
    /// Used while the learner has answered fewer than `cold_start_answers`.
    pub cold_start_ratios: SetRatios,
    pub many_weak_areas: usize,
    pub cold_start_answers: u32,
    pub default_set_size: usize,
    pub min_set_size: usize,
    pub max_set_size: usize,
    pub difficulty_variance: u8,
    pub recent_performance_days: i64,
    pub due_review_buffer_hours: i64,
    pub max_categories_per_set: usize,
    /// Recent answers required before a category can be flagged from recent accuracy alone.
    pub min_recent_answers: usize,
    pub recent_weak_accuracy: f64,
    pub stale_after_days: f64,
    pub max_staleness_priority: f64,
}

impl Default for ComposerConfig {
    fn default() -> Self {
        Self {
            default_ratios: SetRatios {
                weak_area: 0.6,
                review: 0.25,
                new_content: 0.15,
            },
            weak_focus_ratios: SetRatios {
                weak_area: 0.7,
                review: 0.2,
                new_content: 0.1,
            },
            cold_start_ratios: SetRatios {
                weak_area: 0.3,
                review: 0.1,
                new_content: 0.6,
            },
            many_weak_areas: 3,
            cold_start_answers: 20,
            default_set_size: 10,
            min_set_size: 5,
            max_set_size: 50,
            difficulty_variance: 2,
            recent_performance_days: 7,
            due_review_buffer_hours: 2,
            max_categories_per_set: 5,
            min_recent_answers: 3,
            recent_weak_accuracy: 0.6,
            stale_after_days: 7.0,
            max_staleness_priority: 10.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RealTimeConfig {
    pub retention_seconds: i64,
    pub max_responses_per_exam: usize,
    pub default_window_seconds: i64,
}

impl Default for RealTimeConfig {
    fn default() -> Self {
        Self {
            retention_seconds: 600,
            max_responses_per_exam: 500,
            default_window_seconds: 60,
        }
    }
}

/// Immutable engine configuration, handed to each component at construction.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineConfig {
    pub mastery: MasteryConfig,
    pub difficulty: DifficultyConfig,
    pub scheduler: SchedulerConfig,
    pub composer: ComposerConfig,
    pub realtime: RealTimeConfig,
}

impl EngineConfig {
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(val) = env_parse::<f64>("ADAPTIVE_HIGH_ACCURACY_THRESHOLD") {
            config.difficulty.high_accuracy_threshold = val;
        }
        if let Some(val) = env_parse::<f64>("ADAPTIVE_LOW_ACCURACY_THRESHOLD") {
            config.difficulty.low_accuracy_threshold = val;
        }
        if let Some(val) = env_parse::<usize>("ADAPTIVE_LOOKBACK_QUESTIONS") {
            config.difficulty.lookback_questions = val.max(1);
        }
        if let Some(val) = env_parse::<f64>("ADAPTIVE_MAX_DIFFICULTY_CHANGE") {
            config.difficulty.max_difficulty_change = val.abs();
        }
        if let Some(val) = env_parse::<f64>("ADAPTIVE_WEAK_AREA_RATIO") {
            config.composer.default_ratios.weak_area = val.clamp(0.0, 1.0);
        }
        if let Some(val) = env_parse::<f64>("ADAPTIVE_REVIEW_RATIO") {
            config.composer.default_ratios.review = val.clamp(0.0, 1.0);
        }
        if let Some(val) = env_parse::<f64>("ADAPTIVE_NEW_CONTENT_RATIO") {
            config.composer.default_ratios.new_content = val.clamp(0.0, 1.0);
        }
        if let Some(val) = env_parse::<i64>("ADAPTIVE_REVIEW_BUFFER_HOURS") {
            config.composer.due_review_buffer_hours = val.max(0);
        }
        if let Some(val) = env_parse::<i64>("ADAPTIVE_REALTIME_RETENTION_SECONDS") {
            config.realtime.retention_seconds = val.max(1);
        }

        tracing::debug!(
            lookback = config.difficulty.lookback_questions,
            review_buffer_hours = config.composer.due_review_buffer_hours,
            "engine config loaded from environment"
        );

        config
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    let raw = std::env::var(key).ok()?;
    match raw.trim().parse::<T>() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(key, value = %raw, "ignoring unparsable config override");
            None
        }
    }
}
