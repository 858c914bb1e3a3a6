//! Difficulty adjustment: performance metrics plus mastery and learning
//! velocity to a bounded step, applied around the learner's preference.

use crate::config::DifficultyConfig;
use crate::error::Result;
use crate::memory::mastery::mastery_influence;
use crate::sanitize::{
    clamp_difficulty, round_half_up, validate_difficulty, validate_learning_velocity,
};
use crate::types::{
    AnswerEvent, CategoryMastery, DifficultyAdjustmentResult, MasteryInfluence, PerformanceMetrics,
};

use super::metrics::calculate_performance_metrics;

const INSUFFICIENT_DATA_REASONING: &str =
    "Insufficient performance data - using learner preference with category mastery adjustment";
const MAINTAINING_REASONING: &str = "Maintaining current difficulty level";

#[derive(Debug, Clone, Default)]
pub struct DifficultyCalculator {
    config: DifficultyConfig,
}

impl DifficultyCalculator {
    pub fn new(config: DifficultyConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DifficultyConfig {
        &self.config
    }

    pub fn performance_metrics(
        &self,
        events: &[AnswerEvent],
        consider_time: bool,
        consider_hints: bool,
    ) -> PerformanceMetrics {
        calculate_performance_metrics(
            events,
            consider_time,
            consider_hints,
            self.config.slow_answer_threshold,
        )
    }

    pub fn mastery_influence(&self, mastery: Option<&CategoryMastery>) -> MasteryInfluence {
        mastery_influence(mastery, self.config.mastery_influence_factor)
    }

    /// Next difficulty for a learner in one category.
    ///
    /// Below `min_questions_for_adjustment` answers this falls back to
    /// [`initial_difficulty`](Self::initial_difficulty).
    pub fn calculate_next_difficulty(
        &self,
        metrics: &PerformanceMetrics,
        mastery: Option<&CategoryMastery>,
        learning_velocity: f64,
        current_difficulty: u8,
        preferred_difficulty: u8,
    ) -> Result<DifficultyAdjustmentResult> {
        let current = validate_difficulty(current_difficulty, "current difficulty")?;
        let preferred = validate_difficulty(preferred_difficulty, "preferred difficulty")?;
        let velocity = validate_learning_velocity(learning_velocity)?;

        if metrics.total_questions < self.config.min_questions_for_adjustment {
            return Ok(self.initial_difficulty(mastery, preferred, current));
        }

        let influence = self.mastery_influence(mastery);
        let adjustment = self.calculate_difficulty_adjustment(metrics, &influence, velocity);
        let new_difficulty = self.apply_difficulty_adjustment(current, adjustment, preferred);
        let confidence = self.calculate_adjustment_confidence(metrics.total_questions, metrics);
        let reasoning = self.generate_adjustment_reasoning(metrics, &influence, adjustment);

        tracing::debug!(
            current,
            preferred,
            adjustment,
            new_difficulty,
            confidence,
            "difficulty adjustment computed"
        );

        Ok(DifficultyAdjustmentResult {
            new_difficulty,
            previous_difficulty: current,
            adjustment,
            reasoning,
            confidence,
            performance_metrics: Some(metrics.clone()),
        })
    }

    /// Low-confidence recommendation used before enough answers exist:
    /// the preference, nudged one step by category mastery.
    pub fn initial_difficulty(
        &self,
        mastery: Option<&CategoryMastery>,
        preferred_difficulty: u8,
        current_difficulty: u8,
    ) -> DifficultyAdjustmentResult {
        let preferred = preferred_difficulty as i32;
        let recommended = match mastery.map(|m| m.level) {
            Some(level) if level < 30 => clamp_difficulty(preferred - 1),
            Some(level) if level > 80 => clamp_difficulty(preferred + 1),
            _ => clamp_difficulty(preferred),
        };

        DifficultyAdjustmentResult {
            new_difficulty: recommended,
            previous_difficulty: current_difficulty,
            adjustment: recommended as f64 - current_difficulty as f64,
            reasoning: INSUFFICIENT_DATA_REASONING.to_string(),
            confidence: if mastery.is_some() { 0.6 } else { 0.3 },
            performance_metrics: None,
        }
    }

    /// Raw adjustment, clamped to `max_difficulty_change` in either direction.
    pub fn calculate_difficulty_adjustment(
        &self,
        metrics: &PerformanceMetrics,
        influence: &MasteryInfluence,
        learning_velocity: f64,
    ) -> f64 {
        let c = &self.config;
        let mut adjustment = 0.0;

        if metrics.accuracy >= c.high_accuracy_threshold {
            adjustment += 1.0;
            if metrics.accuracy >= c.very_high_accuracy_threshold && metrics.time_efficiency > 0.7 {
                adjustment += 0.5;
            }
        } else if metrics.accuracy <= c.low_accuracy_threshold {
            adjustment -= 1.0;
            if metrics.accuracy <= c.very_low_accuracy_threshold {
                adjustment -= 0.5;
            }
        }

        if metrics.streak >= c.streak_bonus_threshold {
            adjustment += 0.5;
        } else if metrics.streak <= -c.streak_penalty_threshold {
            adjustment -= 0.5;
        }

        if metrics.time_efficiency > 0.8 {
            adjustment += 0.3;
        } else if metrics.time_efficiency < 0.3 {
            adjustment -= 0.3;
        }

        if metrics.average_hints_used > 2.0 {
            adjustment -= 0.3;
        } else if metrics.average_hints_used == 0.0 && metrics.accuracy > 0.7 {
            adjustment += 0.2;
        }

        adjustment += influence.influence;
        adjustment *= 1.0 + (learning_velocity - 1.0) * c.velocity_adjustment_factor;

        adjustment.clamp(-c.max_difficulty_change, c.max_difficulty_change)
    }

    /// Steps the current difficulty, then keeps it within the deviation band
    /// around the preference. A strong signal widens the band by one.
    pub fn apply_difficulty_adjustment(&self, current: u8, adjustment: f64, preferred: u8) -> u8 {
        let stepped = clamp_difficulty(current as i32 + round_half_up(adjustment) as i32);

        let deviation = if adjustment.abs() > self.config.strong_signal_threshold {
            self.config.strong_signal_deviation
        } else {
            self.config.max_deviation
        } as i32;
        let preferred = preferred as i32;
        let min_allowed = (preferred - deviation).max(1);
        let max_allowed = (preferred + deviation).min(10);

        (stepped as i32).clamp(min_allowed, max_allowed) as u8
    }

    /// Always within `[0.1, 1]`.
    pub fn calculate_adjustment_confidence(
        &self,
        data_points: usize,
        metrics: &PerformanceMetrics,
    ) -> f64 {
        let saturation = self.config.confidence_saturation.max(1) as f64;
        let mut confidence = (data_points as f64 / saturation).min(1.0);
        confidence *= metrics.consistency_score.max(0.5);
        if metrics.accuracy == 0.0 || metrics.accuracy == 1.0 {
            confidence *= 0.8;
        }
        confidence.clamp(0.1, 1.0)
    }

    pub fn generate_adjustment_reasoning(
        &self,
        metrics: &PerformanceMetrics,
        influence: &MasteryInfluence,
        adjustment: f64,
    ) -> String {
        let c = &self.config;
        let mut reasons: Vec<String> = Vec::new();

        if metrics.accuracy >= c.high_accuracy_threshold {
            reasons.push(format!("High accuracy ({:.1}%)", metrics.accuracy * 100.0));
        } else if metrics.accuracy <= c.low_accuracy_threshold {
            reasons.push(format!("Low accuracy ({:.1}%)", metrics.accuracy * 100.0));
        }

        if metrics.streak >= c.streak_bonus_threshold {
            reasons.push(format!("Positive streak of {} questions", metrics.streak));
        } else if metrics.streak <= -c.streak_penalty_threshold {
            reasons.push(format!("Negative streak of {} questions", metrics.streak.abs()));
        }

        if metrics.time_efficiency > 0.8 {
            reasons.push("Fast response times".to_string());
        } else if metrics.time_efficiency < 0.3 {
            reasons.push("Slow response times".to_string());
        }

        if metrics.average_hints_used > 2.0 {
            reasons.push("High hint usage".to_string());
        } else if metrics.average_hints_used == 0.0 && metrics.accuracy > 0.7 {
            reasons.push("No hints needed".to_string());
        }

        if influence.influence > 0.1 {
            reasons.push(format!(
                "High category mastery ({:.1}%)",
                influence.mastery_level * 100.0
            ));
        }

        if reasons.is_empty() {
            return MAINTAINING_REASONING.to_string();
        }

        let action = if adjustment > 0.0 {
            "Increasing"
        } else if adjustment < 0.0 {
            "Decreasing"
        } else {
            "Maintaining"
        };
        format!("{action} difficulty based on: {}", reasons.join(", "))
    }
}
