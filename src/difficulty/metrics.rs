//! Windowed performance aggregation over recent answers.

use crate::sanitize::{round_half_up, variance};
use crate::types::{AnswerEvent, PerformanceMetrics};

/// Time efficiency reported when response time is not being considered.
pub const NEUTRAL_TIME_EFFICIENCY: f64 = 0.5;

/// Aggregates a window of answers, most recent first.
///
/// An empty window yields all-zero metrics. With `consider_hints` off the
/// hint average is reported as zero so hint rules never fire downstream.
pub fn calculate_performance_metrics(
    events: &[AnswerEvent],
    consider_time: bool,
    consider_hints: bool,
    slow_answer_threshold: f64,
) -> PerformanceMetrics {
    let Some(first) = events.first() else {
        return PerformanceMetrics::default();
    };

    let n = events.len() as f64;
    let correctness: Vec<f64> = events
        .iter()
        .map(|e| if e.correct { 1.0 } else { 0.0 })
        .collect();

    let accuracy = correctness.iter().sum::<f64>() / n;
    let average_time_spent = events.iter().map(|e| e.time_spent_seconds).sum::<f64>() / n;
    let average_hints_used = if consider_hints {
        events.iter().map(|e| e.hints_used as f64).sum::<f64>() / n
    } else {
        0.0
    };

    let run = events
        .iter()
        .take_while(|e| e.correct == first.correct)
        .count() as i32;
    let streak = if first.correct { run } else { -run };

    let time_efficiency = if consider_time {
        (1.0 - average_time_spent / slow_answer_threshold).max(0.0)
    } else {
        NEUTRAL_TIME_EFFICIENCY
    };

    let consistency_score = (1.0 - variance(&correctness)).max(0.0);

    PerformanceMetrics {
        accuracy,
        average_time_spent,
        average_hints_used,
        streak,
        time_efficiency,
        consistency_score,
        total_questions: events.len(),
    }
}

/// 0-100 score for a single answer: correctness, speed, hints and difficulty.
pub fn performance_score(event: &AnswerEvent) -> u8 {
    let mut score = if event.correct { 60.0 } else { 0.0 };
    score += (25.0 - event.time_spent_seconds / 10.0).max(0.0);
    score = (score - event.hints_used as f64 * 2.0).max(0.0);
    score += (event.difficulty as f64 - 1.0) * 1.5;

    round_half_up(score).min(100.0) as u8
}
