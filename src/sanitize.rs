//! Input validation and numeric helpers.
//!
//! Every public operation that accepts caller-supplied numbers validates them
//! here first, so the algorithms themselves can assume a well-formed domain.

use crate::error::{EngineError, Result};

pub const MIN_DIFFICULTY: u8 = 1;
pub const MAX_DIFFICULTY: u8 = 10;
pub const MAX_QUALITY: u8 = 5;
pub const MIN_LEARNING_VELOCITY: f64 = 0.1;
pub const MAX_LEARNING_VELOCITY: f64 = 5.0;

/// Difficulty must be an integer level in 1..=10.
pub fn validate_difficulty(value: u8, field: &str) -> Result<u8> {
    if (MIN_DIFFICULTY..=MAX_DIFFICULTY).contains(&value) {
        Ok(value)
    } else {
        Err(EngineError::InvalidInput(format!(
            "{field} must be between {MIN_DIFFICULTY} and {MAX_DIFFICULTY}, got {value}"
        )))
    }
}

/// Elapsed time in seconds; rejects negative, NaN and infinite values.
pub fn validate_seconds(value: f64, field: &str) -> Result<f64> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(EngineError::InvalidInput(format!(
            "{field} must be a non-negative number of seconds, got {value}"
        )))
    }
}

/// Review quality on the SM-2 scale 0..=5.
pub fn validate_quality(value: u8) -> Result<u8> {
    if value <= MAX_QUALITY {
        Ok(value)
    } else {
        Err(EngineError::InvalidInput(format!(
            "quality must be between 0 and {MAX_QUALITY}, got {value}"
        )))
    }
}

pub fn validate_learning_velocity(value: f64) -> Result<f64> {
    if value.is_finite() && (MIN_LEARNING_VELOCITY..=MAX_LEARNING_VELOCITY).contains(&value) {
        Ok(value)
    } else {
        Err(EngineError::InvalidInput(format!(
            "learning velocity must be between {MIN_LEARNING_VELOCITY} and \
             {MAX_LEARNING_VELOCITY}, got {value}"
        )))
    }
}

/// Rounds halves toward positive infinity (`-1.5 -> -1`, `1.5 -> 2`).
///
/// Difficulty steps and mastery levels are rounded this way so a symmetric
/// negative adjustment of exactly one and a half levels moves one step, not two.
pub fn round_half_up(value: f64) -> f64 {
    (value + 0.5).floor()
}

/// Clamps a signed difficulty into 1..=10.
pub fn clamp_difficulty(value: i32) -> u8 {
    value.clamp(MIN_DIFFICULTY as i32, MAX_DIFFICULTY as i32) as u8
}

/// Population variance; zero for an empty slice.
pub fn variance(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n
}
