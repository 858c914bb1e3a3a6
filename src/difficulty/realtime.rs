//! Live exam responses and the short-window analysis run over them.
//!
//! Each exam keeps a bounded queue of responses. Entries older than the
//! retention window are evicted on every push and on
//! [`ResponseBuffer::evict_expired`].

use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::config::RealTimeConfig;
use crate::error::Result;
use crate::sanitize::validate_seconds;

const EMPTY_CORRECT_RATE: f64 = 0.5;
const EMPTY_RESPONSE_TIME: f64 = 30.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RealTimeResponse {
    pub exam_id: String,
    pub learner_id: String,
    pub question_id: String,
    pub response_time_seconds: f64,
    pub is_correct: bool,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DifficultyBand {
    Easy,
    Medium,
    Hard,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Adaptation {
    Increase,
    Maintain,
    Decrease,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RealTimeAnalysis {
    pub correct_rate: f64,
    pub avg_response_time: f64,
    pub recommended_difficulty: DifficultyBand,
    pub adaptation: Adaptation,
    pub sample_size: usize,
}

/// Analyses responses inside the last `window_seconds`.
///
/// An empty window returns a neutral medium/maintain recommendation.
pub fn analyze_real_time_performance<'a, I>(
    responses: I,
    window_seconds: i64,
    now: DateTime<Utc>,
) -> RealTimeAnalysis
where
    I: IntoIterator<Item = &'a RealTimeResponse>,
{
    let cutoff = now - Duration::seconds(window_seconds);
    let recent: Vec<&RealTimeResponse> = responses
        .into_iter()
        .filter(|r| r.timestamp >= cutoff)
        .collect();

    if recent.is_empty() {
        return RealTimeAnalysis {
            correct_rate: EMPTY_CORRECT_RATE,
            avg_response_time: EMPTY_RESPONSE_TIME,
            recommended_difficulty: DifficultyBand::Medium,
            adaptation: Adaptation::Maintain,
            sample_size: 0,
        };
    }

    let n = recent.len() as f64;
    let correct_rate = recent.iter().filter(|r| r.is_correct).count() as f64 / n;
    let avg_response_time = recent.iter().map(|r| r.response_time_seconds).sum::<f64>() / n;

    let (recommended_difficulty, adaptation) = if correct_rate >= 0.8 && avg_response_time < 30.0 {
        (DifficultyBand::Hard, Adaptation::Increase)
    } else if correct_rate >= 0.7 {
        (DifficultyBand::Medium, Adaptation::Maintain)
    } else if correct_rate < 0.5 {
        (DifficultyBand::Easy, Adaptation::Decrease)
    } else {
        (DifficultyBand::Medium, Adaptation::Maintain)
    };

    RealTimeAnalysis {
        correct_rate,
        avg_response_time,
        recommended_difficulty,
        adaptation,
        sample_size: recent.len(),
    }
}

#[derive(Debug, Default)]
pub struct ResponseBuffer {
    config: RealTimeConfig,
    exams: HashMap<String, VecDeque<RealTimeResponse>>,
}

impl ResponseBuffer {
    pub fn new(config: RealTimeConfig) -> Self {
        Self {
            config,
            exams: HashMap::new(),
        }
    }

    fn retention(&self) -> Duration {
        Duration::seconds(self.config.retention_seconds)
    }

    pub fn push(&mut self, response: RealTimeResponse, now: DateTime<Utc>) -> Result<()> {
        validate_seconds(response.response_time_seconds, "response time")?;

        let cutoff = now - self.retention();
        let capacity = self.config.max_responses_per_exam.max(1);
        let queue = self.exams.entry(response.exam_id.clone()).or_default();

        queue.push_back(response);
        queue.retain(|r| r.timestamp >= cutoff);
        while queue.len() > capacity {
            queue.pop_front();
        }
        Ok(())
    }

    /// Drops expired responses from every exam and forgets exams left empty.
    /// Returns the number of responses removed.
    pub fn evict_expired(&mut self, now: DateTime<Utc>) -> usize {
        let cutoff = now - self.retention();
        let mut removed = 0;
        self.exams.retain(|_, queue| {
            let before = queue.len();
            queue.retain(|r| r.timestamp >= cutoff);
            removed += before - queue.len();
            !queue.is_empty()
        });
        if removed > 0 {
            tracing::debug!(removed, exams = self.exams.len(), "evicted expired responses");
        }
        removed
    }

    pub fn responses(&self, exam_id: &str) -> impl Iterator<Item = &RealTimeResponse> {
        self.exams.get(exam_id).into_iter().flatten()
    }

    pub fn len(&self, exam_id: &str) -> usize {
        self.exams.get(exam_id).map_or(0, VecDeque::len)
    }

    pub fn clear(&mut self, exam_id: &str) {
        self.exams.remove(exam_id);
    }

    /// Analysis over this exam's buffered responses, using the configured
    /// window when `window_seconds` is `None`.
    pub fn analyze(
        &self,
        exam_id: &str,
        window_seconds: Option<i64>,
        now: DateTime<Utc>,
    ) -> RealTimeAnalysis {
        let window = window_seconds.unwrap_or(self.config.default_window_seconds);
        analyze_real_time_performance(self.responses(exam_id), window, now)
    }
}
