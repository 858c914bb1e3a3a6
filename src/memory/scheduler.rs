//! SM-2 spaced-repetition scheduling.
//!
//! One card per learner per question. Each review carries a quality score
//! (0-5) and a response time:
//! - quality >= 3 grows the interval (1 day, 6 days, then interval x ease)
//! - quality < 3 resets repetitions and keeps a fifth of the interval
//! - fast answers stretch the next interval by 10%, slow ones shrink it by 10%
//!
//! A card retires permanently once it has 8+ repetitions, ease >= 3.0 and
//! 5+ consecutive correct reviews. Retired cards ignore further reviews.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::config::SchedulerConfig;
use crate::error::Result;
use crate::sanitize::{validate_difficulty, validate_quality, validate_seconds};

const MS_PER_DAY: f64 = 86_400_000.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpacedRepetitionCard {
    pub question_id: String,
    pub learner_id: String,
    pub categories: Vec<String>,
    pub difficulty: u8,
    /// Days until the next review.
    pub interval: f64,
    pub ease_factor: f64,
    pub repetitions: u32,
    pub consecutive_correct: u32,
    pub total_reviews: u32,
    pub average_response_time: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_quality: Option<u8>,
    pub last_reviewed: DateTime<Utc>,
    pub next_review_date: DateTime<Utc>,
    pub is_retired: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retired_at: Option<DateTime<Utc>>,
    /// 1-5, higher reviews first.
    pub priority: u8,
}

impl SpacedRepetitionCard {
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        !self.is_retired && self.next_review_date <= now
    }

    /// Whole days until the next review, rounded up; negative when overdue.
    pub fn days_until_review(&self, now: DateTime<Utc>) -> i64 {
        let diff_ms = (self.next_review_date - now).num_milliseconds() as f64;
        (diff_ms / MS_PER_DAY).ceil() as i64
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ReviewOutcome {
    /// Card updated and rescheduled.
    Scheduled,
    /// This review met the retirement criteria.
    Retired,
    /// Card was already retired; nothing changed.
    Ignored,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewStats {
    pub total_cards: usize,
    pub due_cards: usize,
    pub retired_cards: usize,
    pub active_cards: usize,
    pub average_ease_factor: f64,
    pub average_interval: f64,
    pub total_reviews: u64,
    pub mastered_cards: usize,
    pub mastery_rate: f64,
}

#[derive(Debug, Clone, Default)]
pub struct SpacedRepetitionScheduler {
    config: SchedulerConfig,
}

impl SpacedRepetitionScheduler {
    pub fn new(config: SchedulerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Initial state for a question the learner has just seen. Harder
    /// questions get lower priority.
    pub fn schedule_new_card(
        &self,
        question_id: impl Into<String>,
        learner_id: impl Into<String>,
        categories: Vec<String>,
        difficulty: u8,
        now: DateTime<Utc>,
    ) -> Result<SpacedRepetitionCard> {
        let difficulty = validate_difficulty(difficulty, "difficulty")?;
        let interval = self.config.initial_interval_days;

        Ok(SpacedRepetitionCard {
            question_id: question_id.into(),
            learner_id: learner_id.into(),
            categories,
            difficulty,
            interval,
            ease_factor: self.config.initial_ease_factor,
            repetitions: 0,
            consecutive_correct: 0,
            total_reviews: 0,
            average_response_time: 0.0,
            last_quality: None,
            last_reviewed: now,
            next_review_date: add_days(now, interval),
            is_retired: false,
            retired_at: None,
            priority: (6 - difficulty as i32).max(1) as u8,
        })
    }

    pub fn update_from_review(
        &self,
        card: &mut SpacedRepetitionCard,
        quality: u8,
        response_time_seconds: f64,
        now: DateTime<Utc>,
    ) -> Result<ReviewOutcome> {
        let quality = validate_quality(quality)?;
        let response_time = validate_seconds(response_time_seconds, "response time")?;

        if card.is_retired {
            tracing::debug!(question_id = %card.question_id, "review ignored for retired card");
            return Ok(ReviewOutcome::Ignored);
        }

        let old_interval = card.interval;
        let old_ease = card.ease_factor;

        card.last_reviewed = now;
        card.total_reviews += 1;
        card.last_quality = Some(quality);

        let reviews = card.total_reviews as f64;
        card.average_response_time =
            (card.average_response_time * (reviews - 1.0) + response_time) / reviews;

        let passed = quality >= 3;
        if passed {
            card.consecutive_correct += 1;
            card.interval = match card.repetitions {
                0 => self.config.initial_interval_days,
                1 => self.config.second_interval_days,
                _ => (card.interval * card.ease_factor).round(),
            };
            card.repetitions += 1;
        } else {
            card.consecutive_correct = 0;
            card.repetitions = 0;
            card.interval = (card.interval * self.config.failure_interval_factor)
                .max(self.config.initial_interval_days);
        }

        let q = (5 - quality) as f64;
        card.ease_factor =
            (card.ease_factor + (0.1 - q * (0.08 + q * 0.02))).max(self.config.min_ease_factor);

        if response_time < self.config.fast_response_seconds {
            card.interval *= self.config.fast_response_multiplier;
        } else if response_time > self.config.slow_response_seconds {
            card.interval *= self.config.slow_response_multiplier;
        }

        // The stored interval is only capped by `prepare_for_save`; the date
        // never lands further out than the maximum interval.
        card.next_review_date = add_days(now, card.interval.min(self.config.max_interval_days));

        tracing::debug!(
            question_id = %card.question_id,
            quality,
            ease_before = old_ease,
            ease_after = card.ease_factor,
            interval_before = old_interval,
            interval_after = card.interval,
            repetitions = card.repetitions,
            "sm-2 review applied"
        );

        if self.meets_retirement(card) {
            card.is_retired = true;
            card.retired_at = Some(now);
            tracing::info!(
                question_id = %card.question_id,
                learner_id = %card.learner_id,
                repetitions = card.repetitions,
                "card retired"
            );
            return Ok(ReviewOutcome::Retired);
        }

        Ok(ReviewOutcome::Scheduled)
    }

    fn meets_retirement(&self, card: &SpacedRepetitionCard) -> bool {
        card.repetitions >= self.config.retire_repetitions
            && card.ease_factor >= self.config.retire_ease_factor
            && card.consecutive_correct >= self.config.retire_consecutive_correct
    }

    /// Sends a forgotten card back to the start, keeping part of the ease
    /// penalty and bumping its priority.
    pub fn reset_card(&self, card: &mut SpacedRepetitionCard, now: DateTime<Utc>) {
        card.repetitions = 0;
        card.interval = self.config.initial_interval_days;
        card.ease_factor =
            (card.ease_factor - self.config.reset_ease_penalty).max(self.config.min_ease_factor);
        card.consecutive_correct = 0;
        card.next_review_date = add_days(now, self.config.initial_interval_days);
        self.boost_priority(card);
    }

    pub fn boost_priority(&self, card: &mut SpacedRepetitionCard) {
        card.priority = card.priority.saturating_add(1).min(self.config.max_priority);
    }

    /// Storage invariants, applied by the caller right before persisting:
    /// interval and ease stay within their documented bounds, and a new card
    /// is never scheduled in the past.
    pub fn prepare_for_save(
        &self,
        card: &mut SpacedRepetitionCard,
        now: DateTime<Utc>,
        is_new: bool,
    ) {
        if card.interval > self.config.max_interval_days {
            card.interval = self.config.max_interval_days;
            let latest = add_days(card.last_reviewed, card.interval);
            if card.next_review_date > latest {
                card.next_review_date = latest;
            }
        }
        card.interval = card.interval.max(self.config.min_interval_days);
        card.ease_factor = card
            .ease_factor
            .clamp(self.config.min_ease_factor, self.config.max_ease_factor);

        if is_new && card.next_review_date < now {
            card.next_review_date = add_days(now, card.interval);
        }
    }

    /// 0 when not yet due, rising linearly to 1 after a week overdue.
    pub fn urgency(&self, card: &SpacedRepetitionCard, now: DateTime<Utc>) -> f64 {
        let days_past = (now - card.next_review_date).num_milliseconds() as f64 / MS_PER_DAY;
        if days_past <= 0.0 {
            return 0.0;
        }
        (days_past / self.config.full_urgency_days).min(1.0)
    }

    /// 0-100 estimate of how well the card is known.
    pub fn mastery_level(&self, card: &SpacedRepetitionCard) -> u8 {
        let repetition_score = (card.repetitions as f64 / 10.0).min(1.0);
        let ease_span = self.config.max_ease_factor - self.config.min_ease_factor;
        let ease_score =
            ((card.ease_factor - self.config.min_ease_factor) / ease_span).clamp(0.0, 1.0);
        let consistency_score =
            (card.consecutive_correct as f64 / card.total_reviews.max(1) as f64).min(1.0);

        let weighted = repetition_score * 0.4 + ease_score * 0.3 + consistency_score * 0.3;
        (weighted * 100.0).round() as u8
    }

    /// Due, active cards: highest priority first, then oldest due date.
    pub fn due_reviews<'a>(
        &self,
        cards: &'a [SpacedRepetitionCard],
        now: DateTime<Utc>,
        limit: usize,
    ) -> Vec<&'a SpacedRepetitionCard> {
        let mut due: Vec<&SpacedRepetitionCard> = cards.iter().filter(|c| c.is_due(now)).collect();
        due.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then(a.next_review_date.cmp(&b.next_review_date))
        });
        due.truncate(limit);
        due
    }

    /// Active cards coming due within the next `days` days, soonest first.
    pub fn upcoming_reviews<'a>(
        &self,
        cards: &'a [SpacedRepetitionCard],
        now: DateTime<Utc>,
        days: i64,
    ) -> Vec<&'a SpacedRepetitionCard> {
        let horizon = now + Duration::days(days);
        let mut upcoming: Vec<&SpacedRepetitionCard> = cards
            .iter()
            .filter(|c| !c.is_retired && c.next_review_date > now && c.next_review_date <= horizon)
            .collect();
        upcoming.sort_by(|a, b| a.next_review_date.cmp(&b.next_review_date));
        upcoming
    }

    pub fn review_stats(&self, cards: &[SpacedRepetitionCard], now: DateTime<Utc>) -> ReviewStats {
        let total_cards = cards.len();
        if total_cards == 0 {
            return ReviewStats {
                total_cards: 0,
                due_cards: 0,
                retired_cards: 0,
                active_cards: 0,
                average_ease_factor: 0.0,
                average_interval: 0.0,
                total_reviews: 0,
                mastered_cards: 0,
                mastery_rate: 0.0,
            };
        }

        let due_cards = cards.iter().filter(|c| c.is_due(now)).count();
        let retired_cards = cards.iter().filter(|c| c.is_retired).count();
        let mastered_cards = cards
            .iter()
            .filter(|c| c.repetitions >= 5 && c.ease_factor >= 2.8)
            .count();
        let n = total_cards as f64;
        let average_ease_factor = cards.iter().map(|c| c.ease_factor).sum::<f64>() / n;
        let average_interval = cards.iter().map(|c| c.interval).sum::<f64>() / n;

        ReviewStats {
            total_cards,
            due_cards,
            retired_cards,
            active_cards: total_cards - retired_cards,
            average_ease_factor: (average_ease_factor * 100.0).round() / 100.0,
            average_interval: (average_interval * 10.0).round() / 10.0,
            total_reviews: cards.iter().map(|c| c.total_reviews as u64).sum(),
            mastered_cards,
            mastery_rate: mastered_cards as f64 / n,
        }
    }
}

/// Saturates at the latest representable date instead of overflowing.
fn add_days(from: DateTime<Utc>, days: f64) -> DateTime<Utc> {
    let millis = (days * MS_PER_DAY).round() as i64;
    Duration::try_milliseconds(millis)
        .and_then(|delta| from.checked_add_signed(delta))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}
