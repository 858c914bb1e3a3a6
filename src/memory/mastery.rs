//! Category mastery tracking.
//!
//! A learner's mastery of a category is a 0-100 composite of three parts:
//! - accuracy (running mean of correctness), up to 60 points
//! - consistency (current correct streak), up to 25 points
//! - speed (running mean answer time), up to 15 points
//!
//! Confidence grows with accuracy and with the number of answers seen, and
//! saturates after twenty answers.

use chrono::{DateTime, Utc};

use crate::config::MasteryConfig;
use crate::error::Result;
use crate::sanitize::{clamp_difficulty, round_half_up, validate_seconds};
use crate::types::{CategoryMastery, Learner, MasteryInfluence};

#[derive(Debug, Clone, Default)]
pub struct MasteryTracker {
    config: MasteryConfig,
}

impl MasteryTracker {
    pub fn new(config: MasteryConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MasteryConfig {
        &self.config
    }

    /// Folds one answer into a mastery record, starting from a zeroed record
    /// when the category has not been tracked yet.
    pub fn update_category_mastery(
        &self,
        mastery: Option<&CategoryMastery>,
        was_correct: bool,
        time_spent: f64,
        now: DateTime<Utc>,
    ) -> CategoryMastery {
        let mut next = mastery
            .cloned()
            .unwrap_or_else(|| CategoryMastery::empty(now));

        next.questions_answered += 1;
        let n = next.questions_answered as f64;

        let previous_correct = round_half_up(next.average_accuracy * (n - 1.0));
        let correct = previous_correct + if was_correct { 1.0 } else { 0.0 };
        next.average_accuracy = (correct / n).clamp(0.0, 1.0);

        next.average_time_per_question =
            (next.average_time_per_question * (n - 1.0) + time_spent) / n;

        if was_correct {
            next.streak_count += 1;
        } else {
            next.streak_count = 0;
        }

        next.level = self.level_for(&next);

        let experience =
            (n / self.config.full_confidence_answers.max(1) as f64).min(1.0);
        next.confidence = next.average_accuracy * experience;
        next.last_assessed = now;

        tracing::debug!(
            level = next.level,
            accuracy = next.average_accuracy,
            streak = next.streak_count,
            confidence = next.confidence,
            "category mastery updated"
        );

        next
    }

    fn level_for(&self, mastery: &CategoryMastery) -> u8 {
        let accuracy_score = mastery.average_accuracy * self.config.accuracy_weight;
        let consistency_score = (mastery.streak_count as f64 * self.config.streak_points)
            .min(self.config.max_consistency_points);
        let speed_score = (self.config.max_speed_points
            - mastery.average_time_per_question / self.config.seconds_per_speed_point)
            .max(0.0);

        round_half_up(accuracy_score + consistency_score + speed_score).clamp(0.0, 100.0) as u8
    }

    /// Applies an answer to both the category record and the learner totals.
    pub fn record_answer(
        &self,
        learner: &mut Learner,
        category: &str,
        was_correct: bool,
        time_spent: f64,
        now: DateTime<Utc>,
    ) -> Result<CategoryMastery> {
        let time_spent = validate_seconds(time_spent, "time spent")?;

        let updated = self.update_category_mastery(
            learner.category_mastery.get(category),
            was_correct,
            time_spent,
            now,
        );
        learner
            .category_mastery
            .insert(category.to_string(), updated.clone());
        learner.update_overall_stats(was_correct, time_spent, now);

        Ok(updated)
    }

    /// Categories below the weak threshold, sorted by name.
    pub fn weak_areas(&self, learner: &Learner) -> Vec<String> {
        let mut areas: Vec<String> = learner
            .category_mastery
            .iter()
            .filter(|(_, m)| m.level < self.config.weak_threshold)
            .map(|(category, _)| category.clone())
            .collect();
        areas.sort();
        areas
    }

    /// Categories at or above the strong threshold, sorted by name.
    pub fn strong_areas(&self, learner: &Learner) -> Vec<String> {
        let mut areas: Vec<String> = learner
            .category_mastery
            .iter()
            .filter(|(_, m)| m.level >= self.config.strong_threshold)
            .map(|(category, _)| category.clone())
            .collect();
        areas.sort();
        areas
    }
}

impl Learner {
    /// Learner-wide running totals; same rounding rule as category accuracy.
    pub fn update_overall_stats(&mut self, was_correct: bool, time_spent: f64, now: DateTime<Utc>) {
        self.total_questions_answered += 1;
        self.total_time_spent += time_spent;

        let n = self.total_questions_answered as f64;
        let previous_correct = round_half_up(self.overall_accuracy * (n - 1.0));
        let correct = previous_correct + if was_correct { 1.0 } else { 0.0 };
        self.overall_accuracy = (correct / n).clamp(0.0, 1.0);

        if was_correct {
            self.current_streak += 1;
            self.longest_streak = self.longest_streak.max(self.current_streak);
        } else {
            self.current_streak = 0;
        }

        self.last_active = now;
    }

    /// Starting difficulty for a category before any in-session evidence.
    pub fn recommended_difficulty(&self, category: &str) -> u8 {
        let preference = self.difficulty_preference as i32;
        let Some(mastery) = self.category_mastery.get(category) else {
            return clamp_difficulty(preference);
        };

        let target = match mastery.level {
            level if level < 30 => preference - 2,
            level if level < 60 => preference - 1,
            level if level > 80 => preference + 1,
            _ => preference,
        };
        clamp_difficulty(target)
    }

    pub fn average_session_time(&self) -> f64 {
        if self.total_questions_answered == 0 {
            return 0.0;
        }
        self.total_time_spent / self.total_questions_answered as f64
    }
}

/// Mastery contribution to a difficulty decision; zero for untracked categories.
pub fn mastery_influence(mastery: Option<&CategoryMastery>, factor: f64) -> MasteryInfluence {
    match mastery {
        Some(m) => {
            let mastery_level = m.level as f64 / 100.0;
            MasteryInfluence {
                mastery_level,
                confidence: m.confidence,
                influence: mastery_level * m.confidence * factor,
            }
        }
        None => MasteryInfluence::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    fn tracker() -> MasteryTracker {
        MasteryTracker::default()
    }

    #[test]
    fn first_answer_creates_record() {
        let m = tracker().update_category_mastery(None, true, 20.0, now());
        assert_eq!(m.questions_answered, 1);
        assert_eq!(m.average_accuracy, 1.0);
        assert_eq!(m.average_time_per_question, 20.0);
        assert_eq!(m.streak_count, 1);
        // 60 + 2 + (15 - 2) = 75
        assert_eq!(m.level, 75);
        assert!((m.confidence - 0.05).abs() < 1e-12);
        assert_eq!(m.last_assessed, now());
    }

    #[test]
    fn running_means_follow_rounded_correct_count() {
        let t = tracker();
        let m1 = t.update_category_mastery(None, true, 10.0, now());
        let m2 = t.update_category_mastery(Some(&m1), false, 30.0, now());
        let m3 = t.update_category_mastery(Some(&m2), true, 20.0, now());

        assert!((m2.average_accuracy - 0.5).abs() < 1e-12);
        assert!((m3.average_accuracy - 2.0 / 3.0).abs() < 1e-12);
        assert!((m3.average_time_per_question - 20.0).abs() < 1e-12);
        assert_eq!(m3.questions_answered, 3);
    }

    #[test]
    fn perfect_streak_reaches_eighty_by_five() {
        let t = tracker();
        let mut mastery: Option<CategoryMastery> = None;
        let mut last_level = 0;
        for _ in 0..5 {
            let next = t.update_category_mastery(mastery.as_ref(), true, 15.0, now());
            assert!(next.level >= last_level);
            last_level = next.level;
            mastery = Some(next);
        }
        assert!(last_level >= 80, "level after five correct was {last_level}");
    }

    #[test]
    fn incorrect_answer_resets_streak_and_does_not_raise_level() {
        let t = tracker();
        let mut m = t.update_category_mastery(None, true, 10.0, now());
        for _ in 0..4 {
            m = t.update_category_mastery(Some(&m), true, 10.0, now());
        }
        let before = m.level;
        let after = t.update_category_mastery(Some(&m), false, 10.0, now());
        assert_eq!(after.streak_count, 0);
        assert!(after.level <= before);
    }

    #[test]
    fn speed_score_floors_at_zero() {
        let m = tracker().update_category_mastery(None, false, 600.0, now());
        assert_eq!(m.level, 0);
    }

    #[test]
    fn confidence_saturates_after_twenty_answers() {
        let t = tracker();
        let mut m = t.update_category_mastery(None, true, 5.0, now());
        for _ in 0..29 {
            m = t.update_category_mastery(Some(&m), true, 5.0, now());
        }
        assert!((m.confidence - 1.0).abs() < 1e-12);
        assert_eq!(m.level, 100);
    }

    #[test]
    fn record_answer_updates_learner_totals() {
        let t = tracker();
        let mut learner = Learner::new("l-1", now());
        t.record_answer(&mut learner, "algebra", true, 12.0, now()).unwrap();
        t.record_answer(&mut learner, "algebra", true, 8.0, now()).unwrap();
        t.record_answer(&mut learner, "geometry", false, 40.0, now()).unwrap();

        assert_eq!(learner.total_questions_answered, 3);
        assert_eq!(learner.total_time_spent, 60.0);
        assert_eq!(learner.current_streak, 0);
        assert_eq!(learner.longest_streak, 2);
        assert!((learner.overall_accuracy - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(learner.average_session_time(), 20.0);
        assert_eq!(learner.category_mastery.len(), 2);
    }

    #[test]
    fn record_answer_rejects_negative_time() {
        let mut learner = Learner::new("l-1", now());
        let err = tracker()
            .record_answer(&mut learner, "algebra", true, -3.0, now())
            .unwrap_err();
        assert!(matches!(err, crate::EngineError::InvalidInput(_)));
        assert!(learner.category_mastery.is_empty());
        assert_eq!(learner.total_questions_answered, 0);
    }

    #[test]
    fn recommended_difficulty_tracks_mastery_bands() {
        let mut learner = Learner::new("l-1", now()).with_preference(5);
        assert_eq!(learner.recommended_difficulty("unknown"), 5);

        let mut record = CategoryMastery::empty(now());
        for (level, expected) in [(10, 3), (45, 4), (70, 5), (85, 6)] {
            record.level = level;
            learner.category_mastery.insert("c".into(), record.clone());
            assert_eq!(learner.recommended_difficulty("c"), expected, "level {level}");
        }

        learner.difficulty_preference = 1;
        record.level = 10;
        learner.category_mastery.insert("c".into(), record);
        assert_eq!(learner.recommended_difficulty("c"), 1);
    }

    #[test]
    fn weak_and_strong_areas_split_on_thresholds() {
        let mut learner = Learner::new("l-1", now());
        for (category, level) in [("a", 59), ("b", 60), ("c", 80), ("d", 20)] {
            let mut record = CategoryMastery::empty(now());
            record.level = level;
            learner.category_mastery.insert(category.into(), record);
        }
        let t = tracker();
        assert_eq!(t.weak_areas(&learner), vec!["a".to_string(), "d".to_string()]);
        assert_eq!(t.strong_areas(&learner), vec!["c".to_string()]);
    }

    #[test]
    fn influence_is_zero_for_untracked_category() {
        assert_eq!(mastery_influence(None, 0.3), MasteryInfluence::default());

        let mut record = CategoryMastery::empty(now());
        record.level = 70;
        record.confidence = 0.8;
        let influence = mastery_influence(Some(&record), 0.3);
        assert!((influence.mastery_level - 0.7).abs() < 1e-12);
        assert!((influence.influence - 0.168).abs() < 1e-12);
    }
}
