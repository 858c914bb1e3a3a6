//! Learner analysis feeding the set composer: weak and strong categories,
//! a recommended difficulty and behavioural patterns from recent answers.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Duration, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::config::{ComposerConfig, MasteryConfig};
use crate::sanitize::clamp_difficulty;
use crate::types::{AnswerEvent, Learner};

/// Most recent answers considered in one analysis.
pub const MAX_RECENT_ANSWERS: usize = 100;
/// Hour buckets need this many answers before they can be best or worst.
const MIN_HOURLY_SAMPLES: u32 = 3;
const LOW_MASTERY_REASON: &str = "Low mastery level";
const RECENT_POOR_REASON: &str = "Recent poor performance";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryAnalysis {
    pub category: String,
    pub level: u8,
    pub confidence: f64,
    pub questions_answered: u32,
    pub average_accuracy: f64,
    pub last_assessed: DateTime<Utc>,
    pub needs_attention: bool,
    pub is_strong: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeakArea {
    pub category: String,
    /// 0-100; for areas flagged from recent answers only, the recent accuracy.
    pub mastery_level: f64,
    pub confidence: f64,
    pub questions_answered: u32,
    /// 0-100, higher is more urgent.
    pub priority: f64,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StrongArea {
    pub category: String,
    pub mastery_level: u8,
    pub confidence: f64,
    pub questions_answered: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tally {
    pub correct: u32,
    pub total: u32,
}

impl Tally {
    fn add(&mut self, correct: bool) {
        self.total += 1;
        if correct {
            self.correct += 1;
        }
    }

    pub fn accuracy(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.correct as f64 / self.total as f64
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimePatterns {
    pub best_hour: Option<u32>,
    pub worst_hour: Option<u32>,
    pub best_accuracy: f64,
    pub worst_accuracy: f64,
    /// UTC hour of day to answer tally.
    pub hourly: BTreeMap<u32, Tally>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DifficultyPatterns {
    pub accuracy_by_difficulty: BTreeMap<u8, f64>,
    pub tallies: BTreeMap<u8, Tally>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HintPatterns {
    pub average_hints: f64,
    pub total_hints: u32,
    pub hints_when_correct: u32,
    pub hints_when_incorrect: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionPatterns {
    /// Mean answers per session.
    pub average_session_length: f64,
    /// Mean seconds spent per session.
    pub average_session_time: f64,
    pub total_sessions: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LearningPatterns {
    pub time: TimePatterns,
    pub difficulty: DifficultyPatterns,
    pub hints: HintPatterns,
    pub sessions: SessionPatterns,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LearnerAnalysis {
    /// Sorted by category name.
    pub categories: Vec<CategoryAnalysis>,
    /// Highest priority first.
    pub weak_areas: Vec<WeakArea>,
    /// Highest mastery first.
    pub strong_areas: Vec<StrongArea>,
    pub recommended_difficulty: u8,
    pub recent_accuracy: Option<f64>,
    pub total_questions_answered: u32,
    pub learning_patterns: LearningPatterns,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExperienceLevel {
    Beginner,
    Novice,
    Intermediate,
    Advanced,
    Expert,
}

impl ExperienceLevel {
    pub fn from_total_answers(total: u32) -> Self {
        match total {
            0..=9 => Self::Beginner,
            10..=49 => Self::Novice,
            50..=199 => Self::Intermediate,
            200..=499 => Self::Advanced,
            _ => Self::Expert,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonalizationFactors {
    pub experience_level: ExperienceLevel,
    pub learning_velocity: f64,
    pub preferred_difficulty: u8,
    pub weak_area_count: usize,
    pub strong_area_count: usize,
    pub overall_accuracy: f64,
    pub current_streak: u32,
    pub days_since_last_active: i64,
}

#[derive(Debug, Clone)]
pub struct LearnerAnalyzer {
    config: ComposerConfig,
    weak_threshold: u8,
    strong_threshold: u8,
}

impl Default for LearnerAnalyzer {
    fn default() -> Self {
        Self::new(ComposerConfig::default(), &MasteryConfig::default())
    }
}

impl LearnerAnalyzer {
    pub fn new(config: ComposerConfig, mastery: &MasteryConfig) -> Self {
        Self {
            config,
            weak_threshold: mastery.weak_threshold,
            strong_threshold: mastery.strong_threshold,
        }
    }

    pub fn config(&self) -> &ComposerConfig {
        &self.config
    }

    /// Full analysis of a learner.
    ///
    /// `recent_answers` may span any period; only those inside the recent
    /// window (capped at [`MAX_RECENT_ANSWERS`], newest kept) are used. With
    /// `focus` set, only those categories are analysed.
    pub fn analyze_learner(
        &self,
        learner: &Learner,
        recent_answers: &[AnswerEvent],
        focus: Option<&[String]>,
        now: DateTime<Utc>,
    ) -> LearnerAnalysis {
        let in_focus = |category: &str| focus.map_or(true, |f| f.iter().any(|c| c == category));

        let cutoff = now - Duration::days(self.config.recent_performance_days);
        let mut recent: Vec<&AnswerEvent> = recent_answers
            .iter()
            .filter(|e| e.timestamp >= cutoff && e.timestamp <= now)
            .collect();
        recent.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        recent.truncate(MAX_RECENT_ANSWERS);

        let categories = self.analyze_category_mastery(learner, focus);
        let focused_recent: Vec<&AnswerEvent> =
            recent.iter().copied().filter(|e| in_focus(e.category.as_str())).collect();

        let weak_areas = self.identify_weak_areas(&categories, &focused_recent, now);
        let strong_areas = identify_strong_areas(&categories);
        let recent_accuracy = accuracy_of(&recent);
        let recommended_difficulty =
            self.recommended_difficulty(learner, weak_areas.len(), recent_accuracy);

        tracing::debug!(
            learner_id = %learner.id,
            weak = weak_areas.len(),
            strong = strong_areas.len(),
            recommended_difficulty,
            "learner analysed"
        );

        LearnerAnalysis {
            categories,
            weak_areas,
            strong_areas,
            recommended_difficulty,
            recent_accuracy,
            total_questions_answered: learner.total_questions_answered,
            learning_patterns: learning_patterns(&recent),
        }
    }

    pub fn analyze_category_mastery(
        &self,
        learner: &Learner,
        focus: Option<&[String]>,
    ) -> Vec<CategoryAnalysis> {
        let mut categories: Vec<CategoryAnalysis> = learner
            .category_mastery
            .iter()
            .filter(|(category, _)| focus.map_or(true, |f| f.iter().any(|c| c == *category)))
            .map(|(category, m)| CategoryAnalysis {
                category: category.clone(),
                level: m.level,
                confidence: m.confidence,
                questions_answered: m.questions_answered,
                average_accuracy: m.average_accuracy,
                last_assessed: m.last_assessed,
                needs_attention: m.level < self.weak_threshold,
                is_strong: m.level >= self.strong_threshold,
            })
            .collect();
        categories.sort_by(|a, b| a.category.cmp(&b.category));
        categories
    }

    /// Weak categories from mastery, merged with categories that look weak
    /// from recent answers alone.
    pub fn identify_weak_areas(
        &self,
        categories: &[CategoryAnalysis],
        recent: &[&AnswerEvent],
        now: DateTime<Utc>,
    ) -> Vec<WeakArea> {
        let mut weak_areas: Vec<WeakArea> = categories
            .iter()
            .filter(|c| c.needs_attention)
            .map(|c| WeakArea {
                category: c.category.clone(),
                mastery_level: c.level as f64,
                confidence: c.confidence,
                questions_answered: c.questions_answered,
                priority: self.weak_area_priority(c, recent, now),
                reason: LOW_MASTERY_REASON.to_string(),
            })
            .collect();

        for recent_weak in self.identify_recent_weak_areas(recent) {
            match weak_areas.iter_mut().find(|w| w.category == recent_weak.category) {
                Some(existing) => {
                    existing.priority = existing.priority.max(recent_weak.priority);
                    existing.reason.push_str(", ");
                    existing.reason.push_str(RECENT_POOR_REASON);
                }
                None => weak_areas.push(recent_weak),
            }
        }

        weak_areas.sort_by(|a, b| {
            b.priority
                .partial_cmp(&a.priority)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        weak_areas
    }

    /// `(100 - level) * 0.4 + (1 - confidence) * 20 + (1 - recent accuracy) * 30`
    /// plus up to ten points of staleness, capped at 100.
    pub fn weak_area_priority(
        &self,
        category: &CategoryAnalysis,
        recent: &[&AnswerEvent],
        now: DateTime<Utc>,
    ) -> f64 {
        let mut priority = (100.0 - category.level as f64) * 0.4;
        priority += (1.0 - category.confidence) * 20.0;

        let in_category: Vec<&AnswerEvent> = recent
            .iter()
            .copied()
            .filter(|e| e.category == category.category)
            .collect();
        if let Some(recent_accuracy) = accuracy_of(&in_category) {
            priority += (1.0 - recent_accuracy) * 30.0;
        }

        let days_since = (now - category.last_assessed).num_milliseconds() as f64 / 86_400_000.0;
        if days_since > self.config.stale_after_days {
            priority += (days_since - self.config.stale_after_days)
                .min(self.config.max_staleness_priority);
        }

        priority.min(100.0)
    }

    pub fn identify_recent_weak_areas(&self, recent: &[&AnswerEvent]) -> Vec<WeakArea> {
        let mut by_category: BTreeMap<&str, Tally> = BTreeMap::new();
        for event in recent {
            by_category.entry(event.category.as_str()).or_default().add(event.correct);
        }

        by_category
            .into_iter()
            .filter(|(_, tally)| tally.total as usize >= self.config.min_recent_answers)
            .filter(|(_, tally)| tally.accuracy() < self.config.recent_weak_accuracy)
            .map(|(category, tally)| {
                let accuracy = tally.accuracy();
                WeakArea {
                    category: category.to_string(),
                    mastery_level: accuracy * 100.0,
                    confidence: (tally.total as f64 / 10.0).min(1.0),
                    questions_answered: tally.total,
                    priority: (1.0 - accuracy) * 80.0,
                    reason: RECENT_POOR_REASON.to_string(),
                }
            })
            .collect()
    }

    /// Preference moved one step by recent accuracy, and one more step down
    /// when the learner has many weak areas.
    pub fn recommended_difficulty(
        &self,
        learner: &Learner,
        weak_area_count: usize,
        recent_accuracy: Option<f64>,
    ) -> u8 {
        let mut difficulty = learner.difficulty_preference as i32;
        match recent_accuracy {
            Some(acc) if acc < 0.5 => difficulty -= 1,
            Some(acc) if acc > 0.8 => difficulty += 1,
            _ => {}
        }
        difficulty = clamp_difficulty(difficulty) as i32;
        if weak_area_count > self.config.many_weak_areas {
            difficulty -= 1;
        }
        clamp_difficulty(difficulty)
    }

    pub fn personalization_factors(
        &self,
        learner: &Learner,
        analysis: &LearnerAnalysis,
        now: DateTime<Utc>,
    ) -> PersonalizationFactors {
        PersonalizationFactors {
            experience_level: ExperienceLevel::from_total_answers(learner.total_questions_answered),
            learning_velocity: learner.learning_velocity,
            preferred_difficulty: learner.difficulty_preference,
            weak_area_count: analysis.weak_areas.len(),
            strong_area_count: analysis.strong_areas.len(),
            overall_accuracy: learner.overall_accuracy,
            current_streak: learner.current_streak,
            days_since_last_active: (now - learner.last_active).num_days(),
        }
    }
}

fn identify_strong_areas(categories: &[CategoryAnalysis]) -> Vec<StrongArea> {
    let mut strong: Vec<StrongArea> = categories
        .iter()
        .filter(|c| c.is_strong)
        .map(|c| StrongArea {
            category: c.category.clone(),
            mastery_level: c.level,
            confidence: c.confidence,
            questions_answered: c.questions_answered,
        })
        .collect();
    strong.sort_by(|a, b| b.mastery_level.cmp(&a.mastery_level));
    strong
}

fn accuracy_of(events: &[&AnswerEvent]) -> Option<f64> {
    if events.is_empty() {
        return None;
    }
    let correct = events.iter().filter(|e| e.correct).count();
    Some(correct as f64 / events.len() as f64)
}

/// Time-of-day, difficulty, hint and session patterns over `events`.
pub fn learning_patterns(events: &[&AnswerEvent]) -> LearningPatterns {
    LearningPatterns {
        time: time_patterns(events),
        difficulty: difficulty_patterns(events),
        hints: hint_patterns(events),
        sessions: session_patterns(events),
    }
}

fn time_patterns(events: &[&AnswerEvent]) -> TimePatterns {
    let mut hourly: BTreeMap<u32, Tally> = BTreeMap::new();
    for event in events {
        hourly.entry(event.timestamp.hour()).or_default().add(event.correct);
    }

    let mut patterns = TimePatterns {
        best_accuracy: 0.0,
        worst_accuracy: 1.0,
        ..TimePatterns::default()
    };
    for (&hour, tally) in hourly.iter().filter(|(_, t)| t.total >= MIN_HOURLY_SAMPLES) {
        let accuracy = tally.accuracy();
        if accuracy > patterns.best_accuracy {
            patterns.best_accuracy = accuracy;
            patterns.best_hour = Some(hour);
        }
        if accuracy < patterns.worst_accuracy {
            patterns.worst_accuracy = accuracy;
            patterns.worst_hour = Some(hour);
        }
    }
    patterns.hourly = hourly;
    patterns
}

fn difficulty_patterns(events: &[&AnswerEvent]) -> DifficultyPatterns {
    let mut tallies: BTreeMap<u8, Tally> = BTreeMap::new();
    for event in events {
        tallies.entry(event.difficulty).or_default().add(event.correct);
    }
    let accuracy_by_difficulty = tallies.iter().map(|(&d, t)| (d, t.accuracy())).collect();
    DifficultyPatterns {
        accuracy_by_difficulty,
        tallies,
    }
}

fn hint_patterns(events: &[&AnswerEvent]) -> HintPatterns {
    let total_hints: u32 = events.iter().map(|e| e.hints_used).sum();
    let hints_when_correct: u32 = events.iter().filter(|e| e.correct).map(|e| e.hints_used).sum();
    HintPatterns {
        average_hints: if events.is_empty() {
            0.0
        } else {
            total_hints as f64 / events.len() as f64
        },
        total_hints,
        hints_when_correct,
        hints_when_incorrect: total_hints - hints_when_correct,
    }
}

/// Answers without a session id are grouped into one anonymous session.
fn session_patterns(events: &[&AnswerEvent]) -> SessionPatterns {
    let mut sessions: HashMap<Option<&str>, (usize, f64)> = HashMap::new();
    for event in events {
        let entry = sessions.entry(event.session_id.as_deref()).or_insert((0, 0.0));
        entry.0 += 1;
        entry.1 += event.time_spent_seconds;
    }
    if sessions.is_empty() {
        return SessionPatterns::default();
    }

    let n = sessions.len() as f64;
    SessionPatterns {
        average_session_length: sessions.values().map(|(count, _)| *count as f64).sum::<f64>() / n,
        average_session_time: sessions.values().map(|(_, time)| time).sum::<f64>() / n,
        total_sessions: sessions.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CategoryMastery;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 8, 20, 12, 0, 0).unwrap()
    }

    fn analyzer() -> LearnerAnalyzer {
        LearnerAnalyzer::new(ComposerConfig::default(), &MasteryConfig::default())
    }

    fn learner_with(levels: &[(&str, u8, f64)]) -> Learner {
        let mut learner = Learner::new("l-1", now());
        for &(category, level, confidence) in levels {
            let mut m = CategoryMastery::empty(now());
            m.level = level;
            m.confidence = confidence;
            m.questions_answered = 10;
            learner.category_mastery.insert(category.into(), m);
        }
        learner
    }

    fn event(category: &str, correct: bool, hours_ago: i64) -> AnswerEvent {
        AnswerEvent::new(category, correct, 20.0, 5, now() - Duration::hours(hours_ago))
    }

    #[test]
    fn weak_priority_blends_level_confidence_and_recent_accuracy() {
        let a = analyzer();
        let categories = a.analyze_category_mastery(&learner_with(&[("algebra", 40, 0.5)]), None);
        let e1 = event("algebra", false, 1);
        let e2 = event("algebra", true, 2);
        let recent = vec![&e1, &e2];

        // 60 * 0.4 + 0.5 * 20 + 0.5 * 30 = 49
        let priority = a.weak_area_priority(&categories[0], &recent, now());
        assert!((priority - 49.0).abs() < 1e-9);

        // Ten days stale adds three points.
        let later = now() + Duration::days(10);
        let priority = a.weak_area_priority(&categories[0], &[], later);
        assert!((priority - 37.0).abs() < 1e-9);

        // Staleness is capped at ten.
        let much_later = now() + Duration::days(60);
        let priority = a.weak_area_priority(&categories[0], &[], much_later);
        assert!((priority - 44.0).abs() < 1e-9);
    }

    #[test]
    fn recent_poor_performance_merges_into_existing_weak_area() {
        let learner = learner_with(&[("algebra", 50, 0.9), ("geometry", 90, 0.9)]);
        let answers: Vec<AnswerEvent> = vec![
            event("algebra", false, 1),
            event("algebra", false, 2),
            event("algebra", false, 3),
            event("geometry", false, 1),
            event("geometry", false, 2),
            event("geometry", true, 3),
            event("history", true, 4),
        ];
        let analysis = analyzer().analyze_learner(&learner, &answers, None, now());

        assert_eq!(analysis.weak_areas.len(), 2);
        let algebra = &analysis.weak_areas[0];
        assert_eq!(algebra.category, "algebra");
        assert_eq!(algebra.priority, 80.0);
        assert_eq!(algebra.reason, "Low mastery level, Recent poor performance");

        let geometry = &analysis.weak_areas[1];
        assert_eq!(geometry.category, "geometry");
        assert_eq!(geometry.reason, "Recent poor performance");
        assert_eq!(geometry.questions_answered, 3);

        assert_eq!(analysis.strong_areas.len(), 1);
        assert_eq!(analysis.strong_areas[0].category, "geometry");
    }

    #[test]
    fn old_answers_fall_outside_recent_window() {
        let learner = learner_with(&[]);
        let answers = vec![
            event("algebra", false, 24 * 8),
            event("algebra", false, 24 * 9),
            event("algebra", false, 24 * 10),
        ];
        let analysis = analyzer().analyze_learner(&learner, &answers, None, now());
        assert!(analysis.weak_areas.is_empty());
        assert_eq!(analysis.recent_accuracy, None);
        assert_eq!(analysis.recommended_difficulty, 5);
    }

    #[test]
    fn focus_limits_categories() {
        let learner = learner_with(&[("algebra", 20, 0.2), ("geometry", 30, 0.2)]);
        let focus = vec!["geometry".to_string()];
        let analysis = analyzer().analyze_learner(&learner, &[], Some(&focus), now());
        assert_eq!(analysis.categories.len(), 1);
        assert_eq!(analysis.weak_areas.len(), 1);
        assert_eq!(analysis.weak_areas[0].category, "geometry");
    }

    #[test]
    fn recommended_difficulty_follows_recent_accuracy_and_weak_count() {
        let a = analyzer();
        let learner = Learner::new("l", now()).with_preference(5);
        assert_eq!(a.recommended_difficulty(&learner, 0, None), 5);
        assert_eq!(a.recommended_difficulty(&learner, 0, Some(0.4)), 4);
        assert_eq!(a.recommended_difficulty(&learner, 0, Some(0.9)), 6);
        assert_eq!(a.recommended_difficulty(&learner, 4, Some(0.4)), 3);
        assert_eq!(a.recommended_difficulty(&learner, 4, Some(0.9)), 5);

        let floor = Learner::new("l", now()).with_preference(1);
        assert_eq!(a.recommended_difficulty(&floor, 5, Some(0.1)), 1);
    }

    #[test]
    fn patterns_from_recent_answers() {
        let base = Utc.with_ymd_and_hms(2024, 8, 20, 9, 0, 0).unwrap();
        let events: Vec<AnswerEvent> = vec![
            AnswerEvent::new("a", true, 10.0, 3, base).in_session("s1"),
            AnswerEvent::new("a", true, 20.0, 3, base).in_session("s1"),
            AnswerEvent::new("a", true, 30.0, 6, base).in_session("s1").with_hints(1),
            AnswerEvent::new("a", false, 40.0, 6, base + Duration::hours(5)).with_hints(2),
            AnswerEvent::new("a", false, 40.0, 6, base + Duration::hours(5)),
            AnswerEvent::new("a", true, 40.0, 6, base + Duration::hours(5)),
        ];
        let refs: Vec<&AnswerEvent> = events.iter().collect();
        let patterns = learning_patterns(&refs);

        assert_eq!(patterns.time.best_hour, Some(9));
        assert_eq!(patterns.time.worst_hour, Some(14));
        assert_eq!(patterns.difficulty.accuracy_by_difficulty[&3], 1.0);
        assert_eq!(patterns.difficulty.accuracy_by_difficulty[&6], 0.5);
        assert_eq!(patterns.hints.total_hints, 3);
        assert_eq!(patterns.hints.hints_when_correct, 1);
        assert_eq!(patterns.hints.hints_when_incorrect, 2);
        assert_eq!(patterns.sessions.total_sessions, 2);
        assert_eq!(patterns.sessions.average_session_length, 3.0);
        assert_eq!(patterns.sessions.average_session_time, 90.0);
    }

    #[test]
    fn experience_levels_and_factors() {
        assert_eq!(ExperienceLevel::from_total_answers(0), ExperienceLevel::Beginner);
        assert_eq!(ExperienceLevel::from_total_answers(10), ExperienceLevel::Novice);
        assert_eq!(ExperienceLevel::from_total_answers(199), ExperienceLevel::Intermediate);
        assert_eq!(ExperienceLevel::from_total_answers(200), ExperienceLevel::Advanced);
        assert_eq!(ExperienceLevel::from_total_answers(500), ExperienceLevel::Expert);

        let a = analyzer();
        let learner = learner_with(&[("algebra", 20, 0.2)]);
        let analysis = a.analyze_learner(&learner, &[], None, now());
        let factors = a.personalization_factors(&learner, &analysis, now() + Duration::hours(60));
        assert_eq!(factors.weak_area_count, 1);
        assert_eq!(factors.days_since_last_active, 2);
        assert_eq!(factors.experience_level, ExperienceLevel::Beginner);
    }
}
