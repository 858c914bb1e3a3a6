//! Builds a personalized question set from three pools:
//! - weak-area questions, spread over the top weak categories
//! - spaced-repetition cards that are due (or nearly due)
//! - new content around the learner's recommended difficulty
//!
//! Picks never repeat a question, and the finished set is shuffled with a
//! caller-supplied RNG.

use std::collections::HashSet;

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::{ComposerConfig, MasteryConfig, SetRatios};
use crate::error::Result;
use crate::memory::scheduler::SpacedRepetitionCard;
use crate::sanitize::{clamp_difficulty, round_half_up, validate_difficulty};
use crate::types::{AnswerEvent, Learner, Question};

use super::analysis::{
    LearnerAnalysis, LearnerAnalyzer, PersonalizationFactors, StrongArea, WeakArea,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionDistribution {
    pub weak_areas: usize,
    pub reviews: usize,
    pub new_content: usize,
    pub total: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum QuestionSource {
    WeakArea,
    Review,
    NewContent,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectedQuestion {
    #[serde(flatten)]
    pub question: Question,
    pub source: QuestionSource,
}

/// What the composer knows about the learner.
#[derive(Debug, Clone, Copy)]
pub struct LearnerState<'a> {
    pub learner: &'a Learner,
    /// Answers from any period; the analysis keeps the recent window.
    pub recent_answers: &'a [AnswerEvent],
}

/// Candidate pools supplied by the caller.
#[derive(Debug, Clone, Copy)]
pub struct QuestionPools<'a> {
    pub questions: &'a [Question],
    pub review_cards: &'a [SpacedRepetitionCard],
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetOptions {
    /// Clamped to the configured bounds; configured default when `None`.
    pub set_size: Option<usize>,
    pub focus_categories: Option<Vec<String>>,
    pub exclude_question_ids: Vec<String>,
    pub session_id: Option<String>,
    pub include_reviews: bool,
    pub difficulty_override: Option<u8>,
}

impl Default for SetOptions {
    fn default() -> Self {
        Self {
            set_size: None,
            focus_categories: None,
            exclude_question_ids: Vec::new(),
            session_id: None,
            include_reviews: true,
            difficulty_override: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetMetadata {
    pub learner_id: String,
    pub session_id: Option<String>,
    pub generated_at: DateTime<Utc>,
    /// Questions actually selected; can be below the requested size when
    /// pools run dry.
    pub set_size: usize,
    pub distribution: QuestionDistribution,
    pub weak_areas: Vec<WeakArea>,
    pub strong_areas: Vec<StrongArea>,
    pub recommended_difficulty: u8,
    pub total_questions_answered: u32,
    pub personalization_factors: PersonalizationFactors,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonalizedSet {
    pub questions: Vec<SelectedQuestion>,
    pub metadata: SetMetadata,
}

#[derive(Debug, Clone, Default)]
pub struct SetComposer {
    analyzer: LearnerAnalyzer,
}

impl SetComposer {
    pub fn new(config: ComposerConfig, mastery: &MasteryConfig) -> Self {
        Self {
            analyzer: LearnerAnalyzer::new(config, mastery),
        }
    }

    pub fn analyzer(&self) -> &LearnerAnalyzer {
        &self.analyzer
    }

    fn config(&self) -> &ComposerConfig {
        self.analyzer.config()
    }

    pub fn clamp_set_size(&self, requested: Option<usize>) -> usize {
        let c = self.config();
        requested
            .unwrap_or(c.default_set_size)
            .clamp(c.min_set_size, c.max_set_size)
    }

    /// Splits `set_size` across the three pools.
    ///
    /// A cold-start learner gets the cold-start ratios even when they also
    /// have many weak areas. Without reviews the weak/new ratios are
    /// renormalised to fill the set.
    pub fn question_distribution(
        &self,
        set_size: usize,
        weak_area_count: usize,
        total_answered: u32,
        include_reviews: bool,
    ) -> QuestionDistribution {
        let c = self.config();
        let ratios: &SetRatios = if total_answered < c.cold_start_answers {
            &c.cold_start_ratios
        } else if weak_area_count > c.many_weak_areas {
            &c.weak_focus_ratios
        } else {
            &c.default_ratios
        };

        let (weak_ratio, review_ratio) = if include_reviews {
            (ratios.weak_area, ratios.review)
        } else {
            let total = ratios.weak_area + ratios.new_content;
            let weak = if total > 0.0 { ratios.weak_area / total } else { 0.0 };
            (weak, 0.0)
        };

        let size = set_size as f64;
        let weak_areas = (round_half_up(size * weak_ratio) as usize).min(set_size);
        let reviews = (round_half_up(size * review_ratio) as usize).min(set_size - weak_areas);

        QuestionDistribution {
            weak_areas,
            reviews,
            new_content: set_size - weak_areas - reviews,
            total: set_size,
        }
    }

    pub fn build_set<R: Rng + ?Sized>(
        &self,
        state: &LearnerState<'_>,
        pools: &QuestionPools<'_>,
        options: &SetOptions,
        now: DateTime<Utc>,
        rng: &mut R,
    ) -> Result<PersonalizedSet> {
        let difficulty_override = options
            .difficulty_override
            .map(|d| validate_difficulty(d, "difficulty override"))
            .transpose()?;
        let set_size = self.clamp_set_size(options.set_size);
        let learner = state.learner;

        let analysis = self.analyzer.analyze_learner(
            learner,
            state.recent_answers,
            options.focus_categories.as_deref(),
            now,
        );
        let distribution = self.question_distribution(
            set_size,
            analysis.weak_areas.len(),
            analysis.total_questions_answered,
            options.include_reviews,
        );

        let mut taken: HashSet<&str> =
            options.exclude_question_ids.iter().map(String::as_str).collect();
        let mut selected: Vec<SelectedQuestion> = Vec::with_capacity(set_size);

        let weak = self.weak_area_questions(
            learner,
            &analysis,
            pools.questions,
            &taken,
            distribution.weak_areas,
            difficulty_override,
        );
        for q in weak {
            taken.insert(q.id.as_str());
            selected.push(SelectedQuestion {
                question: q.clone(),
                source: QuestionSource::WeakArea,
            });
        }

        if options.include_reviews {
            for q in self.review_questions(learner, pools, &taken, distribution.reviews, now) {
                taken.insert(q.id.as_str());
                selected.push(SelectedQuestion {
                    question: q.clone(),
                    source: QuestionSource::Review,
                });
            }
        }

        let fresh = self.new_content_questions(
            &analysis,
            pools.questions,
            &taken,
            distribution.new_content,
            difficulty_override,
        );
        for q in fresh {
            taken.insert(q.id.as_str());
            selected.push(SelectedQuestion {
                question: q.clone(),
                source: QuestionSource::NewContent,
            });
        }

        shuffle(&mut selected, rng);

        tracing::info!(
            learner_id = %learner.id,
            requested = set_size,
            selected = selected.len(),
            weak = distribution.weak_areas,
            reviews = distribution.reviews,
            new_content = distribution.new_content,
            "personalized set built"
        );

        let personalization_factors =
            self.analyzer.personalization_factors(learner, &analysis, now);
        Ok(PersonalizedSet {
            metadata: SetMetadata {
                learner_id: learner.id.clone(),
                session_id: options.session_id.clone(),
                generated_at: now,
                set_size: selected.len(),
                distribution,
                weak_areas: analysis.weak_areas,
                strong_areas: analysis.strong_areas,
                recommended_difficulty: analysis.recommended_difficulty,
                total_questions_answered: analysis.total_questions_answered,
                personalization_factors,
            },
            questions: selected,
        })
    }

    /// Up to `count` questions from the top weak categories, an even share
    /// per category, each within the difficulty window around that
    /// category's target.
    pub fn weak_area_questions<'q>(
        &self,
        learner: &Learner,
        analysis: &LearnerAnalysis,
        questions: &'q [Question],
        taken: &HashSet<&str>,
        count: usize,
        difficulty_override: Option<u8>,
    ) -> Vec<&'q Question> {
        let c = self.config();
        if count == 0 {
            return Vec::new();
        }

        let areas = &analysis.weak_areas[..analysis.weak_areas.len().min(c.max_categories_per_set)];
        if areas.is_empty() {
            return Vec::new();
        }
        let per_area = (count / areas.len()).max(1);
        let mut picked: Vec<&Question> = Vec::new();

        for area in areas {
            if picked.len() >= count {
                break;
            }
            let target = difficulty_override
                .unwrap_or_else(|| learner.recommended_difficulty(&area.category));
            let (min, max) = self.difficulty_window(target);

            let mut candidates: Vec<&Question> = questions
                .iter()
                .filter(|q| !taken.contains(q.id.as_str()))
                .filter(|q| !picked.iter().any(|p| p.id == q.id))
                .filter(|q| q.in_category(&area.category))
                .filter(|q| (min..=max).contains(&q.difficulty))
                .collect();
            sort_least_used(&mut candidates);
            picked.extend(candidates.into_iter().take(per_area));
        }

        picked.truncate(count);
        picked
    }

    /// Due cards (within the look-ahead buffer), earliest first, resolved
    /// against the question pool. Retired cards never come back.
    pub fn review_questions<'q>(
        &self,
        learner: &Learner,
        pools: &QuestionPools<'q>,
        taken: &HashSet<&str>,
        count: usize,
        now: DateTime<Utc>,
    ) -> Vec<&'q Question> {
        if count == 0 {
            return Vec::new();
        }
        let horizon = now + Duration::hours(self.config().due_review_buffer_hours);

        let mut due: Vec<&SpacedRepetitionCard> = pools
            .review_cards
            .iter()
            .filter(|card| card.learner_id == learner.id)
            .filter(|card| !card.is_retired && card.next_review_date <= horizon)
            .filter(|card| !taken.contains(card.question_id.as_str()))
            .collect();
        due.sort_by(|a, b| a.next_review_date.cmp(&b.next_review_date));

        let mut seen: HashSet<&str> = HashSet::new();
        due.into_iter()
            .filter_map(|card| pools.questions.iter().find(|q| q.id == card.question_id))
            .filter(|q| seen.insert(q.id.as_str()))
            .take(count)
            .collect()
    }

    /// Questions around the recommended difficulty. Categories the learner
    /// is developing (between weak and strong) are used first; the rest of
    /// the pool fills any shortfall.
    pub fn new_content_questions<'q>(
        &self,
        analysis: &LearnerAnalysis,
        questions: &'q [Question],
        taken: &HashSet<&str>,
        count: usize,
        difficulty_override: Option<u8>,
    ) -> Vec<&'q Question> {
        if count == 0 {
            return Vec::new();
        }
        let target = difficulty_override.unwrap_or(analysis.recommended_difficulty);
        let (min, max) = self.difficulty_window(target);

        let developing: Vec<&str> = analysis
            .categories
            .iter()
            .filter(|c| !c.needs_attention && !c.is_strong)
            .map(|c| c.category.as_str())
            .collect();

        let mut candidates: Vec<&Question> = questions
            .iter()
            .filter(|q| !taken.contains(q.id.as_str()))
            .filter(|q| (min..=max).contains(&q.difficulty))
            .collect();
        sort_least_used(&mut candidates);

        let (mut preferred, rest): (Vec<&Question>, Vec<&Question>) = candidates
            .into_iter()
            .partition(|q| developing.iter().any(|c| q.in_category(c)));
        preferred.extend(rest);
        preferred.truncate(count);
        preferred
    }

    fn difficulty_window(&self, target: u8) -> (u8, u8) {
        let variance = self.config().difficulty_variance as i32;
        let target = target as i32;
        (
            clamp_difficulty(target - variance),
            clamp_difficulty(target + variance),
        )
    }
}

/// Least used first; newer questions break ties.
fn sort_least_used(questions: &mut [&Question]) {
    questions.sort_by(|a, b| {
        a.times_used
            .cmp(&b.times_used)
            .then_with(|| b.created_at.cmp(&a.created_at))
    });
}

/// Uniform in-place Fisher-Yates shuffle. Used for question sets and for
/// multiple-choice option order.
pub fn shuffle<T, R: Rng + ?Sized>(items: &mut [T], rng: &mut R) {
    for i in (1..items.len()).rev() {
        let j = rng.gen_range(0..=i);
        items.swap(i, j);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CategoryMastery;
    use chrono::TimeZone;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 9, 2, 10, 0, 0).unwrap()
    }

    fn composer() -> SetComposer {
        SetComposer::default()
    }

    fn question(id: &str, category: &str, difficulty: u8, times_used: u32) -> Question {
        Question {
            id: id.into(),
            categories: vec![category.into()],
            difficulty,
            times_used,
            created_at: now() - Duration::days(30),
        }
    }

    #[test]
    fn distribution_default_ratios() {
        let d = composer().question_distribution(10, 1, 100, true);
        assert_eq!((d.weak_areas, d.reviews, d.new_content), (6, 3, 1));
        assert_eq!(d.total, 10);
    }

    #[test]
    fn distribution_weak_focus_and_cold_start() {
        let c = composer();
        let focus = c.question_distribution(20, 4, 100, true);
        assert_eq!((focus.weak_areas, focus.reviews, focus.new_content), (14, 4, 2));

        let cold = c.question_distribution(20, 4, 5, true);
        assert_eq!((cold.weak_areas, cold.reviews, cold.new_content), (6, 2, 12));
    }

    #[test]
    fn distribution_without_reviews_renormalises() {
        let d = composer().question_distribution(10, 0, 100, false);
        assert_eq!((d.weak_areas, d.reviews, d.new_content), (8, 0, 2));
    }

    #[test]
    fn set_size_is_clamped() {
        let c = composer();
        assert_eq!(c.clamp_set_size(None), 10);
        assert_eq!(c.clamp_set_size(Some(1)), 5);
        assert_eq!(c.clamp_set_size(Some(500)), 50);
    }

    #[test]
    fn shuffle_is_a_permutation_and_seeded() {
        let mut a: Vec<u32> = (0..20).collect();
        let mut b = a.clone();
        shuffle(&mut a, &mut ChaCha8Rng::seed_from_u64(7));
        shuffle(&mut b, &mut ChaCha8Rng::seed_from_u64(7));
        assert_eq!(a, b);

        let mut sorted = a.clone();
        sorted.sort();
        assert_eq!(sorted, (0..20).collect::<Vec<_>>());
    }

    #[test]
    fn shuffle_positions_are_roughly_uniform() {
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let mut first_counts = [0u32; 4];
        for _ in 0..4000 {
            let mut items = [0usize, 1, 2, 3];
            shuffle(&mut items, &mut rng);
            first_counts[items[0]] += 1;
        }
        for count in first_counts {
            assert!((800..1200).contains(&count), "skewed count {count}");
        }
    }

    #[test]
    fn weak_area_questions_respect_window_and_usage() {
        let mut learner = Learner::new("l-1", now()).with_preference(5);
        let mut m = CategoryMastery::empty(now());
        m.level = 20;
        learner.category_mastery.insert("algebra".into(), m);

        let pool = vec![
            question("too-hard", "algebra", 9, 0),
            question("used", "algebra", 3, 5),
            question("fresh", "algebra", 3, 0),
            question("other", "geometry", 3, 0),
        ];
        let analysis = composer().analyzer().analyze_learner(&learner, &[], None, now());
        let picked =
            composer().weak_area_questions(&learner, &analysis, &pool, &HashSet::new(), 2, None);
        let ids: Vec<&str> = picked.iter().map(|q| q.id.as_str()).collect();
        // Target difficulty 3 -> window 1..=5.
        assert_eq!(ids, vec!["fresh", "used"]);
    }

    #[test]
    fn weak_quota_splits_evenly_over_top_five_categories() {
        let mut learner = Learner::new("l-1", now()).with_preference(5);
        let mut pool = Vec::new();
        for i in 0..7u8 {
            let category = format!("c{i}");
            let mut m = CategoryMastery::empty(now());
            // c0 is the weakest, so the highest priority.
            m.level = 5 * (i + 1);
            m.confidence = 0.5;
            learner.category_mastery.insert(category.clone(), m);
            for n in 0..3 {
                pool.push(question(&format!("{category}-{n}"), &category, 3, n));
            }
        }

        let c = composer();
        let analysis = c.analyzer().analyze_learner(&learner, &[], None, now());
        assert_eq!(analysis.weak_areas.len(), 7);
        let picked = c.weak_area_questions(&learner, &analysis, &pool, &HashSet::new(), 10, None);
        assert_eq!(picked.len(), 10);

        for i in 0..7 {
            let category = format!("c{i}");
            let count = picked.iter().filter(|q| q.in_category(&category)).count();
            let expected = if i < 5 { 2 } else { 0 };
            assert_eq!(count, expected, "picks from {category}");
        }
    }

    #[test]
    fn review_questions_skip_retired_and_far_future_cards() {
        let learner = Learner::new("l-1", now());
        let pool = vec![
            question("a", "x", 5, 0),
            question("b", "x", 5, 0),
            question("c", "x", 5, 0),
            question("d", "x", 5, 0),
        ];
        let card = |id: &str, hours: i64, retired: bool| {
            let scheduler = crate::memory::scheduler::SpacedRepetitionScheduler::default();
            let mut card = scheduler
                .schedule_new_card(id, "l-1", vec!["x".into()], 5, now())
                .unwrap();
            card.next_review_date = now() + Duration::hours(hours);
            card.is_retired = retired;
            card
        };
        let cards = vec![
            card("a", 1, false),
            card("b", -5, false),
            card("c", 3, false),
            card("d", -1, true),
        ];
        let pools = QuestionPools { questions: &pool, review_cards: &cards };

        let ids: Vec<&str> = composer()
            .review_questions(&learner, &pools, &HashSet::new(), 5, now())
            .iter()
            .map(|q| q.id.as_str())
            .collect();
        assert_eq!(ids, vec!["b", "a"]);
    }

    #[test]
    fn build_set_never_repeats_and_honours_exclusions() {
        let mut learner = Learner::new("l-1", now());
        learner.total_questions_answered = 50;
        for (category, level) in [("algebra", 30u8), ("geometry", 70)] {
            let mut m = CategoryMastery::empty(now());
            m.level = level;
            learner.category_mastery.insert(category.into(), m);
        }
        let pool: Vec<Question> = (0..30)
            .map(|i| {
                let category = if i % 2 == 0 { "algebra" } else { "geometry" };
                question(&format!("q{i}"), category, (i % 7 + 2) as u8, i as u32 % 4)
            })
            .collect();
        let options = SetOptions {
            exclude_question_ids: vec!["q0".into(), "q1".into()],
            ..SetOptions::default()
        };
        let state = LearnerState { learner: &learner, recent_answers: &[] };
        let pools = QuestionPools { questions: &pool, review_cards: &[] };

        let set = composer()
            .build_set(&state, &pools, &options, now(), &mut ChaCha8Rng::seed_from_u64(1))
            .unwrap();

        let ids: HashSet<&str> = set.questions.iter().map(|q| q.question.id.as_str()).collect();
        assert_eq!(ids.len(), set.questions.len());
        assert!(!ids.contains("q0") && !ids.contains("q1"));
        assert_eq!(set.metadata.set_size, set.questions.len());
        assert!(set.questions.len() <= 10);
        assert!(set.questions.iter().any(|q| q.source == QuestionSource::WeakArea));
    }

    #[test]
    fn build_set_rejects_bad_override() {
        let learner = Learner::new("l-1", now());
        let state = LearnerState { learner: &learner, recent_answers: &[] };
        let pools = QuestionPools { questions: &[], review_cards: &[] };
        let options = SetOptions {
            difficulty_override: Some(0),
            ..SetOptions::default()
        };
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let result = composer().build_set(&state, &pools, &options, now(), &mut rng);
        assert!(result.is_err());
    }
}
