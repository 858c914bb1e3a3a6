//! End-to-end flows through the public API.

use chrono::{DateTime, Duration, TimeZone, Utc};

use adaptive_engine::difficulty::{AdaptiveDifficultyEngine, DifficultyRequest};
use adaptive_engine::memory::{MasteryTracker, ReviewOutcome, SpacedRepetitionScheduler};
use adaptive_engine::{
    AnswerEvent, DifficultyCalculator, InMemoryStore, Learner, SpacedRepetitionCard,
};

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 6, 8, 30, 0).unwrap()
}

fn card_with(repetitions: u32, interval: f64, ease: f64, consecutive: u32) -> SpacedRepetitionCard {
    let scheduler = SpacedRepetitionScheduler::default();
    let mut card = scheduler
        .schedule_new_card("q-1", "l-1", vec!["algebra".into()], 5, t0())
        .unwrap();
    card.repetitions = repetitions;
    card.interval = interval;
    card.ease_factor = ease;
    card.consecutive_correct = consecutive;
    card
}

// ============================================================================
// Difficulty
// ============================================================================

#[test]
fn five_fast_correct_answers_raise_difficulty() {
    let events: Vec<AnswerEvent> = (0..5)
        .map(|i| AnswerEvent::new("algebra", true, 15.0, 5, t0() + Duration::minutes(i)))
        .collect();
    let calculator = DifficultyCalculator::default();
    let metrics = calculator.performance_metrics(&events, true, true);
    let result = calculator
        .calculate_next_difficulty(&metrics, None, 1.0, 5, 5)
        .unwrap();

    assert!(matches!(result.new_difficulty, 6 | 7), "got {}", result.new_difficulty);
    assert!(result.reasoning.contains("High accuracy"));
    assert!(result.reasoning.starts_with("Increasing"));
    assert_eq!(result.previous_difficulty, 5);
}

#[test]
fn struggling_learner_drops_within_band() {
    let events: Vec<AnswerEvent> = (0..6)
        .map(|i| {
            AnswerEvent::new("geometry", false, 150.0, 7, t0() + Duration::minutes(i)).with_hints(3)
        })
        .collect();
    let calculator = DifficultyCalculator::default();
    let metrics = calculator.performance_metrics(&events, true, true);
    let result = calculator
        .calculate_next_difficulty(&metrics, None, 1.0, 7, 6)
        .unwrap();

    assert!(result.new_difficulty < 7);
    assert!(result.new_difficulty >= 3);
    assert!(result.reasoning.contains("Low accuracy"));
}

#[test]
fn store_backed_flow_tracks_mastery_and_difficulty() {
    let tracker = MasteryTracker::default();
    let engine = AdaptiveDifficultyEngine::default();
    let mut store = InMemoryStore::new();
    store.insert_learner(Learner::new("l-1", t0()).with_preference(4));

    let mut difficulty = 4;
    for i in 0..8 {
        let now = t0() + Duration::minutes(i * 2);
        tracker
            .record_answer(store.learner_mut("l-1").unwrap(), "algebra", true, 12.0, now)
            .unwrap();
        store.record_answer("l-1", AnswerEvent::new("algebra", true, 12.0, difficulty, now));
        let result = engine
            .next_difficulty(&store, &DifficultyRequest::new("l-1", "algebra", difficulty))
            .unwrap();
        difficulty = result.new_difficulty;
    }

    // Band around preference 4 caps the climb at 7.
    assert_eq!(difficulty, 7);
    let learner = store.learner_mut("l-1").unwrap();
    assert_eq!(learner.total_questions_answered, 8);
    assert_eq!(learner.current_streak, 8);
    assert!(learner.mastery("algebra").unwrap().level >= 80);
    assert_eq!(tracker.strong_areas(learner), vec!["algebra".to_string()]);
}

// ============================================================================
// SM-2
// ============================================================================

#[test]
fn third_success_multiplies_by_ease() {
    let scheduler = SpacedRepetitionScheduler::default();
    let mut card = card_with(2, 6.0, 2.5, 0);
    let outcome = scheduler.update_from_review(&mut card, 4, 30.0, t0()).unwrap();

    assert_eq!(outcome, ReviewOutcome::Scheduled);
    assert_eq!(card.repetitions, 3);
    assert_eq!(card.interval, 15.0);
    assert_eq!(card.consecutive_correct, 1);
    assert!((card.ease_factor - 2.5).abs() < 1e-9);
    assert_eq!(card.next_review_date, t0() + Duration::days(15));
}

#[test]
fn no_retirement_before_eight_repetitions() {
    let scheduler = SpacedRepetitionScheduler::default();
    let mut card = card_with(5, 20.0, 2.8, 4);
    let outcome = scheduler.update_from_review(&mut card, 5, 15.0, t0()).unwrap();

    assert_eq!(outcome, ReviewOutcome::Scheduled);
    assert_eq!(card.repetitions, 6);
    assert_eq!(card.consecutive_correct, 5);
    assert!((card.ease_factor - 2.9).abs() < 1e-9);
    assert!(!card.is_retired);
}

#[test]
fn card_retires_and_then_ignores_reviews() {
    let scheduler = SpacedRepetitionScheduler::default();
    let mut card = card_with(7, 30.0, 3.0, 4);
    let outcome = scheduler.update_from_review(&mut card, 5, 20.0, t0()).unwrap();
    assert_eq!(outcome, ReviewOutcome::Retired);
    assert!(card.is_retired);
    assert_eq!(card.retired_at, Some(t0()));

    let snapshot = card.clone();
    let later = t0() + Duration::days(40);
    let outcome = scheduler.update_from_review(&mut card, 0, 20.0, later).unwrap();
    assert_eq!(outcome, ReviewOutcome::Ignored);
    assert_eq!(card, snapshot);
    assert!(scheduler.due_reviews(std::slice::from_ref(&card), later, 10).is_empty());
}

#[test]
fn failure_keeps_a_fifth_of_the_interval() {
    let scheduler = SpacedRepetitionScheduler::default();
    let mut card = card_with(4, 20.0, 2.5, 4);
    scheduler.update_from_review(&mut card, 1, 30.0, t0()).unwrap();

    assert_eq!(card.repetitions, 0);
    assert_eq!(card.consecutive_correct, 0);
    assert!((card.interval - 4.0).abs() < 1e-9);
    assert!((card.ease_factor - 1.96).abs() < 1e-9);
}
