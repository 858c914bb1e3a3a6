//! Scripted practice session against the in-memory store.
//!
//! A simulated learner answers questions in three categories. Each answer
//! updates mastery, the SM-2 card and the live exam buffer, and the next
//! difficulty comes from the store-backed engine. At the end a personalised
//! set is composed and a JSON summary goes to stdout.
//!
//! `ADAPTIVE_SIM_SEED` and `ADAPTIVE_SIM_ROUNDS` control the run.

use std::collections::hash_map::{Entry, HashMap};

use chrono::{DateTime, Duration, Utc};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde_json::json;

use adaptive_engine::difficulty::{
    AdaptiveDifficultyEngine, DifficultyRequest, RealTimeResponse, ResponseBuffer,
};
use adaptive_engine::logging;
use adaptive_engine::memory::{MasteryTracker, SpacedRepetitionCard, SpacedRepetitionScheduler};
use adaptive_engine::personalization::{LearnerState, QuestionPools, SetComposer, SetOptions};
use adaptive_engine::{AnswerEvent, EngineConfig, InMemoryStore, Learner, LearnerStore, Question};

const LEARNER_ID: &str = "demo-learner";
const SESSION_ID: &str = "sim-session";
const EXAM_ID: &str = "sim-exam";

/// Hidden skill per category: chance of a correct answer at difficulty 5.
const CATEGORIES: [(&str, f64); 3] = [("algebra", 0.85), ("geometry", 0.45), ("vocabulary", 0.65)];

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn question_pool(start: DateTime<Utc>) -> Vec<Question> {
    CATEGORIES
        .iter()
        .flat_map(|(category, _)| {
            (1..=10u8).flat_map(move |difficulty| {
                (0..2).map(move |n| Question {
                    id: format!("{category}-{difficulty}-{n}"),
                    categories: vec![category.to_string()],
                    difficulty,
                    times_used: 0,
                    created_at: start - Duration::days(30 - n),
                })
            })
        })
        .collect()
}

fn quality_for(correct: bool, time_spent: f64) -> u8 {
    match (correct, time_spent) {
        (true, t) if t < 15.0 => 5,
        (true, t) if t < 40.0 => 4,
        (true, _) => 3,
        (false, t) if t < 20.0 => 2,
        (false, _) => 1,
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _ = dotenvy::dotenv();
    let _log_guard = logging::init_tracing(&logging::log_level_from_env());
    let config = EngineConfig::from_env();

    let seed: u64 = env_or("ADAPTIVE_SIM_SEED", 7);
    let rounds: usize = env_or("ADAPTIVE_SIM_ROUNDS", 36);
    let mut rng = ChaCha8Rng::seed_from_u64(seed);

    let start = Utc::now() - Duration::days(3);
    let tracker = MasteryTracker::new(config.mastery.clone());
    let scheduler = SpacedRepetitionScheduler::new(config.scheduler.clone());
    let engine = AdaptiveDifficultyEngine::new(config.difficulty.clone());
    let composer = SetComposer::new(config.composer.clone(), &config.mastery);
    let mut buffer = ResponseBuffer::new(config.realtime.clone());

    let mut store = InMemoryStore::new();
    store.insert_learner(Learner::new(LEARNER_ID, start));

    let mut questions = question_pool(start);
    let mut cards: HashMap<String, SpacedRepetitionCard> = HashMap::new();
    let mut current: HashMap<&str, u8> = CATEGORIES.iter().map(|(c, _)| (*c, 5u8)).collect();
    let mut now = start;

    for round in 0..rounds {
        let (category, skill) = CATEGORIES[round % CATEGORIES.len()];
        let difficulty = current.get(category).copied().unwrap_or(5);
        now += Duration::minutes(rng.gen_range(1..=4));

        let Some(question) = questions
            .iter_mut()
            .filter(|q| q.in_category(category) && q.difficulty == difficulty)
            .min_by_key(|q| q.times_used)
        else {
            tracing::warn!(category, difficulty, "no question available");
            continue;
        };
        question.times_used += 1;
        let question_id = question.id.clone();

        let p_correct = (skill - (difficulty as f64 - 5.0) * 0.07).clamp(0.05, 0.95);
        let correct = rng.gen_bool(p_correct);
        let time_spent: f64 = rng.gen_range(6.0..70.0);
        let hints = if correct { 0 } else { rng.gen_range(0..=2) };

        tracker.record_answer(store.learner_mut(LEARNER_ID)?, category, correct, time_spent, now)?;
        store.record_answer(
            LEARNER_ID,
            AnswerEvent::new(category, correct, time_spent, difficulty, now)
                .with_hints(hints)
                .in_session(SESSION_ID),
        );

        let card = match cards.entry(question_id.clone()) {
            Entry::Occupied(e) => e.into_mut(),
            Entry::Vacant(e) => {
                let mut card = scheduler.schedule_new_card(
                    &question_id,
                    LEARNER_ID,
                    vec![category.to_string()],
                    difficulty,
                    now,
                )?;
                scheduler.prepare_for_save(&mut card, now, true);
                e.insert(card)
            }
        };
        scheduler.update_from_review(card, quality_for(correct, time_spent), time_spent, now)?;
        scheduler.prepare_for_save(card, now, false);

        buffer.push(
            RealTimeResponse {
                exam_id: EXAM_ID.to_string(),
                learner_id: LEARNER_ID.to_string(),
                question_id,
                response_time_seconds: time_spent,
                is_correct: correct,
                timestamp: now,
            },
            now,
        )?;

        let request =
            DifficultyRequest::new(LEARNER_ID, category, difficulty).in_session(SESSION_ID);
        let decision = engine.next_difficulty(&store, &request)?;
        tracing::info!(
            round,
            category,
            correct,
            from = difficulty,
            to = decision.new_difficulty,
            "difficulty decided"
        );
        current.insert(category, decision.new_difficulty);
    }

    // Come back two days later for a fresh set.
    let later = now + Duration::days(2);
    let learner = store.learner(LEARNER_ID)?;
    let card_list: Vec<SpacedRepetitionCard> = cards.into_values().collect();
    let set = composer.build_set(
        &LearnerState {
            learner: &learner,
            recent_answers: store.answers(LEARNER_ID),
        },
        &QuestionPools {
            questions: &questions,
            review_cards: &card_list,
        },
        &SetOptions {
            session_id: Some("sim-followup".to_string()),
            ..SetOptions::default()
        },
        later,
        &mut rng,
    )?;

    let summary = json!({
        "seed": seed,
        "rounds": rounds,
        "finalDifficulty": current,
        "weakAreas": tracker.weak_areas(&learner),
        "strongAreas": tracker.strong_areas(&learner),
        "learner": learner,
        "reviewStats": scheduler.review_stats(&card_list, later),
        "liveExam": buffer.analyze(EXAM_ID, None, now),
        "nextSet": set,
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
