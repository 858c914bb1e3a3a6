//! # adaptive-engine
//!
//! Adaptive learning core for quiz-style practice: tracks what a learner
//! knows, picks how hard the next question should be, schedules reviews with
//! SM-2 and composes personalised question sets.
//!
//! Every operation takes the current time explicitly and never touches a
//! database. Persistence stays with the caller; [`store::LearnerStore`] is
//! the one read seam the store-backed difficulty API needs.
//!
//! ## Modules
//!
//! - [`memory`] - category mastery tracking and the SM-2 review scheduler
//! - [`difficulty`] - performance aggregation, next-difficulty decisions,
//!   batch requests and the real-time exam buffer
//! - [`personalization`] - learner analysis and personalised set composition
//! - [`store`] - learner/answer read trait plus an in-memory implementation
//! - [`config`] - tunable thresholds, with `ADAPTIVE_*` environment overrides
//! - [`logging`] - tracing subscriber setup for binaries
//! - [`sanitize`] - input validation and shared numeric helpers
//! - [`types`] - records shared across modules
//!
//! ## Example
//!
//! ```rust
//! use adaptive_engine::{AnswerEvent, DifficultyCalculator, Learner, MasteryTracker};
//! use chrono::Utc;
//!
//! let now = Utc::now();
//! let mut learner = Learner::new("learner-1", now);
//! let tracker = MasteryTracker::default();
//! tracker.record_answer(&mut learner, "algebra", true, 12.0, now).unwrap();
//!
//! let events: Vec<AnswerEvent> = (0..5)
//!     .map(|_| AnswerEvent::new("algebra", true, 12.0, 5, now))
//!     .collect();
//! let calculator = DifficultyCalculator::default();
//! let metrics = calculator.performance_metrics(&events, true, true);
//! let result = calculator
//!     .calculate_next_difficulty(&metrics, learner.mastery("algebra"), 1.0, 5, 5)
//!     .unwrap();
//! assert!(result.new_difficulty > 5);
//! ```

pub mod config;
pub mod difficulty;
pub mod error;
pub mod logging;
pub mod memory;
pub mod personalization;
pub mod sanitize;
pub mod store;
pub mod types;

pub use config::EngineConfig;
pub use difficulty::{
    analyze_real_time_performance, calculate_performance_metrics, AdaptiveDifficultyEngine,
    BatchOutcome, DifficultyCalculator, DifficultyRequest, RealTimeAnalysis, RealTimeResponse,
    ResponseBuffer,
};
pub use error::{EngineError, Result};
pub use memory::{
    MasteryTracker, ReviewOutcome, ReviewStats, SpacedRepetitionCard, SpacedRepetitionScheduler,
};
pub use personalization::{
    shuffle, LearnerAnalyzer, LearnerState, PersonalizedSet, QuestionPools, SetComposer, SetOptions,
};
pub use store::{InMemoryStore, LearnerStore};
pub use types::{
    AnswerEvent, CategoryMastery, DifficultyAdjustmentResult, Learner, PerformanceMetrics, Question,
};
