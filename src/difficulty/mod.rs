pub mod adjustment;
pub mod engine;
pub mod metrics;
pub mod realtime;

pub use adjustment::DifficultyCalculator;
pub use engine::{AdaptiveDifficultyEngine, BatchOutcome, DifficultyRequest};
pub use metrics::{calculate_performance_metrics, performance_score};
pub use realtime::{
    analyze_real_time_performance, RealTimeAnalysis, RealTimeResponse, ResponseBuffer,
};
