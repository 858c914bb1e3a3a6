pub mod mastery;
pub mod scheduler;

pub use mastery::{mastery_influence, MasteryTracker};
pub use scheduler::{ReviewOutcome, ReviewStats, SpacedRepetitionCard, SpacedRepetitionScheduler};
