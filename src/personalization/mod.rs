pub mod analysis;
pub mod composer;

pub use analysis::{
    learning_patterns, ExperienceLevel, LearnerAnalysis, LearnerAnalyzer, LearningPatterns,
    PersonalizationFactors, StrongArea, WeakArea,
};
pub use composer::{
    shuffle, LearnerState, PersonalizedSet, QuestionDistribution, QuestionPools, QuestionSource,
    SelectedQuestion, SetComposer, SetMetadata, SetOptions,
};
