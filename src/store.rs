//! Read access to learner records for the store-backed difficulty API.
//!
//! The engine never persists anything. Callers implement [`LearnerStore`]
//! over their own database; [`InMemoryStore`] backs tests and the demo binary.

use std::collections::HashMap;

use crate::error::{EngineError, Result};
use crate::types::{AnswerEvent, Learner};

pub trait LearnerStore {
    /// `EngineError::NotFound` when the learner does not exist.
    fn learner(&self, learner_id: &str) -> Result<Learner>;

    /// Up to `limit` answers in `category`, most recent first, optionally
    /// restricted to one session.
    fn recent_answers(
        &self,
        learner_id: &str,
        category: &str,
        limit: usize,
        session_id: Option<&str>,
    ) -> Result<Vec<AnswerEvent>>;
}

#[derive(Debug, Default)]
pub struct InMemoryStore {
    learners: HashMap<String, Learner>,
    answers: HashMap<String, Vec<AnswerEvent>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_learner(&mut self, learner: Learner) {
        self.learners.insert(learner.id.clone(), learner);
    }

    pub fn learner_mut(&mut self, learner_id: &str) -> Result<&mut Learner> {
        self.learners
            .get_mut(learner_id)
            .ok_or_else(|| EngineError::learner_not_found(learner_id))
    }

    pub fn record_answer(&mut self, learner_id: &str, event: AnswerEvent) {
        self.answers
            .entry(learner_id.to_string())
            .or_default()
            .push(event);
    }

    pub fn answers(&self, learner_id: &str) -> &[AnswerEvent] {
        self.answers
            .get(learner_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

impl LearnerStore for InMemoryStore {
    fn learner(&self, learner_id: &str) -> Result<Learner> {
        self.learners
            .get(learner_id)
            .cloned()
            .ok_or_else(|| EngineError::learner_not_found(learner_id))
    }

    fn recent_answers(
        &self,
        learner_id: &str,
        category: &str,
        limit: usize,
        session_id: Option<&str>,
    ) -> Result<Vec<AnswerEvent>> {
        let mut matching: Vec<AnswerEvent> = self
            .answers(learner_id)
            .iter()
            .filter(|e| e.category == category)
            .filter(|e| session_id.map_or(true, |s| e.session_id.as_deref() == Some(s)))
            .cloned()
            .collect();

        // Stable sort keeps insertion order for equal timestamps, so reverse
        // first to put later insertions ahead.
        matching.reverse();
        matching.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        matching.truncate(limit);
        Ok(matching)
    }
}
