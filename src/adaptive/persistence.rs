use std::collections::{HashMap, VecDeque};

use parking_lot::RwLock;

use crate::adaptive::engine::LearnerState;
use crate::adaptive::error::EngineError;
use crate::adaptive::types::TaskAttempt;

const DEFAULT_ATTEMPT_RETENTION: usize = 200;

/// Per-learner storage with compare-and-swap commits.
///
/// `commit` must apply the state and the attempt as one unit, and only if
/// the stored version still equals `expected_version`. A learner with no
/// stored record has version 0.
pub trait LearnerStore: Send + Sync {
    fn load(&self, learner_id: &str) -> Result<Option<LearnerState>, EngineError>;

    /// Most recent attempts, oldest first.
    fn recent_attempts(&self, learner_id: &str, limit: usize)
        -> Result<Vec<TaskAttempt>, EngineError>;

    fn commit(
        &self,
        expected_version: u64,
        state: LearnerState,
        attempt: Option<TaskAttempt>,
    ) -> Result<LearnerState, EngineError>;
}

#[derive(Debug, Default)]
struct LearnerRecord {
    state: Option<LearnerState>,
    attempts: VecDeque<TaskAttempt>,
}

pub struct InMemoryLearnerStore {
    records: RwLock<HashMap<String, LearnerRecord>>,
    attempt_retention: usize,
}

impl Default for InMemoryLearnerStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryLearnerStore {
    pub fn new() -> Self {
        Self::with_retention(DEFAULT_ATTEMPT_RETENTION)
    }

    pub fn with_retention(attempt_retention: usize) -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            attempt_retention: attempt_retention.max(1),
        }
    }

    pub fn learner_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .records
            .read()
            .iter()
            .filter(|(_, record)| record.state.is_some())
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        ids
    }
}

impl LearnerStore for InMemoryLearnerStore {
    fn load(&self, learner_id: &str) -> Result<Option<LearnerState>, EngineError> {
        Ok(self
            .records
            .read()
            .get(learner_id)
            .and_then(|record| record.state.clone()))
    }

    fn recent_attempts(
        &self,
        learner_id: &str,
        limit: usize,
    ) -> Result<Vec<TaskAttempt>, EngineError> {
        let records = self.records.read();
        let Some(record) = records.get(learner_id) else {
            return Ok(Vec::new());
        };
        let skip = record.attempts.len().saturating_sub(limit);
        Ok(record.attempts.iter().skip(skip).cloned().collect())
    }

    fn commit(
        &self,
        expected_version: u64,
        mut state: LearnerState,
        attempt: Option<TaskAttempt>,
    ) -> Result<LearnerState, EngineError> {
        let mut records = self.records.write();
        let record = records.entry(state.learner_id.clone()).or_default();

        let actual = record.state.as_ref().map(|s| s.version).unwrap_or(0);
        if actual != expected_version {
            return Err(EngineError::Conflict {
                learner_id: state.learner_id,
                expected: expected_version,
                actual,
            });
        }

        state.version = expected_version + 1;
        if let Some(attempt) = attempt {
            record.attempts.push_back(attempt);
            while record.attempts.len() > self.attempt_retention {
                record.attempts.pop_front();
            }
        }
        record.state = Some(state.clone());
        Ok(state)
    }
}
