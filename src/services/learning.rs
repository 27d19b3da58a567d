use std::sync::Arc;

use serde::Serialize;

use crate::adaptive::diagnostic::CognitiveSnapshot;
use crate::adaptive::engine::{LearnerState, LearningEngine};
use crate::adaptive::error::EngineError;
use crate::adaptive::errors::ErrorType;
use crate::adaptive::events::EngineEvent;
use crate::adaptive::generator::{PackagePattern, TaskPackage};
use crate::adaptive::persistence::LearnerStore;
use crate::adaptive::strategy::StrategyDetection;
use crate::adaptive::types::{AttemptSubmission, TaskAttempt};

const MAX_COMMIT_ATTEMPTS: u32 = 3;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionResult {
    pub attempt: TaskAttempt,
    pub state: LearnerState,
    pub strategy: StrategyDetection,
    pub error_type: Option<ErrorType>,
    pub events: Vec<EngineEvent>,
    pub diagnosed: bool,
}

/// Store-backed orchestration around the pure [`LearningEngine`]. Each
/// write is a read-compute-commit cycle retried on version conflicts.
pub struct LearningService<S: LearnerStore> {
    engine: Arc<LearningEngine>,
    store: Arc<S>,
}

impl<S: LearnerStore> LearningService<S> {
    pub fn new(engine: Arc<LearningEngine>, store: Arc<S>) -> Self {
        Self { engine, store }
    }

    pub fn engine(&self) -> &LearningEngine {
        &self.engine
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Current state, or a fresh level-1 learner when nothing is stored.
    pub fn state(&self, learner_id: &str) -> Result<LearnerState, EngineError> {
        Ok(self
            .store
            .load(learner_id)?
            .unwrap_or_else(|| self.engine.new_learner(learner_id)))
    }

    pub fn submit(
        &self,
        learner_id: &str,
        submission: AttemptSubmission,
    ) -> Result<SubmissionResult, EngineError> {
        let mut tries = 0;
        loop {
            tries += 1;
            let current = self.state(learner_id)?;
            let expected_version = current.version;

            let outcome = self.engine.process_attempt(&current, submission.clone())?;
            let mut next = outcome.state;

            let diagnosed = self.engine.diagnosis_due(&next);
            if diagnosed {
                let mut window = self
                    .store
                    .recent_attempts(learner_id, self.engine.window_size())?;
                window.push(outcome.attempt.clone());
                next = self.engine.apply_diagnosis(&next, &window);
            }

            match self
                .store
                .commit(expected_version, next, Some(outcome.attempt.clone()))
            {
                Ok(state) => {
                    if diagnosed {
                        if let Some(ref snapshot) = state.snapshot {
                            tracing::info!(
                                learner_id,
                                zpd_level = snapshot.zpd_level,
                                recommended_difficulty = snapshot.recommended_difficulty,
                                "learner re-diagnosed"
                            );
                        }
                    }
                    return Ok(SubmissionResult {
                        attempt: outcome.attempt,
                        state,
                        strategy: outcome.strategy,
                        error_type: outcome.error_type,
                        events: outcome.events,
                        diagnosed,
                    });
                }
                Err(EngineError::Conflict { actual, .. }) if tries < MAX_COMMIT_ATTEMPTS => {
                    tracing::warn!(
                        learner_id,
                        expected_version,
                        actual,
                        attempt = tries,
                        "learner state changed concurrently, retrying"
                    );
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// On-demand diagnosis over the stored window.
    pub fn diagnose(&self, learner_id: &str) -> Result<CognitiveSnapshot, EngineError> {
        let mut tries = 0;
        loop {
            tries += 1;
            let current = self.state(learner_id)?;
            let expected_version = current.version;
            let window = self
                .store
                .recent_attempts(learner_id, self.engine.window_size())?;
            let next = self.engine.apply_diagnosis(&current, &window);

            match self.store.commit(expected_version, next, None) {
                Ok(state) => {
                    return state.snapshot.ok_or_else(|| {
                        EngineError::Invariant("diagnosis committed without snapshot".into())
                    })
                }
                Err(EngineError::Conflict { actual, .. }) if tries < MAX_COMMIT_ATTEMPTS => {
                    tracing::warn!(learner_id, expected_version, actual, "diagnosis commit conflict, retrying");
                }
                Err(err) => return Err(err),
            }
        }
    }

    pub fn next_package(
        &self,
        learner_id: &str,
        pattern: PackagePattern,
    ) -> Result<TaskPackage, EngineError> {
        let state = self.state(learner_id)?;
        let mut rng = rand::rng();
        Ok(self.engine.next_package(&state, pattern, &mut rng))
    }
}
