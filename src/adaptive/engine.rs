use std::sync::Arc;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::adaptive::catalog::Catalog;
use crate::adaptive::config::EngineConfig;
use crate::adaptive::diagnostic::{CognitiveSnapshot, DiagnosticEngine};
use crate::adaptive::error::EngineError;
use crate::adaptive::errors::{classify_error, ErrorType};
use crate::adaptive::events::EngineEvent;
use crate::adaptive::generator::{PackagePattern, TaskGenerator, TaskPackage};
use crate::adaptive::progression::{
    competency_ids, CompetencyBook, CompetencyTracker, LevelMachine, LevelProgress,
    ScaffoldingController, ScaffoldingState,
};
use crate::adaptive::strategy::{StrategyDetection, StrategyDetector};
use crate::adaptive::types::{AttemptSubmission, StrategyLabel, TaskAttempt};

/// Everything the engine keeps per learner. `version` is owned by the
/// store and only changes on a successful commit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LearnerState {
    pub learner_id: String,
    pub version: u64,
    pub progress: LevelProgress,
    pub competencies: CompetencyBook,
    pub scaffolding: ScaffoldingState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot: Option<CognitiveSnapshot>,
    pub attempts_since_diagnosis: u32,
    pub total_attempts: u64,
}

#[derive(Debug, Clone)]
pub struct AttemptOutcome {
    pub attempt: TaskAttempt,
    pub state: LearnerState,
    pub strategy: StrategyDetection,
    pub error_type: Option<ErrorType>,
    pub competency_ids: Vec<String>,
    pub events: Vec<EngineEvent>,
    pub leveled_up: bool,
}

/// Pure pipeline: (state, attempt) -> new state. No I/O, no locking.
pub struct LearningEngine {
    config: EngineConfig,
    catalog: Arc<Catalog>,
    detector: StrategyDetector,
    tracker: CompetencyTracker,
    levels: LevelMachine,
    scaffolding: ScaffoldingController,
    diagnostic: DiagnosticEngine,
    generator: TaskGenerator,
}

impl LearningEngine {
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        Self::with_catalog(config, Arc::new(Catalog::new()))
    }

    pub fn with_catalog(config: EngineConfig, catalog: Arc<Catalog>) -> Result<Self, EngineError> {
        config.validate()?;
        let detector = StrategyDetector::new(config.detector.clone());
        Ok(Self {
            tracker: CompetencyTracker::new(config.mastery.clone()),
            levels: LevelMachine::new(config.progression.clone(), Arc::clone(&catalog)),
            scaffolding: ScaffoldingController::new(config.scaffolding.clone()),
            diagnostic: DiagnosticEngine::new(
                config.diagnostic.clone(),
                config.zpd.clone(),
                detector.clone(),
                Arc::clone(&catalog),
            ),
            generator: TaskGenerator::new(),
            detector,
            catalog,
            config,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    pub fn new_learner(&self, learner_id: impl Into<String>) -> LearnerState {
        LearnerState {
            learner_id: learner_id.into(),
            version: 0,
            progress: LevelProgress::default(),
            competencies: CompetencyBook::default(),
            scaffolding: ScaffoldingState::new(&self.config.scaffolding),
            snapshot: None,
            attempts_since_diagnosis: 0,
            total_attempts: 0,
        }
    }

    /// detect -> track -> progress for one submission.
    pub fn process_attempt(
        &self,
        state: &LearnerState,
        submission: AttemptSubmission,
    ) -> Result<AttemptOutcome, EngineError> {
        let attempt =
            TaskAttempt::from_submission(submission, self.config.progression.max_levels)?;

        let strategy = self.detector.detect_attempt(&attempt);
        let error_type = classify_error(&attempt);
        let ids = competency_ids(&attempt);

        let competencies = self
            .tracker
            .update_after_task(&state.competencies, &attempt, &ids)?;
        let level_outcome = self.levels.apply(&state.progress, &attempt, error_type)?;
        let mut events = level_outcome.events;

        let (scaffolding, change) = self.scaffolding.apply(
            &state.scaffolding,
            attempt.is_correct,
            attempt.elapsed_ms,
            attempt.completed_at,
        );
        if let Some(change) = change {
            events.push(EngineEvent::RepresentationChanged(change));
        }

        tracing::debug!(
            learner_id = %state.learner_id,
            signature = %attempt.signature(),
            correct = attempt.is_correct,
            strategy = %strategy.label,
            error_type = error_type.map(|e| e.as_str()).unwrap_or("none"),
            level = level_outcome.progress.current_level,
            "attempt processed"
        );

        let next = LearnerState {
            learner_id: state.learner_id.clone(),
            version: state.version,
            progress: level_outcome.progress,
            competencies,
            scaffolding,
            snapshot: state.snapshot.clone(),
            attempts_since_diagnosis: state.attempts_since_diagnosis.saturating_add(1),
            total_attempts: state.total_attempts + 1,
        };

        Ok(AttemptOutcome {
            attempt,
            state: next,
            strategy,
            error_type,
            competency_ids: ids,
            events,
            leveled_up: level_outcome.leveled_up,
        })
    }

    pub fn diagnosis_due(&self, state: &LearnerState) -> bool {
        state.attempts_since_diagnosis >= self.config.diagnostic.diagnosis_interval
    }

    pub fn diagnose(
        &self,
        recent_attempts: &[TaskAttempt],
        prior: Option<&CognitiveSnapshot>,
    ) -> CognitiveSnapshot {
        self.diagnostic.diagnose(recent_attempts, prior)
    }

    /// Replaces the snapshot and resets the cadence counter.
    pub fn apply_diagnosis(&self, state: &LearnerState, recent_attempts: &[TaskAttempt]) -> LearnerState {
        let snapshot = self.diagnose(recent_attempts, state.snapshot.as_ref());
        LearnerState {
            snapshot: Some(snapshot),
            attempts_since_diagnosis: 0,
            ..state.clone()
        }
    }

    pub fn window_size(&self) -> usize {
        self.diagnostic.window_size()
    }

    /// Package for the learner's next practice block, driven by the latest
    /// snapshot and the current stage's number range.
    pub fn next_package<R: Rng + ?Sized>(
        &self,
        state: &LearnerState,
        pattern: PackagePattern,
        rng: &mut R,
    ) -> TaskPackage {
        let cold;
        let snapshot = match state.snapshot.as_ref() {
            Some(snapshot) => snapshot,
            None => {
                cold = CognitiveSnapshot::cold_start(&self.config.zpd);
                &cold
            }
        };
        let strategy = snapshot
            .recommended_strategies
            .first()
            .copied()
            .unwrap_or(StrategyLabel::CountingOn);
        let range = self.catalog.stage_for(state.progress.current_level).number_range;

        self.generator
            .generate(pattern, strategy, snapshot.recommended_difficulty, range, rng)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adaptive::types::{NumberRange, Operator, PlaceholderPosition};
    use chrono::Utc;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn submission(op1: i64, op2: i64, answer: i64, level: i64) -> AttemptSubmission {
        AttemptSubmission {
            operator: Operator::Add,
            op1,
            op2,
            claimed_result: None,
            answer: Some(answer),
            elapsed_ms: 2000,
            steps: vec![],
            number_range: NumberRange::Twenty,
            placeholder: PlaceholderPosition::Result,
            level,
            completed_at: Utc::now(),
        }
    }

    #[test]
    fn fast_wrong_answer_is_still_automatized() {
        let engine = LearningEngine::new(EngineConfig::default()).unwrap();
        let state = engine.new_learner("kid-1");
        let outcome = engine.process_attempt(&state, submission(7, 8, 14, 1)).unwrap();
        assert!(!outcome.attempt.is_correct);
        assert_eq!(outcome.strategy.label, StrategyLabel::Automatized);
        assert_eq!(outcome.error_type, Some(ErrorType::OffByOne));
        assert_eq!(outcome.state.total_attempts, 1);
        assert_eq!(outcome.state.version, 0);
        assert!(outcome.competency_ids.contains(&"add_20_decade_transition".to_string()));
    }

    #[test]
    fn rejected_attempt_leaves_state_untouched() {
        let engine = LearningEngine::new(EngineConfig::default()).unwrap();
        let state = engine.new_learner("kid-2");
        let err = engine.process_attempt(&state, submission(-3, 8, 5, 1)).unwrap_err();
        assert!(err.is_malformed_input());
        let err = engine.process_attempt(&state, submission(3, 8, 11, 4)).unwrap_err();
        assert!(matches!(err, EngineError::LevelLocked { level: 4, current: 1 }));
    }

    #[test]
    fn diagnosis_cadence() {
        let engine = LearningEngine::new(EngineConfig::default()).unwrap();
        let mut state = engine.new_learner("kid-3");
        let mut attempts = Vec::new();
        for _ in 0..10 {
            let outcome = engine.process_attempt(&state, submission(2, 3, 5, 1)).unwrap();
            attempts.push(outcome.attempt);
            state = outcome.state;
        }
        assert!(engine.diagnosis_due(&state));
        let state = engine.apply_diagnosis(&state, &attempts);
        assert!(!engine.diagnosis_due(&state));
        assert_eq!(state.snapshot.as_ref().unwrap().sample_size, 10);
    }

    #[test]
    fn next_package_uses_stage_range() {
        let engine = LearningEngine::new(EngineConfig::default()).unwrap();
        let state = engine.new_learner("kid-4");
        let mut rng = StdRng::seed_from_u64(1);
        let package = engine.next_package(&state, PackagePattern::SumConstancy, &mut rng);
        assert_eq!(package.number_range, NumberRange::Ten);
        assert_eq!(package.difficulty, 2);
        assert_eq!(package.strategy, StrategyLabel::CountingOn);
        assert!(package.tasks.iter().all(|t| t.result == 7));
    }

    #[test]
    fn invalid_config_is_rejected() {
        let mut config = EngineConfig::default();
        config.progression.milestone_target = 0;
        assert!(matches!(LearningEngine::new(config), Err(EngineError::Config(_))));
    }
}
