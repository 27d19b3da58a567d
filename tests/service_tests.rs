//! Learning service behaviour around the store: conflicts, cadence,
//! packages and independent learners.

mod common;

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::thread;

use common::{correct, engine, service, wrong};
use mathpath_engine::adaptive::{
    EngineError, InMemoryLearnerStore, LearnerState, LearnerStore, PackagePattern, TaskAttempt,
};
use mathpath_engine::services::LearningService;

/// Rejects the first `failures` commits as if another writer got there
/// first.
struct ContendedStore {
    inner: InMemoryLearnerStore,
    failures: AtomicU32,
    commits: AtomicU32,
}

impl ContendedStore {
    fn new(failures: u32) -> Self {
        Self {
            inner: InMemoryLearnerStore::new(),
            failures: AtomicU32::new(failures),
            commits: AtomicU32::new(0),
        }
    }
}

impl LearnerStore for ContendedStore {
    fn load(&self, learner_id: &str) -> Result<Option<LearnerState>, EngineError> {
        self.inner.load(learner_id)
    }

    fn recent_attempts(
        &self,
        learner_id: &str,
        limit: usize,
    ) -> Result<Vec<TaskAttempt>, EngineError> {
        self.inner.recent_attempts(learner_id, limit)
    }

    fn commit(
        &self,
        expected_version: u64,
        state: LearnerState,
        attempt: Option<TaskAttempt>,
    ) -> Result<LearnerState, EngineError> {
        self.commits.fetch_add(1, Ordering::SeqCst);
        let remaining = self.failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures.store(remaining - 1, Ordering::SeqCst);
            return Err(EngineError::Conflict {
                learner_id: state.learner_id,
                expected: expected_version,
                actual: expected_version + 1,
            });
        }
        self.inner.commit(expected_version, state, attempt)
    }
}

#[test]
fn conflicts_are_retried() {
    let store = Arc::new(ContendedStore::new(2));
    let service = LearningService::new(engine(), Arc::clone(&store));

    let result = service.submit("zoe", correct(1, 1)).unwrap();
    assert_eq!(result.state.version, 1);
    assert_eq!(store.commits.load(Ordering::SeqCst), 3);
    assert_eq!(store.inner.recent_attempts("zoe", 10).unwrap().len(), 1);
}

#[test]
fn persistent_conflict_is_surfaced() {
    let store = Arc::new(ContendedStore::new(5));
    let service = LearningService::new(engine(), Arc::clone(&store));

    let err = service.submit("zoe", correct(1, 1)).unwrap_err();
    assert!(matches!(err, EngineError::Conflict { .. }));
    assert_eq!(store.commits.load(Ordering::SeqCst), 3);
    assert!(store.inner.load("zoe").unwrap().is_none());
}

#[test]
fn malformed_submission_is_not_stored() {
    let service = service();
    let mut submission = correct(1, 1);
    submission.claimed_result = Some(99);
    let err = service.submit("max", submission).unwrap_err();
    assert!(matches!(err, EngineError::ArithmeticMismatch { .. }));
    assert!(service.store().load("max").unwrap().is_none());
}

#[test]
fn diagnosis_runs_on_cadence() {
    let service = service();
    let mut diagnosed_at = Vec::new();
    for i in 0..25 {
        let submission = if i % 4 == 3 { wrong(1, i) } else { correct(1, i) };
        let result = service.submit("eli", submission).unwrap();
        if result.diagnosed {
            diagnosed_at.push(i);
        }
    }
    assert_eq!(diagnosed_at, vec![9, 19]);

    let state = service.state("eli").unwrap();
    let snapshot = state.snapshot.unwrap();
    assert_eq!(snapshot.sample_size, 20);
    assert_eq!(state.attempts_since_diagnosis, 5);
}

#[test]
fn next_package_follows_snapshot() {
    let service = service();
    for i in 0..10 {
        service.submit("ida", correct(1, i)).unwrap();
    }
    let snapshot = service.state("ida").unwrap().snapshot.unwrap();

    let package = service
        .next_package("ida", PackagePattern::NeighborTasks)
        .unwrap();
    assert_eq!(package.difficulty, snapshot.recommended_difficulty);
    assert_eq!(package.strategy, snapshot.recommended_strategies[0]);
    assert!(!package.tasks.is_empty());
    assert!(package
        .tasks
        .iter()
        .all(|t| t.result <= package.number_range.limit()));
}

#[test]
fn learners_are_independent_across_threads() {
    let service = Arc::new(service());
    thread::scope(|scope| {
        for learner in ["a", "b", "c", "d"] {
            let service = Arc::clone(&service);
            scope.spawn(move || {
                for i in 0..12 {
                    service.submit(learner, correct(1, i)).unwrap();
                }
            });
        }
    });

    for learner in ["a", "b", "c", "d"] {
        let state = service.state(learner).unwrap();
        assert_eq!(state.total_attempts, 12);
        assert_eq!(state.version, 12);
        assert_eq!(state.progress.current_level, 2);
    }
    assert_eq!(service.store().learner_ids().len(), 4);
}
