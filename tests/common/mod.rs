#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use mathpath_engine::adaptive::config::EngineConfig;
use mathpath_engine::adaptive::progression::LevelProgress;
use mathpath_engine::adaptive::{
    AttemptSubmission, InMemoryLearnerStore, LearnerStore, LearningEngine, NumberRange, Operator,
    PlaceholderPosition,
};
use mathpath_engine::services::LearningService;

pub const FIXED_TIMESTAMP: i64 = 1_700_000_000;

pub fn at(offset_secs: i64) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(FIXED_TIMESTAMP, 0).unwrap_or_default()
        + Duration::seconds(offset_secs)
}

pub fn engine() -> Arc<LearningEngine> {
    Arc::new(LearningEngine::new(EngineConfig::default()).expect("default config is valid"))
}

pub fn service() -> LearningService<InMemoryLearnerStore> {
    LearningService::new(engine(), Arc::new(InMemoryLearnerStore::new()))
}

/// A service whose learner already sits on `level`.
pub fn service_with_learner_at(learner_id: &str, level: u32) -> LearningService<InMemoryLearnerStore> {
    let service = service();
    let mut state = service.engine().new_learner(learner_id);
    state.progress = LevelProgress::starting_at(level, at(0));
    service
        .store()
        .commit(0, state, None)
        .expect("seed commit succeeds");
    service
}

pub fn addition(op1: i64, op2: i64, answer: i64, level: i64, offset_secs: i64) -> AttemptSubmission {
    AttemptSubmission {
        operator: Operator::Add,
        op1,
        op2,
        claimed_result: None,
        answer: Some(answer),
        elapsed_ms: 6000,
        steps: vec![],
        number_range: NumberRange::Twenty,
        placeholder: PlaceholderPosition::Result,
        level,
        completed_at: at(offset_secs),
    }
}

pub fn correct(level: i64, offset_secs: i64) -> AttemptSubmission {
    addition(6, 7, 13, level, offset_secs)
}

pub fn wrong(level: i64, offset_secs: i64) -> AttemptSubmission {
    addition(6, 7, 12, level, offset_secs)
}
