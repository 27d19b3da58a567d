//! Offline replay of recorded submissions through the learning service.

use std::collections::BTreeSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::adaptive::error::EngineError;
use crate::adaptive::events::EngineEvent;
use crate::adaptive::persistence::LearnerStore;
use crate::adaptive::types::AttemptSubmission;
use crate::services::LearningService;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplayRecord {
    pub learner_id: String,
    pub submission: AttemptSubmission,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplayEvent {
    pub learner_id: String,
    pub record: usize,
    pub event: EngineEvent,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LearnerSummary {
    pub learner_id: String,
    pub current_level: u32,
    pub level_name: String,
    pub total_attempts: u64,
    pub mastered_levels: usize,
    pub active_gaps: usize,
    pub representation_level: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zpd_level: Option<u8>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplayReport {
    pub processed: usize,
    pub rejected: usize,
    pub events: Vec<ReplayEvent>,
    pub summaries: Vec<LearnerSummary>,
}

pub async fn load_records(path: &Path) -> Result<Vec<ReplayRecord>, EngineError> {
    let raw = tokio::fs::read_to_string(path).await?;
    let records: Vec<ReplayRecord> = serde_json::from_str(&raw)?;
    tracing::info!(path = %path.display(), records = records.len(), "replay records loaded");
    Ok(records)
}

/// Feeds records in order. Malformed submissions are counted and skipped;
/// any other failure stops the replay.
pub fn run<S: LearnerStore>(
    service: &LearningService<S>,
    records: Vec<ReplayRecord>,
) -> Result<ReplayReport, EngineError> {
    let mut report = ReplayReport::default();
    let mut learners = BTreeSet::new();

    for (index, record) in records.into_iter().enumerate() {
        learners.insert(record.learner_id.clone());
        match service.submit(&record.learner_id, record.submission) {
            Ok(result) => {
                report.processed += 1;
                report
                    .events
                    .extend(result.events.into_iter().map(|event| ReplayEvent {
                        learner_id: record.learner_id.clone(),
                        record: index,
                        event,
                    }));
            }
            Err(err) if err.is_malformed_input() => {
                report.rejected += 1;
                tracing::warn!(
                    learner_id = %record.learner_id,
                    record = index,
                    error = %err,
                    "replay record rejected"
                );
            }
            Err(err) => {
                tracing::error!(record = index, error = %err, "replay aborted");
                return Err(err);
            }
        }
    }

    let catalog = service.engine().catalog();
    for learner_id in learners {
        let state = service.state(&learner_id)?;
        report.summaries.push(LearnerSummary {
            current_level: state.progress.current_level,
            level_name: catalog.level_name(state.progress.current_level),
            total_attempts: state.total_attempts,
            mastered_levels: state
                .progress
                .levels
                .values()
                .filter(|level| level.mastered_at.is_some())
                .count(),
            active_gaps: state.progress.active_gaps().count(),
            representation_level: state.scaffolding.level,
            zpd_level: state.snapshot.as_ref().map(|s| s.zpd_level),
            learner_id,
        });
    }

    Ok(report)
}
