use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::adaptive::catalog::{Catalog, IconTier};
use crate::adaptive::config::ProgressionParams;
use crate::adaptive::error::EngineError;
use crate::adaptive::errors::ErrorType;
use crate::adaptive::events::{
    EngineEvent, GapResolvedEvent, KnowledgeGapEvent, MilestoneEvent, MilestoneStats,
};
use crate::adaptive::types::TaskAttempt;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelState {
    pub level: u32,
    pub consecutive_correct: u32,
    pub total_attempts: u32,
    pub total_correct: u32,
    pub average_time_ms: f64,
    pub mastered_at: Option<DateTime<Utc>>,
    pub unlocked_at: DateTime<Utc>,
}

impl LevelState {
    pub fn new(level: u32, unlocked_at: DateTime<Utc>) -> Self {
        Self {
            level,
            consecutive_correct: 0,
            total_attempts: 0,
            total_correct: 0,
            average_time_ms: 0.0,
            mastered_at: None,
            unlocked_at,
        }
    }

    pub fn success_rate(&self) -> f64 {
        if self.total_attempts == 0 {
            0.0
        } else {
            self.total_correct as f64 / self.total_attempts as f64
        }
    }

    fn record(&mut self, correct: bool, elapsed_ms: u64) {
        self.total_attempts += 1;
        if correct {
            self.total_correct += 1;
        }
        self.average_time_ms +=
            (elapsed_ms as f64 - self.average_time_ms) / self.total_attempts as f64;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum GapStatus {
    #[default]
    Active,
    Resolved,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KnowledgeGap {
    pub level: u32,
    pub error_type: ErrorType,
    pub occurrences: u32,
    pub first_detected_at: DateTime<Utc>,
    pub last_detected_at: DateTime<Utc>,
    pub status: GapStatus,
    pub correct_streak: u32,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl KnowledgeGap {
    pub fn key(level: u32, error_type: ErrorType) -> String {
        format!("{level}:{}", error_type.as_str())
    }

    pub fn is_active(&self) -> bool {
        self.status == GapStatus::Active
    }
}

/// Level history for one learner. Entries are only ever added or updated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelProgress {
    pub current_level: u32,
    pub levels: BTreeMap<u32, LevelState>,
    pub knowledge_gaps: BTreeMap<String, KnowledgeGap>,
}

impl Default for LevelProgress {
    fn default() -> Self {
        Self {
            current_level: 1,
            levels: BTreeMap::new(),
            knowledge_gaps: BTreeMap::new(),
        }
    }
}

impl LevelProgress {
    /// Places a learner directly on `level`, e.g. after a placement test.
    /// Lower levels are not backfilled.
    pub fn starting_at(level: u32, at: DateTime<Utc>) -> Self {
        let level = level.max(1);
        let mut levels = BTreeMap::new();
        levels.insert(level, LevelState::new(level, at));
        Self {
            current_level: level,
            levels,
            knowledge_gaps: BTreeMap::new(),
        }
    }

    pub fn current(&self) -> Option<&LevelState> {
        self.levels.get(&self.current_level)
    }

    pub fn level(&self, level: u32) -> Option<&LevelState> {
        self.levels.get(&level)
    }

    pub fn active_gaps(&self) -> impl Iterator<Item = &KnowledgeGap> {
        self.knowledge_gaps.values().filter(|gap| gap.is_active())
    }
}

#[derive(Debug, Clone)]
pub struct LevelOutcome {
    pub progress: LevelProgress,
    pub events: Vec<EngineEvent>,
    pub leveled_up: bool,
}

/// Streak-to-milestone state machine over levels `1..=max_levels`.
pub struct LevelMachine {
    params: ProgressionParams,
    catalog: Arc<Catalog>,
}

impl LevelMachine {
    pub fn new(params: ProgressionParams, catalog: Arc<Catalog>) -> Self {
        Self { params, catalog }
    }

    pub fn apply(
        &self,
        current: &LevelProgress,
        attempt: &TaskAttempt,
        error_type: Option<ErrorType>,
    ) -> Result<LevelOutcome, EngineError> {
        let mut progress = current.clone();
        let mut events = Vec::new();
        let mut leveled_up = false;
        let at = attempt.completed_at;
        let max_level = self.params.max_levels.max(1);

        progress.current_level = progress.current_level.clamp(1, max_level);
        let active = progress.current_level;
        progress
            .levels
            .entry(active)
            .or_insert_with(|| LevelState::new(active, at));

        if attempt.level > active {
            return Err(EngineError::LevelLocked {
                level: attempt.level,
                current: active,
            });
        }

        progress
            .levels
            .entry(attempt.level)
            .or_insert_with(|| LevelState::new(attempt.level, at))
            .record(attempt.is_correct, attempt.elapsed_ms);

        let target = self.params.milestone_target;
        let state = progress
            .levels
            .get_mut(&active)
            .ok_or_else(|| EngineError::Invariant(format!("level {active} state missing")))?;

        if state.consecutive_correct >= target {
            tracing::error!(
                level = active,
                counter = state.consecutive_correct,
                target,
                "milestone counter reached target without firing"
            );
            return Err(EngineError::Invariant(format!(
                "level {active} counter {} not below target {target}",
                state.consecutive_correct
            )));
        }

        if !attempt.is_correct {
            state.consecutive_correct = 0;
        } else if attempt.level == active {
            state.consecutive_correct += 1;

            if state.consecutive_correct == target {
                if state.mastered_at.is_none() {
                    state.mastered_at = Some(at);
                    let event = MilestoneEvent {
                        level: active,
                        title: self.catalog.level_name(active),
                        icon_tier: IconTier::for_level(active),
                        stats: MilestoneStats {
                            success_rate: state.success_rate(),
                            average_time_ms: state.average_time_ms,
                            tasks_completed: state.total_attempts,
                        },
                        achieved_at: at,
                    };
                    tracing::info!(level = active, title = %event.title, "milestone reached");
                    events.push(EngineEvent::Milestone(event));
                }

                if active < max_level {
                    let next = active + 1;
                    progress.current_level = next;
                    let next_state = progress
                        .levels
                        .entry(next)
                        .or_insert_with(|| LevelState::new(next, at));
                    next_state.consecutive_correct = 0;
                    leveled_up = true;
                    tracing::info!(from = active, to = next, "level up");
                } else {
                    state.consecutive_correct = 0;
                    tracing::debug!(level = active, "final level streak completed");
                }
            }
        }

        if attempt.is_correct {
            self.credit_gaps(&mut progress, attempt.level, at, &mut events);
        } else {
            for gap in progress.knowledge_gaps.values_mut() {
                if gap.level == attempt.level {
                    gap.correct_streak = 0;
                }
            }
            if attempt.level < active {
                let error_type = error_type.unwrap_or(ErrorType::Other);
                events.push(self.record_gap(&mut progress, attempt.level, error_type, at));
            }
        }

        Ok(LevelOutcome {
            progress,
            events,
            leveled_up,
        })
    }

    fn record_gap(
        &self,
        progress: &mut LevelProgress,
        level: u32,
        error_type: ErrorType,
        at: DateTime<Utc>,
    ) -> EngineEvent {
        let gap = progress
            .knowledge_gaps
            .entry(KnowledgeGap::key(level, error_type))
            .and_modify(|gap| {
                gap.occurrences += 1;
                gap.last_detected_at = at;
                gap.status = GapStatus::Active;
                gap.correct_streak = 0;
                gap.resolved_at = None;
            })
            .or_insert_with(|| KnowledgeGap {
                level,
                error_type,
                occurrences: 1,
                first_detected_at: at,
                last_detected_at: at,
                status: GapStatus::Active,
                correct_streak: 0,
                resolved_at: None,
            });

        tracing::info!(
            level,
            error_type = error_type.as_str(),
            occurrences = gap.occurrences,
            current_level = progress.current_level,
            "knowledge gap detected"
        );

        EngineEvent::KnowledgeGap(KnowledgeGapEvent {
            level,
            error_type,
            occurrences: gap.occurrences,
            detected_at: at,
        })
    }

    fn credit_gaps(
        &self,
        progress: &mut LevelProgress,
        level: u32,
        at: DateTime<Utc>,
        events: &mut Vec<EngineEvent>,
    ) {
        for gap in progress.knowledge_gaps.values_mut() {
            if gap.level != level || !gap.is_active() {
                continue;
            }
            gap.correct_streak += 1;
            if gap.correct_streak >= self.params.gap_resolution_streak {
                gap.status = GapStatus::Resolved;
                gap.resolved_at = Some(at);
                tracing::info!(level, error_type = gap.error_type.as_str(), "knowledge gap resolved");
                events.push(EngineEvent::GapResolved(GapResolvedEvent {
                    level,
                    error_type: gap.error_type,
                    resolved_at: at,
                }));
            }
        }
    }
}
