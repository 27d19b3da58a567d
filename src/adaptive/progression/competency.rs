use std::collections::{BTreeMap, BTreeSet, VecDeque};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::adaptive::config::MasteryParams;
use crate::adaptive::error::EngineError;
use crate::adaptive::errors::{classify_error, ErrorType};
use crate::adaptive::types::{Operator, PlaceholderPosition, TaskAttempt};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct TaskMastery {
    pub signature: String,
    pub attempts: u32,
    pub score: u32,
    pub mastered: bool,
}

impl TaskMastery {
    pub fn new(signature: impl Into<String>) -> Self {
        Self {
            signature: signature.into(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentError {
    pub signature: String,
    pub answer: Option<i64>,
    pub expected: u32,
    pub error_type: ErrorType,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompetencyProgress {
    pub competency_id: String,
    pub attempted: u32,
    pub correct: u32,
    pub success_rate: f64,
    level: f64,
    pub mastered_tasks: BTreeSet<String>,
    pub recent_errors: VecDeque<RecentError>,
}

impl CompetencyProgress {
    pub fn new(competency_id: impl Into<String>) -> Self {
        Self {
            competency_id: competency_id.into(),
            attempted: 0,
            correct: 0,
            success_rate: 0.0,
            level: 0.0,
            mastered_tasks: BTreeSet::new(),
            recent_errors: VecDeque::new(),
        }
    }

    /// Derived from mastered-task count and success rate; there is no setter.
    pub fn level(&self) -> f64 {
        self.level
    }
}

/// Per-learner competency state: one record per competency plus the task
/// mastery records underneath them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct CompetencyBook {
    pub competencies: BTreeMap<String, CompetencyProgress>,
    pub tasks: BTreeMap<String, TaskMastery>,
}

impl CompetencyBook {
    pub fn competency(&self, id: &str) -> Option<&CompetencyProgress> {
        self.competencies.get(id)
    }

    pub fn task(&self, signature: &str) -> Option<&TaskMastery> {
        self.tasks.get(signature)
    }
}

/// Error-compensated score update: +reward on success, -penalty on error
/// (floored at 0), capped at `score_cap`.
pub fn apply_task_result(
    mastery: &mut TaskMastery,
    correct: bool,
    params: &MasteryParams,
) -> Result<(), EngineError> {
    if mastery.score > params.score_cap {
        tracing::error!(
            signature = %mastery.signature,
            score = mastery.score,
            cap = params.score_cap,
            "task mastery score above cap"
        );
        return Err(EngineError::Invariant(format!(
            "mastery score {} for {} exceeds cap {}",
            mastery.score, mastery.signature, params.score_cap
        )));
    }

    mastery.attempts += 1;
    mastery.score = if correct {
        (mastery.score + params.correct_reward).min(params.score_cap)
    } else {
        mastery.score.saturating_sub(params.error_penalty)
    };
    mastery.mastered = mastery.score >= params.mastery_threshold;
    Ok(())
}

/// Level rollup, first matching row wins.
pub fn competency_level(mastered: usize, success_rate: f64) -> f64 {
    let rate = success_rate;
    if mastered >= 5 || (mastered >= 3 && rate >= 0.80) {
        7.0
    } else if mastered >= 4 || (mastered >= 2 && rate >= 0.75) {
        6.0
    } else if mastered >= 3 || (mastered >= 2 && rate >= 0.70) {
        5.0
    } else if mastered >= 2 || (mastered >= 1 && rate >= 0.65) {
        4.0
    } else if mastered >= 1 || rate >= 0.60 {
        3.0
    } else if rate >= 0.50 {
        2.0
    } else if rate >= 0.30 {
        1.0
    } else {
        0.0
    }
}

/// Competency tags for an attempt, derived only from its numbers.
pub fn competency_ids(attempt: &TaskAttempt) -> Vec<String> {
    let op = attempt.operator.key();
    let band = u32::from(attempt.magnitude_band());
    let mut ids = vec![format!("{op}_{band}")];

    if attempt.placeholder != PlaceholderPosition::Result {
        ids.push(format!("{op}_{band}_missing_{}", attempt.placeholder.key()));
    }
    if attempt.lands_on_round() {
        ids.push(format!("{op}_{band}_round_result"));
    }
    if attempt.crosses_decade() {
        ids.push(format!("{op}_{band}_decade_transition"));
    }

    match attempt.operator {
        Operator::Add if attempt.op1 == attempt.op2 => ids.push("add_doubles".to_string()),
        Operator::Add if attempt.op1.abs_diff(attempt.op2) == 1 => {
            ids.push("add_near_doubles".to_string())
        }
        Operator::Subtract if attempt.op2 > 0 && attempt.op2.checked_mul(2) == Some(attempt.op1) => {
            ids.push("sub_halving".to_string())
        }
        _ => {}
    }

    ids
}

#[derive(Debug, Clone, Default)]
pub struct CompetencyTracker {
    params: MasteryParams,
}

impl CompetencyTracker {
    pub fn new(params: MasteryParams) -> Self {
        Self { params }
    }

    pub fn update_after_task(
        &self,
        current: &CompetencyBook,
        attempt: &TaskAttempt,
        competency_ids: &[String],
    ) -> Result<CompetencyBook, EngineError> {
        let mut book = current.clone();
        let signature = attempt.signature();

        let mastery = book
            .tasks
            .entry(signature.clone())
            .or_insert_with(|| TaskMastery::new(signature.clone()));
        apply_task_result(mastery, attempt.is_correct, &self.params)?;
        let task_mastered = mastery.mastered;

        let error = classify_error(attempt).map(|error_type| RecentError {
            signature: signature.clone(),
            answer: attempt.answer,
            expected: attempt.expected_answer(),
            error_type,
            at: attempt.completed_at,
        });

        for id in competency_ids {
            let progress = book
                .competencies
                .entry(id.clone())
                .or_insert_with(|| CompetencyProgress::new(id.clone()));

            progress.attempted += 1;
            if attempt.is_correct {
                progress.correct += 1;
            }
            progress.success_rate = progress.correct as f64 / progress.attempted as f64;

            if task_mastered {
                progress.mastered_tasks.insert(signature.clone());
            } else {
                progress.mastered_tasks.remove(&signature);
            }

            if let Some(ref error) = error {
                progress.recent_errors.push_back(error.clone());
                while progress.recent_errors.len() > self.params.recent_error_limit {
                    progress.recent_errors.pop_front();
                }
            }

            progress.level = competency_level(progress.mastered_tasks.len(), progress.success_rate);
        }

        Ok(book)
    }
}
