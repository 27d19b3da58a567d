//! Representation (scaffolding) level: 1 is the most visual support,
//! `max_level` the least. Thresholds live in [`ScaffoldingParams`].

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::adaptive::config::ScaffoldingParams;
use crate::adaptive::events::RepresentationChange;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScaffoldingSample {
    pub correct: bool,
    pub elapsed_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScaffoldingState {
    pub level: u8,
    pub window: VecDeque<ScaffoldingSample>,
    pub consecutive_correct: u32,
    pub consecutive_errors: u32,
    pub success_rate: f64,
    pub history: VecDeque<RepresentationChange>,
}

impl ScaffoldingState {
    pub fn new(params: &ScaffoldingParams) -> Self {
        Self {
            level: params.initial_level,
            window: VecDeque::new(),
            consecutive_correct: 0,
            consecutive_errors: 0,
            success_rate: 0.0,
            history: VecDeque::new(),
        }
    }
}

impl Default for ScaffoldingState {
    fn default() -> Self {
        Self::new(&ScaffoldingParams::default())
    }
}

#[derive(Debug, Clone, Default)]
pub struct ScaffoldingController {
    params: ScaffoldingParams,
}

impl ScaffoldingController {
    pub fn new(params: ScaffoldingParams) -> Self {
        Self { params }
    }

    pub fn apply(
        &self,
        current: &ScaffoldingState,
        correct: bool,
        elapsed_ms: u64,
        at: DateTime<Utc>,
    ) -> (ScaffoldingState, Option<RepresentationChange>) {
        let p = &self.params;
        let mut state = current.clone();
        state.level = state.level.clamp(p.min_level, p.max_level);

        state.window.push_back(ScaffoldingSample {
            correct,
            elapsed_ms,
        });
        while state.window.len() > p.window {
            state.window.pop_front();
        }
        self.recount(&mut state);

        let target = if let Some(reason) = self.struggle_reason(&state) {
            (state.level > p.min_level).then(|| (state.level - 1, reason))
        } else if state.consecutive_correct >= p.mastery_consecutive_correct
            && state.success_rate >= p.mastery_success_rate
        {
            (state.level < p.max_level).then(|| (state.level + 1, "sustained_success"))
        } else {
            None
        };

        let Some((to, reason)) = target else {
            return (state, None);
        };

        let change = RepresentationChange {
            from: state.level,
            to,
            reason: reason.to_string(),
            changed_at: at,
        };
        tracing::info!(
            from = change.from,
            to = change.to,
            reason = %change.reason,
            success_rate = state.success_rate,
            "representation level changed"
        );

        state.level = to;
        // the next decision only looks at results under the new level
        state.window.clear();
        self.recount(&mut state);
        state.history.push_back(change.clone());
        while state.history.len() > p.audit_limit {
            state.history.pop_front();
        }

        (state, Some(change))
    }

    fn recount(&self, state: &mut ScaffoldingState) {
        state.consecutive_correct = state.window.iter().rev().take_while(|s| s.correct).count() as u32;
        state.consecutive_errors = state.window.iter().rev().take_while(|s| !s.correct).count() as u32;
        state.success_rate = if state.window.is_empty() {
            0.0
        } else {
            state.window.iter().filter(|s| s.correct).count() as f64 / state.window.len() as f64
        };
    }

    fn struggle_reason(&self, state: &ScaffoldingState) -> Option<&'static str> {
        let p = &self.params;
        if state.consecutive_errors >= p.struggle_consecutive_errors {
            return Some("consecutive_errors");
        }
        if state.window.len() < p.min_samples {
            return None;
        }
        if state.success_rate < p.struggle_success_rate {
            return Some("low_success_rate");
        }

        let half = state.window.len() / 2;
        let first = mean_ms(state.window.iter().take(half));
        let second = mean_ms(state.window.iter().skip(half));
        if first > 0.0 && second >= first * p.rising_time_ratio {
            return Some("rising_solve_time");
        }
        None
    }
}

fn mean_ms<'a>(samples: impl Iterator<Item = &'a ScaffoldingSample>) -> f64 {
    let (sum, n) = samples.fold((0.0f64, 0u32), |(sum, n), s| (sum + s.elapsed_ms as f64, n + 1));
    if n == 0 {
        0.0
    } else {
        sum / f64::from(n)
    }
}
