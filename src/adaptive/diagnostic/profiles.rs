use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::adaptive::config::DiagnosticParams;
use crate::adaptive::errors::{classify_error, ErrorType};
use crate::adaptive::types::{digit_count, Representation, StrategyLabel, TaskAttempt};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessProfile {
    pub preferred_representations: Vec<Representation>,
    pub representation_usage: BTreeMap<Representation, u32>,
    pub flexibility: f64,
    pub systematics: f64,
}

impl Default for ProcessProfile {
    fn default() -> Self {
        Self {
            preferred_representations: Vec::new(),
            representation_usage: BTreeMap::new(),
            flexibility: 0.0,
            systematics: 0.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StrategyProfile {
    pub distribution: BTreeMap<StrategyLabel, f64>,
    pub dominant: StrategyLabel,
    pub flexibility: f64,
}

impl Default for StrategyProfile {
    fn default() -> Self {
        Self {
            distribution: BTreeMap::new(),
            dominant: StrategyLabel::CountingOn,
            flexibility: 0.0,
        }
    }
}

impl StrategyProfile {
    pub fn share(&self, label: StrategyLabel) -> f64 {
        self.distribution.get(&label).copied().unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TimeTrend {
    Improving,
    #[default]
    Stable,
    Declining,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct TimeProfile {
    pub mean_ms: f64,
    pub std_dev_ms: f64,
    pub trend: TimeTrend,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct PatternProfile {
    pub error_rates: BTreeMap<String, f64>,
    pub attempts: BTreeMap<String, u32>,
    pub mastered: Vec<String>,
    pub struggling: Vec<String>,
    pub error_types: BTreeMap<ErrorType, u32>,
    /// Mean error rate over the (operator, category) groups only.
    pub mean_category_error_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmotionProfile {
    pub frustration: f64,
    pub confidence: f64,
    pub persistence: f64,
}

impl Default for EmotionProfile {
    fn default() -> Self {
        Self {
            frustration: 0.0,
            confidence: 0.5,
            persistence: 0.5,
        }
    }
}

pub fn process_profile(attempts: &[TaskAttempt], params: &DiagnosticParams) -> ProcessProfile {
    let mut usage: BTreeMap<Representation, u32> = BTreeMap::new();
    for step in attempts.iter().flat_map(|a| a.steps.iter()) {
        *usage.entry(step.representation).or_insert(0) += 1;
    }

    let mut ranked: Vec<(Representation, u32)> = usage.iter().map(|(r, c)| (*r, *c)).collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    let preferred_representations = ranked.iter().take(2).map(|(r, _)| *r).collect();

    let flexibility = (usage.len() as f64 / params.representation_norm).min(1.0);

    let scores: Vec<f64> = attempts
        .iter()
        .filter(|a| a.is_correct && !a.steps.is_empty())
        .map(|a| (1.0 - a.steps.len() as f64 / params.systematics_step_cap).max(0.0))
        .collect();
    let systematics = if scores.is_empty() {
        0.5
    } else {
        scores.iter().sum::<f64>() / scores.len() as f64
    };

    ProcessProfile {
        preferred_representations,
        representation_usage: usage,
        flexibility,
        systematics,
    }
}

pub fn strategy_profile(labels: &[StrategyLabel], params: &DiagnosticParams) -> StrategyProfile {
    if labels.is_empty() {
        return StrategyProfile::default();
    }

    let mut counts: BTreeMap<StrategyLabel, u32> = BTreeMap::new();
    for label in labels {
        *counts.entry(*label).or_insert(0) += 1;
    }

    let total = labels.len() as f64;
    let distribution: BTreeMap<StrategyLabel, f64> = counts
        .iter()
        .map(|(label, count)| (*label, *count as f64 / total))
        .collect();

    // Ties resolve to the earliest label in declaration order.
    let mut dominant = StrategyLabel::CountingOn;
    let mut best = 0;
    for (label, count) in &counts {
        if *count > best {
            best = *count;
            dominant = *label;
        }
    }

    StrategyProfile {
        flexibility: (counts.len() as f64 / params.strategy_norm).min(1.0),
        distribution,
        dominant,
    }
}

pub fn time_profile(attempts: &[TaskAttempt], params: &DiagnosticParams) -> TimeProfile {
    if attempts.is_empty() {
        return TimeProfile::default();
    }

    let times: Vec<f64> = attempts.iter().map(|a| a.elapsed_ms as f64).collect();
    let mean_ms = mean(&times);
    let variance = times.iter().map(|t| (t - mean_ms).powi(2)).sum::<f64>() / times.len() as f64;

    let trend = if times.len() < 2 {
        TimeTrend::Stable
    } else {
        let (first, second) = times.split_at(times.len() / 2);
        let first_mean = mean(first);
        let second_mean = mean(second);
        if first_mean <= 0.0 {
            TimeTrend::Stable
        } else if second_mean <= first_mean * params.improving_ratio {
            TimeTrend::Improving
        } else if second_mean >= first_mean * params.declining_ratio {
            TimeTrend::Declining
        } else {
            TimeTrend::Stable
        }
    };

    TimeProfile {
        mean_ms,
        std_dev_ms: variance.sqrt(),
        trend,
    }
}

pub fn category_key(attempt: &TaskAttempt) -> String {
    format!(
        "{}_{}_{}",
        attempt.operator.key(),
        u32::from(attempt.number_range),
        attempt.placeholder.key()
    )
}

fn digits_key(attempt: &TaskAttempt) -> String {
    format!(
        "{}_digits_{}x{}",
        attempt.operator.key(),
        digit_count(attempt.op1),
        digit_count(attempt.op2)
    )
}

fn structure_key(attempt: &TaskAttempt) -> String {
    let structure = if attempt.lands_on_round() {
        "complement"
    } else if attempt.crosses_decade() {
        "decade_transition"
    } else {
        "no_transition"
    };
    format!("{}_{}", attempt.operator.key(), structure)
}

#[derive(Default)]
struct Tally {
    total: u32,
    wrong: u32,
}

impl Tally {
    fn record(&mut self, correct: bool) {
        self.total += 1;
        if !correct {
            self.wrong += 1;
        }
    }

    fn error_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.wrong as f64 / self.total as f64
        }
    }
}

pub fn pattern_profile(
    attempts: &[TaskAttempt],
    params: &DiagnosticParams,
    low_error_rate: f64,
    high_error_rate: f64,
) -> PatternProfile {
    let mut categories: BTreeMap<String, Tally> = BTreeMap::new();
    let mut secondary: BTreeMap<String, Tally> = BTreeMap::new();
    let mut error_types: BTreeMap<ErrorType, u32> = BTreeMap::new();

    for attempt in attempts {
        categories
            .entry(category_key(attempt))
            .or_default()
            .record(attempt.is_correct);
        secondary
            .entry(digits_key(attempt))
            .or_default()
            .record(attempt.is_correct);
        secondary
            .entry(structure_key(attempt))
            .or_default()
            .record(attempt.is_correct);
        if let Some(error) = classify_error(attempt) {
            *error_types.entry(error).or_insert(0) += 1;
        }
    }

    let mean_category_error_rate = if categories.is_empty() {
        0.0
    } else {
        categories.values().map(Tally::error_rate).sum::<f64>() / categories.len() as f64
    };

    let mut profile = PatternProfile {
        error_types,
        mean_category_error_rate,
        ..Default::default()
    };

    for (key, tally) in categories.iter().chain(secondary.iter()) {
        let rate = tally.error_rate();
        profile.error_rates.insert(key.clone(), rate);
        profile.attempts.insert(key.clone(), tally.total);
        if tally.total < params.category_min_attempts {
            continue;
        }
        if rate < low_error_rate {
            profile.mastered.push(key.clone());
        } else if rate > high_error_rate {
            profile.struggling.push(key.clone());
        }
    }

    profile
}

pub fn emotion_profile(attempts: &[TaskAttempt], time: &TimeProfile) -> EmotionProfile {
    if attempts.is_empty() {
        return EmotionProfile::default();
    }

    let recent_wrong = attempts
        .iter()
        .rev()
        .take(5)
        .filter(|a| !a.is_correct)
        .count();
    let frustration = if recent_wrong >= 3 && time.trend == TimeTrend::Declining {
        0.7
    } else if recent_wrong >= 2 {
        0.4
    } else {
        0.0
    };

    let success_rate =
        attempts.iter().filter(|a| a.is_correct).count() as f64 / attempts.len() as f64;

    let persistence = if attempts.len() < 5 && success_rate < 0.5 {
        0.3
    } else if attempts.len() >= 10 {
        0.8
    } else {
        0.5
    };

    EmotionProfile {
        frustration,
        confidence: success_rate,
        persistence,
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}
