pub mod profiles;
pub mod zpd;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::adaptive::catalog::Catalog;
use crate::adaptive::config::{DiagnosticParams, ZpdParams};
use crate::adaptive::strategy::StrategyDetector;
use crate::adaptive::types::{StrategyLabel, TaskAttempt};

pub use profiles::{
    EmotionProfile, PatternProfile, ProcessProfile, StrategyProfile, TimeProfile, TimeTrend,
};
pub use zpd::ZpdEstimate;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CognitiveSnapshot {
    pub process: ProcessProfile,
    pub strategy: StrategyProfile,
    pub time: TimeProfile,
    pub pattern: PatternProfile,
    pub emotion: EmotionProfile,
    pub zpd_level: u8,
    pub recommended_difficulty: u8,
    pub recommended_strategies: Vec<StrategyLabel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zpd: Option<ZpdEstimate>,
    pub sample_size: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observed_until: Option<DateTime<Utc>>,
}

impl CognitiveSnapshot {
    /// Snapshot used when there is no history at all.
    pub fn cold_start(params: &ZpdParams) -> Self {
        Self {
            process: ProcessProfile::default(),
            strategy: StrategyProfile::default(),
            time: TimeProfile::default(),
            pattern: PatternProfile::default(),
            emotion: EmotionProfile::default(),
            zpd_level: params.cold_start_level,
            recommended_difficulty: params.cold_start_level,
            recommended_strategies: vec![StrategyLabel::CountingOn],
            zpd: None,
            sample_size: 0,
            observed_until: None,
        }
    }
}

pub struct DiagnosticEngine {
    params: DiagnosticParams,
    zpd: ZpdParams,
    detector: StrategyDetector,
    catalog: Arc<Catalog>,
}

impl DiagnosticEngine {
    pub fn new(
        params: DiagnosticParams,
        zpd: ZpdParams,
        detector: StrategyDetector,
        catalog: Arc<Catalog>,
    ) -> Self {
        Self {
            params,
            zpd,
            detector,
            catalog,
        }
    }

    pub fn window_size(&self) -> usize {
        self.params.window_size
    }

    /// Rebuilds the snapshot from the most recent window. The previous
    /// snapshot only contributes its ZPD level as the prior.
    pub fn diagnose(
        &self,
        recent_attempts: &[TaskAttempt],
        prior: Option<&CognitiveSnapshot>,
    ) -> CognitiveSnapshot {
        if recent_attempts.is_empty() {
            return CognitiveSnapshot::cold_start(&self.zpd);
        }

        let mut window: Vec<&TaskAttempt> = recent_attempts.iter().collect();
        window.sort_by_key(|a| a.completed_at);
        let skip = window.len().saturating_sub(self.params.window_size);
        let window: Vec<TaskAttempt> = window.into_iter().skip(skip).cloned().collect();

        let labels: Vec<StrategyLabel> = window
            .iter()
            .map(|a| self.detector.detect_attempt(a).label)
            .collect();

        let process = profiles::process_profile(&window, &self.params);
        let strategy = profiles::strategy_profile(&labels, &self.params);
        let time = profiles::time_profile(&window, &self.params);
        let pattern = profiles::pattern_profile(
            &window,
            &self.params,
            self.zpd.low_error_rate,
            self.zpd.high_error_rate,
        );
        let emotion = profiles::emotion_profile(&window, &time);

        let estimate = zpd::estimate(
            prior.map(|s| s.zpd_level),
            &strategy,
            &time,
            &pattern,
            &self.catalog,
            &self.zpd,
        );
        let zpd_level = estimate.posterior;
        let recommended_difficulty =
            zpd::recommended_difficulty(zpd_level, pattern.struggling.len(), &self.zpd);
        let recommended_strategies =
            zpd::recommended_strategies(&strategy, &self.catalog, &self.zpd);

        tracing::debug!(
            samples = window.len(),
            prior = estimate.prior,
            likelihood = estimate.likelihood,
            zpd_level,
            dominant = %strategy.dominant,
            "diagnosis computed"
        );

        CognitiveSnapshot {
            process,
            strategy,
            time,
            pattern,
            emotion,
            zpd_level,
            recommended_difficulty,
            recommended_strategies,
            zpd: Some(estimate),
            sample_size: window.len(),
            observed_until: window.last().map(|a| a.completed_at),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adaptive::types::{NumberRange, Operator, PlaceholderPosition};
    use chrono::Duration;
    use uuid::Uuid;

    fn engine() -> DiagnosticEngine {
        DiagnosticEngine::new(
            DiagnosticParams::default(),
            ZpdParams::default(),
            StrategyDetector::default(),
            Arc::new(Catalog::new()),
        )
    }

    fn attempt(i: i64, op1: u32, op2: u32, correct: bool, elapsed_ms: u64) -> TaskAttempt {
        let result = op1 + op2;
        TaskAttempt {
            id: Uuid::new_v4(),
            operator: Operator::Add,
            op1,
            op2,
            result,
            answer: Some(if correct { result as i64 } else { result as i64 + 1 }),
            is_correct: correct,
            elapsed_ms,
            steps: vec![],
            number_range: NumberRange::Twenty,
            placeholder: PlaceholderPosition::Result,
            level: 5,
            completed_at: DateTime::<Utc>::UNIX_EPOCH + Duration::seconds(i),
        }
    }

    #[test]
    fn empty_window_is_cold_start() {
        let snapshot = engine().diagnose(&[], None);
        assert_eq!(snapshot.zpd_level, 2);
        assert_eq!(snapshot.strategy.dominant, StrategyLabel::CountingOn);
        assert_eq!(snapshot.recommended_strategies, vec![StrategyLabel::CountingOn]);
        assert_eq!(snapshot.sample_size, 0);
    }

    #[test]
    fn fast_accurate_learner_moves_up() {
        let attempts: Vec<_> = (0..10).map(|i| attempt(i, 6, 7, true, 2000)).collect();
        let snapshot = engine().diagnose(&attempts, None);
        // automatized (5) + fast (1) + low error (1) = 7; 3*0.6 + 7*0.4 = 4.6
        assert_eq!(snapshot.strategy.dominant, StrategyLabel::Automatized);
        assert_eq!(snapshot.zpd_level, 5);
        assert_eq!(snapshot.recommended_strategies, vec![StrategyLabel::Automatized]);
        assert!((snapshot.emotion.confidence - 1.0).abs() < 1e-9);
    }

    #[test]
    fn prior_is_consumed() {
        let attempts: Vec<_> = (0..6).map(|i| attempt(i, 12, 5, false, 20000)).collect();
        let engine = engine();
        let mut prior = CognitiveSnapshot::cold_start(&ZpdParams::default());
        prior.zpd_level = 5;
        // counting_all (1) - slow (1) - high error (1) = -1; 5*0.6 - 0.4 = 2.6
        let snapshot = engine.diagnose(&attempts, Some(&prior));
        assert_eq!(snapshot.zpd_level, 3);
        let without_prior = engine.diagnose(&attempts, None);
        // 3*0.6 - 0.4 = 1.4
        assert_eq!(without_prior.zpd_level, 1);
    }

    #[test]
    fn window_is_bounded_to_most_recent() {
        let mut attempts: Vec<_> = (0..30).map(|i| attempt(i, 3, 4, false, 9000)).collect();
        attempts.reverse();
        let snapshot = engine().diagnose(&attempts, None);
        assert_eq!(snapshot.sample_size, 20);
        assert_eq!(
            snapshot.observed_until,
            Some(DateTime::<Utc>::UNIX_EPOCH + Duration::seconds(29))
        );
    }
}
