use serde::{Deserialize, Serialize};

use crate::adaptive::error::EngineError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressionParams {
    pub milestone_target: u32,
    pub max_levels: u32,
    pub gap_resolution_streak: u32,
}

impl Default for ProgressionParams {
    fn default() -> Self {
        Self {
            milestone_target: 10,
            max_levels: 100,
            gap_resolution_streak: 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MasteryParams {
    pub mastery_threshold: u32,
    pub correct_reward: u32,
    pub error_penalty: u32,
    pub score_cap: u32,
    pub recent_error_limit: usize,
}

impl Default for MasteryParams {
    fn default() -> Self {
        Self {
            mastery_threshold: 3,
            correct_reward: 1,
            error_penalty: 2,
            score_cap: 5,
            recent_error_limit: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZpdParams {
    pub prior_weight: f64,
    pub evidence_weight: f64,
    pub default_prior: u8,
    pub cold_start_level: u8,
    pub min_level: u8,
    pub max_level: u8,
    pub fast_time_ms: f64,
    pub slow_time_ms: f64,
    pub low_error_rate: f64,
    pub high_error_rate: f64,
    pub struggling_penalty_threshold: usize,
    pub promotion_share: f64,
}

impl Default for ZpdParams {
    fn default() -> Self {
        Self {
            prior_weight: 0.6,
            evidence_weight: 0.4,
            default_prior: 3,
            cold_start_level: 2,
            min_level: 1,
            max_level: 5,
            fast_time_ms: 5000.0,
            slow_time_ms: 10000.0,
            low_error_rate: 0.2,
            high_error_rate: 0.5,
            struggling_penalty_threshold: 3,
            promotion_share: 0.6,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosticParams {
    pub window_size: usize,
    pub diagnosis_interval: u32,
    pub category_min_attempts: u32,
    pub improving_ratio: f64,
    pub declining_ratio: f64,
    pub systematics_step_cap: f64,
    pub representation_norm: f64,
    pub strategy_norm: f64,
}

impl Default for DiagnosticParams {
    fn default() -> Self {
        Self {
            window_size: 20,
            diagnosis_interval: 10,
            category_min_attempts: 3,
            improving_ratio: 0.9,
            declining_ratio: 1.1,
            systematics_step_cap: 15.0,
            representation_norm: 4.0,
            strategy_norm: 5.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectorParams {
    pub automatized_ms: u64,
    pub automatized_max_steps: usize,
    pub count_tolerance: u32,
}

impl Default for DetectorParams {
    fn default() -> Self {
        Self {
            automatized_ms: 3000,
            automatized_max_steps: 2,
            count_tolerance: 1,
        }
    }
}

/// Thresholds for the representation (scaffolding) level. These are
/// heuristics; the replay tool is the way to check them against recordings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScaffoldingParams {
    pub window: usize,
    pub min_level: u8,
    pub max_level: u8,
    pub initial_level: u8,
    pub min_samples: usize,
    pub struggle_consecutive_errors: u32,
    pub struggle_success_rate: f64,
    pub rising_time_ratio: f64,
    pub mastery_consecutive_correct: u32,
    pub mastery_success_rate: f64,
    pub audit_limit: usize,
}

impl Default for ScaffoldingParams {
    fn default() -> Self {
        Self {
            window: 10,
            min_level: 1,
            max_level: 5,
            initial_level: 2,
            min_samples: 5,
            struggle_consecutive_errors: 3,
            struggle_success_rate: 0.5,
            rising_time_ratio: 1.5,
            mastery_consecutive_correct: 5,
            mastery_success_rate: 0.8,
            audit_limit: 50,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    pub progression: ProgressionParams,
    pub mastery: MasteryParams,
    pub zpd: ZpdParams,
    pub diagnostic: DiagnosticParams,
    pub detector: DetectorParams,
    pub scaffolding: ScaffoldingParams,
}

impl EngineConfig {
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("MATHPATH_MILESTONE_TARGET") {
            config.progression.milestone_target =
                val.parse().unwrap_or(config.progression.milestone_target);
        }
        if let Ok(val) = std::env::var("MATHPATH_MAX_LEVELS") {
            config.progression.max_levels = val.parse().unwrap_or(config.progression.max_levels);
        }
        if let Ok(val) = std::env::var("MATHPATH_MASTERY_THRESHOLD") {
            config.mastery.mastery_threshold =
                val.parse().unwrap_or(config.mastery.mastery_threshold);
        }
        if let Ok(val) = std::env::var("MATHPATH_ERROR_PENALTY") {
            config.mastery.error_penalty = val.parse().unwrap_or(config.mastery.error_penalty);
        }
        if let Ok(val) = std::env::var("MATHPATH_ZPD_PRIOR_WEIGHT") {
            config.zpd.prior_weight = val.parse().unwrap_or(config.zpd.prior_weight);
        }
        if let Ok(val) = std::env::var("MATHPATH_ZPD_EVIDENCE_WEIGHT") {
            config.zpd.evidence_weight = val.parse().unwrap_or(config.zpd.evidence_weight);
        }

        config
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        if self.progression.milestone_target == 0 {
            return Err(EngineError::Config("milestone_target must be > 0".into()));
        }
        if self.progression.max_levels == 0 {
            return Err(EngineError::Config("max_levels must be > 0".into()));
        }
        if self.mastery.mastery_threshold == 0 {
            return Err(EngineError::Config("mastery_threshold must be > 0".into()));
        }
        if self.mastery.score_cap < self.mastery.mastery_threshold {
            return Err(EngineError::Config(
                "score_cap must not be below mastery_threshold".into(),
            ));
        }
        for (name, weight) in [
            ("prior_weight", self.zpd.prior_weight),
            ("evidence_weight", self.zpd.evidence_weight),
        ] {
            if !(0.0..=1.0).contains(&weight) {
                return Err(EngineError::Config(format!("{name} must be within [0, 1]")));
            }
        }
        if self.zpd.min_level == 0 || self.zpd.min_level > self.zpd.max_level {
            return Err(EngineError::Config("invalid zpd level bounds".into()));
        }
        if self.scaffolding.min_level > self.scaffolding.max_level
            || !(self.scaffolding.min_level..=self.scaffolding.max_level)
                .contains(&self.scaffolding.initial_level)
        {
            return Err(EngineError::Config("invalid scaffolding level bounds".into()));
        }
        if self.diagnostic.window_size == 0 || self.scaffolding.window == 0 {
            return Err(EngineError::Config("windows must be non-empty".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_constants() {
        let config = EngineConfig::default();
        assert_eq!(config.progression.milestone_target, 10);
        assert_eq!(config.progression.max_levels, 100);
        assert_eq!(config.mastery.mastery_threshold, 3);
        assert_eq!(config.mastery.error_penalty, 2);
        assert!((config.zpd.prior_weight - 0.6).abs() < f64::EPSILON);
        assert!((config.zpd.evidence_weight - 0.4).abs() < f64::EPSILON);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_rejects_bad_values() {
        let mut config = EngineConfig::default();
        config.progression.milestone_target = 0;
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.zpd.prior_weight = 1.4;
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.scaffolding.initial_level = 9;
        assert!(config.validate().is_err());
    }
}
