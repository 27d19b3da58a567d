//! Fixed-weight prior/evidence blend for the ZPD level.
//!
//! posterior = round(prior * 0.6 + likelihood * 0.4), clamped to [1, 5].
//! The weights are design constants; downstream consumers compare exact
//! integer levels.

use serde::{Deserialize, Serialize};

use crate::adaptive::catalog::Catalog;
use crate::adaptive::config::ZpdParams;
use crate::adaptive::diagnostic::profiles::{PatternProfile, StrategyProfile, TimeProfile};
use crate::adaptive::types::StrategyLabel;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ZpdEstimate {
    pub prior: u8,
    pub strategy_evidence: i32,
    pub time_evidence: i32,
    pub pattern_evidence: i32,
    pub likelihood: i32,
    pub posterior: u8,
}

pub fn time_evidence(time: &TimeProfile, params: &ZpdParams) -> i32 {
    if time.mean_ms < params.fast_time_ms {
        1
    } else if time.mean_ms < params.slow_time_ms {
        0
    } else {
        -1
    }
}

pub fn pattern_evidence(pattern: &PatternProfile, params: &ZpdParams) -> i32 {
    if pattern.mean_category_error_rate < params.low_error_rate {
        1
    } else if pattern.mean_category_error_rate > params.high_error_rate {
        -1
    } else {
        0
    }
}

pub fn estimate(
    prior: Option<u8>,
    strategy: &StrategyProfile,
    time: &TimeProfile,
    pattern: &PatternProfile,
    catalog: &Catalog,
    params: &ZpdParams,
) -> ZpdEstimate {
    let prior = prior
        .unwrap_or(params.default_prior)
        .clamp(params.min_level, params.max_level);

    let strategy_evidence = catalog.strategy_rank(strategy.dominant);
    let time_evidence = time_evidence(time, params);
    let pattern_evidence = pattern_evidence(pattern, params);
    let likelihood = strategy_evidence + time_evidence + pattern_evidence;

    ZpdEstimate {
        prior,
        strategy_evidence,
        time_evidence,
        pattern_evidence,
        likelihood,
        posterior: blend(prior, likelihood, params),
    }
}

pub fn blend(prior: u8, likelihood: i32, params: &ZpdParams) -> u8 {
    let raw = prior as f64 * params.prior_weight + likelihood as f64 * params.evidence_weight;
    let rounded = raw.round();
    if rounded.is_nan() {
        return params.min_level;
    }
    (rounded.clamp(params.min_level as f64, params.max_level as f64)) as u8
}

pub fn recommended_difficulty(zpd_level: u8, struggling: usize, params: &ZpdParams) -> u8 {
    if struggling >= params.struggling_penalty_threshold {
        zpd_level.saturating_sub(1).max(params.min_level)
    } else {
        zpd_level
    }
}

pub fn recommended_strategies(
    strategy: &StrategyProfile,
    catalog: &Catalog,
    params: &ZpdParams,
) -> Vec<StrategyLabel> {
    let mut strategies = vec![strategy.dominant];
    if strategy.share(strategy.dominant) > params.promotion_share {
        if let Some(next) = catalog.next_strategy(strategy.dominant) {
            strategies.push(next);
        }
    }
    strategies
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn strategy(dominant: StrategyLabel, share: f64) -> StrategyProfile {
        let mut distribution = BTreeMap::new();
        distribution.insert(dominant, share);
        StrategyProfile {
            distribution,
            dominant,
            flexibility: 0.2,
        }
    }

    fn time(mean_ms: f64) -> TimeProfile {
        TimeProfile {
            mean_ms,
            ..Default::default()
        }
    }

    fn pattern(rate: f64) -> PatternProfile {
        PatternProfile {
            mean_category_error_rate: rate,
            ..Default::default()
        }
    }

    #[test]
    fn blend_uses_fixed_weights() {
        let params = ZpdParams::default();
        // 3 * 0.6 + 7 * 0.4 = 4.6
        assert_eq!(blend(3, 7, &params), 5);
        // 2 * 0.6 + 1 * 0.4 = 1.6
        assert_eq!(blend(2, 1, &params), 2);
        // 1 * 0.6 - 1 * 0.4 = 0.2
        assert_eq!(blend(1, -1, &params), 1);
        // 5 * 0.6 + 7 * 0.4 = 5.8
        assert_eq!(blend(5, 7, &params), 5);
    }

    #[test]
    fn estimate_sums_evidence() {
        let params = ZpdParams::default();
        let catalog = Catalog::new();
        let est = estimate(
            None,
            &strategy(StrategyLabel::MakeTen, 0.5),
            &time(4000.0),
            &pattern(0.1),
            &catalog,
            &params,
        );
        assert_eq!(est.prior, 3);
        assert_eq!(est.likelihood, 6);
        // 1.8 + 2.4 = 4.2
        assert_eq!(est.posterior, 4);

        let est = estimate(
            Some(2),
            &strategy(StrategyLabel::CountingAll, 1.0),
            &time(12000.0),
            &pattern(0.7),
            &catalog,
            &params,
        );
        assert_eq!(est.likelihood, -1);
        assert_eq!(est.posterior, 1);
    }

    #[test]
    fn difficulty_penalty_and_strategy_promotion() {
        let params = ZpdParams::default();
        let catalog = Catalog::new();
        assert_eq!(recommended_difficulty(3, 3, &params), 2);
        assert_eq!(recommended_difficulty(1, 4, &params), 1);
        assert_eq!(recommended_difficulty(3, 2, &params), 3);

        assert_eq!(
            recommended_strategies(&strategy(StrategyLabel::Doubles, 0.7), &catalog, &params),
            vec![StrategyLabel::Doubles, StrategyLabel::NearDoubles]
        );
        assert_eq!(
            recommended_strategies(&strategy(StrategyLabel::Doubles, 0.6), &catalog, &params),
            vec![StrategyLabel::Doubles]
        );
    }
}
