use serde::{Deserialize, Serialize};

use crate::adaptive::config::DetectorParams;
use crate::adaptive::types::{
    crosses_decade, NumberRange, Operator, SolutionStep, StepAction, StrategyLabel, TaskAttempt,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StrategyDetection {
    pub label: StrategyLabel,
    pub confidence: f64,
    pub indicators: Vec<String>,
}

impl StrategyDetection {
    fn new(label: StrategyLabel, confidence: f64, indicators: &[&str]) -> Self {
        Self {
            label,
            confidence: confidence.clamp(0.0, 1.0),
            indicators: indicators.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Guesses the mental strategy behind one attempt from its timing and,
/// when recorded, its solution steps.
#[derive(Debug, Clone, Default)]
pub struct StrategyDetector {
    params: DetectorParams,
}

impl StrategyDetector {
    pub fn new(params: DetectorParams) -> Self {
        Self { params }
    }

    pub fn detect_attempt(&self, attempt: &TaskAttempt) -> StrategyDetection {
        self.detect(
            attempt.operator,
            attempt.op1,
            attempt.op2,
            attempt.result,
            &attempt.steps,
            attempt.elapsed_ms,
            attempt.number_range,
        )
    }

    /// First matching rule wins. The fast path is checked before anything
    /// else, including correctness.
    #[allow(clippy::too_many_arguments)]
    pub fn detect(
        &self,
        operator: Operator,
        op1: u32,
        op2: u32,
        correct_answer: u32,
        steps: &[SolutionStep],
        elapsed_ms: u64,
        number_range: NumberRange,
    ) -> StrategyDetection {
        if elapsed_ms < self.params.automatized_ms && steps.len() <= self.params.automatized_max_steps
        {
            return StrategyDetection::new(
                StrategyLabel::Automatized,
                0.9,
                &["fast_response", "few_steps"],
            );
        }

        if steps.is_empty() {
            return self.detect_from_timing(operator, op1, op2, correct_answer, elapsed_ms, number_range);
        }

        if number_range >= NumberRange::Hundred {
            if let Some(detection) =
                self.detect_place_value_split(operator, op1, op2, correct_answer, steps)
            {
                return detection;
            }
        }

        if let Some(detection) = self.detect_counting(operator, op1, op2, steps) {
            return detection;
        }

        if operator == Operator::Add {
            if op1 == op2 {
                return StrategyDetection::new(StrategyLabel::Doubles, 0.7, &["equal_operands"]);
            }
            if op1.abs_diff(op2) == 1 {
                return StrategyDetection::new(
                    StrategyLabel::NearDoubles,
                    0.65,
                    &["neighbouring_operands"],
                );
            }
            if crosses_decade(operator, op1, op2) && steps.iter().any(|s| s.value == Some(10)) {
                return StrategyDetection::new(
                    StrategyLabel::MakeTen,
                    0.75,
                    &["decade_transition", "intermediate_ten"],
                );
            }
        }

        if steps.len() >= 3 && steps.iter().any(|s| s.action.is_structural()) {
            return StrategyDetection::new(
                StrategyLabel::Decomposition,
                0.6,
                &["split_combine_steps"],
            );
        }

        StrategyDetection::new(StrategyLabel::CountingOn, 0.5, &["default"])
    }

    fn detect_place_value_split(
        &self,
        operator: Operator,
        op1: u32,
        op2: u32,
        result: u32,
        steps: &[SolutionStep],
    ) -> Option<StrategyDetection> {
        if !steps.iter().any(|s| s.action == StepAction::Split) {
            return None;
        }

        let values: Vec<i64> = steps.iter().filter_map(|s| s.value).collect();
        let (low, high) = match operator {
            Operator::Add => (op1 as i64, result as i64),
            Operator::Subtract => (result as i64, op1 as i64),
        };

        if crosses_decade(operator, op1, op2)
            && values
                .iter()
                .any(|v| *v > low && *v < high && v % 10 == 0)
        {
            return Some(StrategyDetection::new(
                StrategyLabel::MakeTen,
                0.8,
                &["split_action", "decade_landing"],
            ));
        }

        let parts: Vec<i64> = [op1, op2]
            .iter()
            .flat_map(|op| [(op - op % 10) as i64, (op % 10) as i64])
            .filter(|part| *part > 0)
            .collect();
        if values.iter().any(|v| parts.contains(v)) {
            return Some(StrategyDetection::new(
                StrategyLabel::Decomposition,
                0.75,
                &["split_action", "tens_ones_separation"],
            ));
        }

        None
    }

    fn detect_counting(
        &self,
        operator: Operator,
        op1: u32,
        op2: u32,
        steps: &[SolutionStep],
    ) -> Option<StrategyDetection> {
        let counts = steps
            .iter()
            .filter(|s| s.action.is_elemental_count())
            .count() as u32;
        if counts == 0 {
            return None;
        }

        let near = |target: u32| counts.abs_diff(target) <= self.params.count_tolerance.max(target / 10);

        // counting all starts from one: the sum, or the minuend when taking away
        let total = match operator {
            Operator::Add => op1.saturating_add(op2),
            Operator::Subtract => op1,
        };
        if near(total) {
            return Some(StrategyDetection::new(
                StrategyLabel::CountingAll,
                0.8,
                &["counting_actions_match_total"],
            ));
        }
        if near(op1.min(op2)) {
            return Some(StrategyDetection::new(
                StrategyLabel::CountingOn,
                0.75,
                &["counting_actions_match_smaller_operand"],
            ));
        }
        None
    }

    /// Fallback when no step telemetry was recorded.
    pub fn detect_from_timing(
        &self,
        operator: Operator,
        op1: u32,
        op2: u32,
        correct_answer: u32,
        elapsed_ms: u64,
        number_range: NumberRange,
    ) -> StrategyDetection {
        let is_add = operator == Operator::Add;

        if is_add && op1 == op2 && elapsed_ms < 5000 {
            return StrategyDetection::new(
                StrategyLabel::Doubles,
                0.6,
                &["no_step_data", "equal_operands"],
            );
        }
        if is_add && op1.abs_diff(op2) == 1 && elapsed_ms < 6000 {
            return StrategyDetection::new(
                StrategyLabel::Derivation,
                0.55,
                &["no_step_data", "near_double_fact"],
            );
        }

        let small_fact = (op1 <= 5 && op2 <= 5)
            || match operator {
                Operator::Add => correct_answer <= 10,
                Operator::Subtract => op1 <= 10,
            };
        if small_fact && elapsed_ms < 5000 {
            return StrategyDetection::new(
                StrategyLabel::Retrieval,
                0.6,
                &["no_step_data", "known_small_fact"],
            );
        }

        if crosses_decade(operator, op1, op2) && elapsed_ms < 10000 {
            return StrategyDetection::new(
                StrategyLabel::MakeTen,
                0.45,
                &["no_step_data", "decade_transition"],
            );
        }

        if number_range >= NumberRange::Hundred && elapsed_ms < 15000 {
            return StrategyDetection::new(
                StrategyLabel::PlaceValue,
                0.4,
                &["no_step_data", "multi_digit"],
            );
        }

        if elapsed_ms >= 15000 {
            return StrategyDetection::new(
                StrategyLabel::CountingAll,
                0.4,
                &["no_step_data", "slow_response"],
            );
        }

        StrategyDetection::new(StrategyLabel::CountingOn, 0.4, &["no_step_data"])
    }
}
