use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::adaptive::error::EngineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Operator {
    #[serde(rename = "+", alias = "add")]
    Add,
    #[serde(rename = "-", alias = "sub")]
    Subtract,
}

impl Operator {
    pub fn symbol(&self) -> char {
        match self {
            Self::Add => '+',
            Self::Subtract => '-',
        }
    }

    pub fn key(&self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Subtract => "sub",
        }
    }

    /// `None` when the result would be negative or overflow.
    pub fn apply(&self, a: u32, b: u32) -> Option<u32> {
        match self {
            Self::Add => a.checked_add(b),
            Self::Subtract => a.checked_sub(b),
        }
    }

    pub fn inverse(&self) -> Self {
        match self {
            Self::Add => Self::Subtract,
            Self::Subtract => Self::Add,
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(try_from = "u32", into = "u32")]
pub enum NumberRange {
    #[default]
    Ten,
    Twenty,
    Hundred,
    Thousand,
}

impl NumberRange {
    pub fn limit(&self) -> u32 {
        match self {
            Self::Ten => 10,
            Self::Twenty => 20,
            Self::Hundred => 100,
            Self::Thousand => 1000,
        }
    }

    /// Step width used when walking decompositions inside this range.
    pub fn stride(&self) -> u32 {
        match self {
            Self::Ten => 1,
            Self::Twenty => 2,
            Self::Hundred => 10,
            Self::Thousand => 100,
        }
    }

    /// Smallest range containing `value`.
    pub fn band_for(value: u32) -> Self {
        match value {
            0..=10 => Self::Ten,
            11..=20 => Self::Twenty,
            21..=100 => Self::Hundred,
            _ => Self::Thousand,
        }
    }
}

impl TryFrom<u32> for NumberRange {
    type Error = String;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            10 => Ok(Self::Ten),
            20 => Ok(Self::Twenty),
            100 => Ok(Self::Hundred),
            1000 => Ok(Self::Thousand),
            other => Err(format!("unsupported number range {other}")),
        }
    }
}

impl From<NumberRange> for u32 {
    fn from(range: NumberRange) -> Self {
        range.limit()
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum PlaceholderPosition {
    FirstOperand,
    SecondOperand,
    #[default]
    Result,
}

impl PlaceholderPosition {
    pub fn key(&self) -> &'static str {
        match self {
            Self::FirstOperand => "first",
            Self::SecondOperand => "second",
            Self::Result => "result",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Representation {
    NumberLine,
    TenFrame,
    TwentyField,
    HundredField,
    DotField,
    Fingers,
    Blocks,
    Symbolic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepAction {
    Count,
    Place,
    Remove,
    #[serde(alias = "decompose")]
    Split,
    Combine,
    Jump,
    Input,
}

impl StepAction {
    /// Single-unit manipulations that indicate counting.
    pub fn is_elemental_count(&self) -> bool {
        matches!(self, Self::Count | Self::Place | Self::Remove)
    }

    pub fn is_structural(&self) -> bool {
        matches!(self, Self::Split | Self::Combine)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SolutionStep {
    /// Milliseconds since the task was shown.
    pub at_ms: u64,
    pub representation: Representation,
    pub action: StepAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyLabel {
    CountingAll,
    CountingOn,
    Doubles,
    NearDoubles,
    Decomposition,
    MakeTen,
    PlaceValue,
    Derivation,
    Retrieval,
    Automatized,
}

impl StrategyLabel {
    pub const ALL: [StrategyLabel; 10] = [
        Self::CountingAll,
        Self::CountingOn,
        Self::Doubles,
        Self::NearDoubles,
        Self::Decomposition,
        Self::MakeTen,
        Self::PlaceValue,
        Self::Derivation,
        Self::Retrieval,
        Self::Automatized,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CountingAll => "counting_all",
            Self::CountingOn => "counting_on",
            Self::Doubles => "doubles",
            Self::NearDoubles => "near_doubles",
            Self::Decomposition => "decomposition",
            Self::MakeTen => "make_ten",
            Self::PlaceValue => "place_value",
            Self::Derivation => "derivation",
            Self::Retrieval => "retrieval",
            Self::Automatized => "automatized",
        }
    }
}

impl fmt::Display for StrategyLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether `a op b` crosses a multiple of ten without landing on it.
pub fn crosses_decade(operator: Operator, a: u32, b: u32) -> bool {
    match operator {
        Operator::Add => a % 10 + b % 10 > 10,
        Operator::Subtract => a >= b && a % 10 != 0 && a % 10 < b % 10,
    }
}

/// Whether `a op b` lands exactly on a non-zero multiple of ten.
pub fn lands_on_round(operator: Operator, a: u32, b: u32) -> bool {
    operator
        .apply(a, b)
        .map(|r| r > 0 && r % 10 == 0)
        .unwrap_or(false)
}

pub fn digit_count(n: u32) -> u32 {
    if n == 0 {
        1
    } else {
        n.ilog10() + 1
    }
}

pub fn task_signature(
    operator: Operator,
    op1: u32,
    op2: u32,
    result: u32,
    placeholder: PlaceholderPosition,
) -> String {
    match placeholder {
        PlaceholderPosition::FirstOperand => format!("_{operator}{op2}={result}"),
        PlaceholderPosition::SecondOperand => format!("{op1}{operator}_={result}"),
        PlaceholderPosition::Result => format!("{op1}{operator}{op2}=_"),
    }
}

/// Untrusted attempt as delivered by the request layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptSubmission {
    pub operator: Operator,
    pub op1: i64,
    pub op2: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claimed_result: Option<i64>,
    #[serde(default)]
    pub answer: Option<i64>,
    pub elapsed_ms: u64,
    #[serde(default)]
    pub steps: Vec<SolutionStep>,
    pub number_range: NumberRange,
    #[serde(default)]
    pub placeholder: PlaceholderPosition,
    pub level: i64,
    pub completed_at: DateTime<Utc>,
}

/// A verified attempt. The result and correctness flag are computed here,
/// never taken from the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskAttempt {
    pub id: Uuid,
    pub operator: Operator,
    pub op1: u32,
    pub op2: u32,
    pub result: u32,
    pub answer: Option<i64>,
    pub is_correct: bool,
    pub elapsed_ms: u64,
    pub steps: Vec<SolutionStep>,
    pub number_range: NumberRange,
    pub placeholder: PlaceholderPosition,
    pub level: u32,
    pub completed_at: DateTime<Utc>,
}

impl TaskAttempt {
    pub fn from_submission(
        submission: AttemptSubmission,
        max_levels: u32,
    ) -> Result<Self, EngineError> {
        let op1 = checked_operand(submission.op1)?;
        let op2 = checked_operand(submission.op2)?;

        let result = match submission.operator.apply(op1, op2) {
            Some(result) => result,
            None if submission.operator == Operator::Subtract => {
                return Err(EngineError::NegativeResult {
                    op1: submission.op1,
                    op2: submission.op2,
                })
            }
            None => {
                return Err(EngineError::Validation(format!(
                    "{op1} + {op2} overflows"
                )))
            }
        };

        if let Some(claimed) = submission.claimed_result {
            if claimed != result as i64 {
                return Err(EngineError::ArithmeticMismatch {
                    operator: submission.operator,
                    op1,
                    op2,
                    expected: result,
                    claimed,
                });
            }
        }

        let max_levels = max_levels.max(1);
        let level = if submission.level < 1 || submission.level > max_levels as i64 {
            let clamped = submission.level.clamp(1, max_levels as i64) as u32;
            tracing::warn!(
                level = submission.level,
                clamped,
                "attempt level out of range, clamping"
            );
            clamped
        } else {
            submission.level as u32
        };

        let expected = match submission.placeholder {
            PlaceholderPosition::FirstOperand => op1,
            PlaceholderPosition::SecondOperand => op2,
            PlaceholderPosition::Result => result,
        };
        let is_correct = submission.answer == Some(expected as i64);

        Ok(Self {
            id: Uuid::new_v4(),
            operator: submission.operator,
            op1,
            op2,
            result,
            answer: submission.answer,
            is_correct,
            elapsed_ms: submission.elapsed_ms,
            steps: submission.steps,
            number_range: submission.number_range,
            placeholder: submission.placeholder,
            level,
            completed_at: submission.completed_at,
        })
    }

    /// The value the learner had to fill in.
    pub fn expected_answer(&self) -> u32 {
        match self.placeholder {
            PlaceholderPosition::FirstOperand => self.op1,
            PlaceholderPosition::SecondOperand => self.op2,
            PlaceholderPosition::Result => self.result,
        }
    }

    pub fn signature(&self) -> String {
        task_signature(
            self.operator,
            self.op1,
            self.op2,
            self.result,
            self.placeholder,
        )
    }

    pub fn crosses_decade(&self) -> bool {
        crosses_decade(self.operator, self.op1, self.op2)
    }

    pub fn lands_on_round(&self) -> bool {
        lands_on_round(self.operator, self.op1, self.op2)
    }

    pub fn magnitude_band(&self) -> NumberRange {
        NumberRange::band_for(self.op1.max(self.op2).max(self.result))
    }
}

fn checked_operand(value: i64) -> Result<u32, EngineError> {
    if value < 0 {
        return Err(EngineError::NegativeOperand { operand: value });
    }
    u32::try_from(value)
        .map_err(|_| EngineError::Validation(format!("operand {value} is too large")))
}

/// A generated task; operands and result are non-negative by construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub operator: Operator,
    pub op1: u32,
    pub op2: u32,
    pub result: u32,
    pub placeholder: PlaceholderPosition,
}

impl Task {
    pub fn new(operator: Operator, op1: u32, op2: u32) -> Option<Self> {
        operator.apply(op1, op2).map(|result| Self {
            operator,
            op1,
            op2,
            result,
            placeholder: PlaceholderPosition::Result,
        })
    }

    pub fn signature(&self) -> String {
        task_signature(
            self.operator,
            self.op1,
            self.op2,
            self.result,
            self.placeholder,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn submission(operator: Operator, op1: i64, op2: i64, answer: Option<i64>) -> AttemptSubmission {
        AttemptSubmission {
            operator,
            op1,
            op2,
            claimed_result: None,
            answer,
            elapsed_ms: 4000,
            steps: vec![],
            number_range: NumberRange::Twenty,
            placeholder: PlaceholderPosition::Result,
            level: 3,
            completed_at: Utc::now(),
        }
    }

    #[test]
    fn correctness_is_recomputed() {
        let attempt =
            TaskAttempt::from_submission(submission(Operator::Add, 7, 8, Some(15)), 100).unwrap();
        assert!(attempt.is_correct);
        assert_eq!(attempt.result, 15);

        let attempt =
            TaskAttempt::from_submission(submission(Operator::Add, 7, 8, Some(14)), 100).unwrap();
        assert!(!attempt.is_correct);
    }

    #[test]
    fn negative_operands_and_results_are_rejected() {
        let err = TaskAttempt::from_submission(submission(Operator::Add, -1, 8, None), 100)
            .unwrap_err();
        assert!(matches!(err, EngineError::NegativeOperand { operand: -1 }));

        let err = TaskAttempt::from_submission(submission(Operator::Subtract, 3, 8, None), 100)
            .unwrap_err();
        assert!(matches!(err, EngineError::NegativeResult { .. }));
    }

    #[test]
    fn claimed_result_must_match() {
        let mut sub = submission(Operator::Subtract, 13, 5, Some(8));
        sub.claimed_result = Some(9);
        let err = TaskAttempt::from_submission(sub, 100).unwrap_err();
        assert!(matches!(err, EngineError::ArithmeticMismatch { expected: 8, claimed: 9, .. }));
        assert!(err.is_malformed_input());
    }

    #[test]
    fn level_is_clamped() {
        let mut sub = submission(Operator::Add, 2, 2, Some(4));
        sub.level = 250;
        assert_eq!(TaskAttempt::from_submission(sub.clone(), 100).unwrap().level, 100);
        sub.level = -4;
        assert_eq!(TaskAttempt::from_submission(sub, 100).unwrap().level, 1);
    }

    #[test]
    fn placeholder_answers() {
        let mut sub = submission(Operator::Add, 6, 9, Some(9));
        sub.placeholder = PlaceholderPosition::SecondOperand;
        let attempt = TaskAttempt::from_submission(sub, 100).unwrap();
        assert!(attempt.is_correct);
        assert_eq!(attempt.signature(), "6+_=15");
    }

    #[test]
    fn decade_structure() {
        assert!(crosses_decade(Operator::Add, 8, 5));
        assert!(!crosses_decade(Operator::Add, 8, 2));
        assert!(lands_on_round(Operator::Add, 8, 2));
        assert!(crosses_decade(Operator::Subtract, 13, 5));
        assert!(!crosses_decade(Operator::Subtract, 20, 5));
        assert!(!crosses_decade(Operator::Subtract, 17, 5));
        assert_eq!(digit_count(0), 1);
        assert_eq!(digit_count(47), 2);
    }

    #[test]
    fn number_range_serde() {
        let range: NumberRange = serde_json::from_str("100").unwrap();
        assert_eq!(range, NumberRange::Hundred);
        assert!(serde_json::from_str::<NumberRange>("30").is_err());
        assert_eq!(serde_json::to_string(&NumberRange::Twenty).unwrap(), "20");
    }
}
