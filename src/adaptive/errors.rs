use serde::{Deserialize, Serialize};

use crate::adaptive::types::{PlaceholderPosition, TaskAttempt};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorType {
    NoAnswer,
    OffByOne,
    OperationConfusion,
    DigitReversal,
    PlaceValue,
    DecadeTransition,
    Other,
}

impl ErrorType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoAnswer => "no_answer",
            Self::OffByOne => "off_by_one",
            Self::OperationConfusion => "operation_confusion",
            Self::DigitReversal => "digit_reversal",
            Self::PlaceValue => "place_value",
            Self::DecadeTransition => "decade_transition",
            Self::Other => "other",
        }
    }
}

/// Classifies a wrong answer. Returns `None` for correct attempts.
pub fn classify_error(attempt: &TaskAttempt) -> Option<ErrorType> {
    if attempt.is_correct {
        return None;
    }
    let Some(answer) = attempt.answer else {
        return Some(ErrorType::NoAnswer);
    };

    let expected = attempt.expected_answer() as i64;
    let diff = answer.abs_diff(expected);

    if diff == 1 {
        return Some(ErrorType::OffByOne);
    }

    if attempt.placeholder == PlaceholderPosition::Result {
        let swapped = attempt
            .operator
            .inverse()
            .apply(attempt.op1, attempt.op2)
            .map(|v| v as i64);
        if swapped == Some(answer) {
            return Some(ErrorType::OperationConfusion);
        }
    }

    if expected >= 10 && answer >= 10 && reversed_digits(expected) == Some(answer) {
        return Some(ErrorType::DigitReversal);
    }

    if diff % 10 == 0 {
        return Some(ErrorType::PlaceValue);
    }

    if attempt.crosses_decade() {
        return Some(ErrorType::DecadeTransition);
    }

    Some(ErrorType::Other)
}

fn reversed_digits(value: i64) -> Option<i64> {
    if value < 0 {
        return None;
    }
    let reversed: String = value.to_string().chars().rev().collect();
    let parsed = reversed.parse::<i64>().ok()?;
    (parsed != value).then_some(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adaptive::types::{NumberRange, Operator};
    use chrono::Utc;
    use uuid::Uuid;

    fn attempt(operator: Operator, op1: u32, op2: u32, answer: Option<i64>) -> TaskAttempt {
        let result = operator.apply(op1, op2).unwrap();
        TaskAttempt {
            id: Uuid::new_v4(),
            operator,
            op1,
            op2,
            result,
            answer,
            is_correct: answer == Some(result as i64),
            elapsed_ms: 4000,
            steps: vec![],
            number_range: NumberRange::Hundred,
            placeholder: PlaceholderPosition::Result,
            level: 1,
            completed_at: Utc::now(),
        }
    }

    #[test]
    fn classifies_common_slips() {
        assert_eq!(classify_error(&attempt(Operator::Add, 7, 8, Some(15))), None);
        assert_eq!(
            classify_error(&attempt(Operator::Add, 7, 8, Some(14))),
            Some(ErrorType::OffByOne)
        );
        assert_eq!(
            classify_error(&attempt(Operator::Add, 7, 8, None)),
            Some(ErrorType::NoAnswer)
        );
        assert_eq!(
            classify_error(&attempt(Operator::Subtract, 12, 5, Some(17))),
            Some(ErrorType::OperationConfusion)
        );
        assert_eq!(
            classify_error(&attempt(Operator::Add, 30, 4, Some(43))),
            Some(ErrorType::DigitReversal)
        );
        assert_eq!(
            classify_error(&attempt(Operator::Add, 38, 5, Some(53))),
            Some(ErrorType::PlaceValue)
        );
        assert_eq!(
            classify_error(&attempt(Operator::Add, 8, 5, Some(16))),
            Some(ErrorType::DecadeTransition)
        );
        assert_eq!(
            classify_error(&attempt(Operator::Add, 2, 3, Some(8))),
            Some(ErrorType::Other)
        );
    }

    #[test]
    fn extreme_answers_do_not_overflow() {
        assert_eq!(
            classify_error(&attempt(Operator::Add, 2, 3, Some(i64::MIN))),
            Some(ErrorType::Other)
        );
        assert_eq!(
            classify_error(&attempt(Operator::Add, 2, 3, Some(i64::MAX))),
            Some(ErrorType::Other)
        );
        assert_eq!(
            classify_error(&attempt(Operator::Add, 40, 0, Some(i64::MIN + 40))),
            Some(ErrorType::Other)
        );
        assert_eq!(reversed_digits(-21), None);
    }
}
