use crate::adaptive::types::Operator;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("validation error: {0}")]
    Validation(String),
    #[error("negative operand: {operand}")]
    NegativeOperand { operand: i64 },
    #[error("negative result: {op1} - {op2}")]
    NegativeResult { op1: i64, op2: i64 },
    #[error("arithmetic mismatch: {op1} {operator} {op2} = {expected}, caller claimed {claimed}")]
    ArithmeticMismatch {
        operator: Operator,
        op1: u32,
        op2: u32,
        expected: u32,
        claimed: i64,
    },
    #[error("level {level} is locked (current level {current})")]
    LevelLocked { level: u32, current: u32 },
    #[error("invariant violated: {0}")]
    Invariant(String),
    #[error("config error: {0}")]
    Config(String),
    #[error("stale learner record {learner_id}: expected version {expected}, found {actual}")]
    Conflict {
        learner_id: String,
        expected: u64,
        actual: u64,
    },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl EngineError {
    pub fn is_malformed_input(&self) -> bool {
        matches!(
            self,
            Self::Validation(_)
                | Self::NegativeOperand { .. }
                | Self::NegativeResult { .. }
                | Self::ArithmeticMismatch { .. }
                | Self::LevelLocked { .. }
        )
    }
}
