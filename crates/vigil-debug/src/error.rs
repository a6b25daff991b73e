use thiserror::Error;

use crate::condition::ConditionParseError;

pub type BreakpointResult<T> = Result<T, BreakpointError>;

#[derive(Error, Debug)]
pub enum BreakpointError {
    /// Condition text failed the set-time syntax check; nothing was
    /// stored.
    #[error("invalid condition: {0}")]
    InvalidCondition(#[from] ConditionParseError),
}
