//! Vigil breakpoint engine.
//!
//! The [`BreakpointManager`] decides, for every pause event the external
//! debugger delivers, whether execution actually stops, what gets recorded,
//! and what observers are told. Watch points live in the
//! [`BreakpointRegistry`]; conditions and tracepoint log templates are
//! resolved against an opaque [`ExpressionEvaluator`] supplied per hit.
//!
//! The one policy worth calling out: conditions fail open. A condition the
//! debugger cannot evaluate counts as satisfied, because an unnecessary
//! pause is recoverable and a silently skipped break is not.

mod condition;
mod error;
mod log_message;
mod manager;
mod mock;
mod registry;

pub use condition::{
    evaluate_condition, parse_comparison, validate_condition, CompareOp, Comparison,
    ConditionContext, ConditionParseError, ConditionResult, EvalError, EvalValue,
    ExpressionEvaluator, Literal,
};
pub use error::{BreakpointError, BreakpointResult};
pub use log_message::render_log_message;
pub use manager::{
    BindOutcome, BreakpointManager, ExceptionBreakpointSpec, ExceptionEvent, HitEvent,
    PauseDecision, TracepointSpec, WaitResult,
};
pub use mock::MockEvaluator;
pub use registry::BreakpointRegistry;
