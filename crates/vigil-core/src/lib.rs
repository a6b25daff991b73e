//! Core shared types for Vigil.
//!
//! Everything in this crate is a plain value type. Breakpoint records are
//! cloned out of the registry and replaced wholesale, never mutated in
//! place; hit values are produced per event and never stored.

mod breakpoint;
mod hit;

pub use breakpoint::{
    Breakpoint, BreakpointId, BreakpointKind, BreakpointLocation, BreakpointState,
    ExceptionBreakpoint,
};
pub use hit::{now_millis, BreakpointHit, ExceptionInfo, HitKind, HitNotification};
