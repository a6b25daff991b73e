use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of a watch point, assigned by the manager at creation.
///
/// The prefix encodes the kind: `bp-` for blocking breakpoints, `tp-` for
/// tracepoints, `ex-` for exception breakpoints. Numbers come from one
/// monotonic counter, so ids never collide across kinds.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BreakpointId(String);

impl BreakpointId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn blocking(n: u64) -> Self {
        Self(format!("bp-{n}"))
    }

    pub fn tracepoint(n: u64) -> Self {
        Self(format!("tp-{n}"))
    }

    pub fn exception(n: u64) -> Self {
        Self(format!("ex-{n}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True for ids that address the exception-breakpoint store.
    pub fn is_exception(&self) -> bool {
        self.0.starts_with("ex-")
    }
}

impl fmt::Display for BreakpointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BreakpointId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

/// Whether a hit suspends the debuggee or only reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BreakpointKind {
    Blocking,
    Tracepoint,
}

/// Binding progress of a breakpoint, advanced by the external attachment
/// layer via `update_binding`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BreakpointState {
    Pending,
    Bound,
    Verified,
}

/// A source position a breakpoint is anchored to. Compared by content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BreakpointLocation {
    pub file: String,
    pub line: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_line: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_column: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub function_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub module_name: Option<String>,
}

impl BreakpointLocation {
    pub fn new(file: impl Into<String>, line: u32) -> Self {
        Self {
            file: file.into(),
            line,
            column: None,
            end_line: None,
            end_column: None,
            function_name: None,
            module_name: None,
        }
    }
}

/// One blocking breakpoint or tracepoint.
///
/// Invariant: `notifications_sent <= max_notifications` whenever
/// `max_notifications > 0`; reaching the bound disables the tracepoint in
/// the same registry update that records the final notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Breakpoint {
    pub id: BreakpointId,
    pub location: BreakpointLocation,
    pub state: BreakpointState,
    pub enabled: bool,
    pub verified: bool,
    /// Hits observed while enabled. Monotonic; disabled hits do not count.
    pub hit_count: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
    pub kind: BreakpointKind,
    /// Tracepoints only: template rendered into each notification.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_message: Option<String>,
    /// Tracepoints only: notify every Nth hit. 0 means every hit.
    pub hit_count_multiple: u64,
    /// Tracepoints only: notification budget. 0 means unlimited.
    pub max_notifications: u64,
    pub notifications_sent: u64,
    /// Binding/verification note from the attachment layer.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// A filter matching raised exceptions by exact type name and chance
/// timing rather than by location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExceptionBreakpoint {
    pub id: BreakpointId,
    pub exception_type: String,
    pub break_on_first_chance: bool,
    pub break_on_second_chance: bool,
    /// Subtype matching is resolved by the external debugger before an
    /// event reaches the manager; the flag is carried for it.
    pub include_subtypes: bool,
    pub enabled: bool,
    pub verified: bool,
    pub hit_count: u64,
}
