use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::breakpoint::{BreakpointId, BreakpointKind, BreakpointLocation};

/// Detail of a raised exception, attached to matching hit notifications.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExceptionInfo {
    pub exception_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub first_chance: bool,
}

/// Data of one breakpoint hit. Produced per event, handed to a pending
/// wait, never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BreakpointHit {
    pub breakpoint_id: BreakpointId,
    pub thread_id: u64,
    pub timestamp_ms: u64,
    pub location: BreakpointLocation,
    pub hit_count: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exception: Option<ExceptionInfo>,
}

/// What kind of watch point produced a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HitKind {
    Blocking,
    Tracepoint,
    Exception,
}

impl From<BreakpointKind> for HitKind {
    fn from(kind: BreakpointKind) -> Self {
        match kind {
            BreakpointKind::Blocking => HitKind::Blocking,
            BreakpointKind::Tracepoint => HitKind::Tracepoint,
        }
    }
}

/// Payload handed to the notification transport for every reported hit.
///
/// Exception hits are not location-bound, so `location` is optional;
/// `log_message` is the resolved tracepoint template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HitNotification {
    pub breakpoint_id: BreakpointId,
    pub kind: HitKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<BreakpointLocation>,
    pub thread_id: u64,
    pub timestamp_ms: u64,
    pub hit_count: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exception: Option<ExceptionInfo>,
}

/// Milliseconds since the Unix epoch, used to stamp hits.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notification_wire_shape() {
        let n = HitNotification {
            breakpoint_id: BreakpointId::tracepoint(3),
            kind: HitKind::Tracepoint,
            location: Some(BreakpointLocation::new("app/Service.cs", 17)),
            thread_id: 4,
            timestamp_ms: 1_000,
            hit_count: 6,
            log_message: Some("count is 6".to_owned()),
            exception: None,
        };
        let value = serde_json::to_value(&n).unwrap();
        assert_eq!(value["breakpointId"], "tp-3");
        assert_eq!(value["kind"], "tracepoint");
        assert_eq!(value["threadId"], 4);
        assert_eq!(value["timestampMs"], 1_000);
        assert_eq!(value["logMessage"], "count is 6");
        assert!(value.get("exception").is_none());
    }

    #[test]
    fn exception_notification_has_no_location() {
        let n = HitNotification {
            breakpoint_id: BreakpointId::exception(2),
            kind: HitKind::Exception,
            location: None,
            thread_id: 1,
            timestamp_ms: 5,
            hit_count: 1,
            log_message: None,
            exception: Some(ExceptionInfo {
                exception_type: "System.InvalidOperationException".to_owned(),
                message: Some("boom".to_owned()),
                first_chance: true,
            }),
        };
        let value = serde_json::to_value(&n).unwrap();
        assert!(value.get("location").is_none());
        assert_eq!(value["kind"], "exception");
        assert_eq!(
            value["exception"]["exceptionType"],
            "System.InvalidOperationException"
        );
        assert_eq!(value["exception"]["firstChance"], true);
    }

    #[test]
    fn now_millis_is_monotonic_enough() {
        let a = now_millis();
        let b = now_millis();
        assert!(b >= a);
        assert!(a > 1_600_000_000_000, "clock looks pre-2020: {a}");
    }
}
