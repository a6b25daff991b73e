//! Breakpoint orchestration.
//!
//! The manager owns the registry, assigns ids, applies the
//! condition/throttle/auto-disable policy on every hit, drives
//! fire-and-forget notifications, and runs the one-shot wait-for-hit
//! rendezvous. Hit handlers are called synchronously on the debugger's
//! event-delivery thread and never block on I/O.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use vigil_core::{
    now_millis, Breakpoint, BreakpointHit, BreakpointId, BreakpointKind, BreakpointLocation,
    BreakpointState, ExceptionBreakpoint, ExceptionInfo, HitKind, HitNotification,
};
use vigil_notify::{HitDispatcher, NotificationTransport};

use crate::condition::{
    evaluate_condition, validate_condition, ConditionContext, ExpressionEvaluator,
};
use crate::error::BreakpointResult;
use crate::log_message::render_log_message;
use crate::registry::BreakpointRegistry;

/// What the debugger should do with the thread that raised an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PauseDecision {
    Pause,
    Continue,
}

/// A location hit as delivered by the external debugger.
#[derive(Debug, Clone)]
pub struct HitEvent {
    pub breakpoint_id: BreakpointId,
    pub thread_id: u64,
}

/// A raised exception as delivered by the external debugger. Subtype
/// inclusion is resolved before the event arrives, so `exception_type`
/// compares exactly against the stored filters.
#[derive(Debug, Clone)]
pub struct ExceptionEvent {
    pub exception_type: String,
    pub message: Option<String>,
    pub first_chance: bool,
    pub thread_id: u64,
}

/// Parameters for a new tracepoint.
#[derive(Debug, Clone)]
pub struct TracepointSpec {
    pub location: BreakpointLocation,
    pub condition: Option<String>,
    pub log_message: Option<String>,
    /// Notify every Nth hit; 0 notifies on every hit.
    pub hit_count_multiple: u64,
    /// Notification budget; 0 means unlimited.
    pub max_notifications: u64,
}

impl TracepointSpec {
    pub fn new(location: BreakpointLocation) -> Self {
        Self {
            location,
            condition: None,
            log_message: None,
            hit_count_multiple: 0,
            max_notifications: 0,
        }
    }
}

/// Parameters for a new exception breakpoint. Defaults break on second
/// chance only.
#[derive(Debug, Clone)]
pub struct ExceptionBreakpointSpec {
    pub exception_type: String,
    pub break_on_first_chance: bool,
    pub break_on_second_chance: bool,
    pub include_subtypes: bool,
}

impl ExceptionBreakpointSpec {
    pub fn new(exception_type: impl Into<String>) -> Self {
        Self {
            exception_type: exception_type.into(),
            break_on_first_chance: false,
            break_on_second_chance: true,
            include_subtypes: false,
        }
    }
}

/// Result reported by the external attachment layer for one breakpoint.
#[derive(Debug, Clone)]
pub enum BindOutcome {
    Bound,
    Verified,
    Failed(String),
}

/// How a [`BreakpointManager::wait_for_breakpoint`] call ended.
/// `Cancelled` covers both token cancellation and a newer wait taking
/// over the slot; `TimedOut` is distinct.
#[derive(Debug)]
pub enum WaitResult {
    Hit(BreakpointHit),
    TimedOut,
    Cancelled,
}

struct WaitSlot {
    seq: u64,
    tx: oneshot::Sender<BreakpointHit>,
}

pub struct BreakpointManager {
    registry: Arc<BreakpointRegistry>,
    dispatcher: HitDispatcher,
    next_id: AtomicU64,
    wait_seq: AtomicU64,
    wait_slot: Mutex<Option<WaitSlot>>,
}

impl BreakpointManager {
    /// `handle` is where fire-and-forget sends are spawned, so the hit
    /// handlers may be called from threads outside the runtime.
    pub fn new(transport: Arc<dyn NotificationTransport>, handle: Handle) -> Self {
        Self {
            registry: Arc::new(BreakpointRegistry::new()),
            dispatcher: HitDispatcher::new(transport, handle),
            next_id: AtomicU64::new(1),
            wait_seq: AtomicU64::new(0),
            wait_slot: Mutex::new(None),
        }
    }

    /// Shared registry, for read access and change subscriptions from the
    /// outer protocol layer.
    pub fn registry(&self) -> &Arc<BreakpointRegistry> {
        &self.registry
    }

    fn next_number(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Creates a blocking breakpoint at `location`. The condition, if
    /// any, is syntax-checked here so a malformed one is rejected at
    /// set-time rather than at hit-time.
    pub fn set_breakpoint(
        &self,
        location: BreakpointLocation,
        condition: Option<&str>,
    ) -> BreakpointResult<Breakpoint> {
        if let Some(condition) = condition {
            validate_condition(condition)?;
        }
        let breakpoint = Breakpoint {
            id: BreakpointId::blocking(self.next_number()),
            location,
            state: BreakpointState::Pending,
            enabled: true,
            verified: false,
            hit_count: 0,
            condition: condition.map(str::to_owned),
            kind: BreakpointKind::Blocking,
            log_message: None,
            hit_count_multiple: 0,
            max_notifications: 0,
            notifications_sent: 0,
            message: None,
        };
        self.registry.add(breakpoint.clone());
        tracing::debug!(
            target = "vigil.debug",
            breakpoint_id = %breakpoint.id,
            file = %breakpoint.location.file,
            line = breakpoint.location.line,
            "breakpoint created"
        );
        Ok(breakpoint)
    }

    pub fn set_tracepoint(&self, spec: TracepointSpec) -> BreakpointResult<Breakpoint> {
        if let Some(condition) = spec.condition.as_deref() {
            validate_condition(condition)?;
        }
        let breakpoint = Breakpoint {
            id: BreakpointId::tracepoint(self.next_number()),
            location: spec.location,
            state: BreakpointState::Pending,
            enabled: true,
            verified: false,
            hit_count: 0,
            condition: spec.condition,
            kind: BreakpointKind::Tracepoint,
            log_message: spec.log_message,
            hit_count_multiple: spec.hit_count_multiple,
            max_notifications: spec.max_notifications,
            notifications_sent: 0,
            message: None,
        };
        self.registry.add(breakpoint.clone());
        tracing::debug!(
            target = "vigil.debug",
            breakpoint_id = %breakpoint.id,
            file = %breakpoint.location.file,
            line = breakpoint.location.line,
            "tracepoint created"
        );
        Ok(breakpoint)
    }

    /// Exception filters carry no condition, so creation is infallible.
    /// They need no binding either; they are born verified.
    pub fn set_exception_breakpoint(&self, spec: ExceptionBreakpointSpec) -> ExceptionBreakpoint {
        let breakpoint = ExceptionBreakpoint {
            id: BreakpointId::exception(self.next_number()),
            exception_type: spec.exception_type,
            break_on_first_chance: spec.break_on_first_chance,
            break_on_second_chance: spec.break_on_second_chance,
            include_subtypes: spec.include_subtypes,
            enabled: true,
            verified: true,
            hit_count: 0,
        };
        self.registry.add_exception(breakpoint.clone());
        tracing::debug!(
            target = "vigil.debug",
            breakpoint_id = %breakpoint.id,
            exception_type = %breakpoint.exception_type,
            "exception breakpoint created"
        );
        breakpoint
    }

    /// Removes by id; `ex-` ids address the exception store. Returns
    /// false when the id is unknown.
    pub fn remove_breakpoint(&self, id: &BreakpointId) -> bool {
        let removed = if id.is_exception() {
            self.registry.remove_exception(id).is_some()
        } else {
            self.registry.remove(id).is_some()
        };
        if removed {
            tracing::debug!(target = "vigil.debug", breakpoint_id = %id, "breakpoint removed");
        }
        removed
    }

    /// Enables or disables by id. Re-enabling a tracepoint does not reset
    /// its hit count or notification budget.
    pub fn set_breakpoint_enabled(&self, id: &BreakpointId, enabled: bool) -> bool {
        if id.is_exception() {
            return self
                .registry
                .update_exception_with(id, |current| {
                    let mut next = current.clone();
                    next.enabled = enabled;
                    Some(next)
                })
                .is_some();
        }
        self.registry
            .update_with(id, |current| {
                let mut next = current.clone();
                next.enabled = enabled;
                Some(next)
            })
            .is_some()
    }

    /// Records the attachment layer's binding outcome for a breakpoint.
    /// Exception ids have nothing to bind and report not-found.
    pub fn update_binding(&self, id: &BreakpointId, outcome: BindOutcome) -> bool {
        if id.is_exception() {
            return false;
        }
        self.registry
            .update_with(id, |current| {
                let mut next = current.clone();
                match &outcome {
                    BindOutcome::Bound => next.state = BreakpointState::Bound,
                    BindOutcome::Verified => {
                        next.state = BreakpointState::Verified;
                        next.verified = true;
                    }
                    BindOutcome::Failed(reason) => {
                        next.state = BreakpointState::Pending;
                        next.verified = false;
                        next.message = Some(reason.clone());
                    }
                }
                Some(next)
            })
            .is_some()
    }

    pub fn breakpoints(&self) -> Vec<Breakpoint> {
        self.registry.all()
    }

    pub fn exception_breakpoints(&self) -> Vec<ExceptionBreakpoint> {
        self.registry.all_exceptions()
    }

    /// Drops every watch point, e.g. on client disconnect. A pending wait
    /// is left to its timeout; no hit can arrive for a cleared breakpoint.
    pub fn clear(&self) {
        self.registry.clear();
        tracing::debug!(target = "vigil.debug", "all breakpoints cleared");
    }

    /// Decides what to do about a blocking/tracepoint hit.
    ///
    /// The hit ordinal is reserved first: one registry update covers the
    /// enabled check and the increment, so back-to-back hits on separate
    /// threads each see a distinct ordinal. The condition then gates on
    /// that ordinal; a non-satisfied condition keeps the increment but
    /// produces no notification. Tracepoints never pause.
    pub fn on_breakpoint_hit(
        &self,
        event: &HitEvent,
        evaluator: Option<&dyn ExpressionEvaluator>,
    ) -> PauseDecision {
        let Some(breakpoint) = self.registry.update_with(&event.breakpoint_id, |current| {
            if !current.enabled {
                return None;
            }
            let mut next = current.clone();
            next.hit_count += 1;
            Some(next)
        }) else {
            return PauseDecision::Continue;
        };

        if let Some(condition) = breakpoint.condition.as_deref() {
            let ctx = ConditionContext {
                hit_count: breakpoint.hit_count,
                evaluator,
            };
            if !evaluate_condition(condition, &ctx).is_satisfied() {
                return PauseDecision::Continue;
            }
        }

        match breakpoint.kind {
            BreakpointKind::Blocking => {
                let hit = BreakpointHit {
                    breakpoint_id: breakpoint.id.clone(),
                    thread_id: event.thread_id,
                    timestamp_ms: now_millis(),
                    location: breakpoint.location.clone(),
                    hit_count: breakpoint.hit_count,
                    exception: None,
                };
                self.resolve_wait(&hit);
                self.dispatcher.dispatch(HitNotification {
                    breakpoint_id: breakpoint.id,
                    kind: HitKind::Blocking,
                    location: Some(breakpoint.location),
                    thread_id: event.thread_id,
                    timestamp_ms: hit.timestamp_ms,
                    hit_count: hit.hit_count,
                    log_message: None,
                    exception: None,
                });
                PauseDecision::Pause
            }
            BreakpointKind::Tracepoint => {
                self.handle_tracepoint_hit(breakpoint, event, evaluator);
                PauseDecision::Continue
            }
        }
    }

    /// `breakpoint` is the record as of this hit's reservation; its
    /// `hit_count` is the ordinal the frequency filter and the rendered
    /// message see, even if later hits have already landed in the
    /// registry.
    fn handle_tracepoint_hit(
        &self,
        breakpoint: Breakpoint,
        event: &HitEvent,
        evaluator: Option<&dyn ExpressionEvaluator>,
    ) {
        if breakpoint.hit_count_multiple != 0
            && breakpoint.hit_count % breakpoint.hit_count_multiple != 0
        {
            return;
        }

        // Claim a notification slot: the budget check, the increment, and
        // the auto-disable are one registry update. A hit that finds the
        // budget already spent re-asserts the disable and sends nothing.
        let mut claimed = false;
        let updated = self.registry.update_with(&breakpoint.id, |current| {
            if !current.enabled {
                return None;
            }
            let mut next = current.clone();
            if next.max_notifications > 0 && next.notifications_sent >= next.max_notifications {
                next.enabled = false;
                return Some(next);
            }
            next.notifications_sent += 1;
            if next.max_notifications > 0 && next.notifications_sent >= next.max_notifications {
                next.enabled = false;
            }
            claimed = true;
            Some(next)
        });
        let Some(updated) = updated else {
            return;
        };
        if !claimed {
            return;
        }
        if !updated.enabled {
            tracing::debug!(
                target = "vigil.debug",
                breakpoint_id = %updated.id,
                notifications_sent = updated.notifications_sent,
                "tracepoint reached its notification budget, disabling"
            );
        }

        let log_message = updated.log_message.as_deref().map(|template| {
            let ctx = ConditionContext {
                hit_count: breakpoint.hit_count,
                evaluator,
            };
            render_log_message(template, &ctx)
        });

        self.dispatcher.dispatch(HitNotification {
            breakpoint_id: updated.id,
            kind: HitKind::Tracepoint,
            location: Some(updated.location),
            thread_id: event.thread_id,
            timestamp_ms: now_millis(),
            hit_count: breakpoint.hit_count,
            log_message,
            exception: None,
        });
    }

    /// Decides what to do about a raised exception: pause when an enabled
    /// filter matches the exact type with the chance flag for this event,
    /// continue otherwise.
    pub fn on_exception_hit(&self, event: &ExceptionEvent) -> PauseDecision {
        let matched = self.registry.all_exceptions().into_iter().find(|filter| {
            filter.enabled
                && filter.exception_type == event.exception_type
                && if event.first_chance {
                    filter.break_on_first_chance
                } else {
                    filter.break_on_second_chance
                }
        });
        let Some(matched) = matched else {
            return PauseDecision::Continue;
        };

        // The filter may have been disabled or removed since the snapshot.
        let Some(updated) = self.registry.update_exception_with(&matched.id, |current| {
            if !current.enabled {
                return None;
            }
            let mut next = current.clone();
            next.hit_count += 1;
            Some(next)
        }) else {
            return PauseDecision::Continue;
        };

        self.dispatcher.dispatch(HitNotification {
            breakpoint_id: updated.id,
            kind: HitKind::Exception,
            location: None,
            thread_id: event.thread_id,
            timestamp_ms: now_millis(),
            hit_count: updated.hit_count,
            log_message: None,
            exception: Some(ExceptionInfo {
                exception_type: event.exception_type.clone(),
                message: event.message.clone(),
                first_chance: event.first_chance,
            }),
        });
        PauseDecision::Pause
    }

    /// Suspends until the next blocking-breakpoint hit, the timeout, or
    /// cancellation. Single-slot: a newer wait supersedes the previous
    /// one, which completes as `Cancelled`. Tracepoint and exception hits
    /// never resolve the wait.
    pub async fn wait_for_breakpoint(
        &self,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> WaitResult {
        let (tx, rx) = oneshot::channel();
        let seq = self.wait_seq.fetch_add(1, Ordering::Relaxed) + 1;
        // Dropping a superseded sender errors that waiter's receiver.
        *self.wait_slot.lock() = Some(WaitSlot { seq, tx });

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => WaitResult::Cancelled,
            outcome = rx => match outcome {
                Ok(hit) => WaitResult::Hit(hit),
                Err(_) => WaitResult::Cancelled,
            },
            _ = tokio::time::sleep(timeout) => WaitResult::TimedOut,
        };

        if !matches!(result, WaitResult::Hit(_)) {
            // Clear only our own registration; a newer wait keeps its
            // slot.
            let mut slot = self.wait_slot.lock();
            if slot.as_ref().is_some_and(|s| s.seq == seq) {
                *slot = None;
            }
        }
        result
    }

    fn resolve_wait(&self, hit: &BreakpointHit) {
        let slot = self.wait_slot.lock().take();
        if let Some(slot) = slot {
            tracing::debug!(
                target = "vigil.debug",
                breakpoint_id = %hit.breakpoint_id,
                "resolving pending wait"
            );
            // The waiter may have timed out already; a dead receiver is
            // fine.
            let _ = slot.tx.send(hit.clone());
        }
    }
}
