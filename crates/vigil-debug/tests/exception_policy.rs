//! Exception-filter matching: exact type, chance flags, and the pause
//! decision.

use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use vigil_core::HitKind;
use vigil_debug::{
    BreakpointManager, ExceptionBreakpointSpec, ExceptionEvent, PauseDecision, WaitResult,
};
use vigil_notify::RecordingTransport;

fn manager(transport: &Arc<RecordingTransport>) -> BreakpointManager {
    BreakpointManager::new(transport.clone(), Handle::current())
}

fn raised(exception_type: &str, first_chance: bool) -> ExceptionEvent {
    ExceptionEvent {
        exception_type: exception_type.to_owned(),
        message: Some("boom".to_owned()),
        first_chance,
        thread_id: 3,
    }
}

async fn wait_for_hits(transport: &RecordingTransport, expected: usize) {
    for _ in 0..50 {
        if transport.hit_count() >= expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!(
        "expected {expected} notifications, saw {}",
        transport.hit_count()
    );
}

#[tokio::test]
async fn matching_type_and_chance_pauses_and_notifies() {
    let transport = RecordingTransport::new();
    let manager = manager(&transport);
    let filter =
        manager.set_exception_breakpoint(ExceptionBreakpointSpec::new("System.IO.IOException"));

    // Defaults break on second chance.
    let decision = manager.on_exception_hit(&raised("System.IO.IOException", false));
    assert_eq!(decision, PauseDecision::Pause);

    wait_for_hits(&transport, 1).await;
    let sent = transport.hits().remove(0);
    assert_eq!(sent.breakpoint_id, filter.id);
    assert_eq!(sent.kind, HitKind::Exception);
    assert!(sent.location.is_none());
    let detail = sent.exception.unwrap();
    assert_eq!(detail.exception_type, "System.IO.IOException");
    assert_eq!(detail.message.as_deref(), Some("boom"));
    assert!(!detail.first_chance);

    let stored = manager
        .exception_breakpoints()
        .into_iter()
        .find(|f| f.id == filter.id)
        .unwrap();
    assert_eq!(stored.hit_count, 1);
}

#[tokio::test]
async fn type_mismatch_never_matches() {
    let transport = RecordingTransport::new();
    let manager = manager(&transport);
    let filter =
        manager.set_exception_breakpoint(ExceptionBreakpointSpec::new("System.IO.IOException"));

    let decision = manager.on_exception_hit(&raised("System.InvalidOperationException", false));
    assert_eq!(decision, PauseDecision::Continue);

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(transport.hit_count(), 0);
    let stored = manager
        .exception_breakpoints()
        .into_iter()
        .find(|f| f.id == filter.id)
        .unwrap();
    assert_eq!(stored.hit_count, 0);
}

#[tokio::test]
async fn chance_flags_gate_matching() {
    let transport = RecordingTransport::new();
    let manager = manager(&transport);

    // Default filter ignores first-chance throws.
    manager.set_exception_breakpoint(ExceptionBreakpointSpec::new("java.lang.Error"));
    assert_eq!(
        manager.on_exception_hit(&raised("java.lang.Error", true)),
        PauseDecision::Continue
    );
    assert_eq!(
        manager.on_exception_hit(&raised("java.lang.Error", false)),
        PauseDecision::Pause
    );

    // First-chance-only filter, the other way around.
    let mut spec = ExceptionBreakpointSpec::new("java.io.IOException");
    spec.break_on_first_chance = true;
    spec.break_on_second_chance = false;
    manager.set_exception_breakpoint(spec);
    assert_eq!(
        manager.on_exception_hit(&raised("java.io.IOException", true)),
        PauseDecision::Pause
    );
    assert_eq!(
        manager.on_exception_hit(&raised("java.io.IOException", false)),
        PauseDecision::Continue
    );
}

#[tokio::test]
async fn disabled_filter_does_not_match() {
    let transport = RecordingTransport::new();
    let manager = manager(&transport);
    let filter =
        manager.set_exception_breakpoint(ExceptionBreakpointSpec::new("System.IO.IOException"));
    assert!(manager.set_breakpoint_enabled(&filter.id, false));

    assert_eq!(
        manager.on_exception_hit(&raised("System.IO.IOException", false)),
        PauseDecision::Continue
    );
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(transport.hit_count(), 0);
}

#[tokio::test]
async fn each_matching_event_increments_hit_count() {
    let transport = RecordingTransport::new();
    let manager = manager(&transport);
    let filter =
        manager.set_exception_breakpoint(ExceptionBreakpointSpec::new("System.IO.IOException"));

    manager.on_exception_hit(&raised("System.IO.IOException", false));
    manager.on_exception_hit(&raised("System.IO.IOException", false));

    wait_for_hits(&transport, 2).await;
    let stored = manager
        .exception_breakpoints()
        .into_iter()
        .find(|f| f.id == filter.id)
        .unwrap();
    assert_eq!(stored.hit_count, 2);
    assert_eq!(transport.hits()[1].hit_count, 2);
}

#[tokio::test]
async fn exception_hits_do_not_resolve_a_pending_wait() {
    let transport = RecordingTransport::new();
    let manager = Arc::new(manager(&transport));
    manager.set_exception_breakpoint(ExceptionBreakpointSpec::new("System.IO.IOException"));

    let waiter = {
        let manager = manager.clone();
        tokio::spawn(async move {
            let cancel = CancellationToken::new();
            manager
                .wait_for_breakpoint(Duration::from_millis(300), &cancel)
                .await
        })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(
        manager.on_exception_hit(&raised("System.IO.IOException", false)),
        PauseDecision::Pause
    );

    let result = waiter.await.unwrap();
    assert!(matches!(result, WaitResult::TimedOut), "{result:?}");
    wait_for_hits(&transport, 1).await;
}
