use std::sync::Arc;

use tokio::runtime::Handle;

use vigil_core::HitNotification;

use crate::transport::NotificationTransport;

/// Fire-and-forget sender for hit notifications.
///
/// `dispatch` returns as soon as the send is spawned; the caller is the
/// hit-handling path and must not wait on transport I/O. Failures are
/// logged here and go no further.
#[derive(Clone)]
pub struct HitDispatcher {
    transport: Arc<dyn NotificationTransport>,
    handle: Handle,
}

impl HitDispatcher {
    /// `handle` is the runtime the sends run on. Taking it explicitly lets
    /// the dispatcher be driven from threads that are not themselves inside
    /// a runtime (the debugger's event-delivery thread).
    pub fn new(transport: Arc<dyn NotificationTransport>, handle: Handle) -> Self {
        Self { transport, handle }
    }

    pub fn dispatch(&self, notification: HitNotification) {
        let transport = Arc::clone(&self.transport);
        self.handle.spawn(async move {
            if let Err(err) = transport.send_hit(&notification).await {
                tracing::warn!(
                    target = "vigil.notify",
                    breakpoint_id = %notification.breakpoint_id,
                    error = %err,
                    "failed to deliver hit notification"
                );
            }
        });
    }
}
