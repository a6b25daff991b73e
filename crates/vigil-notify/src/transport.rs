use async_trait::async_trait;
use thiserror::Error;

use vigil_core::HitNotification;

#[derive(Debug, Error)]
pub enum TransportError {
    /// The peer is gone; nothing further will be deliverable.
    #[error("notification transport closed")]
    Closed,
    #[error("send failed: {0}")]
    Send(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Outbound push channel to whatever protocol layer the server speaks.
///
/// Implementations must tolerate calls from multiple tasks. Sends are
/// awaited on spawned tasks, never on the hit-handling thread, so an
/// implementation is free to do real I/O here.
#[async_trait]
pub trait NotificationTransport: Send + Sync {
    /// Deliver one breakpoint/tracepoint/exception hit payload.
    async fn send_hit(&self, notification: &HitNotification) -> Result<(), TransportError>;

    /// Deliver a "this resource changed" push for one subscribed key.
    async fn send_resource_updated(&self, uri: &str) -> Result<(), TransportError>;

    /// Deliver a "the resource list changed" push.
    async fn send_resource_list_changed(&self) -> Result<(), TransportError>;
}
