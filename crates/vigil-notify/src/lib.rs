//! Notification dispatch for Vigil.
//!
//! Two pieces: [`HitDispatcher`] pushes breakpoint/exception hit payloads
//! fire-and-forget, and [`ResourceNotifier`] coalesces "resource changed"
//! pushes with a trailing-edge debounce. Both stay off the hit-handling
//! thread: every send runs on a captured runtime handle, and delivery
//! failures are logged at the dispatch boundary, never propagated.

mod dispatch;
mod mock;
mod resource;
mod transport;

pub use dispatch::HitDispatcher;
pub use mock::RecordingTransport;
pub use resource::{ResourceNotifier, ResourceNotifierConfig, DEFAULT_DEBOUNCE_WINDOW};
pub use transport::{NotificationTransport, TransportError};
