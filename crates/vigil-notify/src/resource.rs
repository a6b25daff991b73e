use std::{
    collections::{HashMap, HashSet},
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;

use crate::transport::NotificationTransport;

/// Debounce window applied when the config does not override it.
pub const DEFAULT_DEBOUNCE_WINDOW: Duration = Duration::from_millis(300);

#[derive(Debug, Clone)]
pub struct ResourceNotifierConfig {
    /// Trailing-edge window: a burst of updates for one key collapses into
    /// a single push sent this long after the last call in the burst.
    pub debounce_window: Duration,
}

impl Default for ResourceNotifierConfig {
    fn default() -> Self {
        Self {
            debounce_window: DEFAULT_DEBOUNCE_WINDOW,
        }
    }
}

struct TimerEntry {
    id: u64,
    token: CancellationToken,
    handle: tokio::task::JoinHandle<()>,
}

struct NotifierInner {
    transport: Arc<dyn NotificationTransport>,
    handle: Handle,
    window: Duration,
    next_id: AtomicU64,
    timers: Mutex<HashMap<String, TimerEntry>>,
    subscriptions: Mutex<HashSet<String>>,
    disposed: AtomicBool,
}

/// Debounced "resource changed" pusher.
///
/// Consumers subscribe to keys (resource uris). `notify_updated` on a
/// subscribed key arms, or re-arms, that key's single-shot timer; the push
/// goes out once the window elapses without another call. Unsubscribed
/// keys are ignored entirely. `notify_list_changed` bypasses both the
/// subscription set and the debounce. After `dispose` every call is a
/// no-op.
pub struct ResourceNotifier {
    inner: Arc<NotifierInner>,
}

impl ResourceNotifier {
    pub fn new(transport: Arc<dyn NotificationTransport>, handle: Handle) -> Self {
        Self::with_config(transport, handle, ResourceNotifierConfig::default())
    }

    pub fn with_config(
        transport: Arc<dyn NotificationTransport>,
        handle: Handle,
        config: ResourceNotifierConfig,
    ) -> Self {
        Self {
            inner: Arc::new(NotifierInner {
                transport,
                handle,
                window: config.debounce_window,
                next_id: AtomicU64::new(1),
                timers: Mutex::new(HashMap::new()),
                subscriptions: Mutex::new(HashSet::new()),
                disposed: AtomicBool::new(false),
            }),
        }
    }

    pub fn subscribe(&self, key: impl Into<String>) {
        if self.inner.disposed.load(Ordering::SeqCst) {
            return;
        }
        self.inner.subscriptions.lock().insert(key.into());
    }

    /// Drops the subscription and any armed timer for `key`, so a consumer
    /// that just unsubscribed cannot receive a late push. Returns whether
    /// the key was subscribed.
    pub fn unsubscribe(&self, key: &str) -> bool {
        let removed = self.inner.subscriptions.lock().remove(key);
        if removed {
            if let Some(entry) = self.inner.timers.lock().remove(key) {
                entry.token.cancel();
                entry.handle.abort();
            }
        }
        removed
    }

    pub fn is_subscribed(&self, key: &str) -> bool {
        self.inner.subscriptions.lock().contains(key)
    }

    /// Arms (or re-arms) the trailing-edge timer for `key`. No-op for
    /// unsubscribed keys and after disposal. Re-arming cancels the previous
    /// timer, so one key never has two live timers.
    pub fn notify_updated(&self, key: &str) {
        let inner = &self.inner;
        if inner.disposed.load(Ordering::SeqCst) {
            return;
        }
        if !inner.subscriptions.lock().contains(key) {
            return;
        }

        let id = inner.next_id.fetch_add(1, Ordering::Relaxed);
        let token = CancellationToken::new();

        let inner_for_task = Arc::clone(inner);
        let key_for_task = key.to_owned();
        let token_for_task = token.clone();
        let window = inner.window;

        // Held from the displace through the insert so concurrent re-arms
        // for one key serialize; a key never has two un-cancelled timers.
        let mut timers = inner.timers.lock();
        if let Some(previous) = timers.remove(key) {
            previous.token.cancel();
            previous.handle.abort();
        }

        let handle = inner.handle.spawn(async move {
            tokio::select! {
                _ = token_for_task.cancelled() => {}
                _ = tokio::time::sleep(window) => {
                    // An unsubscribe can land between the subscription check
                    // and the insert and find no timer to cancel; re-check
                    // at fire time so the key cannot receive a late push.
                    let deliver = !inner_for_task.disposed.load(Ordering::SeqCst)
                        && inner_for_task.subscriptions.lock().contains(&key_for_task);
                    if deliver {
                        if let Err(err) =
                            inner_for_task.transport.send_resource_updated(&key_for_task).await
                        {
                            tracing::warn!(
                                target = "vigil.notify",
                                key = %key_for_task,
                                error = %err,
                                "failed to deliver resource update"
                            );
                        }
                    }
                }
            }

            // Only the entry this task armed may be cleaned up; a newer
            // timer for the same key has a different id.
            let mut timers = inner_for_task.timers.lock();
            if let Some(current) = timers.get(&key_for_task) {
                if current.id == id {
                    timers.remove(&key_for_task);
                }
            }
        });

        timers.insert(key.to_owned(), TimerEntry { id, token, handle });
    }

    /// Immediate push that a resource appeared or disappeared. Not gated
    /// by subscriptions, never debounced.
    pub fn notify_list_changed(&self) {
        let inner = &self.inner;
        if inner.disposed.load(Ordering::SeqCst) {
            return;
        }
        let transport = Arc::clone(&inner.transport);
        inner.handle.spawn(async move {
            if let Err(err) = transport.send_resource_list_changed().await {
                tracing::warn!(
                    target = "vigil.notify",
                    error = %err,
                    "failed to deliver resource-list-changed"
                );
            }
        });
    }

    /// Cancels every armed timer and turns all further calls into no-ops.
    pub fn dispose(&self) {
        if self.inner.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        let mut timers = self.inner.timers.lock();
        for (_, entry) in timers.drain() {
            entry.token.cancel();
            entry.handle.abort();
        }
        drop(timers);
        self.inner.subscriptions.lock().clear();
    }
}

impl Drop for ResourceNotifier {
    fn drop(&mut self) {
        self.dispose();
    }
}
