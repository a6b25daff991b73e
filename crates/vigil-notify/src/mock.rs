use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Arc,
};

use async_trait::async_trait;
use parking_lot::Mutex;

use vigil_core::HitNotification;

use crate::transport::{NotificationTransport, TransportError};

/// Transport double that records everything it is asked to send.
///
/// `set_fail_all(true)` turns every send into an error so the
/// logged-not-propagated contract at the dispatch boundary can be
/// exercised.
#[derive(Default)]
pub struct RecordingTransport {
    hits: Mutex<Vec<HitNotification>>,
    resource_updates: Mutex<Vec<String>>,
    list_changed: AtomicUsize,
    fail_all: AtomicBool,
}

impl RecordingTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn hits(&self) -> Vec<HitNotification> {
        self.hits.lock().clone()
    }

    pub fn hit_count(&self) -> usize {
        self.hits.lock().len()
    }

    pub fn resource_updates(&self) -> Vec<String> {
        self.resource_updates.lock().clone()
    }

    pub fn list_changed_count(&self) -> usize {
        self.list_changed.load(Ordering::SeqCst)
    }

    pub fn set_fail_all(&self, fail: bool) {
        self.fail_all.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl NotificationTransport for RecordingTransport {
    async fn send_hit(&self, notification: &HitNotification) -> Result<(), TransportError> {
        if self.fail_all.load(Ordering::SeqCst) {
            return Err(TransportError::Send("injected failure".to_owned()));
        }
        self.hits.lock().push(notification.clone());
        Ok(())
    }

    async fn send_resource_updated(&self, uri: &str) -> Result<(), TransportError> {
        if self.fail_all.load(Ordering::SeqCst) {
            return Err(TransportError::Send("injected failure".to_owned()));
        }
        self.resource_updates.lock().push(uri.to_owned());
        Ok(())
    }

    async fn send_resource_list_changed(&self) -> Result<(), TransportError> {
        if self.fail_all.load(Ordering::SeqCst) {
            return Err(TransportError::Send("injected failure".to_owned()));
        }
        self.list_changed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
