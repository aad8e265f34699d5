//! The managed remote event bus: an external collaborator, described only
//! by the interface it presents.

use async_trait::async_trait;

use crate::event::Event;

#[derive(Debug, Clone)]
pub struct PutResult {
    pub event_id: uuid::Uuid,
    pub success: bool,
}

#[async_trait]
pub trait RemoteTransport: Send + Sync {
    async fn put_events(&self, events: &[Event]) -> Vec<PutResult>;
}

/// In-memory double for tests: records every batch it was given and can be
/// configured to fail every call.
pub struct InMemoryRemoteTransport {
    received: std::sync::Mutex<Vec<Event>>,
    fail: std::sync::atomic::AtomicBool,
}

impl InMemoryRemoteTransport {
    pub fn new() -> Self {
        InMemoryRemoteTransport {
            received: std::sync::Mutex::new(Vec::new()),
            fail: std::sync::atomic::AtomicBool::new(false),
        }
    }

    pub fn set_failing(&self, failing: bool) {
        self.fail.store(failing, std::sync::atomic::Ordering::SeqCst);
    }

    pub fn received(&self) -> Vec<Event> {
        self.received.lock().expect("remote transport double poisoned").clone()
    }
}

impl Default for InMemoryRemoteTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RemoteTransport for InMemoryRemoteTransport {
    async fn put_events(&self, events: &[Event]) -> Vec<PutResult> {
        let failing = self.fail.load(std::sync::atomic::Ordering::SeqCst);
        if failing {
            return events
                .iter()
                .map(|e| PutResult { event_id: e.event_id, success: false })
                .collect();
        }
        self.received
            .lock()
            .expect("remote transport double poisoned")
            .extend(events.iter().cloned());
        events
            .iter()
            .map(|e| PutResult { event_id: e.event_id, success: true })
            .collect()
    }
}
