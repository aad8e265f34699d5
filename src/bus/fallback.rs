//! The simpler fallback notification channel used when the remote transport
//! exhausts its own retry budget.

use async_trait::async_trait;

#[async_trait]
pub trait FallbackTransport: Send + Sync {
    async fn publish(&self, topic: &str, payload_json: &str) -> bool;
}

pub struct InMemoryFallbackTransport {
    received: std::sync::Mutex<Vec<(String, String)>>,
}

impl InMemoryFallbackTransport {
    pub fn new() -> Self {
        InMemoryFallbackTransport { received: std::sync::Mutex::new(Vec::new()) }
    }

    pub fn received(&self) -> Vec<(String, String)> {
        self.received.lock().expect("fallback transport double poisoned").clone()
    }
}

impl Default for InMemoryFallbackTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FallbackTransport for InMemoryFallbackTransport {
    async fn publish(&self, topic: &str, payload_json: &str) -> bool {
        self.received
            .lock()
            .expect("fallback transport double poisoned")
            .push((topic.to_string(), payload_json.to_string()));
        true
    }
}
