//! The subscriber contract and subscription handles.

use async_trait::async_trait;

use crate::error::Result;
use crate::event::Event;

/// What a `(topic, subscriber)` worker invokes for each delivered event.
/// Implemented by the handler harness in `orchestrator`, which wraps a
/// `handlers::Handler`, performs dedup/timing, and republishes whatever
/// events the handler emits — the bus itself never inspects payloads.
#[async_trait]
pub trait Subscriber: Send + Sync {
    async fn on_event(&self, event: &Event) -> Result<()>;

    /// Name used in dead-letter reasons and tracing spans.
    fn name(&self) -> &str;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle(pub u64);
