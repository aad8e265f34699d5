//! C4: Agent Handlers. Seven named handlers that subscribe to specific
//! topics, invoke C1/C2, and publish follow-on events.
//!
//! One `async_trait`, `Send + Sync` struct per specialist, each in its own
//! module, sharing a single `handle()` method — no multi-level escalation
//! engine, just "handle one event, return the events to publish".

pub mod assistant;
pub mod compliance;
pub mod knowledge;
pub mod pii;
pub mod privacy;
pub mod resilience;
pub mod risk;
pub mod sentiment;
pub mod sentiment_lexicon;

use async_trait::async_trait;

use crate::error::Result;
use crate::event::Event;

/// A pure-ish function `handle(event) -> set of events to publish`. Handlers
/// never talk to the bus directly; the harness in `orchestrator` publishes
/// whatever this returns. Every emitted event MUST carry the input event's
/// `correlation_id` (enforced by each handler's construction of its outputs,
/// not by the trait).
#[async_trait]
pub trait Handler: Send + Sync {
    async fn handle(&self, event: &Event) -> Result<Vec<Event>>;

    /// Name used for tracing, dead-letter reasons, and the idempotence
    /// dedup window key.
    fn name(&self) -> &str;

    /// Topics this handler subscribes to, used by the orchestrator when
    /// wiring subscriptions so the topic list lives next to the handler
    /// that owns it instead of in a separate registration table.
    fn topics(&self) -> &'static [&'static str];
}
