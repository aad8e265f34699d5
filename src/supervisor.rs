//! C5: Pipeline Supervisor. Per-transaction correlation, stage sequencing,
//! and terminal-state detection. Observes every event on the bus via its
//! own subscription to all topics; never publishes, never mutates.
//!
//! Keeps contexts in an `RwLock<HashMap<...>>` (many short reads, occasional
//! writes on stage transitions), evicted by a periodic sweep on the same
//! shape as a polling progress monitor.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::bus::Subscriber;
use crate::error::Result;
use crate::event::{CorrelationId, Event, EventPayload};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    RiskEvaluated,
    ComplianceDecided,
    ActionApplied,
    Narrated,
}

#[derive(Debug, Clone)]
pub struct TransactionContext {
    pub correlation_id: CorrelationId,
    pub created_at: DateTime<Utc>,
    pub stages_seen: Vec<Stage>,
    pub terminal: bool,
    pub last_event_time: DateTime<Utc>,
}

impl TransactionContext {
    fn new(correlation_id: CorrelationId, at: DateTime<Utc>) -> Self {
        TransactionContext {
            correlation_id,
            created_at: at,
            stages_seen: Vec::new(),
            terminal: false,
            last_event_time: at,
        }
    }

    fn mark(&mut self, stage: Stage, at: DateTime<Utc>) {
        if !self.stages_seen.contains(&stage) {
            self.stages_seen.push(stage);
        }
        self.last_event_time = at;
        if stage == Stage::Narrated {
            self.terminal = true;
        }
    }
}

#[derive(Debug, Clone)]
pub struct StatusQuery {
    pub stages_seen: Vec<Stage>,
    pub last_event_time: DateTime<Utc>,
    pub terminal: bool,
}

pub struct Supervisor {
    contexts: RwLock<HashMap<String, TransactionContext>>,
    context_ttl: Duration,
    grace_period: Duration,
    max_contexts: usize,
}

impl Supervisor {
    pub fn new(context_ttl: Duration, grace_period: Duration, max_contexts: usize) -> Self {
        Supervisor {
            contexts: RwLock::new(HashMap::new()),
            context_ttl,
            grace_period,
            max_contexts,
        }
    }

    fn stage_for(payload: &EventPayload) -> Option<Stage> {
        match payload {
            EventPayload::RiskFlagged { .. } => Some(Stage::RiskEvaluated),
            EventPayload::ComplianceAction { .. } => Some(Stage::ComplianceDecided),
            EventPayload::OpsAction { .. } => Some(Stage::ActionApplied),
            EventPayload::OpsAlert { channel, .. } if channel == "narrative" => Some(Stage::Narrated),
            _ => None,
        }
    }

    /// Observes `event`, creating the context lazily on first sight of a
    /// correlation id, or no-ops if the event carries no stage marker.
    pub fn observe(&self, event: &Event) {
        let Some(stage) = Self::stage_for(&event.payload) else { return };

        let mut contexts = self.contexts.write().expect("supervisor context map poisoned");
        let key = event.correlation_id.0.clone();
        let ctx = contexts
            .entry(key)
            .or_insert_with(|| TransactionContext::new(event.correlation_id.clone(), event.timestamp));
        ctx.mark(stage, event.timestamp);

        if contexts.len() > self.max_contexts {
            evict_lru(&mut contexts);
        }
    }

    pub fn status(&self, correlation_id: &CorrelationId) -> Option<StatusQuery> {
        let contexts = self.contexts.read().expect("supervisor context map poisoned");
        contexts.get(&correlation_id.0).map(|ctx| StatusQuery {
            stages_seen: ctx.stages_seen.clone(),
            last_event_time: ctx.last_event_time,
            terminal: ctx.terminal,
        })
    }

    pub fn pending(&self) -> usize {
        let contexts = self.contexts.read().expect("supervisor context map poisoned");
        contexts.values().filter(|c| !c.terminal).count()
    }

    /// TTL/grace-period sweep: marks idle contexts terminal, then evicts
    /// contexts that have been terminal past the grace window. Intended to
    /// be driven by a periodic `tokio::time::interval` in the orchestrator.
    pub fn sweep(&self, now: DateTime<Utc>) {
        let mut contexts = self.contexts.write().expect("supervisor context map poisoned");
        let ttl = chrono::Duration::from_std(self.context_ttl).unwrap_or(chrono::Duration::zero());
        let grace = chrono::Duration::from_std(self.grace_period).unwrap_or(chrono::Duration::zero());

        for ctx in contexts.values_mut() {
            if !ctx.terminal && now - ctx.last_event_time >= ttl {
                ctx.terminal = true;
            }
        }

        contexts.retain(|_, ctx| !(ctx.terminal && now - ctx.last_event_time >= ttl + grace));
    }
}

fn evict_lru(contexts: &mut HashMap<String, TransactionContext>) {
    if let Some(oldest_key) = contexts
        .iter()
        .min_by_key(|(_, ctx)| ctx.last_event_time)
        .map(|(k, _)| k.clone())
    {
        contexts.remove(&oldest_key);
    }
}

/// Wraps the supervisor as a bus subscriber: an observer that always
/// succeeds (it never fails a delivery, so it never gets retried or
/// dead-lettered).
pub struct SupervisorSubscriber(pub Arc<Supervisor>);

#[async_trait]
impl Subscriber for SupervisorSubscriber {
    async fn on_event(&self, event: &Event) -> Result<()> {
        self.0.observe(event);
        Ok(())
    }

    fn name(&self) -> &str {
        "supervisor"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event_with_stage(correlation_id: &str, payload: EventPayload, at: DateTime<Utc>) -> Event {
        let mut e = Event::new("test", CorrelationId::new(correlation_id), payload);
        e.timestamp = at;
        e
    }

    #[test]
    fn stage_markers_accumulate_in_order() {
        let sup = Supervisor::new(Duration::from_secs(600), Duration::from_secs(60), 100_000);
        let t0 = Utc::now();
        sup.observe(&event_with_stage(
            "c-1",
            EventPayload::RiskFlagged {
                transaction_id: "t-1".into(),
                score: 0.9,
                indicators: vec![],
                justification_text: "".into(),
                citations: vec![],
            },
            t0,
        ));
        sup.observe(&event_with_stage(
            "c-1",
            EventPayload::ComplianceAction {
                transaction_id: "t-1".into(),
                action: "block".into(),
                rationale_text: "".into(),
                citations: vec![],
            },
            t0,
        ));

        let status = sup.status(&CorrelationId::new("c-1")).unwrap();
        assert_eq!(status.stages_seen, vec![Stage::RiskEvaluated, Stage::ComplianceDecided]);
        assert!(!status.terminal);
    }

    #[test]
    fn narrated_marks_terminal() {
        let sup = Supervisor::new(Duration::from_secs(600), Duration::from_secs(60), 100_000);
        let t0 = Utc::now();
        sup.observe(&event_with_stage(
            "c-1",
            EventPayload::OpsAlert {
                channel: "narrative".into(),
                sentiment_score: None,
                excerpt: None,
                suggested_action: None,
                summary_text: Some("done".into()),
                citations: vec![],
            },
            t0,
        ));
        let status = sup.status(&CorrelationId::new("c-1")).unwrap();
        assert!(status.terminal);
    }

    #[test]
    fn sweep_evicts_past_ttl_plus_grace() {
        let sup = Supervisor::new(Duration::from_secs(60), Duration::from_secs(10), 100_000);
        let t0 = Utc::now();
        sup.observe(&event_with_stage(
            "c-1",
            EventPayload::RiskFlagged {
                transaction_id: "t-1".into(),
                score: 0.9,
                indicators: vec![],
                justification_text: "".into(),
                citations: vec![],
            },
            t0,
        ));

        sup.sweep(t0 + chrono::Duration::seconds(61));
        assert!(sup.status(&CorrelationId::new("c-1")).unwrap().terminal);

        sup.sweep(t0 + chrono::Duration::seconds(72));
        assert!(sup.status(&CorrelationId::new("c-1")).is_none());
    }

    #[test]
    fn pending_counts_only_non_terminal() {
        let sup = Supervisor::new(Duration::from_secs(600), Duration::from_secs(60), 100_000);
        let t0 = Utc::now();
        sup.observe(&event_with_stage(
            "c-1",
            EventPayload::RiskFlagged {
                transaction_id: "t-1".into(),
                score: 0.9,
                indicators: vec![],
                justification_text: "".into(),
                citations: vec![],
            },
            t0,
        ));
        sup.observe(&event_with_stage(
            "c-2",
            EventPayload::OpsAlert {
                channel: "narrative".into(),
                sentiment_score: None,
                excerpt: None,
                suggested_action: None,
                summary_text: None,
                citations: vec![],
            },
            t0,
        ));
        assert_eq!(sup.pending(), 1);
    }
}
