//! Knowledge Handler — subscribes to every stage event for a
//! correlation id and narrates the pipeline once it goes quiet.
//!
//! The quiet-period trigger (5s after the last accumulated event, absent an
//! `ops.action`) can't fire from inside `Handler::handle` — that method only
//! runs in response to a dispatched event and must return promptly. Instead
//! this handler spawns a debounce task per accumulation, canceled implicitly
//! by a generation counter each time a new event arrives, and the debounce
//! task pushes its summary onto a side channel the orchestrator drains and
//! republishes through the bus. The `ops.action` trigger is synchronous and
//! returned directly from `handle`, matching "on ops.action or after a quiet
//! period" without double-emitting for the same accumulation.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::Result;
use crate::event::{CorrelationId, Event, EventPayload};
use crate::model::{CompletionOptions, ModelAdapter};

const TOPICS: &[&str] =
    &["risk.flagged", "compliance.action", "ops.action", "ops.alert", "privacy.violation"];

struct Accumulated {
    events: Vec<Event>,
    generation: u64,
}

struct KnowledgeInner {
    model: Arc<dyn ModelAdapter>,
    state: Mutex<HashMap<String, Accumulated>>,
    quiet_period: Duration,
    emit_tx: mpsc::UnboundedSender<Event>,
}

pub struct KnowledgeHandler(Arc<KnowledgeInner>);

impl KnowledgeHandler {
    /// Returns the handler and the receiving end of its side channel; the
    /// orchestrator must drain the receiver and publish whatever arrives.
    pub fn new(model: Arc<dyn ModelAdapter>, quiet_period: Duration) -> (Self, mpsc::UnboundedReceiver<Event>) {
        let (emit_tx, emit_rx) = mpsc::unbounded_channel();
        let inner = Arc::new(KnowledgeInner {
            model,
            state: Mutex::new(HashMap::new()),
            quiet_period,
            emit_tx,
        });
        (KnowledgeHandler(inner), emit_rx)
    }

    fn push_event(&self, event: &Event) -> u64 {
        let mut state = self.0.state.lock().expect("knowledge state poisoned");
        let entry = state
            .entry(event.correlation_id.0.clone())
            .or_insert_with(|| Accumulated { events: Vec::new(), generation: 0 });
        entry.events.push(event.clone());
        entry.generation += 1;
        entry.generation
    }

    fn schedule_quiet_timer(&self, correlation_id: CorrelationId, generation: u64) {
        let inner = self.0.clone();
        tokio::spawn(async move {
            tokio::time::sleep(inner.quiet_period).await;
            if let Some(event) = take_and_summarize(&inner, &correlation_id, generation).await {
                let _ = inner.emit_tx.send(event);
            }
        });
    }
}

/// Removes the accumulation for `correlation_id` and builds its summary
/// event, but only if no newer event has arrived since `expected_generation`
/// was recorded — otherwise this firing has been superseded and does
/// nothing, tolerating the supervisor's authoritative context disappearing
/// or the accumulation already having been consumed by an `ops.action`
/// trigger.
async fn take_and_summarize(
    inner: &Arc<KnowledgeInner>,
    correlation_id: &CorrelationId,
    expected_generation: u64,
) -> Option<Event> {
    let events = {
        let mut state = inner.state.lock().expect("knowledge state poisoned");
        match state.get(&correlation_id.0) {
            Some(acc) if acc.generation == expected_generation => {
                state.remove(&correlation_id.0).map(|acc| acc.events)
            }
            _ => None,
        }
    }?;

    Some(build_summary(inner, correlation_id, &events).await)
}

async fn build_summary(inner: &Arc<KnowledgeInner>, correlation_id: &CorrelationId, events: &[Event]) -> Event {
    let mut citations = Vec::new();
    let mut narrative_inputs = Vec::new();
    for event in events {
        match &event.payload {
            EventPayload::RiskFlagged { citations: c, justification_text, .. } => {
                citations.extend(c.clone());
                narrative_inputs.push(format!("risk: {justification_text}"));
            }
            EventPayload::ComplianceAction { action, rationale_text, citations: c, .. } => {
                citations.extend(c.clone());
                narrative_inputs.push(format!("compliance: {action} ({rationale_text})"));
            }
            EventPayload::OpsAction { intent, .. } => {
                narrative_inputs.push(format!("ops: {intent}"));
            }
            EventPayload::OpsAlert { channel, .. } => {
                narrative_inputs.push(format!("alert: {channel}"));
            }
            EventPayload::PrivacyViolation { findings, .. } => {
                narrative_inputs.push(format!("privacy: {} findings", findings.len()));
            }
            _ => {}
        }
    }

    let prompt = format!(
        "Summarize this transaction pipeline for an operator, citing regulatory sources:\n{}",
        narrative_inputs.join("\n")
    );
    let summary_text = match inner
        .model
        .complete(&prompt, "Write a concise operator-facing summary.", CompletionOptions::default())
        .await
    {
        Ok((text, _usage)) => text,
        Err(_) => narrative_inputs.join("; "),
    };

    Event::new(
        "knowledge",
        correlation_id.clone(),
        EventPayload::OpsAlert {
            channel: "narrative".to_string(),
            sentiment_score: None,
            excerpt: None,
            suggested_action: None,
            summary_text: Some(summary_text),
            citations,
        },
    )
}

#[async_trait]
impl super::Handler for KnowledgeHandler {
    async fn handle(&self, event: &Event) -> Result<Vec<Event>> {
        if matches!(&event.payload, EventPayload::OpsAlert { channel, .. } if channel == "narrative") {
            // This handler's own narrative, republished onto `ops.alert` by the
            // orchestrator. Accumulating it would re-arm the quiet timer on
            // every firing and narrate forever instead of once per pipeline.
            return Ok(vec![]);
        }

        let generation = self.push_event(event);

        if matches!(event.payload, EventPayload::OpsAction { .. }) {
            if let Some(summary) =
                take_and_summarize(&self.0, &event.correlation_id, generation).await
            {
                return Ok(vec![summary]);
            }
            return Ok(vec![]);
        }

        self.schedule_quiet_timer(event.correlation_id.clone(), generation);
        Ok(vec![])
    }

    fn name(&self) -> &str {
        "knowledge"
    }

    fn topics(&self) -> &'static [&'static str] {
        TOPICS
    }
}
