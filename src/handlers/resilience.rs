//! Resilience Handler — subscribes to `compliance.action`.

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::error::Result;
use crate::event::{Event, EventPayload};

const TOPICS: &[&str] = &["compliance.action"];

/// Translates a compliance action into the operational intent describing
/// the step to take. The core publishes the intent; it never executes it
/// against a banking system.
fn intent_for_action(action: &str) -> &'static str {
    match action {
        "block" => "block_transaction",
        "hold" => "place_hold",
        "report" => "enqueue_regulator_report",
        "monitor" => "flag_for_monitoring",
        _ => "no_op",
    }
}

pub struct ResilienceHandler;

impl ResilienceHandler {
    pub fn new() -> Self {
        ResilienceHandler
    }
}

impl Default for ResilienceHandler {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl super::Handler for ResilienceHandler {
    async fn handle(&self, event: &Event) -> Result<Vec<Event>> {
        let EventPayload::ComplianceAction { transaction_id, action, .. } = &event.payload else {
            return Ok(vec![]);
        };

        let mut parameters = BTreeMap::new();
        parameters.insert("transaction_id".to_string(), transaction_id.clone());
        parameters.insert("source_action".to_string(), action.clone());

        Ok(vec![Event::new(
            self.name(),
            event.correlation_id.clone(),
            EventPayload::OpsAction {
                transaction_id: transaction_id.clone(),
                intent: intent_for_action(action).to_string(),
                parameters,
            },
        )])
    }

    fn name(&self) -> &str {
        "resilience"
    }

    fn topics(&self) -> &'static [&'static str] {
        TOPICS
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::CorrelationId;
    use crate::handlers::Handler as _;

    #[tokio::test]
    async fn emits_exactly_one_ops_action_per_input() {
        let h = ResilienceHandler::new();
        let event = Event::new(
            "compliance",
            CorrelationId::new("c-1"),
            EventPayload::ComplianceAction {
                transaction_id: "t-1".into(),
                action: "block".into(),
                rationale_text: "r".into(),
                citations: vec![],
            },
        );
        let emitted = h.handle(&event).await.unwrap();
        assert_eq!(emitted.len(), 1);
        let EventPayload::OpsAction { intent, .. } = &emitted[0].payload else { panic!() };
        assert_eq!(intent, "block_transaction");
    }
}
