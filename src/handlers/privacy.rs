//! Privacy Handler — subscribes to `log.line`.

use async_trait::async_trait;

use crate::error::Result;
use crate::event::{Event, EventPayload};

use super::pii;

const TOPICS: &[&str] = &["log.line"];

pub struct PrivacyHandler;

impl PrivacyHandler {
    pub fn new() -> Self {
        PrivacyHandler
    }
}

impl Default for PrivacyHandler {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl super::Handler for PrivacyHandler {
    async fn handle(&self, event: &Event) -> Result<Vec<Event>> {
        let EventPayload::LogLine { source_component, body } = &event.payload else {
            return Ok(vec![]);
        };

        let (findings, sanitized_line) = pii::scan(body);
        if findings.is_empty() {
            return Ok(vec![]);
        }

        Ok(vec![Event::new(
            self.name(),
            event.correlation_id.clone(),
            EventPayload::PrivacyViolation {
                source_component: source_component.clone(),
                findings,
                sanitized_line,
            },
        )])
    }

    fn name(&self) -> &str {
        "privacy"
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
    async fn scenario_d_pii_in_log_line_sanitized() {
        let h = PrivacyHandler::new();
        let event = Event::new(
            "gateway",
            CorrelationId::new("c-3"),
            EventPayload::LogLine {
                source_component: "gateway".into(),
                body: "user jane@example.com transferred $100".into(),
            },
        );
        let emitted = h.handle(&event).await.unwrap();
        assert_eq!(emitted.len(), 1);
        let EventPayload::PrivacyViolation { sanitized_line, findings, .. } = &emitted[0].payload else {
            panic!()
        };
        assert!(sanitized_line.contains("<EMAIL>"));
        assert!(!sanitized_line.contains("jane@example.com"));
        assert!(!findings.is_empty());
    }

    #[tokio::test]
    async fn clean_log_line_emits_nothing() {
        let h = PrivacyHandler::new();
        let event = Event::new(
            "gateway",
            CorrelationId::new("c-3"),
            EventPayload::LogLine { source_component: "gateway".into(), body: "service started".into() },
        );
        let emitted = h.handle(&event).await.unwrap();
        assert!(emitted.is_empty());
    }
}
