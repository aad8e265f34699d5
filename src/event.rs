//! Event envelope and the closed payload vocabulary routed by the bus.
//!
//! Payloads are modeled as a single `serde`-tagged enum keyed on `event_type`
//! rather than an untyped JSON bag: an event whose `event_type` string doesn't
//! match a known variant fails to deserialize instead of silently carrying an
//! opaque map nobody validates. That is the "dynamic payload -> tagged union"
//! design note applied directly.

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable identifier threading every event belonging to one originating
/// transaction, message, or query.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CorrelationId(pub String);

impl CorrelationId {
    pub fn new(s: impl Into<String>) -> Self {
        CorrelationId(s.into())
    }
}

impl std::fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One finding in a privacy scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PiiFinding {
    pub kind: String,
    pub span_start: usize,
    pub span_end: usize,
}

/// The closed `event_type` vocabulary. Every payload variant carries its own
/// structured fields; there is no untyped fallback arm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event_type", content = "payload")]
pub enum EventPayload {
    #[serde(rename = "transaction.created")]
    TransactionCreated {
        transaction_id: String,
        amount: String,
        currency: String,
        origin_account: String,
        destination_account: String,
        destination_jurisdiction: String,
        initiated_at: DateTime<FixedOffset>,
        #[serde(default)]
        velocity_indicator: Option<f64>,
    },

    #[serde(rename = "risk.flagged")]
    RiskFlagged {
        transaction_id: String,
        score: f64,
        indicators: Vec<String>,
        justification_text: String,
        citations: Vec<String>,
    },

    #[serde(rename = "compliance.action")]
    ComplianceAction {
        transaction_id: String,
        action: String,
        rationale_text: String,
        citations: Vec<String>,
    },

    #[serde(rename = "ops.action")]
    OpsAction {
        transaction_id: String,
        intent: String,
        parameters: std::collections::BTreeMap<String, String>,
    },

    #[serde(rename = "ops.alert")]
    OpsAlert {
        channel: String,
        #[serde(default)]
        sentiment_score: Option<f64>,
        #[serde(default)]
        excerpt: Option<String>,
        #[serde(default)]
        suggested_action: Option<String>,
        #[serde(default)]
        summary_text: Option<String>,
        #[serde(default)]
        citations: Vec<String>,
    },

    #[serde(rename = "customer.message")]
    CustomerMessage { body: String },

    #[serde(rename = "log.line")]
    LogLine {
        source_component: String,
        body: String,
    },

    #[serde(rename = "user.query")]
    UserQuery { query_id: String, text: String },

    #[serde(rename = "user.response")]
    UserResponse {
        query_id: String,
        answer_text: String,
        citations: Vec<String>,
    },

    #[serde(rename = "privacy.violation")]
    PrivacyViolation {
        source_component: String,
        findings: Vec<PiiFinding>,
        sanitized_line: String,
    },
}

impl EventPayload {
    /// The closed-vocabulary string this payload serializes under; used by
    /// the bus to validate publishes and route subscriptions without forcing
    /// callers to re-derive it from the enum discriminant by hand.
    pub fn event_type(&self) -> &'static str {
        match self {
            EventPayload::TransactionCreated { .. } => "transaction.created",
            EventPayload::RiskFlagged { .. } => "risk.flagged",
            EventPayload::ComplianceAction { .. } => "compliance.action",
            EventPayload::OpsAction { .. } => "ops.action",
            EventPayload::OpsAlert { .. } => "ops.alert",
            EventPayload::CustomerMessage { .. } => "customer.message",
            EventPayload::LogLine { .. } => "log.line",
            EventPayload::UserQuery { .. } => "user.query",
            EventPayload::UserResponse { .. } => "user.response",
            EventPayload::PrivacyViolation { .. } => "privacy.violation",
        }
    }
}

/// The unit of communication on the bus. Immutable after publish; every
/// subscriber delivery receives its own clone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub event_id: Uuid,
    pub correlation_id: CorrelationId,
    pub timestamp: DateTime<Utc>,
    pub source: String,
    pub attempt: u32,
    #[serde(flatten)]
    pub payload: EventPayload,
}

impl Event {
    /// Builds a fresh, first-attempt event. `event_id`/`timestamp` are
    /// assigned here rather than left to the bus, matching "assigns
    /// `event_id` if absent" — callers that already have one use
    /// [`Event::with_id`].
    pub fn new(source: impl Into<String>, correlation_id: CorrelationId, payload: EventPayload) -> Self {
        Event {
            event_id: Uuid::new_v4(),
            correlation_id,
            timestamp: Utc::now(),
            source: source.into(),
            attempt: 0,
            payload,
        }
    }

    pub fn event_type(&self) -> &'static str {
        self.payload.event_type()
    }

    /// Returns a copy with `attempt` incremented, used by the bus on
    /// redelivery.
    pub fn redelivery(&self) -> Self {
        let mut e = self.clone();
        e.attempt += 1;
        e
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_type_matches_serde_tag() {
        let e = EventPayload::CustomerMessage { body: "hi".into() };
        assert_eq!(e.event_type(), "customer.message");
        let json = serde_json::to_value(&e).unwrap();
        assert_eq!(json["event_type"], "customer.message");
    }

    #[test]
    fn unknown_event_type_fails_to_deserialize() {
        let raw = serde_json::json!({"event_type": "txn.mystery", "payload": {}});
        let res: Result<EventPayload, _> = serde_json::from_value(raw);
        assert!(res.is_err());
    }

    #[test]
    fn redelivery_increments_attempt_and_preserves_identity() {
        let e = Event::new(
            "ledger",
            CorrelationId::new("c-1"),
            EventPayload::CustomerMessage { body: "hi".into() },
        );
        let r = e.redelivery();
        assert_eq!(r.attempt, 1);
        assert_eq!(r.event_id, e.event_id);
        assert_eq!(r.correlation_id, e.correlation_id);
    }
}
