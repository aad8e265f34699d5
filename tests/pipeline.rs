//! End-to-end scenarios driven through the bus, exercising the full
//! subscribe/publish/deliver/observe wiring rather than a single handler in
//! isolation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::DateTime;

use sentinel_orchestrator::bus::{FallbackTransport, RemoteTransport};
use sentinel_orchestrator::event::{CorrelationId, Event, EventPayload};
use sentinel_orchestrator::model::{CompletionOptions, ModelAdapter, Usage};
use sentinel_orchestrator::orchestrator::Orchestrator;
use sentinel_orchestrator::retrieval::RetrievalIndex;
use sentinel_orchestrator::supervisor::Stage;
use sentinel_orchestrator::Config;

/// Always answers "ok" to `complete` and a fixed vector to `embed`, or fails
/// every call once `unavailable` is flipped on — used to drive Scenario E.
struct SwitchableAdapter {
    unavailable: AtomicBool,
}

impl SwitchableAdapter {
    fn new() -> Self {
        SwitchableAdapter { unavailable: AtomicBool::new(false) }
    }

    fn go_unavailable(&self) {
        self.unavailable.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl ModelAdapter for SwitchableAdapter {
    async fn complete(&self, _: &str, _: &str, _: CompletionOptions) -> sentinel_orchestrator::Result<(String, Usage)> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(sentinel_orchestrator::Error::ModelUnavailable("outage".into()));
        }
        Ok(("ok".to_string(), Usage::default()))
    }

    async fn embed(&self, _: &str) -> sentinel_orchestrator::Result<(Vec<f32>, Usage)> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(sentinel_orchestrator::Error::ModelUnavailable("outage".into()));
        }
        Ok((vec![0.0; 8], Usage::default()))
    }

    fn embedding_dimension(&self) -> usize {
        8
    }
}

fn build(model: Arc<dyn ModelAdapter>) -> Orchestrator {
    let config = Config { embedding_dimension: 8, ..Config::default() };
    let retrieval =
        Arc::new(RetrievalIndex::new(":memory:", model.clone(), 1000, 200, 100_000).unwrap());
    let remote: Option<Arc<dyn RemoteTransport>> = None;
    let fallback: Option<Arc<dyn FallbackTransport>> = None;
    Orchestrator::build(&config, model, retrieval, remote, fallback)
}

fn high_risk_transaction(correlation_id: &str) -> Event {
    Event::new(
        "ledger",
        CorrelationId::new(correlation_id),
        EventPayload::TransactionCreated {
            transaction_id: "t-1".into(),
            amount: "50000.00".into(),
            currency: "AUD".into(),
            origin_account: "acc-1".into(),
            destination_account: "acc-2".into(),
            destination_jurisdiction: "KP".into(),
            initiated_at: DateTime::parse_from_rfc3339("2025-01-15T02:14:00+11:00").unwrap(),
            velocity_indicator: None,
        },
    )
}

#[tokio::test]
async fn scenario_e_model_outage_still_blocks_via_fallback() {
    let model = Arc::new(SwitchableAdapter::new());
    model.go_unavailable();
    let orch = build(model);

    orch.bus.publish(high_risk_transaction("c-5")).await.unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;

    let status = orch.supervisor.status(&CorrelationId::new("c-5")).unwrap();
    assert!(status.stages_seen.contains(&Stage::RiskEvaluated));
    assert!(status.stages_seen.contains(&Stage::ComplianceDecided));
    assert!(status.stages_seen.contains(&Stage::ActionApplied));
}

#[tokio::test]
async fn scenario_d_pii_in_log_line_is_sanitized_end_to_end() {
    let model = Arc::new(SwitchableAdapter::new());
    let orch = build(model);

    let event = Event::new(
        "gateway",
        CorrelationId::new("c-d"),
        EventPayload::LogLine {
            source_component: "gateway".into(),
            body: "user jane@example.com transferred $100".into(),
        },
    );
    orch.bus.publish(event).await.unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;

    // Privacy violations feed the knowledge handler but are not themselves a
    // supervisor stage marker; this asserts only that publishing a log line
    // through the full wiring doesn't error or dead-letter, the sanitization
    // content itself is covered at the handler level.
    assert!(orch.supervisor.status(&CorrelationId::new("c-d")).is_none());
}

#[tokio::test]
async fn replay_redelivers_logged_events_to_new_subscriber() {
    let model = Arc::new(SwitchableAdapter::new());
    let orch = build(model);

    let before = chrono::Utc::now() - chrono::Duration::seconds(1);
    orch.bus.publish(high_risk_transaction("c-replay")).await.unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;

    let replayed = orch.bus.replay("transaction.created", before).await.unwrap();
    assert_eq!(replayed, 1);

    tokio::time::sleep(Duration::from_millis(200)).await;
    let status = orch.supervisor.status(&CorrelationId::new("c-replay")).unwrap();
    assert!(status.stages_seen.contains(&Stage::RiskEvaluated));
}
