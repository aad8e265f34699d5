//! Wiring layer: builds C1-C5 into a runnable service.
//!
//! Every handler shares a harness that performs event-id deduplication,
//! timing, error capture, and publish of emitted events: implemented here as
//! [`HandlerSubscriber`], a [`bus::Subscriber`] that wraps a
//! [`handlers::Handler`]. The bus itself never knows about handler
//! semantics; the harness is the only thing that bridges the two.

use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;
use uuid::Uuid;

use crate::bus::{Bus, BusConfig, FallbackTransport, RemoteTransport, Subscriber};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::event::Event;
use crate::handlers::Handler;
use crate::model::ModelAdapter;
use crate::retrieval::RetrievalIndex;
use crate::supervisor::{Supervisor, SupervisorSubscriber};

const DEDUP_WINDOW_CAPACITY: usize = 10_000;

/// Bounded set of recently-seen `event_id`s, evicted oldest-first once the
/// window fills.
struct DedupWindow {
    seen: HashSet<Uuid>,
    order: VecDeque<Uuid>,
    capacity: usize,
}

impl DedupWindow {
    fn new(capacity: usize) -> Self {
        DedupWindow { seen: HashSet::new(), order: VecDeque::new(), capacity }
    }

    /// Returns `true` if `id` had already been seen (caller should treat the
    /// delivery as a no-op), otherwise records it and returns `false`.
    fn check_and_insert(&mut self, id: Uuid) -> bool {
        if self.seen.contains(&id) {
            return true;
        }
        if self.order.len() >= self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.seen.remove(&oldest);
            }
        }
        self.seen.insert(id);
        self.order.push_back(id);
        false
    }
}

/// Bridges a [`Handler`] into a [`bus::Subscriber`]: dedup, timeout, error
/// capture, and republish of whatever events the handler emits.
pub struct HandlerSubscriber {
    handler: Arc<dyn Handler>,
    bus: Arc<Bus>,
    dedup: Mutex<DedupWindow>,
    handler_timeout: Duration,
}

impl HandlerSubscriber {
    pub fn new(handler: Arc<dyn Handler>, bus: Arc<Bus>, handler_timeout: Duration) -> Self {
        HandlerSubscriber {
            handler,
            bus,
            dedup: Mutex::new(DedupWindow::new(DEDUP_WINDOW_CAPACITY)),
            handler_timeout,
        }
    }
}

#[async_trait]
impl Subscriber for HandlerSubscriber {
    async fn on_event(&self, event: &Event) -> Result<()> {
        {
            let mut dedup = self.dedup.lock().expect("dedup window poisoned");
            if dedup.check_and_insert(event.event_id) {
                return Ok(());
            }
        }

        let handled = tokio::time::timeout(self.handler_timeout, self.handler.handle(event)).await;

        let emitted = match handled {
            Ok(Ok(events)) => events,
            Ok(Err(e)) => {
                return Err(Error::HandlerRaised { handler: self.handler.name().to_string(), message: e.to_string() })
            }
            Err(_) => {
                return Err(Error::HandlerTimeout {
                    handler: self.handler.name().to_string(),
                    elapsed: self.handler_timeout,
                })
            }
        };

        for out_event in emitted {
            if let Err(e) = self.bus.publish(out_event).await {
                tracing::warn!(handler = self.handler.name(), error = %e, "failed to publish handler output");
            }
        }

        Ok(())
    }

    fn name(&self) -> &str {
        self.handler.name()
    }
}

/// A subscriber that republishes whatever arrives on a side channel — used
/// to drain the knowledge handler's quiet-period emissions back onto the
/// bus (see `handlers::knowledge`).
pub fn spawn_side_channel_publisher(
    bus: Arc<Bus>,
    mut receiver: tokio::sync::mpsc::UnboundedReceiver<Event>,
) {
    tokio::spawn(async move {
        while let Some(event) = receiver.recv().await {
            if let Err(e) = bus.publish(event).await {
                tracing::warn!(error = %e, "failed to publish knowledge handler narrative");
            }
        }
    });
}

pub struct Orchestrator {
    pub bus: Arc<Bus>,
    pub supervisor: Arc<Supervisor>,
    sweep_shutdown: Arc<Notify>,
}

impl Orchestrator {
    /// Builds the bus, supervisor, all seven handlers, and wires
    /// subscriptions, given shared C1/C2 instances.
    pub fn build(
        config: &Config,
        model: Arc<dyn ModelAdapter>,
        retrieval: Arc<RetrievalIndex>,
        remote: Option<Arc<dyn RemoteTransport>>,
        fallback: Option<Arc<dyn FallbackTransport>>,
    ) -> Self {
        let bus = Arc::new(Bus::new(
            BusConfig {
                subscriber_queue_depth: config.subscriber_queue_depth,
                publish_backpressure_deadline: Duration::from_millis(
                    config.publish_backpressure_deadline_ms,
                ),
                dead_letter_capacity: 10_000,
            },
            remote,
            fallback,
        ));

        let supervisor = Arc::new(Supervisor::new(
            Duration::from_millis(config.context_ttl_ms),
            Duration::from_secs(60),
            100_000,
        ));

        let handler_timeout = Duration::from_millis(config.handler_timeout_ms);

        let risk = Arc::new(crate::handlers::risk::RiskHandler::new(
            model.clone(),
            retrieval.clone(),
            config.risk_score_flag_threshold,
            "AU",
        ));
        let compliance = Arc::new(crate::handlers::compliance::ComplianceHandler::new(
            model.clone(),
            retrieval.clone(),
            config.compliance_block_threshold,
            config.compliance_hold_threshold,
        ));
        let resilience = Arc::new(crate::handlers::resilience::ResilienceHandler::new());
        let sentiment = Arc::new(crate::handlers::sentiment::SentimentHandler::new(model.clone()));
        let privacy = Arc::new(crate::handlers::privacy::PrivacyHandler::new());
        let assistant = Arc::new(crate::handlers::assistant::AssistantHandler::new(model.clone(), retrieval.clone()));
        let (knowledge, knowledge_rx) = crate::handlers::knowledge::KnowledgeHandler::new(
            model.clone(),
            Duration::from_millis(config.knowledge_quiet_period_ms),
        );
        let knowledge = Arc::new(knowledge);

        subscribe_handler(&bus, risk, handler_timeout);
        subscribe_handler(&bus, compliance, handler_timeout);
        subscribe_handler(&bus, resilience, handler_timeout);
        subscribe_handler(&bus, sentiment, handler_timeout);
        subscribe_handler(&bus, privacy, handler_timeout);
        subscribe_handler(&bus, assistant, handler_timeout);
        subscribe_handler(&bus, knowledge, handler_timeout);
        spawn_side_channel_publisher(bus.clone(), knowledge_rx);

        for topic in ["transaction.created", "risk.flagged", "compliance.action", "ops.action",
            "ops.alert", "customer.message", "log.line", "user.query", "user.response",
            "privacy.violation"]
        {
            bus.subscribe(topic, Arc::new(SupervisorSubscriber(supervisor.clone())));
        }

        let sweep_shutdown = Arc::new(Notify::new());
        spawn_supervisor_sweep(supervisor.clone(), sweep_shutdown.clone());

        Orchestrator { bus, supervisor, sweep_shutdown }
    }

    /// Cooperative shutdown: stop accepting publishes, let workers drain up
    /// to `grace`, persist dead-letters, stop the sweep task.
    pub async fn shutdown(&self, grace: Duration, dead_letter_path: Option<&std::path::Path>) {
        self.bus.begin_shutdown();
        self.sweep_shutdown.notify_waiters();
        tokio::time::sleep(grace).await;

        if let Some(path) = dead_letter_path {
            for (topic, dlq) in self.bus.all_dead_letter_queues() {
                if dlq.is_empty() {
                    continue;
                }
                let topic_path = path.join(format!("{}.jsonl", topic.replace('.', "_")));
                if let Err(e) = dlq.persist_jsonl(&topic_path) {
                    tracing::error!(topic = %topic, error = %e, "failed to persist dead letters on shutdown");
                }
            }
        }
    }
}

fn subscribe_handler(bus: &Arc<Bus>, handler: Arc<dyn Handler>, handler_timeout: Duration) {
    let subscriber: Arc<dyn Subscriber> =
        Arc::new(HandlerSubscriber::new(handler.clone(), bus.clone(), handler_timeout));
    for topic in handler.topics() {
        bus.subscribe(topic, subscriber.clone());
    }
}

fn spawn_supervisor_sweep(supervisor: Arc<Supervisor>, shutdown: Arc<Notify>) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(30));
        loop {
            tokio::select! {
                _ = interval.tick() => supervisor.sweep(chrono::Utc::now()),
                _ = shutdown.notified() => break,
            }
        }
    });
}
