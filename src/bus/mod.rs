//! C3: Event Bus. Topic-addressed pub/sub: publish, subscribe, fan-out
//! delivery, fallback transport, dead-letter, replay.

pub mod deadletter;
pub mod fallback;
pub mod remote;
pub mod subscription;
pub mod worker;

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::Notify;

use crate::error::{Error, Result};
use crate::event::Event;

pub use deadletter::DeadLetterQueue;
pub use fallback::FallbackTransport;
pub use remote::RemoteTransport;
pub use subscription::{Subscriber, SubscriptionHandle};

const REPLAY_LOG_CAPACITY: usize = 1000;

struct TopicState {
    subscribers: Vec<(SubscriptionHandle, tokio::sync::mpsc::Sender<Event>)>,
    dead_letters: Arc<DeadLetterQueue>,
    log: VecDeque<Event>,
}

impl TopicState {
    fn new(dead_letter_capacity: usize) -> Self {
        TopicState {
            subscribers: Vec::new(),
            dead_letters: Arc::new(DeadLetterQueue::new(dead_letter_capacity)),
            log: VecDeque::new(),
        }
    }
}

pub struct BusConfig {
    pub subscriber_queue_depth: usize,
    pub publish_backpressure_deadline: Duration,
    pub dead_letter_capacity: usize,
}

impl Default for BusConfig {
    fn default() -> Self {
        BusConfig {
            subscriber_queue_depth: 1024,
            publish_backpressure_deadline: Duration::from_millis(2000),
            dead_letter_capacity: 10_000,
        }
    }
}

pub struct Bus {
    config: BusConfig,
    topics: RwLock<HashMap<String, TopicState>>,
    next_handle: AtomicU64,
    remote: Option<Arc<dyn RemoteTransport>>,
    fallback: Option<Arc<dyn FallbackTransport>>,
    shutdown: Arc<Notify>,
    accepting: std::sync::atomic::AtomicBool,
}

impl Bus {
    pub fn new(
        config: BusConfig,
        remote: Option<Arc<dyn RemoteTransport>>,
        fallback: Option<Arc<dyn FallbackTransport>>,
    ) -> Self {
        Bus {
            config,
            topics: RwLock::new(HashMap::new()),
            next_handle: AtomicU64::new(1),
            remote,
            fallback,
            shutdown: Arc::new(Notify::new()),
            accepting: std::sync::atomic::AtomicBool::new(true),
        }
    }

    /// Registers `subscriber` for `topic`, spawning its dedicated delivery
    /// worker. Applies only to events published after this call returns.
    pub fn subscribe(&self, topic: &str, subscriber: Arc<dyn Subscriber>) -> SubscriptionHandle {
        let handle = SubscriptionHandle(self.next_handle.fetch_add(1, Ordering::SeqCst));
        let mut topics = self.topics.write().expect("bus topic table poisoned");
        let state = topics
            .entry(topic.to_string())
            .or_insert_with(|| TopicState::new(self.config.dead_letter_capacity));

        let worker = worker::spawn_worker(
            subscriber,
            state.dead_letters.clone(),
            self.config.subscriber_queue_depth,
            self.shutdown.clone(),
        );
        state.subscribers.push((handle, worker.sender));
        handle
    }

    /// Idempotent: removing an already-removed or unknown handle is a no-op.
    pub fn unsubscribe(&self, topic: &str, handle: SubscriptionHandle) {
        let mut topics = self.topics.write().expect("bus topic table poisoned");
        if let Some(state) = topics.get_mut(topic) {
            state.subscribers.retain(|(h, _)| *h != handle);
        }
    }

    /// Assigns `event_id`/`timestamp` if this is the first publish of a
    /// fresh `Event`, enqueues to every local subscriber of its topic
    /// concurrently, and best-effort-forwards to the remote and fallback
    /// transports. Local delivery success is what `publish` reports;
    /// remote/fallback failures are logged, never surfaced to the caller.
    pub async fn publish(&self, event: Event) -> Result<()> {
        if !self.accepting.load(Ordering::SeqCst) {
            return Err(Error::Internal("bus is shutting down, not accepting publishes".into()));
        }

        let topic = event.event_type().to_string();

        let (senders, _dead_letters) = {
            let mut topics = self.topics.write().expect("bus topic table poisoned");
            let state = topics
                .entry(topic.clone())
                .or_insert_with(|| TopicState::new(self.config.dead_letter_capacity));
            state.log.push_back(event.clone());
            if state.log.len() > REPLAY_LOG_CAPACITY {
                state.log.pop_front();
            }
            (
                state.subscribers.iter().map(|(_, s)| s.clone()).collect::<Vec<_>>(),
                state.dead_letters.clone(),
            )
        };

        let deadline = self.config.publish_backpressure_deadline;
        let mut sends = tokio::task::JoinSet::new();
        for sender in senders {
            let event = event.clone();
            sends.spawn(async move { tokio::time::timeout(deadline, sender.send(event)).await });
        }

        let mut backpressured = false;
        while let Some(result) = sends.join_next().await {
            match result {
                Ok(Ok(Ok(()))) => {}
                Ok(_) => backpressured = true,
                Err(e) => {
                    tracing::error!(error = %e, "subscriber delivery task panicked");
                    backpressured = true;
                }
            }
        }

        if backpressured {
            return Err(Error::Backpressure { topic, waited: deadline });
        }

        self.forward_to_remote_and_fallback(event).await;
        Ok(())
    }

    async fn forward_to_remote_and_fallback(&self, event: Event) {
        let Some(remote) = self.remote.clone() else { return };
        let fallback = self.fallback.clone();
        let topic = event.event_type().to_string();
        tokio::spawn(async move {
            let results = remote.put_events(std::slice::from_ref(&event)).await;
            let remote_ok = results.iter().all(|r| r.success);
            if !remote_ok {
                tracing::warn!(topic = %topic, "remote transport delivery failed");
                if let Some(fallback) = fallback {
                    match serde_json::to_string(&event) {
                        Ok(payload) => {
                            if !fallback.publish(&topic, &payload).await {
                                tracing::warn!(topic = %topic, "fallback transport delivery also failed");
                            }
                        }
                        Err(e) => tracing::warn!(topic = %topic, error = %e, "failed to serialize event for fallback transport"),
                    }
                }
            }
        });
    }

    /// Re-emits past events for `topic` published at or after
    /// `since_timestamp` to all current subscribers. Handlers' idempotence
    /// makes this safe to call repeatedly.
    pub async fn replay(&self, topic: &str, since_timestamp: DateTime<Utc>) -> Result<usize> {
        let events: Vec<Event> = {
            let topics = self.topics.read().expect("bus topic table poisoned");
            topics
                .get(topic)
                .map(|s| s.log.iter().filter(|e| e.timestamp >= since_timestamp).cloned().collect())
                .unwrap_or_default()
        };
        let count = events.len();
        for event in events {
            self.publish(event).await?;
        }
        Ok(count)
    }

    pub fn dead_letter_queue(&self, topic: &str) -> Option<Arc<DeadLetterQueue>> {
        self.topics
            .read()
            .expect("bus topic table poisoned")
            .get(topic)
            .map(|s| s.dead_letters.clone())
    }

    pub fn all_dead_letter_queues(&self) -> Vec<(String, Arc<DeadLetterQueue>)> {
        self.topics
            .read()
            .expect("bus topic table poisoned")
            .iter()
            .map(|(topic, state)| (topic.clone(), state.dead_letters.clone()))
            .collect()
    }

    /// Stops accepting new publishes and wakes every worker so it drains and
    /// exits once its queue is empty. Callers should await worker
    /// completion externally (e.g. a grace-period sleep) before persisting
    /// dead-letters.
    pub fn begin_shutdown(&self) {
        self.accepting.store(false, Ordering::SeqCst);
        self.shutdown.notify_waiters();
    }
}
