//! Per-`(topic, subscriber)` delivery worker: one task per subscription,
//! reading a bounded channel, invoking the subscriber sequentially (FIFO
//! within the pair), retrying on failure per the fixed delay sequence, and
//! dead-lettering after the retry budget is exhausted.
//!
//! Replaces a single loop over all connections checking subscription match
//! with a stricter one-task-per-subscription model, built on `tokio` channels
//! instead of actix actors since there is no WebSocket transport here.

use std::sync::Arc;

use tokio::sync::{mpsc, Notify};

use crate::event::Event;
use crate::model::retry::FixedDelaySequence;

use super::deadletter::DeadLetterQueue;
use super::subscription::Subscriber;

pub struct WorkerHandles {
    pub sender: mpsc::Sender<Event>,
}

/// Spawns the worker task for one subscription and returns the sender side
/// of its bounded channel. The task runs until `shutdown` is notified and
/// the channel drains.
pub fn spawn_worker(
    subscriber: Arc<dyn Subscriber>,
    dead_letters: Arc<DeadLetterQueue>,
    queue_depth: usize,
    shutdown: Arc<Notify>,
) -> WorkerHandles {
    let (tx, mut rx) = mpsc::channel::<Event>(queue_depth);
    let delays = FixedDelaySequence::bus_default();

    tokio::spawn(async move {
        loop {
            let event = tokio::select! {
                biased;
                event = rx.recv() => event,
                _ = shutdown.notified() => {
                    // Drain whatever is already queued before exiting.
                    rx.close();
                    rx.recv().await
                }
            };

            let Some(event) = event else { break };
            deliver_with_retry(&subscriber, event, &delays, &dead_letters).await;
        }
    });

    WorkerHandles { sender: tx }
}

async fn deliver_with_retry(
    subscriber: &Arc<dyn Subscriber>,
    mut event: Event,
    delays: &FixedDelaySequence,
    dead_letters: &Arc<DeadLetterQueue>,
) {
    loop {
        match subscriber.on_event(&event).await {
            Ok(()) => return,
            Err(e) => {
                tracing::warn!(
                    subscriber = subscriber.name(),
                    attempt = event.attempt,
                    error = %e,
                    "subscriber delivery failed"
                );
                match delays.delay_for_attempt(event.attempt) {
                    Some(delay) => {
                        tokio::time::sleep(delay).await;
                        event = event.redelivery();
                    }
                    None => {
                        dead_letters.push(event, e.to_string());
                        return;
                    }
                }
            }
        }
    }
}
