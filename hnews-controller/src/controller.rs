//! Controller runner
//!
//! Turns triggers into reconciliation cycles:
//! - `Created` / `SpecUpdated` events from the store
//! - deferred outcomes, re-enqueued after their delay
//! - a periodic resync of every resource (the first tick fires at startup)
//!
//! Keys wait in a de-duplicating FIFO queue and cycles run one at a time, so a
//! resource never has two cycles in flight. Cancelling the token abandons the
//! running cycle, drops pending requeue timers and returns from [`Controller::run`].

use hnews_common::events::{EventBus, ResourceEvent};
use hnews_common::ResourceKey;
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::reconciler::Reconciler;
use crate::store::ResourceStore;

/// FIFO of resource keys; a key already waiting is not queued twice
#[derive(Debug, Default)]
pub struct WorkQueue {
    order: VecDeque<ResourceKey>,
    queued: HashSet<ResourceKey>,
}

impl WorkQueue {
    /// Returns false if the key was already waiting
    pub fn push(&mut self, key: ResourceKey) -> bool {
        if !self.queued.insert(key.clone()) {
            return false;
        }
        self.order.push_back(key);
        true
    }

    pub fn pop(&mut self) -> Option<ResourceKey> {
        let key = self.order.pop_front()?;
        self.queued.remove(&key);
        Some(key)
    }

    pub fn remove(&mut self, key: &ResourceKey) {
        if self.queued.remove(key) {
            self.order.retain(|k| k != key);
        }
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

pub struct Controller {
    reconciler: Arc<Reconciler>,
    store: Arc<dyn ResourceStore>,
    event_bus: EventBus,
    resync_interval: Duration,
}

impl Controller {
    pub fn new(
        reconciler: Arc<Reconciler>,
        store: Arc<dyn ResourceStore>,
        event_bus: EventBus,
        resync_interval: Duration,
    ) -> Self {
        Self {
            reconciler,
            store,
            event_bus,
            resync_interval,
        }
    }

    /// Run until `cancel` fires
    pub async fn run(self, cancel: CancellationToken) {
        let mut events = self.event_bus.subscribe();
        let (requeue_tx, mut requeue_rx) = mpsc::unbounded_channel::<ResourceKey>();
        let mut queue = WorkQueue::default();

        // tokio rejects a zero period
        let mut resync = tokio::time::interval(self.resync_interval.max(Duration::from_secs(1)));
        resync.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            resync_secs = self.resync_interval.as_secs(),
            requeue_secs = self.reconciler.requeue_after().as_secs(),
            "Controller started"
        );

        loop {
            while let Some(key) = queue.pop() {
                if cancel.is_cancelled() {
                    break;
                }
                self.process(key, &requeue_tx, &cancel).await;
            }

            tokio::select! {
                _ = cancel.cancelled() => break,

                event = events.recv() => match event {
                    Ok(ResourceEvent::Deleted { key, .. }) => queue.remove(&key),
                    Ok(event) if event.triggers_reconcile() => {
                        queue.push(event.key().clone());
                    }
                    Ok(_) => {}
                    Err(RecvError::Lagged(missed)) => {
                        warn!(missed, "Resource events dropped, resyncing all resources");
                        self.enqueue_all(&mut queue).await;
                    }
                    Err(RecvError::Closed) => break,
                },

                Some(key) = requeue_rx.recv() => {
                    queue.push(key);
                }

                _ = resync.tick() => {
                    self.enqueue_all(&mut queue).await;
                }
            }
        }

        info!("Controller stopped");
    }

    async fn enqueue_all(&self, queue: &mut WorkQueue) {
        match self.store.list().await {
            Ok(resources) => {
                for resource in resources {
                    queue.push(resource.key());
                }
                debug!(queued = queue.len(), "Resync enqueued resources");
            }
            Err(e) => error!(error = %e, "Unable to list resources for resync"),
        }
    }

    async fn process(
        &self,
        key: ResourceKey,
        requeue_tx: &mpsc::UnboundedSender<ResourceKey>,
        cancel: &CancellationToken,
    ) {
        let outcome = tokio::select! {
            _ = cancel.cancelled() => {
                info!(resource = %key, "Cycle abandoned on shutdown");
                return;
            }
            outcome = self.reconciler.reconcile(&key) => outcome,
        };

        match outcome {
            Ok(outcome) => {
                debug!(resource = %key, ?outcome, "Cycle finished");
                if let Some(after) = outcome.requeue_after() {
                    schedule_requeue(key, after, requeue_tx.clone(), cancel.clone());
                }
            }
            Err(e) => {
                error!(resource = %key, error = %e, "Cycle aborted");
            }
        }
    }
}

fn schedule_requeue(
    key: ResourceKey,
    after: Duration,
    requeue_tx: mpsc::UnboundedSender<ResourceKey>,
    cancel: CancellationToken,
) {
    debug!(resource = %key, after_secs = after.as_secs(), "Requeue scheduled");

    tokio::spawn(async move {
        tokio::select! {
            _ = cancel.cancelled() => {}
            _ = tokio::time::sleep(after) => {
                // Receiver is gone only after the controller stopped
                let _ = requeue_tx.send(key);
            }
        }
    });
}
