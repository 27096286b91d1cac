//! Event hub: single owner of the subscriber registry.
//!
//! Every membership change and every broadcast goes through one ordered
//! control channel and is applied by one loop task, so a registration
//! either lands before a broadcast or after it, and an unregister that was
//! enqueued before a broadcast guarantees that broadcast skips the handle.
//!
//! Broadcasts are resolved against the store when the loop dequeues them,
//! not when they are enqueued. Two signals sent back to back may therefore
//! carry the same snapshot if the store did not change in between.
//!
//! Shutdown travels on its own watch channel rather than the control channel,
//! so a `stop` call takes effect on its first poll even when the control
//! channel is full.

use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::config::HubConfig;
use crate::error::{ExplorerError, Result};
use crate::store::SharedStateStore;
use crate::websocket::envelope::{EnvelopePayload, EventKind, UpdateEnvelope};
use crate::websocket::subscriptions::{SlowConsumerPolicy, SubscriberHandle, SubscriberRegistry};

enum HubRequest {
    Register {
        queue: mpsc::Sender<UpdateEnvelope>,
        reply: oneshot::Sender<SubscriberHandle>,
    },
    Unregister(SubscriberHandle),
    Broadcast(EventKind),
    Stats(oneshot::Sender<HubStats>),
}

/// Counters maintained by the hub loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct HubStats {
    pub subscribers: usize,
    pub broadcasts: u64,
    pub delivered: u64,
    pub dropped: u64,
    pub evicted: u64,
    pub pruned: u64,
    pub next_seq: u64,
}

/// A registered subscriber: its handle and the receiving end of its queue.
#[derive(Debug)]
pub struct Subscription {
    pub handle: SubscriberHandle,
    pub queue: mpsc::Receiver<UpdateEnvelope>,
}

struct HubShared {
    control: mpsc::Sender<HubRequest>,
    stopped: AtomicBool,
    shutdown: watch::Sender<bool>,
    finished: watch::Receiver<bool>,
    subscriber_queue: usize,
}

/// Cloneable handle to the hub loop.
#[derive(Clone)]
pub struct EventHub {
    shared: Arc<HubShared>,
}

impl EventHub {
    /// Starts the hub loop on the current tokio runtime.
    pub fn spawn(store: Arc<SharedStateStore>, config: &HubConfig) -> (Self, JoinHandle<()>) {
        let control_capacity = config.control_capacity.max(1);
        let subscriber_queue = config.subscriber_queue.max(1);
        let (control, requests) = mpsc::channel(control_capacity);
        let (shutdown, shutdown_rx) = watch::channel(false);
        let (finished_tx, finished) = watch::channel(false);
        let hub_loop = HubLoop {
            store,
            requests,
            shutdown: shutdown_rx,
            finished: finished_tx,
            registry: SubscriberRegistry::new(),
            policy: config.slow_consumer,
            stats: HubStats {
                next_seq: 1,
                ..Default::default()
            },
        };
        let task = tokio::spawn(hub_loop.run());

        info!(
            control_capacity,
            subscriber_queue,
            policy = ?config.slow_consumer,
            "Event hub started"
        );

        let hub = Self {
            shared: Arc::new(HubShared {
                control,
                stopped: AtomicBool::new(false),
                shutdown,
                finished,
                subscriber_queue,
            }),
        };
        (hub, task)
    }

    /// Registers a subscriber with the configured queue capacity.
    pub async fn register(&self) -> Result<Subscription> {
        self.register_with_capacity(self.shared.subscriber_queue).await
    }

    /// Registers a subscriber whose queue holds at most `capacity` envelopes.
    /// The subscriber receives every envelope broadcast after this returns.
    pub async fn register_with_capacity(&self, capacity: usize) -> Result<Subscription> {
        if capacity == 0 {
            return Err(ExplorerError::InvalidInput("subscriber queue capacity must be at least 1".to_string()));
        }
        self.ensure_open()?;

        let (queue_tx, queue) = mpsc::channel(capacity);
        let (reply, admitted) = oneshot::channel();
        self.send(HubRequest::Register { queue: queue_tx, reply }).await?;
        let handle = admitted.await.map_err(|_| ExplorerError::HubClosed)?;

        Ok(Subscription { handle, queue })
    }

    /// Requests removal of `handle`. Unknown handles and a stopped hub are
    /// both no-ops.
    pub async fn unregister(&self, handle: SubscriberHandle) {
        if self.shared.control.send(HubRequest::Unregister(handle)).await.is_err() {
            debug!(subscriber = %handle, "Unregister after hub shutdown ignored");
        }
    }

    /// Enqueues a change signal. Waits only for room in the control channel.
    pub async fn broadcast(&self, kind: EventKind) -> Result<()> {
        self.ensure_open()?;
        self.send(HubRequest::Broadcast(kind)).await
    }

    pub async fn stats(&self) -> Result<HubStats> {
        self.ensure_open()?;
        let (reply, stats) = oneshot::channel();
        self.send(HubRequest::Stats(reply)).await?;
        stats.await.map_err(|_| ExplorerError::HubClosed)
    }

    /// Stops the loop and closes every subscriber queue, then waits for the
    /// loop to exit. Every call waits for the same exit, so a call that was
    /// cancelled can simply be repeated.
    pub async fn stop(&self) {
        if !self.shared.stopped.swap(true, Ordering::SeqCst) {
            info!("Stopping event hub");
        }
        self.shared.shutdown.send_replace(true);

        let mut finished = self.shared.finished.clone();
        // Err: the loop task is already gone.
        let _ = finished.wait_for(|done| *done).await;
    }

    pub fn is_stopped(&self) -> bool {
        self.shared.stopped.load(Ordering::SeqCst)
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_stopped() {
            Err(ExplorerError::HubClosed)
        } else {
            Ok(())
        }
    }

    async fn send(&self, request: HubRequest) -> Result<()> {
        self.shared
            .control
            .send(request)
            .await
            .map_err(|_| ExplorerError::HubClosed)
    }
}

struct HubLoop {
    store: Arc<SharedStateStore>,
    requests: mpsc::Receiver<HubRequest>,
    shutdown: watch::Receiver<bool>,
    finished: watch::Sender<bool>,
    registry: SubscriberRegistry,
    policy: SlowConsumerPolicy,
    stats: HubStats,
}

impl HubLoop {
    async fn run(mut self) {
        loop {
            let next = tokio::select! {
                biased;
                _ = self.shutdown.wait_for(|stop| *stop) => None,
                request = self.requests.recv() => request,
            };
            let Some(request) = next else {
                break;
            };

            match request {
                HubRequest::Register { queue, reply } => {
                    let handle = self.registry.admit(queue);
                    debug!(subscriber = %handle, active = self.registry.len(), "Subscriber registered");
                    if reply.send(handle).is_err() {
                        // The caller gave up waiting; nobody holds the receiver.
                        self.registry.remove(handle);
                    }
                }
                HubRequest::Unregister(handle) => {
                    if self.registry.remove(handle) {
                        debug!(subscriber = %handle, active = self.registry.len(), "Subscriber unregistered");
                    }
                }
                HubRequest::Broadcast(kind) => self.broadcast(kind),
                HubRequest::Stats(reply) => {
                    let mut stats = self.stats;
                    stats.subscribers = self.registry.len();
                    let _ = reply.send(stats);
                }
            }
        }

        // Requests still queued are dropped with the receiver when this
        // returns; callers waiting on a reply see HubClosed.
        self.requests.close();
        self.registry.clear();
        self.finished.send_replace(true);
        info!(broadcasts = self.stats.broadcasts, "Event hub stopped");
    }

    fn broadcast(&mut self, kind: EventKind) {
        let payload = match kind {
            EventKind::NewBlock => EnvelopePayload::NewBlock(self.store.chain_snapshot()),
            EventKind::MempoolUpdate => EnvelopePayload::MempoolUpdate,
        };
        let envelope = UpdateEnvelope::new(self.stats.next_seq, chrono::Utc::now().timestamp(), payload);
        self.stats.next_seq += 1;
        self.stats.broadcasts += 1;

        let outcome = self.registry.fan_out(&envelope, self.policy);
        self.stats.delivered += outcome.delivered as u64;
        self.stats.dropped += outcome.dropped as u64;
        self.stats.evicted += outcome.evicted as u64;
        self.stats.pruned += outcome.pruned as u64;

        debug!(
            event = %kind,
            seq = envelope.seq(),
            delivered = outcome.delivered,
            dropped = outcome.dropped,
            "Broadcast"
        );
    }
}
