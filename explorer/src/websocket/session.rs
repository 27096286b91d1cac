//! Per-connection delivery of hub envelopes to a transport

use async_trait::async_trait;
use std::future::Future;
use tracing::{debug, warn};

use crate::error::Result;
use crate::websocket::envelope::UpdateEnvelope;
use crate::websocket::hub::{EventHub, Subscription};
use crate::websocket::subscriptions::SubscriberHandle;

/// Transport side of a session. Implementations serialize the envelope and
/// write it to their connection.
#[async_trait]
pub trait EnvelopeSink: Send {
    async fn deliver(&mut self, envelope: &UpdateEnvelope) -> Result<()>;

    async fn close(&mut self) {}
}

/// Why a session stopped delivering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The close signal fired, e.g. the client disconnected.
    Closed,
    /// The hub closed the queue: hub stop or eviction as a slow consumer.
    QueueClosed,
    /// Writing to the transport failed.
    TransportFailed,
}

/// One subscriber bound to one transport connection.
///
/// The subscriber handle is released exactly once, when `run` or
/// `run_until` returns. A session dropped without running leaves a closed
/// queue behind, which the hub prunes on its next broadcast.
pub struct Session<S> {
    hub: EventHub,
    subscription: Subscription,
    sink: S,
}

impl<S: EnvelopeSink> Session<S> {
    /// Registers with the hub using its default queue capacity.
    pub async fn open(hub: &EventHub, sink: S) -> Result<Self> {
        let subscription = hub.register().await?;
        Ok(Self::new(hub.clone(), subscription, sink))
    }

    pub fn new(hub: EventHub, subscription: Subscription, sink: S) -> Self {
        Self { hub, subscription, sink }
    }

    pub fn handle(&self) -> SubscriberHandle {
        self.subscription.handle
    }

    /// Delivers until the hub closes the queue or the transport fails.
    pub async fn run(self) -> SessionEnd {
        self.run_until(std::future::pending()).await
    }

    /// Delivers in arrival order until `close` resolves, the hub closes the
    /// queue, or the transport fails, then unregisters.
    pub async fn run_until<F>(self, close: F) -> SessionEnd
    where
        F: Future<Output = ()> + Send,
    {
        let Session { hub, subscription, mut sink } = self;
        let Subscription { handle, mut queue } = subscription;
        debug!(subscriber = %handle, "Session started");

        tokio::pin!(close);
        let end = loop {
            tokio::select! {
                biased;

                _ = &mut close => break SessionEnd::Closed,

                next = queue.recv() => match next {
                    Some(envelope) => {
                        if let Err(e) = sink.deliver(&envelope).await {
                            warn!(subscriber = %handle, seq = envelope.seq(), "Transport write failed: {}", e);
                            break SessionEnd::TransportFailed;
                        }
                    }
                    None => break SessionEnd::QueueClosed,
                },
            }
        };

        drop(queue);
        hub.unregister(handle).await;
        sink.close().await;

        debug!(subscriber = %handle, end = ?end, "Session ended");
        end
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HubConfig;
    use crate::error::ExplorerError;
    use crate::store::SharedStateStore;
    use crate::websocket::envelope::EventKind;
    use crate::websocket::subscriptions::SlowConsumerPolicy;
    use std::sync::Arc;
    use tokio::sync::{mpsc, oneshot};

    struct ChannelSink {
        out: mpsc::UnboundedSender<u64>,
        fail_after: Option<usize>,
        delivered: usize,
    }

    #[async_trait]
    impl EnvelopeSink for ChannelSink {
        async fn deliver(&mut self, envelope: &UpdateEnvelope) -> Result<()> {
            if self.fail_after == Some(self.delivered) {
                return Err(ExplorerError::Transport("broken pipe".to_string()));
            }
            self.delivered += 1;
            self.out
                .send(envelope.seq())
                .map_err(|e| ExplorerError::Transport(e.to_string()))
        }
    }

    fn sink(fail_after: Option<usize>) -> (ChannelSink, mpsc::UnboundedReceiver<u64>) {
        let (out, rx) = mpsc::unbounded_channel();
        (ChannelSink { out, fail_after, delivered: 0 }, rx)
    }

    fn hub() -> EventHub {
        let config = HubConfig {
            control_capacity: 16,
            subscriber_queue: 8,
            slow_consumer: SlowConsumerPolicy::Skip,
        };
        EventHub::spawn(Arc::new(SharedStateStore::new()), &config).0
    }

    #[tokio::test]
    async fn test_delivers_in_order_until_closed() {
        let hub = hub();
        let (sink, mut seen) = sink(None);
        let session = Session::open(&hub, sink).await.unwrap();

        let (close_tx, close_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(session.run_until(async {
            let _ = close_rx.await;
        }));

        for _ in 0..4 {
            hub.broadcast(EventKind::MempoolUpdate).await.unwrap();
        }
        let mut seqs = Vec::new();
        for _ in 0..4 {
            seqs.push(seen.recv().await.unwrap());
        }
        assert_eq!(seqs, vec![1, 2, 3, 4]);

        close_tx.send(()).unwrap();
        assert_eq!(task.await.unwrap(), SessionEnd::Closed);
        assert_eq!(hub.stats().await.unwrap().subscribers, 0);
    }

    #[tokio::test]
    async fn test_transport_failure_unregisters() {
        let hub = hub();
        let (sink, _seen) = sink(Some(1));
        let session = Session::open(&hub, sink).await.unwrap();
        let task = tokio::spawn(session.run());

        hub.broadcast(EventKind::NewBlock).await.unwrap();
        hub.broadcast(EventKind::NewBlock).await.unwrap();

        assert_eq!(task.await.unwrap(), SessionEnd::TransportFailed);
        assert_eq!(hub.stats().await.unwrap().subscribers, 0);
    }

    #[tokio::test]
    async fn test_hub_stop_ends_session() {
        let hub = hub();
        let (sink, _seen) = sink(None);
        let session = Session::open(&hub, sink).await.unwrap();
        let task = tokio::spawn(session.run());

        hub.stop().await;
        assert_eq!(task.await.unwrap(), SessionEnd::QueueClosed);
    }

    #[tokio::test]
    async fn test_open_after_stop_fails() {
        let hub = hub();
        hub.stop().await;
        let (sink, _seen) = sink(None);
        assert!(matches!(Session::open(&hub, sink).await, Err(ExplorerError::HubClosed)));
    }
}
