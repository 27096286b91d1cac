//! Subscriber registry owned by the event hub loop

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, warn};

use crate::websocket::envelope::UpdateEnvelope;

/// Opaque token identifying one registered subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberHandle(u64);

impl fmt::Display for SubscriberHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// What the hub does when a subscriber's queue is full at broadcast time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlowConsumerPolicy {
    /// Drop this event for the subscriber and keep it registered.
    #[default]
    Skip,
    /// Remove the subscriber, closing its queue.
    Evict,
}

/// Outcome of offering one envelope to every subscriber.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FanOut {
    pub delivered: usize,
    pub dropped: usize,
    pub evicted: usize,
    pub pruned: usize,
}

/// Registry of live subscribers. It has a single owner, the hub loop, so it
/// needs no lock of its own.
pub struct SubscriberRegistry {
    subscribers: HashMap<SubscriberHandle, mpsc::Sender<UpdateEnvelope>>,
    next_id: u64,
}

impl SubscriberRegistry {
    pub fn new() -> Self {
        Self {
            subscribers: HashMap::new(),
            next_id: 1,
        }
    }

    /// Admits a subscriber fed through `queue` and returns its handle.
    pub fn admit(&mut self, queue: mpsc::Sender<UpdateEnvelope>) -> SubscriberHandle {
        let handle = SubscriberHandle(self.next_id);
        self.next_id += 1;
        self.subscribers.insert(handle, queue);
        handle
    }

    /// Removes a subscriber. Returns false for unknown or already removed
    /// handles.
    pub fn remove(&mut self, handle: SubscriberHandle) -> bool {
        self.subscribers.remove(&handle).is_some()
    }

    pub fn contains(&self, handle: SubscriberHandle) -> bool {
        self.subscribers.contains_key(&handle)
    }

    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }

    /// Drops every queue sender, which closes the subscribers' queues.
    pub fn clear(&mut self) {
        self.subscribers.clear();
    }

    /// Offers `envelope` to every subscriber without waiting on any of them.
    pub fn fan_out(&mut self, envelope: &UpdateEnvelope, policy: SlowConsumerPolicy) -> FanOut {
        let mut outcome = FanOut::default();
        let mut gone = Vec::new();

        for (handle, queue) in self.subscribers.iter() {
            match queue.try_send(envelope.clone()) {
                Ok(()) => outcome.delivered += 1,
                Err(TrySendError::Full(_)) => match policy {
                    SlowConsumerPolicy::Skip => {
                        outcome.dropped += 1;
                        warn!(subscriber = %handle, seq = envelope.seq(), "Queue full, dropping event for slow subscriber");
                    }
                    SlowConsumerPolicy::Evict => {
                        outcome.dropped += 1;
                        outcome.evicted += 1;
                        warn!(subscriber = %handle, seq = envelope.seq(), "Queue full, evicting slow subscriber");
                        gone.push(*handle);
                    }
                },
                Err(TrySendError::Closed(_)) => {
                    outcome.pruned += 1;
                    debug!(subscriber = %handle, "Subscriber queue closed, pruning");
                    gone.push(*handle);
                }
            }
        }

        for handle in gone {
            self.subscribers.remove(&handle);
        }
        outcome
    }
}

impl Default for SubscriberRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::websocket::envelope::EnvelopePayload;

    fn envelope(seq: u64) -> UpdateEnvelope {
        UpdateEnvelope::new(seq, 0, EnvelopePayload::MempoolUpdate)
    }

    #[test]
    fn test_handles_are_unique() {
        let mut registry = SubscriberRegistry::new();
        let (tx, _rx) = mpsc::channel(1);
        let a = registry.admit(tx.clone());
        let b = registry.admit(tx);
        assert_ne!(a, b);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_remove_is_idempotent() {
        let mut registry = SubscriberRegistry::new();
        let (tx, _rx) = mpsc::channel(1);
        let handle = registry.admit(tx);

        assert!(registry.remove(handle));
        assert!(!registry.remove(handle));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_skip_policy_keeps_slow_subscriber() {
        let mut registry = SubscriberRegistry::new();
        let (slow_tx, mut slow_rx) = mpsc::channel(1);
        let (fast_tx, mut fast_rx) = mpsc::channel(4);
        let slow = registry.admit(slow_tx);
        registry.admit(fast_tx);

        let first = registry.fan_out(&envelope(1), SlowConsumerPolicy::Skip);
        assert_eq!(first.delivered, 2);

        let second = registry.fan_out(&envelope(2), SlowConsumerPolicy::Skip);
        assert_eq!(second.delivered, 1);
        assert_eq!(second.dropped, 1);
        assert!(registry.contains(slow));

        assert_eq!(slow_rx.try_recv().unwrap().seq(), 1);
        assert!(slow_rx.try_recv().is_err());
        assert_eq!(fast_rx.try_recv().unwrap().seq(), 1);
        assert_eq!(fast_rx.try_recv().unwrap().seq(), 2);
    }

    #[test]
    fn test_evict_policy_removes_slow_subscriber() {
        let mut registry = SubscriberRegistry::new();
        let (tx, _rx) = mpsc::channel(1);
        let handle = registry.admit(tx);

        registry.fan_out(&envelope(1), SlowConsumerPolicy::Evict);
        let outcome = registry.fan_out(&envelope(2), SlowConsumerPolicy::Evict);

        assert_eq!(outcome.evicted, 1);
        assert!(!registry.contains(handle));
    }

    #[test]
    fn test_closed_queue_is_pruned() {
        let mut registry = SubscriberRegistry::new();
        let (tx, rx) = mpsc::channel(1);
        registry.admit(tx);
        drop(rx);

        let outcome = registry.fan_out(&envelope(1), SlowConsumerPolicy::Skip);
        assert_eq!(outcome.pruned, 1);
        assert!(registry.is_empty());
    }
}
