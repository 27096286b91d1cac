//! Live update distribution: event hub, subscriber sessions and the
//! WebSocket transport

pub mod envelope;
pub mod hub;
pub mod server;
pub mod session;
pub mod subscriptions;

pub use envelope::{EnvelopePayload, EventKind, UpdateEnvelope};
pub use hub::{EventHub, HubStats, Subscription};
pub use session::{EnvelopeSink, Session, SessionEnd};
pub use subscriptions::{SlowConsumerPolicy, SubscriberHandle};
