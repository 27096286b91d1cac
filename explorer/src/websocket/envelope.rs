//! Update envelopes fanned out by the hub and their wire encoding

use serde::Serialize;
use std::fmt;
use std::sync::Arc;

use crate::error::Result;
use crate::models::ChainSummary;

/// Kind of change a producer signals to the hub.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    NewBlock,
    MempoolUpdate,
}

impl EventKind {
    /// Event discriminator used on the wire.
    pub fn code(&self) -> &'static str {
        match self {
            EventKind::NewBlock => "newblock",
            EventKind::MempoolUpdate => "mempool",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Event-specific content of an envelope.
///
/// Mempool updates carry no payload; receivers pull the current mempool
/// summary themselves.
#[derive(Debug, Clone, PartialEq)]
pub enum EnvelopePayload {
    NewBlock(Arc<ChainSummary>),
    MempoolUpdate,
}

/// Immutable message broadcast by the hub. Cloning is cheap: block
/// snapshots are shared between all subscribers of one broadcast.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateEnvelope {
    seq: u64,
    time: i64,
    payload: EnvelopePayload,
}

#[derive(Serialize)]
struct WsEvent<'a> {
    event: &'static str,
    seq: u64,
    time: i64,
    message: Option<&'a ChainSummary>,
}

impl UpdateEnvelope {
    pub fn new(seq: u64, time: i64, payload: EnvelopePayload) -> Self {
        Self { seq, time, payload }
    }

    pub fn kind(&self) -> EventKind {
        match self.payload {
            EnvelopePayload::NewBlock(_) => EventKind::NewBlock,
            EnvelopePayload::MempoolUpdate => EventKind::MempoolUpdate,
        }
    }

    /// Hub-assigned sequence number, strictly increasing across broadcasts.
    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn time(&self) -> i64 {
        self.time
    }

    pub fn payload(&self) -> &EnvelopePayload {
        &self.payload
    }

    pub fn chain_summary(&self) -> Option<&ChainSummary> {
        match &self.payload {
            EnvelopePayload::NewBlock(summary) => Some(summary.as_ref()),
            EnvelopePayload::MempoolUpdate => None,
        }
    }

    pub fn to_json(&self) -> Result<String> {
        let event = WsEvent {
            event: self.kind().code(),
            seq: self.seq,
            time: self.time,
            message: self.chain_summary(),
        };
        Ok(serde_json::to_string(&event)?)
    }

    /// Newline-terminated JSON, for line-delimited transports.
    pub fn to_json_line(&self) -> Result<String> {
        let mut line = self.to_json()?;
        line.push('\n');
        Ok(line)
    }
}
