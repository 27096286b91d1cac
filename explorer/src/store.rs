//! Guarded store for the latest chain and mempool summaries.
//!
//! Each record sits behind its own reader/writer lock so a slow mempool
//! update never holds up a block read and vice versa. Reads hand out
//! owned copies; no guard ever escapes this module, which keeps locks from
//! being held across a hub call or any `.await`.

use parking_lot::RwLock;
use std::sync::Arc;

use crate::models::{ChainSummary, MempoolSummary};

#[derive(Default)]
pub struct SharedStateStore {
    chain: RwLock<Arc<ChainSummary>>,
    mempool: RwLock<Arc<MempoolSummary>>,
}

impl SharedStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the chain summary. Readers see either the old or the new
    /// record, never a mix.
    pub fn set_chain_summary(&self, summary: ChainSummary) {
        let summary = Arc::new(summary);
        *self.chain.write() = summary;
    }

    pub fn chain_summary(&self) -> ChainSummary {
        self.chain.read().as_ref().clone()
    }

    /// Shared snapshot of the chain summary, used by the hub to fan out
    /// one allocation to every subscriber.
    pub fn chain_snapshot(&self) -> Arc<ChainSummary> {
        self.chain.read().clone()
    }

    pub fn set_mempool_summary(&self, summary: MempoolSummary) {
        let summary = Arc::new(summary);
        *self.mempool.write() = summary;
    }

    pub fn mempool_summary(&self) -> MempoolSummary {
        self.mempool.read().as_ref().clone()
    }
}
