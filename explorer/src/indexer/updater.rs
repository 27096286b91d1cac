//! Entry points used by the ingestion pipeline to publish new chain and
//! mempool state.
//!
//! Each update replaces a record in the store and hands back a
//! [`PendingNotification`]; calling `notify` on it signals the hub, so the
//! signal is always sent after the record it announces has been written.

use chrono::DateTime;
use std::sync::Arc;
use tracing::debug;

use crate::error::Result;
use crate::models::{
    format_bytes, BlockBasic, BlockSubsidy, ChainParams, ChainSummary, ExtraInfo, MempoolSummary, MempoolTx,
    TicketPoolInfo,
};
use crate::store::SharedStateStore;
use crate::websocket::envelope::EventKind;
use crate::websocket::hub::EventHub;

/// Block record as produced by the ingestion pipeline.
#[derive(Debug, Clone, Default)]
pub struct BlockData {
    pub height: u32,
    pub size: u32,
    pub valid: bool,
    pub voters: u16,
    pub fresh_stake: u8,
    pub revocations: u32,
    pub tx_count: usize,
    pub time: i64,
    pub difficulty: f64,
    pub coin_supply: i64,
    pub stake_diff: f64,
    pub idx_block_in_window: i64,
    pub next_block_subsidy: BlockSubsidy,
    pub pool_info: TicketPoolInfo,
}

/// Pending transactions as produced by the mempool monitor.
#[derive(Debug, Clone, Default)]
pub struct MempoolSnapshot {
    pub block_height: i64,
    pub block_time: i64,
    pub transactions: Vec<MempoolTx>,
}

/// Signal owed to the hub for a store update that has already been applied.
#[must_use = "subscribers are not told about the update until `notify` is called"]
pub struct PendingNotification {
    hub: EventHub,
    kind: EventKind,
}

impl PendingNotification {
    pub fn kind(&self) -> EventKind {
        self.kind
    }

    pub async fn notify(self) -> Result<()> {
        self.hub.broadcast(self.kind).await
    }
}

#[derive(Clone)]
pub struct LiveUpdater {
    store: Arc<SharedStateStore>,
    hub: EventHub,
    params: ChainParams,
    latest_limit: usize,
}

impl LiveUpdater {
    pub fn new(store: Arc<SharedStateStore>, hub: EventHub, params: ChainParams, latest_limit: usize) -> Self {
        Self {
            store,
            hub,
            params,
            latest_limit,
        }
    }

    pub fn update_chain_summary(&self, summary: ChainSummary) -> PendingNotification {
        self.store.set_chain_summary(summary);
        self.pending(EventKind::NewBlock)
    }

    pub async fn notify_new_block(&self) -> Result<()> {
        self.hub.broadcast(EventKind::NewBlock).await
    }

    pub fn update_mempool_summary(&self, summary: MempoolSummary) -> PendingNotification {
        self.store.set_mempool_summary(summary);
        self.pending(EventKind::MempoolUpdate)
    }

    pub async fn notify_mempool_changed(&self) -> Result<()> {
        self.hub.broadcast(EventKind::MempoolUpdate).await
    }

    /// Publishes a newly connected block.
    pub async fn store_block(&self, data: &BlockData) -> Result<()> {
        let summary = self.chain_summary_from(data);
        let height = summary.height();
        self.update_chain_summary(summary).notify().await?;
        debug!("Got new block {}", height);
        Ok(())
    }

    /// Publishes a new mempool state.
    pub async fn store_mempool(&self, snapshot: MempoolSnapshot) -> Result<()> {
        let summary = MempoolSummary::build(
            snapshot.block_height,
            snapshot.block_time,
            snapshot.transactions,
            self.latest_limit,
        );
        debug!(pending = summary.num_all, tickets = summary.num_tickets, "Mempool updated");
        self.update_mempool_summary(summary).notify().await
    }

    pub fn chain_summary_from(&self, data: &BlockData) -> ChainSummary {
        let formatted_time = DateTime::from_timestamp(data.time, 0)
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_default();
        let idx_in_reward_window = if self.params.reward_window_size > 0 {
            i64::from(data.height) % self.params.reward_window_size
        } else {
            0
        };

        ChainSummary {
            block: BlockBasic {
                height: i64::from(data.height),
                size: i32::try_from(data.size).unwrap_or(i32::MAX),
                valid: data.valid,
                voters: data.voters,
                transactions: data.tx_count,
                fresh_stake: data.fresh_stake,
                revocations: data.revocations,
                block_time: data.time,
                formatted_time,
                formatted_bytes: format_bytes(u64::from(data.size)),
            },
            extra: ExtraInfo {
                coin_supply: data.coin_supply,
                stake_diff: data.stake_diff,
                idx_block_in_window: data.idx_block_in_window,
                idx_in_reward_window,
                difficulty: data.difficulty,
                next_block_subsidy: data.next_block_subsidy,
                params: self.params,
                pool_info: data.pool_info.clone(),
                ..Default::default()
            },
        }
    }

    fn pending(&self, kind: EventKind) -> PendingNotification {
        PendingNotification {
            hub: self.hub.clone(),
            kind,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ChainConfig, HubConfig};
    use crate::error::ExplorerError;
    use crate::models::TxType;

    fn updater() -> (LiveUpdater, EventHub, Arc<SharedStateStore>) {
        let store = Arc::new(SharedStateStore::new());
        let (hub, _task) = EventHub::spawn(store.clone(), &HubConfig::default());
        let updater = LiveUpdater::new(store.clone(), hub.clone(), ChainConfig::default().params(), 2);
        (updater, hub, store)
    }

    #[tokio::test]
    async fn test_store_block_fills_summary() {
        let (updater, hub, store) = updater();
        let mut sub = hub.register().await.unwrap();

        let data = BlockData {
            height: 6150,
            size: 1234,
            valid: true,
            voters: 5,
            tx_count: 12,
            time: 0,
            coin_supply: 900,
            idx_block_in_window: 11,
            next_block_subsidy: BlockSubsidy { total: 10, pow: 6, pos: 3, dev: 1 },
            ..Default::default()
        };
        updater.store_block(&data).await.unwrap();

        let summary = store.chain_summary();
        assert_eq!(summary.height(), 6150);
        assert_eq!(summary.block.formatted_bytes, "1.2 kB");
        assert_eq!(summary.block.formatted_time, "1970-01-01 00:00:00");
        assert_eq!(summary.extra.idx_in_reward_window, 6);
        assert_eq!(summary.extra.params.window_size, 144);
        assert_eq!(summary.extra.next_block_subsidy.pow, 6);

        let envelope = sub.queue.recv().await.unwrap();
        assert_eq!(envelope.chain_summary(), Some(&summary));
    }

    #[tokio::test]
    async fn test_oversized_block_size_is_clamped() {
        let (updater, _hub, _store) = updater();

        let summary = updater.chain_summary_from(&BlockData {
            size: u32::MAX,
            ..Default::default()
        });
        assert_eq!(summary.block.size, i32::MAX);
        assert_eq!(summary.block.formatted_bytes, "4.3 GB");
    }

    #[tokio::test]
    async fn test_store_mempool_sends_marker() {
        let (updater, hub, store) = updater();
        let mut sub = hub.register().await.unwrap();

        let snapshot = MempoolSnapshot {
            block_height: 10,
            block_time: 100,
            transactions: vec![
                MempoolTx { hash: "t".into(), time: 3, tx_type: TxType::Ticket, ..Default::default() },
                MempoolTx { hash: "r".into(), time: 2, ..Default::default() },
                MempoolTx { hash: "v".into(), time: 1, tx_type: TxType::Vote, ..Default::default() },
            ],
        };
        updater.store_mempool(snapshot).await.unwrap();

        let envelope = sub.queue.recv().await.unwrap();
        assert_eq!(envelope.kind(), EventKind::MempoolUpdate);
        assert!(envelope.chain_summary().is_none());

        let mempool = store.mempool_summary();
        assert_eq!(mempool.num_all, 3);
        assert_eq!(mempool.latest_transactions.len(), 2);
        assert_eq!(mempool.ticket_index("t"), Some(0));
    }

    #[tokio::test]
    async fn test_update_without_notify_is_silent() {
        let (updater, hub, store) = updater();
        let mut sub = hub.register().await.unwrap();

        let mut summary = ChainSummary::default();
        summary.block.height = 5;
        let pending = updater.update_chain_summary(summary);
        assert_eq!(pending.kind(), EventKind::NewBlock);
        assert_eq!(store.chain_summary().height(), 5);

        hub.stats().await.unwrap();
        assert!(sub.queue.try_recv().is_err());

        pending.notify().await.unwrap();
        assert_eq!(sub.queue.recv().await.unwrap().chain_summary().unwrap().height(), 5);
    }

    #[tokio::test]
    async fn test_notify_after_stop_is_hub_closed() {
        let (updater, hub, _store) = updater();
        hub.stop().await;
        assert!(matches!(updater.notify_new_block().await, Err(ExplorerError::HubClosed)));
        assert!(matches!(updater.notify_mempool_changed().await, Err(ExplorerError::HubClosed)));
    }
}
