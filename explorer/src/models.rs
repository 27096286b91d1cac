//! Data models for the explorer

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Best-block fields shown on the home and blocks pages.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BlockBasic {
    pub height: i64,
    pub size: i32,
    pub valid: bool,
    #[serde(rename = "votes")]
    pub voters: u16,
    #[serde(rename = "tx")]
    pub transactions: usize,
    #[serde(rename = "tickets")]
    pub fresh_stake: u8,
    pub revocations: u32,
    #[serde(rename = "time")]
    pub block_time: i64,
    pub formatted_time: String,
    pub formatted_bytes: String,
}

/// Next-block subsidy split in atoms.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockSubsidy {
    pub total: i64,
    pub pow: i64,
    pub pos: i64,
    pub dev: i64,
}

/// Chain parameters surfaced to the home page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainParams {
    pub window_size: i64,
    pub reward_window_size: i64,
    pub target_pool_size: i64,
    #[serde(rename = "target_block_time")]
    pub block_time: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TicketPoolInfo {
    pub size: u32,
    pub value: f64,
    #[serde(rename = "valavg")]
    pub value_avg: f64,
    #[serde(rename = "percent")]
    pub percentage: f64,
    pub target: u16,
    pub percent_target: f64,
}

/// Values derived from the best block that are not part of the block itself.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtraInfo {
    pub coin_supply: i64,
    #[serde(rename = "sdiff")]
    pub stake_diff: f64,
    #[serde(rename = "window_idx")]
    pub idx_block_in_window: i64,
    #[serde(rename = "reward_idx")]
    pub idx_in_reward_window: i64,
    pub difficulty: f64,
    pub dev_fund: i64,
    pub dev_address: String,
    #[serde(rename = "roi")]
    pub ticket_roi: f64,
    pub roi_period: String,
    #[serde(rename = "subsidy")]
    pub next_block_subsidy: BlockSubsidy,
    pub params: ChainParams,
    pub pool_info: TicketPoolInfo,
}

/// The latest block summary together with its derived info. Replaced
/// wholesale on every new block.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChainSummary {
    pub block: BlockBasic,
    pub extra: ExtraInfo,
}

impl ChainSummary {
    pub fn height(&self) -> i64 {
        self.block.height
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TxType {
    #[default]
    Regular,
    Ticket,
    Vote,
    Revocation,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BlockValidation {
    pub hash: String,
    pub height: i64,
    pub validity: bool,
}

/// Vote details attached to mempool votes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VoteInfo {
    #[serde(rename = "block_validation")]
    pub validation: BlockValidation,
    #[serde(rename = "vote_version")]
    pub version: u32,
    #[serde(rename = "vote_bits")]
    pub bits: u16,
    pub ticket_spent: String,
    pub mempool_ticket_index: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MempoolTx {
    pub hash: String,
    pub time: i64,
    pub size: i32,
    #[serde(rename = "total")]
    pub total_out: f64,
    #[serde(rename = "Type")]
    pub tx_type: TxType,
    pub vote_info: Option<VoteInfo>,
}

/// Pending transaction summary for the home and mempool pages.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MempoolSummary {
    #[serde(rename = "block_height")]
    pub last_block_height: i64,
    #[serde(rename = "block_time")]
    pub last_block_time: i64,
    #[serde(rename = "total")]
    pub total_out: f64,
    #[serde(rename = "size")]
    pub total_size: i32,
    pub num_tickets: usize,
    pub num_votes: usize,
    pub num_regular: usize,
    pub num_revokes: usize,
    pub num_all: usize,
    #[serde(rename = "latest")]
    pub latest_transactions: Vec<MempoolTx>,
    #[serde(rename = "formatted_size")]
    pub formatted_total_size: String,
    pub ticket_indexes: HashMap<String, usize>,
    #[serde(rename = "tx")]
    pub transactions: Vec<MempoolTx>,
    pub tickets: Vec<MempoolTx>,
    pub votes: Vec<MempoolTx>,
    #[serde(rename = "revs")]
    pub revocations: Vec<MempoolTx>,
}

impl MempoolSummary {
    /// Builds the summary from the full list of pending transactions.
    ///
    /// Per-type lists and `latest_transactions` are ordered newest first;
    /// `latest_transactions` keeps at most `latest_limit` entries. Ticket
    /// positions in `ticket_indexes` refer to the ordered `tickets` list, and
    /// votes spending one of those tickets carry its position.
    pub fn build(
        last_block_height: i64,
        last_block_time: i64,
        mut txs: Vec<MempoolTx>,
        latest_limit: usize,
    ) -> Self {
        txs.sort_by(|a, b| b.time.cmp(&a.time));

        let mut summary = MempoolSummary {
            last_block_height,
            last_block_time,
            ..Default::default()
        };

        for tx in &txs {
            summary.total_out += tx.total_out;
            summary.total_size = summary.total_size.saturating_add(tx.size);
        }
        summary.num_all = txs.len();
        summary.latest_transactions = txs.iter().take(latest_limit).cloned().collect();

        for tx in txs {
            match tx.tx_type {
                TxType::Regular => summary.transactions.push(tx),
                TxType::Ticket => summary.tickets.push(tx),
                TxType::Vote => summary.votes.push(tx),
                TxType::Revocation => summary.revocations.push(tx),
            }
        }
        summary.num_regular = summary.transactions.len();
        summary.num_tickets = summary.tickets.len();
        summary.num_votes = summary.votes.len();
        summary.num_revokes = summary.revocations.len();

        summary.ticket_indexes = summary
            .tickets
            .iter()
            .enumerate()
            .map(|(idx, tx)| (tx.hash.clone(), idx))
            .collect();
        for vote in &mut summary.votes {
            if let Some(info) = vote.vote_info.as_mut() {
                if let Some(&idx) = summary.ticket_indexes.get(&info.ticket_spent) {
                    info.mempool_ticket_index = idx;
                }
            }
        }
        summary.formatted_total_size = format_bytes(summary.total_size.max(0) as u64);

        summary
    }

    pub fn ticket_index(&self, ticket: &str) -> Option<usize> {
        self.ticket_indexes.get(ticket).copied()
    }
}

/// Formats a byte count with SI units, e.g. `"1.2 kB"` or `"312 B"`.
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 7] = ["B", "kB", "MB", "GB", "TB", "PB", "EB"];
    if bytes < 10 {
        return format!("{} B", bytes);
    }
    let exp = ((bytes as f64).ln() / 1000f64.ln()).floor() as usize;
    let exp = exp.min(UNITS.len() - 1);
    let value = ((bytes as f64 / 1000f64.powi(exp as i32)) * 10.0 + 0.5).floor() / 10.0;
    if value < 10.0 {
        format!("{:.1} {}", value, UNITS[exp])
    } else {
        format!("{:.0} {}", value, UNITS[exp])
    }
}
