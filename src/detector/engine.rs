use futures::future::join_all;
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use crate::chain::classifier::{ContractClassifier, LogClassifier};
use crate::chain::swap;
use crate::config::DetectorConfig;
use crate::db::counters::CounterStore;
use crate::error::StoreError;
use crate::relay::{RelayBlock, RelayFeed, RelayTransaction};

use super::queue::PendingQueue;
use super::score;
use super::types::{AlertCategory, AlertRecord};

/// Cumulative counters behind the anomaly score.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counters {
    pub relayed_tx_count: u64,
    pub total_tx_count: u64,
}

/// Result of one block invocation.
#[derive(Debug, Default)]
pub struct BlockOutcome {
    /// Oldest pending alerts, at most `max_alerts_per_block`.
    pub alerts: Vec<AlertRecord>,
    /// Set when this block was a persistence checkpoint and the write failed.
    pub persist_error: Option<StoreError>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSnapshot {
    pub last_processed_block: u64,
    pub counters: Counters,
    pub pending_alerts: usize,
    pub anomaly_score: String,
}

/// A transaction that passed every filter, before it is numbered and scored.
struct Candidate {
    category: AlertCategory,
    involved_addresses: BTreeSet<String>,
}

/// Reconciles each processed block against the relay feed and scores relayed contract calls.
///
/// Invocations take `&mut self` and so are serialized by construction. Relay blocks at or below
/// the watermark are never evaluated again; a transaction whose code or log lookup failed is
/// simply excluded once its block has been evaluated.
pub struct ReconciliationEngine {
    config: DetectorConfig,
    feed: Arc<dyn RelayFeed>,
    contracts: Arc<dyn ContractClassifier>,
    logs: Arc<dyn LogClassifier>,
    store: Arc<dyn CounterStore>,
    counters: Counters,
    last_processed_block: u64,
    pending: PendingQueue,
}

impl ReconciliationEngine {
    pub fn new(
        config: DetectorConfig,
        feed: Arc<dyn RelayFeed>,
        contracts: Arc<dyn ContractClassifier>,
        logs: Arc<dyn LogClassifier>,
        store: Arc<dyn CounterStore>,
    ) -> Self {
        let pending = PendingQueue::new(config.max_alerts_per_block, config.max_pending_alerts);
        Self {
            config,
            feed,
            contracts,
            logs,
            store,
            counters: Counters::default(),
            last_processed_block: 0,
            pending,
        }
    }

    /// Load counters persisted by earlier runs. Call once before the first block.
    pub async fn initialize(&mut self) {
        self.counters = Counters {
            relayed_tx_count: self.store.load(&self.config.relayed_key).await,
            total_tx_count: self.store.load(&self.config.total_key).await,
        };

        tracing::info!(
            relayed = self.counters.relayed_tx_count,
            total = self.counters.total_tx_count,
            "Counters loaded"
        );
    }

    /// Handle one processed chain block carrying `tx_count` transactions.
    pub async fn on_block_processed(&mut self, block_number: u64, tx_count: u64) -> BlockOutcome {
        let blocks = match self.feed.fetch_recent_blocks().await {
            Ok(blocks) => blocks,
            Err(e) => {
                tracing::warn!(block = block_number, error = %e, "Relay feed unavailable, skipping block");
                return BlockOutcome::default();
            }
        };

        self.counters.total_tx_count = self.counters.total_tx_count.saturating_add(tx_count);

        let start_watermark = self.last_processed_block;
        let mut seen = HashSet::new();
        let mut new_alerts = Vec::new();

        for relay_block in &blocks {
            if relay_block.block_number <= start_watermark || !seen.insert(relay_block.block_number) {
                continue;
            }

            let candidates = self.evaluate_block(relay_block).await;
            for (tx, candidate) in relay_block.transactions.iter().zip(candidates) {
                if let Some(candidate) = candidate {
                    new_alerts.push(self.score_alert(relay_block.block_number, tx, candidate));
                }
            }

            self.last_processed_block = self.last_processed_block.max(relay_block.block_number);
        }

        let new_count = new_alerts.len();
        let dropped = self.pending.extend(new_alerts);
        if dropped > 0 {
            tracing::warn!(dropped, "Pending alert queue full, dropped oldest undelivered alerts");
        }

        let persist_error = if block_number.checked_rem(self.config.persist_interval) == Some(0) {
            self.persist_counters().await.err()
        } else {
            None
        };

        let alerts = self.pending.next_batch();

        tracing::debug!(
            block = block_number,
            relay_blocks = blocks.len(),
            new_alerts = new_count,
            delivered = alerts.len(),
            pending = self.pending.len(),
            watermark = self.last_processed_block,
            "Block reconciled"
        );

        BlockOutcome {
            alerts,
            persist_error,
        }
    }

    /// Return a batch the sink rejected to the head of the pending queue, so it goes out again
    /// before anything newer.
    pub fn requeue_undelivered(&mut self, alerts: Vec<AlertRecord>) {
        let returned = alerts.len();
        let dropped = self.pending.requeue(alerts);
        if dropped > 0 {
            tracing::warn!(dropped, "Pending alert queue full, dropped oldest undelivered alerts");
        }
        tracing::debug!(returned, pending = self.pending.len(), "Undelivered alerts requeued");
    }

    /// Write both counters to the store. Attempts both writes and reports the first failure.
    pub async fn persist_counters(&self) -> Result<(), StoreError> {
        let relayed = self
            .store
            .persist(self.counters.relayed_tx_count, &self.config.relayed_key)
            .await;
        let total = self
            .store
            .persist(self.counters.total_tx_count, &self.config.total_key)
            .await;

        match relayed.and(total) {
            Ok(()) => {
                tracing::info!(
                    relayed = self.counters.relayed_tx_count,
                    total = self.counters.total_tx_count,
                    "Counters persisted"
                );
                Ok(())
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to persist counters");
                Err(e)
            }
        }
    }

    pub fn snapshot(&self) -> EngineSnapshot {
        EngineSnapshot {
            last_processed_block: self.last_processed_block,
            counters: self.counters,
            pending_alerts: self.pending.len(),
            anomaly_score: score::format_score(score::anomaly_score(
                self.counters.relayed_tx_count,
                self.counters.total_tx_count,
            )),
        }
    }

    /// Classify every transaction of a relay block concurrently. The result is index-aligned
    /// with `block.transactions`.
    async fn evaluate_block(&self, block: &RelayBlock) -> Vec<Option<Candidate>> {
        join_all(
            block
                .transactions
                .iter()
                .map(|tx| self.evaluate_transaction(block.block_number, tx)),
        )
        .await
    }

    async fn evaluate_transaction(
        &self,
        block_number: u64,
        tx: &RelayTransaction,
    ) -> Option<Candidate> {
        if tx.bundle_type.is_mempool() {
            return None;
        }

        match self.contracts.has_code(&tx.to_address).await {
            Ok(true) => {}
            Ok(false) => return None,
            Err(e) => {
                tracing::warn!(
                    block = block_number,
                    tx = %tx.transaction_hash,
                    error = %e,
                    "Contract lookup failed, excluding transaction"
                );
                return None;
            }
        }

        let logs = match self.logs.get_logs(&tx.transaction_hash).await {
            Ok(logs) => logs,
            Err(e) => {
                tracing::warn!(
                    block = block_number,
                    tx = %tx.transaction_hash,
                    error = %e,
                    "Log lookup failed, excluding transaction"
                );
                return None;
            }
        };

        let category = if logs.iter().any(swap::is_swap_log) {
            AlertCategory::Swap
        } else {
            AlertCategory::Generic
        };

        let involved_addresses = logs
            .iter()
            .map(|log| format!("0x{}", hex::encode(log.address.as_slice())))
            .collect();

        Some(Candidate {
            category,
            involved_addresses,
        })
    }

    fn score_alert(
        &mut self,
        block_number: u64,
        tx: &RelayTransaction,
        candidate: Candidate,
    ) -> AlertRecord {
        self.counters.relayed_tx_count = self.counters.relayed_tx_count.saturating_add(1);
        let anomaly_score = score::format_score(score::anomaly_score(
            self.counters.relayed_tx_count,
            self.counters.total_tx_count,
        ));

        AlertRecord {
            category: candidate.category,
            from_address: tx.from_address.clone(),
            to_address: tx.to_address.clone(),
            transaction_hash: tx.transaction_hash.clone(),
            block_number,
            involved_addresses: candidate.involved_addresses,
            anomaly_score,
        }
    }
}
