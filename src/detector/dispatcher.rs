use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::chain::BlockEvent;
use crate::output::AlertSink;

use super::engine::ReconciliationEngine;

/// Counts accumulated over the life of a dispatcher.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DispatchStats {
    pub blocks: u64,
    pub alerts_delivered: u64,
    pub persist_failures: u64,
    pub delivery_failures: u64,
}

/// Feed block events to the engine one at a time and hand every batch to the sink.
/// A batch the sink rejects goes back to the front of the queue and is retried with the next block.
///
/// Runs until the channel closes or `shutdown` fires, then flushes the counters once.
pub async fn run_dispatcher(
    mut engine: ReconciliationEngine,
    mut sink: Box<dyn AlertSink>,
    mut events: mpsc::Receiver<BlockEvent>,
    shutdown: CancellationToken,
) -> DispatchStats {
    let mut stats = DispatchStats::default();

    loop {
        let event = tokio::select! {
            maybe_event = events.recv() => match maybe_event {
                Some(event) => event,
                None => {
                    tracing::info!("Block channel closed, stopping dispatcher");
                    break;
                }
            },
            _ = shutdown.cancelled() => {
                tracing::info!("Shutdown received, stopping dispatcher");
                break;
            }
        };

        let outcome = engine.on_block_processed(event.number, event.tx_count).await;
        stats.blocks += 1;

        if outcome.persist_error.is_some() {
            stats.persist_failures += 1;
        }

        let batch_len = outcome.alerts.len();
        if batch_len > 0 {
            match sink.deliver(&outcome.alerts).await {
                Ok(()) => stats.alerts_delivered += batch_len as u64,
                Err(e) => {
                    stats.delivery_failures += 1;
                    tracing::error!(
                        block = event.number,
                        sink = sink.sink_type(),
                        alerts = batch_len,
                        error = %e,
                        "Failed to deliver alerts, requeued for the next block"
                    );
                    engine.requeue_undelivered(outcome.alerts);
                }
            }
        }

        let snapshot = engine.snapshot();
        tracing::info!(
            block = event.number,
            txs = event.tx_count,
            alerts = batch_len,
            pending = snapshot.pending_alerts,
            watermark = snapshot.last_processed_block,
            anomaly_score = %snapshot.anomaly_score,
            "Processed block"
        );
    }

    if engine.persist_counters().await.is_err() {
        stats.persist_failures += 1;
    }

    stats
}
