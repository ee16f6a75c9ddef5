use alloy::providers::{Provider, ProviderBuilder, WsConnect};
use alloy::rpc::types::BlockNumberOrTag;
use futures::StreamExt;
use std::ops::ControlFlow;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::config::ChainConfig;

/// A processed block as seen by the detector: its number and how many transactions it held.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockEvent {
    pub number: u64,
    pub tx_count: u64,
}

/// Backoff schedule for listener RPC calls.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
        }
    }
}

/// Follow the chain head and forward one `BlockEvent` per new block, in order.
/// Subscribes over WebSocket when configured, falling back to HTTP polling.
///
/// A block whose fetch keeps failing is not skipped: the listener holds its position and
/// retries that block on the next head, so every block's transaction count reaches the engine.
pub async fn run_block_listener(
    config: ChainConfig,
    shutdown: CancellationToken,
    events: mpsc::Sender<BlockEvent>,
) -> eyre::Result<()> {
    let retry = RetryPolicy::default();

    if let Some(ws_url) = &config.rpc_ws {
        match listen_ws(ws_url, &retry, &shutdown, &events).await {
            Ok(()) => return Ok(()),
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    "WebSocket connection failed, falling back to HTTP polling"
                );
            }
        }
    }

    let provider = ProviderBuilder::new()
        .connect_http(config.rpc_http.parse().map_err(|e| eyre::eyre!("Invalid RPC URL: {}", e))?);
    let poll_interval = Duration::from_millis(config.poll_interval_ms);

    tracing::info!(poll_interval_ms = config.poll_interval_ms, "HTTP polling active");
    poll_blocks(provider, poll_interval, &retry, &shutdown, &events).await
}

async fn listen_ws(
    ws_url: &str,
    retry: &RetryPolicy,
    shutdown: &CancellationToken,
    events: &mpsc::Sender<BlockEvent>,
) -> eyre::Result<()> {
    let ws = WsConnect::new(ws_url);
    let provider = ProviderBuilder::new().connect_ws(ws).await?;

    let sub = provider.subscribe_blocks().await?;
    let mut stream = sub.into_stream();

    tracing::info!("WebSocket block subscription active");

    let mut next_block: Option<u64> = None;

    loop {
        tokio::select! {
            maybe_header = stream.next() => {
                let Some(header) = maybe_header else {
                    tracing::warn!("Block stream ended");
                    return Err(eyre::eyre!("WebSocket block stream ended"));
                };

                let next = next_block.get_or_insert(header.number);
                let flow = forward_blocks(&provider, retry, next, header.number, shutdown, events).await;
                if flow.is_break() {
                    tracing::info!("Block consumer dropped, stopping listener");
                    break;
                }
            }
            _ = shutdown.cancelled() => {
                tracing::info!("Shutdown received, stopping block listener");
                break;
            }
        }
    }

    Ok(())
}

/// Poll the head every `poll_interval`. The first poll only anchors the position, so the first
/// event is the block after the head seen at startup.
async fn poll_blocks<P: Provider>(
    provider: P,
    poll_interval: Duration,
    retry: &RetryPolicy,
    shutdown: &CancellationToken,
    events: &mpsc::Sender<BlockEvent>,
) -> eyre::Result<()> {
    let mut next_block: Option<u64> = None;

    loop {
        tokio::select! {
            _ = tokio::time::sleep(poll_interval) => {}
            _ = shutdown.cancelled() => {
                tracing::info!("Shutdown received, stopping poller");
                break;
            }
        }

        let head = match retry_rpc(retry, || provider.get_block_number()).await {
            Ok(n) => n,
            Err(e) => {
                tracing::error!(error = %e, "Failed to get block number");
                continue;
            }
        };

        let Some(next) = next_block.as_mut() else {
            tracing::info!(head, "Polling from current head");
            next_block = Some(head.saturating_add(1));
            continue;
        };

        if forward_blocks(&provider, retry, next, head, shutdown, events)
            .await
            .is_break()
        {
            tracing::info!("Block consumer dropped, stopping poller");
            break;
        }
    }

    Ok(())
}

/// Send events for blocks `*next..=head` in order. `*next` only moves past a block once it has
/// been sent or confirmed missing; a fetch that exhausts its retries leaves `*next` on that block.
/// Breaks when the consumer is gone.
async fn forward_blocks<P: Provider>(
    provider: &P,
    retry: &RetryPolicy,
    next: &mut u64,
    head: u64,
    shutdown: &CancellationToken,
    events: &mpsc::Sender<BlockEvent>,
) -> ControlFlow<()> {
    while *next <= head {
        if shutdown.is_cancelled() {
            break;
        }

        let number = *next;
        match retry_rpc(retry, || block_event(provider, number)).await {
            Ok(Some(event)) => {
                if events.send(event).await.is_err() {
                    return ControlFlow::Break(());
                }
            }
            Ok(None) => tracing::warn!(block = number, "Block not found, skipping"),
            Err(e) => {
                tracing::error!(
                    block = number,
                    head,
                    error = %e,
                    "Failed to fetch block, retrying from it on the next head"
                );
                break;
            }
        }

        *next = number + 1;
    }

    ControlFlow::Continue(())
}

async fn block_event<P: Provider>(provider: &P, number: u64) -> eyre::Result<Option<BlockEvent>> {
    let block = provider
        .get_block_by_number(BlockNumberOrTag::Number(number))
        .await?;

    Ok(block.map(|b| BlockEvent {
        number,
        tx_count: b.transactions.len() as u64,
    }))
}

/// Retry an async operation with exponential backoff per `policy`.
/// Handles transient RPC errors (rate limits, network issues).
pub async fn retry_rpc<F, Fut, T, E>(policy: &RetryPolicy, mut f: F) -> eyre::Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut delay = policy.initial_delay;

    for attempt in 0..policy.max_retries {
        match f().await {
            Ok(val) => return Ok(val),
            Err(e) => {
                tracing::warn!(
                    attempt = attempt + 1,
                    max_retries = policy.max_retries,
                    error = %e,
                    delay_ms = delay.as_millis() as u64,
                    "RPC call failed, retrying..."
                );
                tokio::time::sleep(delay).await;
                delay = std::cmp::min(delay * 2, policy.max_delay);
            }
        }
    }

    f().await.map_err(|e| {
        eyre::eyre!("RPC call failed after {} retries: {}", policy.max_retries, e)
    })
}
