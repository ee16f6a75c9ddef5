use std::sync::Arc;
use std::time::Duration;

use alloy::providers::ProviderBuilder;
use sqlx::postgres::PgPoolOptions;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use relay_watch::chain::{run_block_listener, RpcClassifier};
use relay_watch::config::{Config, LoggingConfig};
use relay_watch::db::{CounterStore, MemoryCounterStore, PgCounterStore};
use relay_watch::detector::{run_dispatcher, ReconciliationEngine};
use relay_watch::output::{AlertSink, FanoutSink, JsonlSink, LogSink};
use relay_watch::relay::FlashbotsFeed;

fn init_tracing(logging: &LoggingConfig) {
    // Set RUST_LOG to override the default level
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    if logging.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    }
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    color_eyre::install()?;

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.toml".to_string());

    let config = Config::load(&config_path)?;
    init_tracing(&config.logging);

    tracing::info!("Relay watch starting, configuration loaded from {}", config_path);

    // Counter persistence
    let store: Arc<dyn CounterStore> = match &config.database.url {
        Some(url) => {
            let pool = PgPoolOptions::new()
                .max_connections(config.database.max_connections)
                .connect(url)
                .await
                .map_err(|e| eyre::eyre!("Failed to connect to database: {}", e))?;

            tracing::info!("Connected to PostgreSQL");

            sqlx::migrate!("./migrations")
                .run(&pool)
                .await
                .map_err(|e| eyre::eyre!("Failed to run migrations: {}", e))?;

            tracing::info!("Database migrations complete");
            Arc::new(PgCounterStore::new(pool))
        }
        None => {
            tracing::warn!("No database configured, counters will not survive a restart");
            Arc::new(MemoryCounterStore::new())
        }
    };

    // Collaborators
    let feed = FlashbotsFeed::new(
        config.relay.url.clone(),
        Duration::from_millis(config.relay.timeout_ms),
    )?;

    let provider = ProviderBuilder::new().connect_http(
        config
            .chain
            .rpc_http
            .parse()
            .map_err(|e| eyre::eyre!("Invalid RPC URL: {}", e))?,
    );
    let classifier = Arc::new(RpcClassifier::new(provider));

    let mut engine = ReconciliationEngine::new(
        config.detector.clone(),
        Arc::new(feed),
        classifier.clone(),
        classifier,
        store,
    );
    engine.initialize().await;

    // Alert output
    let mut sinks: Vec<Box<dyn AlertSink>> = vec![Box::new(LogSink)];
    if let Some(path) = &config.output.jsonl_path {
        sinks.push(Box::new(JsonlSink::open(path)?));
    }
    let sink = Box::new(FanoutSink::new(sinks));

    let shutdown = CancellationToken::new();
    let (tx, rx) = mpsc::channel(256);

    let listener = {
        let shutdown = shutdown.clone();
        let chain = config.chain.clone();
        tokio::spawn(async move {
            if let Err(e) = run_block_listener(chain, shutdown, tx).await {
                tracing::error!(error = %e, "Block listener failed");
            }
        })
    };

    let mut dispatcher = tokio::spawn(run_dispatcher(engine, sink, rx, shutdown.clone()));

    tracing::info!("Relay watch running. Press Ctrl+C to stop.");

    // The dispatcher only finishes on its own when the listener has gone away.
    let stopped_early = tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal?;
            tracing::info!("Shutdown signal received, stopping...");
            None
        }
        finished = &mut dispatcher => Some(finished),
    };

    shutdown.cancel();
    let _ = listener.await;

    let stats = match stopped_early {
        None => dispatcher.await?,
        Some(finished) => {
            let stats = finished?;
            tracing::error!(
                blocks = stats.blocks,
                alerts = stats.alerts_delivered,
                "Block pipeline stopped without a shutdown signal"
            );
            return Err(eyre::eyre!("block listener stopped, no blocks are being watched"));
        }
    };

    tracing::info!(
        blocks = stats.blocks,
        alerts = stats.alerts_delivered,
        persist_failures = stats.persist_failures,
        delivery_failures = stats.delivery_failures,
        "Relay watch stopped gracefully"
    );
    Ok(())
}
