use thiserror::Error;

/// The relay feed could not be fetched or decoded. Aborts the current invocation only.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("relay feed request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("relay feed returned HTTP {0}")]
    Status(u16),
    #[error("relay feed payload could not be decoded: {0}")]
    Decode(String),
}

/// A per-transaction lookup failed. The transaction is excluded from the current pass.
#[derive(Debug, Error)]
pub enum ClassifyError {
    #[error("invalid address `{0}`")]
    InvalidAddress(String),
    #[error("invalid transaction hash `{0}`")]
    InvalidHash(String),
    #[error("rpc lookup failed: {0}")]
    Rpc(String),
    #[error("no receipt for transaction {0}")]
    MissingReceipt(String),
}

/// A counter write (or read) against the persistence backend failed.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("counter store backend error: {0}")]
    Backend(#[from] sqlx::Error),
    #[error("counter `{key}` holds a value that does not fit: {value}")]
    OutOfRange { key: String, value: i64 },
}

/// The alert sink could not deliver a batch.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("failed to write alerts: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to encode alert: {0}")]
    Encode(#[from] serde_json::Error),
}
