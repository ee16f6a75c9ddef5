use async_trait::async_trait;
use sqlx::PgPool;
use std::collections::HashMap;
use tokio::sync::Mutex;

use crate::error::StoreError;

/// Durable named counters with last-write-wins semantics.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Read a counter. Absent keys and backend failures both read as 0.
    async fn load(&self, key: &str) -> u64;

    async fn persist(&self, value: u64, key: &str) -> Result<(), StoreError>;
}

/// Counters kept in the `detector_counters` table.
pub struct PgCounterStore {
    pool: PgPool,
}

impl PgCounterStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn try_load(&self, key: &str) -> Result<u64, StoreError> {
        let row: Option<(i64,)> =
            sqlx::query_as("SELECT value FROM detector_counters WHERE key = $1")
                .bind(key)
                .fetch_optional(&self.pool)
                .await?;

        match row {
            None => Ok(0),
            Some((value,)) => u64::try_from(value).map_err(|_| StoreError::OutOfRange {
                key: key.to_string(),
                value,
            }),
        }
    }
}

#[async_trait]
impl CounterStore for PgCounterStore {
    async fn load(&self, key: &str) -> u64 {
        match self.try_load(key).await {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(key, error = %e, "Failed to load counter, starting from 0");
                0
            }
        }
    }

    async fn persist(&self, value: u64, key: &str) -> Result<(), StoreError> {
        let stored = i64::try_from(value).map_err(|_| StoreError::OutOfRange {
            key: key.to_string(),
            value: i64::MAX,
        })?;

        sqlx::query(
            "INSERT INTO detector_counters (key, value, updated_at)
             VALUES ($1, $2, NOW())
             ON CONFLICT (key) DO UPDATE
             SET value = $2, updated_at = NOW()",
        )
        .bind(key)
        .bind(stored)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

/// Process-local counters, used when no database is configured.
#[derive(Default)]
pub struct MemoryCounterStore {
    values: Mutex<HashMap<String, u64>>,
}

impl MemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populate a counter, as if persisted by an earlier run.
    pub fn with_value(mut self, key: &str, value: u64) -> Self {
        self.values.get_mut().insert(key.to_string(), value);
        self
    }
}

#[async_trait]
impl CounterStore for MemoryCounterStore {
    async fn load(&self, key: &str) -> u64 {
        self.values.lock().await.get(key).copied().unwrap_or(0)
    }

    async fn persist(&self, value: u64, key: &str) -> Result<(), StoreError> {
        self.values.lock().await.insert(key.to_string(), value);
        Ok(())
    }
}
