use alloy::primitives::{Address, B256};
use alloy::providers::Provider;
use async_trait::async_trait;
use std::str::FromStr;

use crate::error::ClassifyError;

/// The parts of a receipt log the detector looks at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxLog {
    pub address: Address,
    pub topics: Vec<B256>,
}

/// Answers whether an address has deployed bytecode.
#[async_trait]
pub trait ContractClassifier: Send + Sync {
    async fn has_code(&self, address: &str) -> Result<bool, ClassifyError>;
}

/// Returns the event logs emitted by a transaction.
#[async_trait]
pub trait LogClassifier: Send + Sync {
    async fn get_logs(&self, tx_hash: &str) -> Result<Vec<TxLog>, ClassifyError>;
}

/// Both lookups served by a single alloy provider.
pub struct RpcClassifier<P> {
    provider: P,
}

impl<P: Provider> RpcClassifier<P> {
    pub fn new(provider: P) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl<P: Provider> ContractClassifier for RpcClassifier<P> {
    async fn has_code(&self, address: &str) -> Result<bool, ClassifyError> {
        let address = Address::from_str(address.trim())
            .map_err(|_| ClassifyError::InvalidAddress(address.to_string()))?;

        let code = self
            .provider
            .get_code_at(address)
            .await
            .map_err(|e| ClassifyError::Rpc(e.to_string()))?;

        Ok(!code.is_empty())
    }
}

#[async_trait]
impl<P: Provider> LogClassifier for RpcClassifier<P> {
    async fn get_logs(&self, tx_hash: &str) -> Result<Vec<TxLog>, ClassifyError> {
        let hash = B256::from_str(tx_hash.trim())
            .map_err(|_| ClassifyError::InvalidHash(tx_hash.to_string()))?;

        let receipt = self
            .provider
            .get_transaction_receipt(hash)
            .await
            .map_err(|e| ClassifyError::Rpc(e.to_string()))?
            .ok_or_else(|| ClassifyError::MissingReceipt(tx_hash.to_string()))?;

        let logs = receipt
            .inner
            .logs()
            .iter()
            .map(|log| TxLog {
                address: log.inner.address,
                topics: log.inner.data.topics().to_vec(),
            })
            .collect();

        Ok(logs)
    }
}
