use serde::Deserialize;

/// How a relayed transaction reached the builder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BundleType {
    /// Also seen in the public mempool, so not private.
    Mempool,
    Other(String),
}

impl BundleType {
    pub fn is_mempool(&self) -> bool {
        matches!(self, Self::Mempool)
    }
}

impl From<String> for BundleType {
    fn from(raw: String) -> Self {
        if raw == "mempool" {
            Self::Mempool
        } else {
            Self::Other(raw)
        }
    }
}

impl<'de> Deserialize<'de> for BundleType {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(Self::from)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RelayTransaction {
    pub bundle_type: BundleType,
    #[serde(rename = "eoa_address")]
    pub from_address: String,
    pub to_address: String,
    pub transaction_hash: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RelayBlock {
    pub block_number: u64,
    #[serde(default)]
    pub transactions: Vec<RelayTransaction>,
}

/// Top-level envelope returned by the blocks endpoint.
#[derive(Debug, Deserialize)]
pub struct RelayBlocksResponse {
    pub blocks: Vec<RelayBlock>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_feed_payload() {
        let json = r#"{
            "blocks": [{
                "block_number": 17000001,
                "miner_reward": "123",
                "transactions": [
                    {
                        "transaction_hash": "0xabc",
                        "tx_index": 0,
                        "bundle_type": "flashbots",
                        "bundle_index": 0,
                        "block_number": 17000001,
                        "eoa_address": "0x1111111111111111111111111111111111111111",
                        "to_address": "0x2222222222222222222222222222222222222222"
                    },
                    {
                        "transaction_hash": "0xdef",
                        "bundle_type": "mempool",
                        "eoa_address": "0x3333333333333333333333333333333333333333",
                        "to_address": "0x4444444444444444444444444444444444444444"
                    }
                ]
            }],
            "latest_block_number": 17000001
        }"#;

        let response: RelayBlocksResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.blocks.len(), 1);
        let block = &response.blocks[0];
        assert_eq!(block.block_number, 17000001);
        assert_eq!(block.transactions.len(), 2);
        assert_eq!(
            block.transactions[0].bundle_type,
            BundleType::Other("flashbots".to_string())
        );
        assert_eq!(
            block.transactions[0].from_address,
            "0x1111111111111111111111111111111111111111"
        );
        assert!(block.transactions[1].bundle_type.is_mempool());
    }

    #[test]
    fn test_missing_blocks_field_is_error() {
        assert!(serde_json::from_str::<RelayBlocksResponse>(r#"{"data": []}"#).is_err());
    }
}
