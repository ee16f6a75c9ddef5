use alloy::primitives::B256;
use alloy::sol_types::SolEvent;

use super::classifier::TxLog;

// Each pool version emits an event literally named `Swap`, so they live in separate
// namespaces to keep the generated signature hashes correct.
mod uniswap_v2 {
    use alloy::sol;

    sol! {
        event Swap(
            address indexed sender,
            uint256 amount0In,
            uint256 amount1In,
            uint256 amount0Out,
            uint256 amount1Out,
            address indexed to
        );
    }
}

mod uniswap_v3 {
    use alloy::sol;

    sol! {
        event Swap(
            address indexed sender,
            address indexed recipient,
            int256 amount0,
            int256 amount1,
            uint160 sqrtPriceX96,
            uint128 liquidity,
            int24 tick
        );
    }
}

/// Uniswap V2 (and forks) `Swap` topic.
pub const UNISWAP_V2_SWAP_TOPIC: B256 = uniswap_v2::Swap::SIGNATURE_HASH;

/// Uniswap V3 `Swap` topic.
pub const UNISWAP_V3_SWAP_TOPIC: B256 = uniswap_v3::Swap::SIGNATURE_HASH;

/// True if any topic of this log is a known swap signature.
pub fn is_swap_log(log: &TxLog) -> bool {
    log.topics
        .iter()
        .any(|t| *t == UNISWAP_V2_SWAP_TOPIC || *t == UNISWAP_V3_SWAP_TOPIC)
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::{address, b256};

    #[test]
    fn test_swap_topics_match_known_hashes() {
        assert_eq!(
            UNISWAP_V2_SWAP_TOPIC,
            b256!("d78ad95fa46c994b6551d0da85fc275fe613ce37657fb8d5e3d130840159d822")
        );
        assert_eq!(
            UNISWAP_V3_SWAP_TOPIC,
            b256!("c42079f94a6350d7e6235f29174924f928cc2ac818eb64fed8004e115fbcca67")
        );
    }

    #[test]
    fn test_swap_topic_in_any_position() {
        let log = TxLog {
            address: address!("88e6a0c2ddd26feeb64f039a2c41296fcb3f5640"),
            topics: vec![B256::ZERO, UNISWAP_V3_SWAP_TOPIC],
        };
        assert!(is_swap_log(&log));

        let transfer = TxLog {
            address: address!("a0b86991c6218b36c1d19d4a2e9eb0ce3606eb48"),
            topics: vec![b256!(
                "ddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef"
            )],
        };
        assert!(!is_swap_log(&transfer));
    }
}
