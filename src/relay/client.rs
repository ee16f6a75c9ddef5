use async_trait::async_trait;
use std::time::Duration;

use crate::error::FeedError;

use super::types::{RelayBlock, RelayBlocksResponse};

/// Source of recently relayed blocks.
#[async_trait]
pub trait RelayFeed: Send + Sync {
    /// Fetch the most recent batch of relay blocks, in the order the feed delivers them.
    async fn fetch_recent_blocks(&self) -> Result<Vec<RelayBlock>, FeedError>;
}

/// HTTP client for the Flashbots blocks API.
pub struct FlashbotsFeed {
    client: reqwest::Client,
    url: String,
}

impl FlashbotsFeed {
    /// Build a client whose requests are bounded by `timeout`.
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, FeedError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl RelayFeed for FlashbotsFeed {
    async fn fetch_recent_blocks(&self) -> Result<Vec<RelayBlock>, FeedError> {
        let response = self.client.get(&self.url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FeedError::Status(status.as_u16()));
        }

        let body = response.bytes().await?;
        let parsed: RelayBlocksResponse =
            serde_json::from_slice(&body).map_err(|e| FeedError::Decode(e.to_string()))?;

        tracing::debug!(
            url = %self.url,
            blocks = parsed.blocks.len(),
            "Fetched relay blocks"
        );

        Ok(parsed.blocks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    #[ignore] // Run only when testing with the live API
    async fn test_fetch_live_feed() {
        let feed = FlashbotsFeed::new(
            "https://blocks.flashbots.net/v1/blocks?limit=4",
            Duration::from_secs(10),
        )
        .unwrap();

        let blocks = feed.fetch_recent_blocks().await.unwrap();
        assert!(!blocks.is_empty());
    }

    #[tokio::test]
    async fn test_unreachable_feed_is_transport_error() {
        let feed = FlashbotsFeed::new("http://127.0.0.1:9/v1/blocks", Duration::from_millis(500))
            .unwrap();

        let err = feed.fetch_recent_blocks().await.unwrap_err();
        assert!(matches!(err, FeedError::Transport(_)));
    }
}
