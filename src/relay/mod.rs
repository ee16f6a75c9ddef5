pub mod client;
pub mod types;

pub use client::{FlashbotsFeed, RelayFeed};
pub use types::{BundleType, RelayBlock, RelayTransaction};
