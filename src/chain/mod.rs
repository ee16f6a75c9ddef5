pub mod classifier;
pub mod listener;
pub mod swap;

pub use classifier::{ContractClassifier, LogClassifier, RpcClassifier, TxLog};
pub use listener::{run_block_listener, BlockEvent};
