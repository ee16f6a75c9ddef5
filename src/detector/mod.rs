pub mod dispatcher;
pub mod engine;
pub mod queue;
pub mod score;
pub mod types;

pub use dispatcher::{run_dispatcher, DispatchStats};
pub use engine::{BlockOutcome, Counters, EngineSnapshot, ReconciliationEngine};
pub use types::{AlertCategory, AlertRecord, Finding};
