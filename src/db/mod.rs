pub mod counters;

pub use counters::{CounterStore, MemoryCounterStore, PgCounterStore};
