//! Selection & Recording Coordinator: turns a fire signal or a manual
//! command into one random pick from the active patient's tablets and one
//! consumption record.

pub mod coordinator;
pub mod interface;
pub mod random;
pub mod signals;

pub use coordinator::{RecordError, SelectionCoordinator, SelectionError, SelectionOutcome};
pub use interface::{CatalogStore, ConsumptionRecord, ConsumptionRecorder, Item, StoreError, Subject};
pub use random::{RandomSource, SeededRandom, ThreadRandom};
pub use signals::{log_outcome, run_signal_loop};

#[cfg(test)]
mod tests;
