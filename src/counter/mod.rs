//! Threshold Window Counter: turns a stream of broker events into
//! fire / silent-reset signals.
//!
//! The tally lives inside a single task (`WindowCounter`) that receives both
//! event commands and window ticks, so threshold-cross resets and window
//! resets can never interleave.

pub mod config;
pub mod state;
pub mod window;

pub use config::CounterConfig;
pub use state::{CounterSignal, FireReason, TallyState};
pub use window::{CounterError, CounterHandle, CounterSnapshot, EventOutcome, WindowCounter};
