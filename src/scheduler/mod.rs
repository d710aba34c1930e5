//! Worker pool driving every account's wake cycle.
//!
//! Reloads the account store each iteration and runs one worker
//! per eligible account concurrently.

mod runner;
mod state;

pub use runner::{PoolMessage, WorkerPool};
pub use state::{IterationSummary, PoolState};
