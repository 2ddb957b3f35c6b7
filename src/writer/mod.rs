//! Statement execution.
//!
//! This module provides the write executor (retry, backoff and per-row
//! fallback) and the outcome values it produces.

mod executor;
mod outcome;

pub use executor::{RetryPolicy, WriteExecutor};
pub use outcome::{ExecSuccess, FallbackSummary, OutcomeStatus, RowFailure, WriteOutcome};
