//! Bridge configuration and constants.
//!
//! This module provides:
//! - Configuration constants (batch thresholds, retry policy, timeouts)
//! - The library [`Config`] struct and its validation
//! - CLI option parsing ([`Opt`])

mod cli;
mod constants;
mod types;
mod validate;

// Re-export all constants
pub use cli::Opt;
pub use constants::*;
pub use types::{Config, LogFormat, LogLevel};
