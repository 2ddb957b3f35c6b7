//! Main application modules.
//!
//! This module provides shutdown signal handling, throughput logging and
//! statistics printing used by the run loop.

pub mod logging;
pub mod shutdown;
pub mod statistics;

// Re-export public API
pub use logging::log_throughput;
pub use shutdown::{cancel_on_ctrl_c, shutdown_gracefully};
pub use statistics::print_bridge_statistics;
