// storage/mod.rs
// Storage engine access: client seam, connection lifecycle, statement building

pub mod client;
pub mod connection;
pub mod insert;
pub mod memory;
pub mod sqlite;

// Re-export commonly used items
pub use client::{ConnectSettings, ExecResult, StorageClient};
pub use connection::{ConnectionManager, ConnectionState, LiveConnection};
pub use memory::MemoryClient;
pub use sqlite::SqliteClient;
