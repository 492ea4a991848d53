//! Checkpoint management for mysql-es-sync
//!
//! Provides the per-table sync log used to resume incremental scans.
//!
//! # Architecture
//!
//! This crate provides a generic checkpoint system that:
//! - Defines the `CheckpointStore` trait for storage backends
//! - Records one `SyncLogEntry` per successfully reconciled record
//! - Derives the per-table checkpoint as the maximum recorded integer
//!   primary-key value
//!
//! ## Storage Backends
//!
//! - `MySqlStore` - Stores sync-log entries in a table inside the source
//!   database
//! - `MemoryStore` - In-memory storage for tests
//!
//! Only integer-typed primary keys support resumable checkpointing;
//! string-keyed tables record audit entries without a checkpoint value and
//! are re-scanned from the beginning each run.

mod memory;
mod mysql;
pub mod store;


// Re-export store trait and types
pub use store::{CheckpointStore, SyncLogEntry};

// Re-export storage implementations
pub use memory::MemoryStore;
pub use mysql::{MySqlStore, SYNC_LOG_TABLE};
