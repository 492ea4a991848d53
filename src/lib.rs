//! Incremental MySQL to Elasticsearch synchronization.
//!
//! Each run scans the configured source tables forward from a durable
//! per-table checkpoint, transforms the rows into index documents, and
//! reconciles them against the target cluster with diff-aware upserts.
//! Delivery is at-least-once; the upsert path is idempotent, so replayed
//! rows converge to the same indexed state.
//!
//! The pipeline, in order: [`config`] is parsed once at startup,
//! [`sync`] resolves the table targets and drives the page loop,
//! [`source`] reads key-ordered pages, [`transform`] builds typed
//! records from raw rows, [`dispatch`] fans the records out as
//! concurrent tasks, [`writer`] decides insert/update/skip per record,
//! and the `checkpoint` crate records what was reconciled.

pub mod backpressure;
pub mod config;
pub mod dispatch;
pub mod es;
pub mod record;
pub mod retry;
pub mod schema;
pub mod source;
pub mod sync;
pub mod testing;
pub mod transform;
pub mod writer;

pub use dispatch::SyncOutcome;
pub use sync::{SyncContext, TableSyncTarget};
