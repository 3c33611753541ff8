//! Durable, partitioned key-value storage for cached reads and queued writes.
//!
//! Two logical partitions live in one SQLite database:
//! - `cache`: response payloads keyed by request identity
//! - `pending-mutations`: writes waiting for delivery, enumerated in insertion order
//!
//! Every operation touches a single key (or a single partition scan) inside one
//! SQLite statement, so a failed write never leaves a half-written entry.

mod schema;
mod store;

pub use store::{Partition, Record, SqliteStore, Store};
