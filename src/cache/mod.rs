//! Read-through caching strategies over the durable store.
//!
//! This module mediates between the remote and the store's cache partition:
//! - network-first: freshest data when reachable, bounded staleness when not
//! - cache-first: near-static assets served without network cost
//! - stale-while-revalidate: instant answers, refreshed in the background
//!
//! Concurrent writers of one key resolve by `stored_at`: the later entry wins.

mod entry;
mod key;
mod layer;
mod traits;

pub use entry::{CacheEntry, Payload};
pub use key::{normalize_url, resource_of, RequestKey};
pub use layer::CacheLayer;
pub use traits::{CacheResult, CacheSource, FetchOptions, Strategy};
