//! Offline cache and mutation sync engine.
//!
//! Reads go through a [`gateway::RequestGateway`] that picks a cache strategy
//! per route; writes made while offline are queued durably and replayed by a
//! [`sync::SyncCoordinator`] once connectivity returns.

pub mod cache;
pub mod clock;
pub mod db;
pub mod error;
pub mod event;
pub mod gateway;
pub mod net;
pub mod sync;

pub use error::{Error, Result};
