//! Remote transport and connectivity signal.

pub mod connectivity;
mod probe;
#[cfg(test)]
pub(crate) mod testing;
mod transport;

pub use connectivity::{ConnectivityPublisher, ConnectivityState, ConnectivityWatch};
pub use probe::{reachable, ReachabilityProbe};
pub(crate) use transport::if_none_match;
pub use transport::{HttpTransport, Request, Response, Transport};
