/// Core abstractions: the primary address, its epoch, and the relay plumbing
pub mod connection;
pub mod epoch;
pub mod listener;
pub mod session;
pub mod topology;

pub use connection::{ConnectionManager, ConnectionResult};
pub use epoch::{Epoch, EpochWatch};
pub use listener::Listener;
pub use session::{Session, SessionSummary, TeardownReason};
pub use topology::{Topology, TopologyHandle, TopologyPublisher};

use std::fmt;

/// Address of the currently writable node, as reported by the sentinel.
///
/// Immutable once built; a new primary always means a new value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PrimaryAddress {
    host: String,
    port: u16,
}

impl PrimaryAddress {
    pub fn new<S: Into<String>>(host: S, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }
}

impl fmt::Display for PrimaryAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}
