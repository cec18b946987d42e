//! gwrelay Error Types
//!
//! One enum per failure class, aggregated in [`Error`].

use gwrelay_core::address::AddressError;
use gwrelay_core::error::FramingError;
use std::io;
use thiserror::Error;

use crate::proxy::Direction;

/// Setup failure of a bind or connect call. Fatal to that call, never retried.
#[derive(Error, Debug)]
pub enum BindError {
    /// Address failed to parse
    #[error("invalid address: {0}")]
    InvalidAddress(#[from] AddressError),

    /// Another socket already listens on the address
    #[error("address already in use: {address}")]
    AddressInUse { address: String },

    /// Host, interface or path could not be resolved
    #[error("address cannot be resolved: {address} ({reason})")]
    Unresolvable { address: String, reason: String },

    /// Insufficient rights, e.g. on an IPC socket path
    #[error("permission denied: {address}")]
    PermissionDenied { address: String },

    /// The owning lifecycle context is shutting down or gone
    #[error("lifecycle context already destroyed")]
    ContextDestroyed,

    /// Debug monitor could not be attached before binding
    #[error("failed to attach monitor to {address}: {reason}")]
    MonitorSetup { address: String, reason: String },

    /// Any other transport failure
    #[error("transport error on {address}: {source}")]
    Transport {
        address: String,
        #[source]
        source: zmq::Error,
    },
}

impl BindError {
    /// Map a libzmq failure for `address` onto the typed variants.
    pub(crate) fn from_zmq(address: &str, err: zmq::Error) -> Self {
        let address = address.to_string();
        match err {
            zmq::Error::EADDRINUSE => Self::AddressInUse { address },
            zmq::Error::EACCES => Self::PermissionDenied { address },
            zmq::Error::EADDRNOTAVAIL
            | zmq::Error::ENODEV
            | zmq::Error::EINVAL
            | zmq::Error::ENOENT
            | zmq::Error::ENAMETOOLONG
            | zmq::Error::EPROTONOSUPPORT
            | zmq::Error::ECONNREFUSED => Self::Unresolvable {
                address,
                reason: err.to_string(),
            },
            zmq::Error::ETERM => Self::ContextDestroyed,
            source => Self::Transport { address, source },
        }
    }
}

/// A receive call failed; terminates the affected relay direction.
///
/// Collected in [`ProxyReport::closed`](crate::ProxyReport::closed).
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("receive failed on {direction}: {source}")]
pub struct TransportReadError {
    pub direction: Direction,
    #[source]
    pub source: zmq::Error,
}

impl TransportReadError {
    /// True when the failure is the context being torn down mid-read.
    pub fn is_context_terminated(&self) -> bool {
        self.source == zmq::Error::ETERM
    }
}

/// Failure of a single monitor read.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MonitorError {
    /// Event did not have the two-part header/address shape
    #[error("malformed monitor event: {0}")]
    Framing(#[from] FramingError),

    /// Read timeout elapsed (only when a receive timeout is configured)
    #[error("timed out waiting for a monitor event")]
    Timeout,

    #[error("monitor read failed: {0}")]
    Transport(zmq::Error),
}

impl From<zmq::Error> for MonitorError {
    fn from(err: zmq::Error) -> Self {
        match err {
            zmq::Error::EAGAIN => Self::Timeout,
            other => Self::Transport(other),
        }
    }
}

/// Lifecycle context failures.
#[derive(Error, Debug)]
pub enum ContextError {
    /// `destroy()` was already called on this context
    #[error("lifecycle context already destroyed")]
    AlreadyDestroyed,

    /// Teardown finished with resources still registered
    #[error("context teardown leaked {endpoints} endpoint(s) and {workers} worker(s)")]
    Leaked { endpoints: usize, workers: usize },

    /// A worker thread could not be started
    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[from] io::Error),

    /// A worker exited before acknowledging readiness
    #[error("worker {name} exited before it was ready")]
    WorkerNotReady { name: String },

    /// A worker thread panicked
    #[error("worker {name} panicked")]
    WorkerPanicked { name: String },

    /// No reply on a control channel within the allotted time
    #[error("no reply from {name} control channel")]
    ControlTimeout { name: String },

    #[error("transport error: {0}")]
    Transport(#[from] zmq::Error),
}

/// Main error type for gwrelay operations
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Bind(#[from] BindError),

    #[error(transparent)]
    Monitor(#[from] MonitorError),

    #[error(transparent)]
    Context(#[from] ContextError),
}

/// Result type alias for gwrelay operations
pub type Result<T> = std::result::Result<T, Error>;
