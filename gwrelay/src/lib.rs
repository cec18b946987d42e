//! # gwrelay
//!
//! Gateway message relay: gateway publishers push onto an XSUB ingress, the
//! relay fans every message out to the XPUB egress, and subscriptions from
//! downstream consumers flow back upstream.
//!
//! ## Architecture
//!
//! - **`gwrelay-core`**: addresses, roles, options, control frames and the
//!   monitor event model (no transport)
//! - **`gwrelay-zmq`**: libzmq endpoints, the forwarding proxy, event
//!   monitors and the lifecycle context
//! - **`gwrelay`**: configuration, diagnostics and the `gwrelay` binary
//!   (this crate)
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use gwrelay::{Relay, RelayConfig};
//!
//! let config = RelayConfig::default().with_debug(true);
//! let relay = Relay::start(config)?;
//! println!("relaying to {}", relay.proxy().egress_endpoint());
//! relay.shutdown()?;
//! # Ok::<(), gwrelay::Error>(())
//! ```

#![deny(unsafe_code)]
#![warn(clippy::all)]

pub mod config;
pub mod dev_tracing;
pub mod diagnostics;
pub mod relay;

pub use bytes::Bytes;
pub use config::{RelayConfig, DEFAULT_EGRESS, DEFAULT_INGRESS};
pub use relay::Relay;

pub use gwrelay_zmq::{
    start_proxy, BindError, ContextConfig, ContextError, Error, LifecycleContext, ProxyHandle,
    Result,
};

/// Prelude module for convenient imports
///
/// ```rust
/// use gwrelay::prelude::*;
/// ```
pub mod prelude {
    pub use super::{Relay, RelayConfig};
    pub use gwrelay_zmq::prelude::*;
}
