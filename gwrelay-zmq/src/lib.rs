//! # gwrelay ZMQ
//!
//! libzmq-backed implementation of the gateway relay.
//!
//! ## Overview
//!
//! - **LifecycleContext**: owns the libzmq context and a registry of every
//!   endpoint and worker thread created under it
//! - **Binder**: creates XSUB / XPUB / PAIR endpoints with typed bind errors
//! - **ForwardingProxy**: XSUB → XPUB data relay with upstream subscription
//!   forwarding and a steerable control channel
//! - **EventMonitor**: decoded socket lifecycle events
//! - **spawn_worker**: context-registered threads that stop on teardown
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use gwrelay_zmq::{start_proxy, LifecycleContext};
//!
//! let ctx = LifecycleContext::init()?;
//! let proxy = start_proxy(&ctx, "ipc:///tmp/nginx_queue_listen", "tcp://0.0.0.0:6001", true)?;
//! println!("relaying to {}", proxy.egress_endpoint());
//! ctx.destroy()?;
//! # Ok::<(), gwrelay_zmq::Error>(())
//! ```

#![deny(unsafe_code)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::needless_pass_by_value)]

mod control;

pub mod adaptor;
pub mod binder;
pub mod context;
pub mod endpoint;
pub mod error;
pub mod monitor;
pub mod proxy;
pub mod worker;

pub use adaptor::{start_proxy, start_proxy_with_options};
pub use binder::Binder;
pub use context::{ContextConfig, LifecycleContext};
pub use endpoint::Endpoint;
pub use error::{BindError, ContextError, Error, MonitorError, Result, TransportReadError};
pub use monitor::{spawn_monitor, EventMonitor, MonitorHandle};
pub use proxy::{Direction, ForwardingProxy, ProxyHandle, ProxyReport, RelaySocket, StopReason};
pub use worker::{spawn_worker, Wake, Worker, WorkerHandle};

/// Prelude module for convenient imports
///
/// ```rust
/// use gwrelay_zmq::prelude::*;
/// ```
pub mod prelude {
    pub use super::{
        start_proxy, Binder, BindError, ContextConfig, Endpoint, Error, EventMonitor,
        ForwardingProxy, LifecycleContext, ProxyHandle,
    };
    pub use bytes::Bytes;
    pub use gwrelay_core::prelude::*;
}
