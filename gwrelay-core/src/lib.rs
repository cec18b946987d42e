//! gwrelay Core
//!
//! This crate contains the transport-agnostic building blocks of the relay:
//! - Address parsing for `tcp://`, `ipc://` and `inproc://` (`address`)
//! - Endpoint roles (`role`)
//! - Endpoint options (`options`)
//! - Subscription control frames (`subscription`)
//! - Socket lifecycle event model (`monitor`)
//! - Worker control commands and relay counters (`command`)
//! - Framing errors (`error`)

#![deny(unsafe_code)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod address;
pub mod command;
pub mod error;
pub mod monitor;
pub mod options;
pub mod role;
pub mod subscription;

/// A message: an ordered list of one or more frames, relayed as a unit.
pub type Message = Vec<bytes::Bytes>;

pub mod prelude {
    pub use crate::address::{Address, AddressError, Port};
    pub use crate::command::{ProxyCommand, ProxyStats};
    pub use crate::error::FramingError;
    pub use crate::monitor::{MonitorEvent, MonitorEventKind};
    pub use crate::options::{EndpointOptions, TcpKeepalive};
    pub use crate::role::Role;
    pub use crate::subscription::SubscriptionControl;
    pub use crate::Message;
}
