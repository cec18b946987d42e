//! Endpoint roles.
//!
//! A role fixes which ZeroMQ socket type an endpoint is created with and
//! which options the binder applies to it.

use std::fmt;

/// The fixed role of an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// Subscribe-side proxy endpoint (XSUB). Upstream publishers connect
    /// here; subscription control frames are sent back through it.
    IngressSubscribe,

    /// Publish-side proxy endpoint (XPUB). Downstream consumers connect
    /// here; their subscription control frames are read from it.
    EgressPublish,

    /// Exclusive pair used to read socket monitor events and for inproc
    /// control channels.
    MonitorPair,

    /// Plain subscriber attached downstream of the egress (SUB).
    Consumer,

    /// Plain publisher attached upstream of the ingress (PUB).
    Publisher,
}

impl Role {
    /// ZeroMQ socket type name for this role.
    pub fn socket_type_name(&self) -> &'static str {
        match self {
            Self::IngressSubscribe => "XSUB",
            Self::EgressPublish => "XPUB",
            Self::MonitorPair => "PAIR",
            Self::Consumer => "SUB",
            Self::Publisher => "PUB",
        }
    }

    /// Short label used in logs and inproc monitor addresses.
    pub fn label(&self) -> &'static str {
        match self {
            Self::IngressSubscribe => "xsub",
            Self::EgressPublish => "xpub",
            Self::MonitorPair => "pair",
            Self::Consumer => "sub",
            Self::Publisher => "pub",
        }
    }

    /// Whether the binder enables verbose subscription echo for this role.
    pub fn echoes_subscriptions(&self) -> bool {
        matches!(self, Self::EgressPublish)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.socket_type_name())
    }
}
