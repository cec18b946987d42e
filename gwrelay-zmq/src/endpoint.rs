//! Live transport endpoints.

use bytes::Bytes;
use std::fmt;

use gwrelay_core::address::Address;
use gwrelay_core::role::Role;
use gwrelay_core::Message;

use crate::context::Registration;
use crate::monitor::MonitorHandle;

/// A libzmq socket bound or connected to one address with a fixed role.
///
/// Dropping the endpoint closes the socket and removes it from the
/// lifecycle context's registry. Endpoints can be moved to another thread
/// but are never shared.
pub struct Endpoint {
    socket: zmq::Socket,
    address: Address,
    last_endpoint: String,
    role: Role,
    registration: Registration,
    monitor: Option<MonitorHandle>,
}

impl Endpoint {
    pub(crate) fn new(
        socket: zmq::Socket,
        address: Address,
        last_endpoint: String,
        role: Role,
        registration: Registration,
        monitor: Option<MonitorHandle>,
    ) -> Self {
        Self {
            socket,
            address,
            last_endpoint,
            role,
            registration,
            monitor,
        }
    }

    /// Registry identifier, unique within the owning context.
    pub fn id(&self) -> u64 {
        self.registration.id()
    }

    /// The address as requested.
    pub fn address(&self) -> &Address {
        &self.address
    }

    /// The address as resolved by the transport (wildcard ports filled in).
    pub fn last_endpoint(&self) -> &str {
        &self.last_endpoint
    }

    pub fn role(&self) -> Role {
        self.role
    }

    /// Debug monitor attached when the endpoint was created, if any.
    pub fn monitor(&self) -> Option<&MonitorHandle> {
        self.monitor.as_ref()
    }

    /// Underlying socket, for polling and monitor installation.
    pub fn socket(&self) -> &zmq::Socket {
        &self.socket
    }

    /// Subscribe a consumer endpoint to a topic prefix (`b""` for everything).
    pub fn subscribe(&self, topic: &[u8]) -> Result<(), zmq::Error> {
        if self.role != Role::Consumer {
            return Err(zmq::Error::ENOTSUP);
        }
        self.socket.set_subscribe(topic)
    }

    /// Receive one complete message, blocking per the receive timeout.
    pub fn recv_message(&self) -> Result<Message, zmq::Error> {
        let frames = self.socket.recv_multipart(0)?;
        Ok(frames.into_iter().map(Bytes::from).collect())
    }

    /// Send all frames of `msg` as one message.
    pub fn send_message(&self, msg: &[Bytes]) -> Result<(), zmq::Error> {
        self.socket.send_multipart(msg.iter().map(|f| &f[..]), 0)
    }
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Endpoint")
            .field("id", &self.id())
            .field("role", &self.role)
            .field("address", &self.last_endpoint)
            .field("monitored", &self.monitor.is_some())
            .finish()
    }
}
