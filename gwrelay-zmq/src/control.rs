//! Inproc control channels for worker threads.
//!
//! Each worker owns the bound end of a PAIR pair and polls it next to its
//! data endpoints. The connected end lives in a [`ControlHandle`] shared by
//! the caller and the context registry, so both user code and
//! `destroy()` can steer the worker.

use bytes::Bytes;
use parking_lot::Mutex;
use std::fmt;
use std::time::Duration;
use tracing::{trace, warn};

use gwrelay_core::command::{ProxyCommand, ProxyStats};

use crate::context::LifecycleContext;

/// Caller side of a control channel.
pub struct ControlHandle {
    socket: Mutex<zmq::Socket>,
    address: String,
}

impl ControlHandle {
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Deliver a command without blocking.
    pub fn send(&self, command: ProxyCommand) -> Result<(), zmq::Error> {
        trace!("[{}] -> {}", self.address, command);
        self.socket.lock().send(command.as_str(), zmq::DONTWAIT)
    }

    /// Ask the worker for a statistics snapshot and wait up to `timeout`.
    ///
    /// Returns `Ok(None)` on timeout or a malformed reply.
    pub fn request_statistics(&self, timeout: Duration) -> Result<Option<ProxyStats>, zmq::Error> {
        let socket = self.socket.lock();

        // Discard a reply left over from an earlier request that timed out.
        while socket.poll(zmq::POLLIN, 0)? > 0 {
            let stale = socket.recv_multipart(0)?;
            trace!("[{}] discarded stale reply ({} frames)", self.address, stale.len());
        }

        socket.send(ProxyCommand::Statistics.as_str(), zmq::DONTWAIT)?;
        let millis = i64::try_from(timeout.as_millis()).unwrap_or(i64::MAX);
        if socket.poll(zmq::POLLIN, millis)? == 0 {
            return Ok(None);
        }
        let frames = socket.recv_multipart(0)?;
        Ok(ProxyStats::from_frames(&frames))
    }
}

impl fmt::Debug for ControlHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControlHandle")
            .field("address", &self.address)
            .finish()
    }
}

/// Worker side of a control channel.
pub(crate) struct ControlEndpoint {
    socket: zmq::Socket,
    address: String,
}

impl ControlEndpoint {
    pub(crate) fn socket(&self) -> &zmq::Socket {
        &self.socket
    }

    /// Read one command. Unknown words are logged and yield `None`.
    pub(crate) fn recv_command(&self) -> Result<Option<ProxyCommand>, zmq::Error> {
        let frames = self.socket.recv_multipart(0)?;
        let Some(first) = frames.first() else {
            return Ok(None);
        };
        let command = ProxyCommand::parse(first);
        if command.is_none() {
            warn!(
                "[{}] Ignoring unknown control command {:?}",
                self.address,
                String::from_utf8_lossy(first)
            );
        }
        Ok(command)
    }

    pub(crate) fn reply(&self, frames: &[Bytes]) -> Result<(), zmq::Error> {
        self.socket
            .send_multipart(frames.iter().map(|f| &f[..]), zmq::DONTWAIT)
    }
}

/// Create a connected control pair for a worker named `label`.
pub(crate) fn channel(
    ctx: &LifecycleContext,
    label: &str,
) -> Result<(ControlHandle, ControlEndpoint), zmq::Error> {
    let address = format!("inproc://gwrelay/control/{}-{}", label, ctx.next_id());

    let worker = ctx.socket(zmq::PAIR)?;
    worker.set_linger(0)?;
    worker.bind(&address)?;

    let caller = ctx.socket(zmq::PAIR)?;
    caller.set_linger(0)?;
    caller.connect(&address)?;

    Ok((
        ControlHandle {
            socket: Mutex::new(caller),
            address: address.clone(),
        },
        ControlEndpoint {
            socket: worker,
            address,
        },
    ))
}
