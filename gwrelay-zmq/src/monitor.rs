//! Socket event monitoring.
//!
//! libzmq publishes lifecycle events of a monitored socket on an inproc PAIR
//! address. [`EventMonitor`] reads and decodes that stream;
//! [`spawn_monitor`] runs a logging loop over it in a worker thread that
//! also listens on a control channel, so context teardown can stop it.

use std::fmt;
use std::time::Duration;
use tracing::{debug, info, trace, warn};

use gwrelay_core::command::ProxyCommand;
use gwrelay_core::error::FramingError;
use gwrelay_core::monitor::{MonitorEvent, MonitorEventKind, ALL_EVENTS};
use gwrelay_core::role::Role;

use crate::binder;
use crate::context::LifecycleContext;
use crate::endpoint::Endpoint;
use crate::error::{BindError, ContextError, Error, MonitorError};
use crate::worker::{spawn_worker, Wake, Worker, WorkerHandle};

/// Reader for the event stream published on a monitor address.
///
/// Iterating yields one item per event and ends when the monitored socket
/// stops being monitored or the context is torn down.
pub struct EventMonitor {
    endpoint: Endpoint,
    finished: bool,
}

impl EventMonitor {
    /// Connect to `monitor_address`, where a socket monitor publishes.
    pub fn attach(ctx: &LifecycleContext, monitor_address: &str) -> Result<Self, BindError> {
        let endpoint = binder::connect(ctx, monitor_address, Role::MonitorPair)?;
        Ok(Self {
            endpoint,
            finished: false,
        })
    }

    pub fn address(&self) -> &str {
        self.endpoint.last_endpoint()
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Bound each read. `None` blocks until an event arrives.
    pub fn set_read_timeout(&self, timeout: Option<Duration>) -> Result<(), MonitorError> {
        let millis = timeout.map_or(-1, |t| i32::try_from(t.as_millis()).unwrap_or(i32::MAX));
        self.endpoint.socket().set_rcvtimeo(millis)?;
        Ok(())
    }

    /// Read and decode one event.
    ///
    /// A framing violation fails only this read; the stream stays aligned
    /// on the next message.
    pub fn read_event(&self) -> Result<MonitorEvent, MonitorError> {
        let socket = self.endpoint.socket();

        let header = socket.recv_msg(0)?;
        let header_more = header.get_more();
        if !header_more {
            return Err(FramingError::MissingMoreFlag { part: "header" }.into());
        }

        let address = socket.recv_msg(0)?;
        let address_more = address.get_more();
        if address_more {
            self.drain()?;
        }

        let event = MonitorEvent::decode(&header, header_more, &address, address_more)?;
        trace!("[{}] {}", self.address(), event);
        Ok(event)
    }

    fn drain(&self) -> Result<(), MonitorError> {
        let socket = self.endpoint.socket();
        while socket.get_rcvmore()? {
            socket.recv_msg(0)?;
        }
        Ok(())
    }
}

impl Iterator for EventMonitor {
    type Item = Result<MonitorEvent, MonitorError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.read_event() {
            Ok(event) if event.is_monitor_stopped() => {
                self.finished = true;
                None
            }
            Err(MonitorError::Transport(zmq::Error::ETERM)) => {
                self.finished = true;
                None
            }
            other => Some(other),
        }
    }
}

impl fmt::Debug for EventMonitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventMonitor")
            .field("address", &self.address())
            .field("finished", &self.finished)
            .finish()
    }
}

/// Handle to a running monitor logging thread.
pub struct MonitorHandle {
    address: String,
    worker: WorkerHandle<()>,
}

impl MonitorHandle {
    /// Inproc address the events are published on.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Ask the logging thread to exit.
    pub fn stop(&self) -> Result<(), Error> {
        self.worker.command(ProxyCommand::Terminate)
    }

    /// Wait for the logging thread to exit.
    pub fn join(self) {
        if self.worker.join().is_err() {
            warn!("Monitor thread for {} panicked", self.address);
        }
    }

    pub fn is_finished(&self) -> bool {
        self.worker.is_finished()
    }
}

/// Monitor `target` and log its events from a worker thread.
pub fn spawn_monitor(
    ctx: &LifecycleContext,
    target: &Endpoint,
    label: &str,
) -> Result<MonitorHandle, Error> {
    spawn_on(ctx, target.socket(), target.role(), label)
}

/// Binder hook: attach a logger to a socket that is not bound yet.
pub(crate) fn attach_logger(
    ctx: &LifecycleContext,
    socket: &zmq::Socket,
    role: Role,
) -> Result<MonitorHandle, BindError> {
    spawn_on(ctx, socket, role, role.socket_type_name()).map_err(|e| match e {
        Error::Bind(bind) => bind,
        other => BindError::MonitorSetup {
            address: format!("inproc://monitor/{}", role.label()),
            reason: other.to_string(),
        },
    })
}

fn spawn_on(
    ctx: &LifecycleContext,
    socket: &zmq::Socket,
    role: Role,
    label: &str,
) -> Result<MonitorHandle, Error> {
    let address = format!("inproc://monitor/{}-{}", role.label(), ctx.next_id());
    socket
        .monitor(&address, ALL_EVENTS)
        .map_err(ContextError::Transport)?;

    let monitor = EventMonitor::attach(ctx, &address)?;
    let label = label.to_string();
    let worker = spawn_worker(ctx, &format!("monitor-{}", role.label()), move |worker| {
        run_logger(&monitor, worker, &label);
    })?;

    Ok(MonitorHandle { address, worker })
}

fn run_logger(monitor: &EventMonitor, worker: &Worker, label: &str) {
    info!("[{}] Event monitor started on {}", label, monitor.address());

    loop {
        match worker.wait(monitor.endpoint(), None) {
            Ok(Wake::Command(ProxyCommand::Terminate)) => break,
            Ok(Wake::Command(command)) => debug!("[{}] Monitor ignores {}", label, command),
            Ok(Wake::Timeout) => {}
            Ok(Wake::Readable) => match monitor.read_event() {
                Ok(event) if event.is_monitor_stopped() => break,
                Ok(event) => log_event(label, &event),
                Err(MonitorError::Framing(e)) => {
                    warn!("[{}] Dropping malformed monitor event: {}", label, e);
                }
                Err(e) => {
                    debug!("[{}] Monitor read ended: {}", label, e);
                    break;
                }
            },
            Err(e) => {
                debug!("[{}] Monitor wait ended: {}", label, e);
                break;
            }
        }
    }

    info!("[{}] Event monitor stopped", label);
}

fn log_event(label: &str, event: &MonitorEvent) {
    match event.kind() {
        MonitorEventKind::Unknown => warn!(
            "[{}] Unknown monitor event {} with value={} for address={}",
            label, event.code, event.value, event.peer_address
        ),
        kind if kind.is_failure() => warn!("[{}] {}", label, event),
        _ => info!("[{}] {}", label, event),
    }
}
