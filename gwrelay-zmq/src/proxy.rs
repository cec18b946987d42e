//! Forwarding proxy core.
//!
//! Bridges a subscribe-side ingress endpoint and a publish-side egress
//! endpoint:
//!
//! ```text
//! Gateway publishers → XSUB (ingress) → XPUB (egress) → Consumers
//!                      XSUB (ingress) ← XPUB (egress) ← 0x01/0x00 + topic
//! ```
//!
//! Messages flow verbatim in both directions. Upstream traffic is normally
//! subscription control frames; anything else arriving on the egress side is
//! counted and relayed all the same. The loop also polls an inproc control
//! channel that accepts `PAUSE`, `RESUME`, `TERMINATE` and `STATISTICS`.
//!
//! # Example
//!
//! ```no_run
//! use gwrelay_core::role::Role;
//! use gwrelay_zmq::{binder, ForwardingProxy, LifecycleContext};
//!
//! let ctx = LifecycleContext::init()?;
//! let ingress = binder::bind(&ctx, "ipc:///tmp/nginx_queue_listen", Role::IngressSubscribe)?;
//! let egress = binder::bind(&ctx, "tcp://0.0.0.0:6001", Role::EgressPublish)?;
//!
//! let proxy = ForwardingProxy::new(ingress, egress).run(&ctx)?;
//! // ...
//! let report = proxy.stop()?;
//! println!("relayed {} messages", report.stats.ingress_messages);
//! ctx.destroy()?;
//! # Ok::<(), gwrelay_zmq::Error>(())
//! ```

use bytes::Bytes;
use std::fmt;
use std::time::Duration;
use tracing::{debug, info, trace, warn};

use gwrelay_core::command::{ProxyCommand, ProxyStats};
use gwrelay_core::role::Role;
use gwrelay_core::subscription::validate_control_message;
use gwrelay_core::Message;

use crate::context::LifecycleContext;
use crate::control::ControlEndpoint;
use crate::endpoint::Endpoint;
use crate::error::{ContextError, Error, TransportReadError};
use crate::worker::{self, spawn_worker, WorkerHandle};

/// How long `statistics()` waits for the relay loop to answer.
const STATISTICS_TIMEOUT: Duration = Duration::from_secs(1);

/// Endpoints that can participate in the relay.
pub trait RelaySocket {
    /// Receive one complete message.
    fn recv_message(&mut self) -> Result<Message, zmq::Error>;

    /// Send all frames of `msg` as one message.
    fn send_message(&mut self, msg: &[Bytes]) -> Result<(), zmq::Error>;

    /// Short description for logging.
    fn socket_desc(&self) -> &'static str;
}

impl RelaySocket for Endpoint {
    fn recv_message(&mut self) -> Result<Message, zmq::Error> {
        Endpoint::recv_message(self)
    }

    fn send_message(&mut self, msg: &[Bytes]) -> Result<(), zmq::Error> {
        Endpoint::send_message(self, msg)
    }

    fn socket_desc(&self) -> &'static str {
        self.role().socket_type_name()
    }
}

/// Relay direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Data: ingress → egress
    Downstream,
    /// Subscriptions and other upstream messages: egress → ingress
    Upstream,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Downstream => f.write_str("XSUB -> XPUB"),
            Self::Upstream => f.write_str("XPUB -> XSUB"),
        }
    }
}

/// Why a relay loop exited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// `TERMINATE` received on the control channel
    Terminated,
    /// The transport context was terminated underneath the loop
    ContextTerminated,
    /// Receive failed in both directions
    DirectionsClosed,
    /// Polling or the control channel failed
    TransportFailed(zmq::Error),
}

/// Final state of a relay loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyReport {
    pub stats: ProxyStats,
    pub reason: StopReason,
    /// Receive failures that closed a direction, in the order they happened
    pub closed: Vec<TransportReadError>,
}

/// Move one message from `from` to `to`.
///
/// Both directions relay verbatim. Upstream messages that are not a single
/// subscription control frame are counted in
/// [`ProxyStats::upstream_non_control`]. A refused send drops the message.
/// Only a failed receive is returned as an error.
pub fn relay_step<F, T>(
    from: &mut F,
    to: &mut T,
    direction: Direction,
    stats: &mut ProxyStats,
) -> Result<(), TransportReadError>
where
    F: RelaySocket + ?Sized,
    T: RelaySocket + ?Sized,
{
    let msg = from
        .recv_message()
        .map_err(|source| TransportReadError { direction, source })?;

    if direction == Direction::Upstream {
        match validate_control_message(&msg) {
            Ok(control) => trace!(
                "{} {} topic={:?}",
                direction,
                if control.is_subscribe() { "subscribe" } else { "unsubscribe" },
                control.topic()
            ),
            Err(e) => {
                trace!("{} message from {} ({})", direction, from.socket_desc(), e);
                stats.upstream_non_control += 1;
            }
        }
    }

    if let Err(e) = to.send_message(&msg) {
        debug!("Send to {} failed, message dropped: {}", to.socket_desc(), e);
        stats.dropped_sends += 1;
        return Ok(());
    }

    let frames = msg.len() as u64;
    let bytes: u64 = msg.iter().map(|f| f.len() as u64).sum();
    match direction {
        Direction::Downstream => {
            stats.ingress_messages += 1;
            stats.ingress_frames += frames;
            stats.ingress_bytes += bytes;
        }
        Direction::Upstream => {
            stats.egress_messages += 1;
            stats.egress_frames += frames;
            stats.egress_bytes += bytes;
        }
    }
    Ok(())
}

/// Bookkeeping of one relay loop: counters, pause flag and open directions.
#[derive(Debug)]
struct RelayState {
    stats: ProxyStats,
    paused: bool,
    downstream_open: bool,
    upstream_open: bool,
    closed: Vec<TransportReadError>,
}

impl RelayState {
    fn new() -> Self {
        Self {
            stats: ProxyStats::default(),
            paused: false,
            downstream_open: true,
            upstream_open: true,
            closed: Vec::new(),
        }
    }

    /// Which data endpoints to poll, as `(ingress, egress)`.
    fn interest(&self) -> (bool, bool) {
        (
            !self.paused && self.downstream_open,
            !self.paused && self.upstream_open,
        )
    }

    fn exhausted(&self) -> bool {
        !self.downstream_open && !self.upstream_open
    }

    /// Relay one message in `direction`.
    ///
    /// A receive failure closes that direction only. Returns the reason to
    /// stop once the context is gone or both directions are closed.
    fn relay<I, E>(
        &mut self,
        ingress: &mut I,
        egress: &mut E,
        direction: Direction,
    ) -> Option<StopReason>
    where
        I: RelaySocket + ?Sized,
        E: RelaySocket + ?Sized,
    {
        let result = match direction {
            Direction::Downstream => relay_step(ingress, egress, direction, &mut self.stats),
            Direction::Upstream => relay_step(egress, ingress, direction, &mut self.stats),
        };
        let Err(e) = result else {
            return None;
        };
        if e.is_context_terminated() {
            return Some(StopReason::ContextTerminated);
        }

        warn!("Closing relay direction: {}", e);
        match direction {
            Direction::Downstream => self.downstream_open = false,
            Direction::Upstream => self.upstream_open = false,
        }
        self.closed.push(e);
        self.exhausted().then_some(StopReason::DirectionsClosed)
    }

    fn into_report(self, reason: StopReason) -> ProxyReport {
        ProxyReport {
            stats: self.stats,
            reason,
            closed: self.closed,
        }
    }
}

/// A relay between one ingress and one egress endpoint.
pub struct ForwardingProxy {
    ingress: Endpoint,
    egress: Endpoint,
}

impl ForwardingProxy {
    /// Pair an ingress (XSUB) endpoint with an egress (XPUB) endpoint.
    pub fn new(ingress: Endpoint, egress: Endpoint) -> Self {
        if ingress.role() != Role::IngressSubscribe || egress.role() != Role::EgressPublish {
            warn!(
                "Unusual proxy pairing: {} -> {}",
                ingress.role(),
                egress.role()
            );
        }
        Self { ingress, egress }
    }

    /// Spawn the relay loop on its own thread.
    ///
    /// Returns once the loop has acknowledged that it is running.
    pub fn run(self, ctx: &LifecycleContext) -> Result<ProxyHandle, Error> {
        let ingress = self.ingress.last_endpoint().to_string();
        let egress = self.egress.last_endpoint().to_string();

        let mut relay = self;
        let worker = spawn_worker(ctx, "proxy", move |worker| relay.pump(worker.control()))?;

        Ok(ProxyHandle {
            worker,
            ingress,
            egress,
        })
    }

    /// Run the relay loop on the calling thread until it stops.
    ///
    /// The loop is registered with `ctx`, so `destroy()` from another thread
    /// ends it.
    pub fn run_blocking(mut self, ctx: &LifecycleContext) -> Result<ProxyReport, Error> {
        let (worker, _control, _guard) = worker::enlist(ctx, "proxy")?;
        let report = self.pump(worker.control());
        drop(self);
        drop(worker);
        Ok(report)
    }

    fn pump(&mut self, control: &ControlEndpoint) -> ProxyReport {
        info!(
            "Starting XSUB->XPUB proxy [{}] -> [{}]",
            self.ingress.last_endpoint(),
            self.egress.last_endpoint()
        );

        let mut state = RelayState::new();

        let reason = loop {
            if state.exhausted() {
                break StopReason::DirectionsClosed;
            }
            let (poll_ingress, poll_egress) = state.interest();

            let (control_ready, ingress_ready, egress_ready) = {
                let mut items = Vec::with_capacity(3);
                items.push(control.socket().as_poll_item(zmq::POLLIN));
                let ingress_slot = poll_ingress.then(|| {
                    items.push(self.ingress.socket().as_poll_item(zmq::POLLIN));
                    items.len() - 1
                });
                let egress_slot = poll_egress.then(|| {
                    items.push(self.egress.socket().as_poll_item(zmq::POLLIN));
                    items.len() - 1
                });

                match zmq::poll(&mut items, -1) {
                    Ok(_) => {}
                    Err(zmq::Error::EINTR) => continue,
                    Err(zmq::Error::ETERM) => break StopReason::ContextTerminated,
                    Err(e) => break StopReason::TransportFailed(e),
                }
                (
                    items[0].is_readable(),
                    ingress_slot.is_some_and(|i| items[i].is_readable()),
                    egress_slot.is_some_and(|i| items[i].is_readable()),
                )
            };

            if control_ready {
                match control.recv_command() {
                    Ok(Some(ProxyCommand::Terminate)) => break StopReason::Terminated,
                    Ok(Some(ProxyCommand::Pause)) => {
                        debug!("Proxy paused");
                        state.paused = true;
                    }
                    Ok(Some(ProxyCommand::Resume)) => {
                        debug!("Proxy resumed");
                        state.paused = false;
                    }
                    Ok(Some(ProxyCommand::Statistics)) => {
                        if let Err(e) = control.reply(&state.stats.to_frames()) {
                            debug!("Statistics reply failed: {}", e);
                        }
                    }
                    Ok(None) => {}
                    Err(zmq::Error::ETERM) => break StopReason::ContextTerminated,
                    Err(e) => break StopReason::TransportFailed(e),
                }
                continue;
            }

            if ingress_ready {
                if let Some(reason) =
                    state.relay(&mut self.ingress, &mut self.egress, Direction::Downstream)
                {
                    break reason;
                }
            }
            if egress_ready {
                if let Some(reason) =
                    state.relay(&mut self.ingress, &mut self.egress, Direction::Upstream)
                {
                    break reason;
                }
            }
        };

        let stats = &state.stats;
        info!(
            "Proxy stopped ({:?}): {} messages downstream, {} upstream ({} non-control), {} dropped",
            reason,
            stats.ingress_messages,
            stats.egress_messages,
            stats.upstream_non_control,
            stats.dropped_sends
        );
        state.into_report(reason)
    }
}

impl fmt::Debug for ForwardingProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ForwardingProxy")
            .field("ingress", &self.ingress)
            .field("egress", &self.egress)
            .finish()
    }
}

/// Handle to a relay loop running on its own thread.
///
/// Dropping the handle leaves the loop running until the context is
/// destroyed.
pub struct ProxyHandle {
    worker: WorkerHandle<ProxyReport>,
    ingress: String,
    egress: String,
}

impl ProxyHandle {
    /// Resolved ingress address.
    pub fn ingress_endpoint(&self) -> &str {
        &self.ingress
    }

    /// Resolved egress address (wildcard ports filled in).
    pub fn egress_endpoint(&self) -> &str {
        &self.egress
    }

    /// Stop relaying; traffic queues in the transport up to its high water marks.
    pub fn pause(&self) -> Result<(), Error> {
        self.worker.command(ProxyCommand::Pause)
    }

    pub fn resume(&self) -> Result<(), Error> {
        self.worker.command(ProxyCommand::Resume)
    }

    /// Snapshot of the relay counters.
    pub fn statistics(&self) -> Result<ProxyStats, Error> {
        self.worker
            .control()
            .request_statistics(STATISTICS_TIMEOUT)
            .map_err(ContextError::Transport)?
            .ok_or_else(|| {
                ContextError::ControlTimeout {
                    name: self.worker.name().to_string(),
                }
                .into()
            })
    }

    /// Terminate the loop and wait for it to release its endpoints.
    pub fn stop(self) -> Result<ProxyReport, Error> {
        self.worker.stop()
    }

    /// Wait for the loop to exit on its own.
    pub fn join(self) -> Result<ProxyReport, Error> {
        self.worker.join()
    }

    pub fn is_finished(&self) -> bool {
        self.worker.is_finished()
    }
}

impl fmt::Debug for ProxyHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyHandle")
            .field("ingress", &self.ingress)
            .field("egress", &self.egress)
            .field("finished", &self.is_finished())
            .finish()
    }
}
