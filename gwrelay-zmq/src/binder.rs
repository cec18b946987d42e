//! Endpoint binder.
//!
//! Creates an [`Endpoint`] of a given [`Role`], applies [`EndpointOptions`],
//! optionally installs a debug monitor, and binds or connects it. Transport
//! failures are mapped onto [`BindError`] and returned to the caller.
//!
//! # Examples
//!
//! ```no_run
//! use gwrelay_core::role::Role;
//! use gwrelay_zmq::{binder, LifecycleContext};
//!
//! let ctx = LifecycleContext::init()?;
//! let egress = binder::bind(&ctx, "tcp://0.0.0.0:6001", Role::EgressPublish)?;
//! println!("listening on {}", egress.last_endpoint());
//! # Ok::<(), gwrelay_zmq::Error>(())
//! ```

use tracing::{debug, error, info};

use gwrelay_core::address::Address;
use gwrelay_core::options::EndpointOptions;
use gwrelay_core::role::Role;

use crate::context::LifecycleContext;
use crate::endpoint::Endpoint;
use crate::error::BindError;
use crate::monitor;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Attach {
    Bind,
    Connect,
}

/// Builder for endpoints sharing one set of options.
#[derive(Debug, Clone)]
pub struct Binder<'a> {
    ctx: &'a LifecycleContext,
    options: EndpointOptions,
    monitor: bool,
}

impl<'a> Binder<'a> {
    pub fn new(ctx: &'a LifecycleContext) -> Self {
        Self {
            ctx,
            options: EndpointOptions::default(),
            monitor: false,
        }
    }

    pub fn with_options(mut self, options: EndpointOptions) -> Self {
        self.options = options;
        self
    }

    /// Attach a logging event monitor to each endpoint before it binds.
    pub fn with_monitor(mut self, enabled: bool) -> Self {
        self.monitor = enabled;
        self
    }

    /// Create an endpoint and bind it to `address`.
    pub fn bind(&self, address: &str, role: Role) -> Result<Endpoint, BindError> {
        self.open(address, role, Attach::Bind)
    }

    /// Create an endpoint and connect it to `address`.
    pub fn connect(&self, address: &str, role: Role) -> Result<Endpoint, BindError> {
        self.open(address, role, Attach::Connect)
    }

    fn open(&self, address: &str, role: Role, attach: Attach) -> Result<Endpoint, BindError> {
        let parsed = Address::parse(address)?;
        if attach == Attach::Bind {
            check_ipc_parent(&parsed, address)?;
        }

        let socket = self
            .ctx
            .socket(socket_type(role))
            .map_err(|e| BindError::from_zmq(address, e))?;
        apply_options(&socket, &parsed, role, &self.options)
            .map_err(|e| BindError::from_zmq(address, e))?;

        // Installed before bind so LISTENING / BIND_FAILED are observed.
        let monitor = if self.monitor {
            Some(monitor::attach_logger(self.ctx, &socket, role)?)
        } else {
            None
        };

        let result = match attach {
            Attach::Bind => socket.bind(address),
            Attach::Connect => socket.connect(address),
        };
        if let Err(e) = result {
            error!("[{}] Failed to {:?} {}: {}", role.socket_type_name(), attach, address, e);
            return Err(BindError::from_zmq(address, e));
        }

        let last_endpoint = socket
            .get_last_endpoint()
            .ok()
            .and_then(Result::ok)
            .unwrap_or_else(|| address.to_string());
        let registration = self
            .ctx
            .register_endpoint(&last_endpoint, role)
            .map_err(|e| BindError::from_zmq(address, e))?;

        match attach {
            Attach::Bind => info!("[{}] Bound to {}", role.socket_type_name(), last_endpoint),
            Attach::Connect => info!("[{}] Connected to {}", role.socket_type_name(), last_endpoint),
        }

        Ok(Endpoint::new(
            socket,
            parsed,
            last_endpoint,
            role,
            registration,
            monitor,
        ))
    }
}

/// Bind a new endpoint with default options.
pub fn bind(ctx: &LifecycleContext, address: &str, role: Role) -> Result<Endpoint, BindError> {
    Binder::new(ctx).bind(address, role)
}

/// Bind a new endpoint with explicit options.
pub fn bind_with_options(
    ctx: &LifecycleContext,
    address: &str,
    role: Role,
    options: &EndpointOptions,
) -> Result<Endpoint, BindError> {
    Binder::new(ctx).with_options(options.clone()).bind(address, role)
}

/// Connect a new endpoint with default options.
pub fn connect(ctx: &LifecycleContext, address: &str, role: Role) -> Result<Endpoint, BindError> {
    Binder::new(ctx).connect(address, role)
}

/// Connect a new endpoint with explicit options.
pub fn connect_with_options(
    ctx: &LifecycleContext,
    address: &str,
    role: Role,
    options: &EndpointOptions,
) -> Result<Endpoint, BindError> {
    Binder::new(ctx).with_options(options.clone()).connect(address, role)
}

fn socket_type(role: Role) -> zmq::SocketType {
    match role {
        Role::IngressSubscribe => zmq::XSUB,
        Role::EgressPublish => zmq::XPUB,
        Role::MonitorPair => zmq::PAIR,
        Role::Consumer => zmq::SUB,
        Role::Publisher => zmq::PUB,
    }
}

fn apply_options(
    socket: &zmq::Socket,
    address: &Address,
    role: Role,
    options: &EndpointOptions,
) -> Result<(), zmq::Error> {
    socket.set_linger(options.linger_millis())?;
    socket.set_sndhwm(options.send_hwm_i32())?;
    socket.set_rcvhwm(options.recv_hwm_i32())?;
    socket.set_rcvtimeo(options.recv_timeout_millis())?;

    if role == Role::EgressPublish {
        let verbose = options.xpub_verbose.unwrap_or(role.echoes_subscriptions());
        socket.set_xpub_verbose(verbose)?;
    }

    if let (true, Some(keepalive)) = (address.is_tcp(), options.tcp_keepalive) {
        socket.set_tcp_keepalive(1)?;
        socket.set_tcp_keepalive_idle(keepalive.idle)?;
        socket.set_tcp_keepalive_cnt(keepalive.count)?;
        socket.set_tcp_keepalive_intvl(keepalive.interval)?;
    }

    debug!(
        "[{}] Options applied: linger={}ms sndhwm={} rcvhwm={}",
        role.socket_type_name(),
        options.linger_millis(),
        options.send_hwm,
        options.recv_hwm
    );
    Ok(())
}

/// Filesystem IPC sockets need an existing parent directory.
fn check_ipc_parent(address: &Address, raw: &str) -> Result<(), BindError> {
    let Some(parent) = address.ipc_path().and_then(std::path::Path::parent) else {
        return Ok(());
    };
    if parent.as_os_str().is_empty() || parent.is_dir() {
        return Ok(());
    }
    Err(BindError::Unresolvable {
        address: raw.to_string(),
        reason: format!("directory {} does not exist", parent.display()),
    })
}
