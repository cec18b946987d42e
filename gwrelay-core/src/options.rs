//! Endpoint configuration options
//!
//! Transport-agnostic mirror of the libzmq socket options the relay cares
//! about. The binder translates these into `zmq_setsockopt` calls.

use std::time::Duration;

/// TCP keepalive tuning (ZMQ_TCP_KEEPALIVE*).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TcpKeepalive {
    /// Seconds of idle time before the first probe (ZMQ_TCP_KEEPALIVE_IDLE)
    pub idle: i32,
    /// Number of unanswered probes before the peer is dropped (ZMQ_TCP_KEEPALIVE_CNT)
    pub count: i32,
    /// Seconds between probes (ZMQ_TCP_KEEPALIVE_INTVL)
    pub interval: i32,
}

impl Default for TcpKeepalive {
    fn default() -> Self {
        Self {
            idle: 300,
            count: 300,
            interval: 300,
        }
    }
}

/// Endpoint configuration options.
///
/// # Examples
///
/// ```
/// use gwrelay_core::options::EndpointOptions;
/// use std::time::Duration;
///
/// let opts = EndpointOptions::default()
///     .with_send_hwm(10_000)
///     .with_linger(Some(Duration::from_millis(100)));
/// assert_eq!(opts.linger_millis(), 100);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointOptions {
    /// Linger timeout (ZMQ_LINGER)
    ///
    /// Time to wait for pending messages to be sent before closing.
    /// - `None`: Close immediately, discard pending messages (default)
    /// - `Some(duration)`: Wait up to duration for messages to be sent
    pub linger: Option<Duration>,

    /// High water mark for sending (ZMQ_SNDHWM)
    ///
    /// Messages beyond this are dropped by publish-side sockets, which is
    /// how slow consumers lose messages instead of growing memory.
    /// - Default: 1000 messages
    pub send_hwm: usize,

    /// High water mark for receiving (ZMQ_RCVHWM)
    /// - Default: 1000 messages
    pub recv_hwm: usize,

    /// TCP keepalive, applied to TCP addresses only.
    /// - Default: enabled with 300/300/300
    pub tcp_keepalive: Option<TcpKeepalive>,

    /// XPUB verbose mode (ZMQ_XPUB_VERBOSE)
    ///
    /// - `None`: follow the role (on for egress-publish endpoints)
    /// - `Some(flag)`: force the setting
    pub xpub_verbose: Option<bool>,

    /// Receive timeout (ZMQ_RCVTIMEO). `None` blocks indefinitely.
    pub recv_timeout: Option<Duration>,
}

impl Default for EndpointOptions {
    fn default() -> Self {
        Self {
            linger: None,
            send_hwm: 1000,
            recv_hwm: 1000,
            tcp_keepalive: Some(TcpKeepalive::default()),
            xpub_verbose: None,
            recv_timeout: None,
        }
    }
}

impl EndpointOptions {
    /// Create options with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set linger timeout.
    pub fn with_linger(mut self, linger: Option<Duration>) -> Self {
        self.linger = linger;
        self
    }

    /// Set send high water mark.
    pub fn with_send_hwm(mut self, hwm: usize) -> Self {
        self.send_hwm = hwm;
        self
    }

    /// Set receive high water mark.
    pub fn with_recv_hwm(mut self, hwm: usize) -> Self {
        self.recv_hwm = hwm;
        self
    }

    /// Set or disable TCP keepalive.
    pub fn with_tcp_keepalive(mut self, keepalive: Option<TcpKeepalive>) -> Self {
        self.tcp_keepalive = keepalive;
        self
    }

    /// Force XPUB verbose mode on or off.
    pub fn with_xpub_verbose(mut self, enabled: bool) -> Self {
        self.xpub_verbose = Some(enabled);
        self
    }

    /// Set receive timeout.
    pub fn with_recv_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.recv_timeout = timeout;
        self
    }

    /// Linger in the millisecond form libzmq expects.
    pub fn linger_millis(&self) -> i32 {
        self.linger.map_or(0, duration_millis)
    }

    /// Receive timeout in the millisecond form libzmq expects (`-1` = infinite).
    pub fn recv_timeout_millis(&self) -> i32 {
        self.recv_timeout.map_or(-1, duration_millis)
    }

    /// Send high water mark clamped to libzmq's `int`.
    pub fn send_hwm_i32(&self) -> i32 {
        i32::try_from(self.send_hwm).unwrap_or(i32::MAX)
    }

    /// Receive high water mark clamped to libzmq's `int`.
    pub fn recv_hwm_i32(&self) -> i32 {
        i32::try_from(self.recv_hwm).unwrap_or(i32::MAX)
    }
}

fn duration_millis(d: Duration) -> i32 {
    i32::try_from(d.as_millis()).unwrap_or(i32::MAX)
}
