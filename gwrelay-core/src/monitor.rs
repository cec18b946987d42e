//! Socket lifecycle event model.
//!
//! A socket monitor reports each lifecycle transition as a two-part message:
//! a 6-byte header (`u16` event code, `u32` auxiliary value, native byte
//! order) marked "more", followed by the peer address string as the final
//! frame. This module decodes and classifies those messages; reading them
//! off the wire is the transport crate's job.

use std::fmt;

use crate::error::FramingError;

/// Size of the binary event header.
pub const HEADER_LEN: usize = 6;

/// Event code emitted once when the monitored socket stops being monitored
/// (socket closed or monitoring disabled). Ends an event stream.
pub const MONITOR_STOPPED: u16 = 0x0400;

/// Mask subscribing a monitor to every event.
pub const ALL_EVENTS: i32 = 0xFFFF;

/// Known lifecycle event kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MonitorEventKind {
    /// Connection established to a peer
    Connected,
    /// Synchronous connect failed, will be retried asynchronously
    ConnectDelayed,
    /// Reconnect attempt scheduled (value: interval in ms)
    ConnectRetried,
    /// Socket bound and listening
    Listening,
    /// Bind failed (value: errno)
    BindFailed,
    /// Incoming connection accepted (value: fd)
    Accepted,
    /// Incoming connection could not be accepted (value: errno)
    AcceptFailed,
    /// Connection closed (value: fd)
    Closed,
    /// Close failed (value: errno)
    CloseFailed,
    /// Peer disconnected unexpectedly (value: fd)
    Disconnected,
    /// Any other code
    Unknown,
}

impl MonitorEventKind {
    /// Classify a numeric event code.
    #[must_use]
    pub const fn from_code(code: u16) -> Self {
        match code {
            0x0001 => Self::Connected,
            0x0002 => Self::ConnectDelayed,
            0x0004 => Self::ConnectRetried,
            0x0008 => Self::Listening,
            0x0010 => Self::BindFailed,
            0x0020 => Self::Accepted,
            0x0040 => Self::AcceptFailed,
            0x0080 => Self::Closed,
            0x0100 => Self::CloseFailed,
            0x0200 => Self::Disconnected,
            _ => Self::Unknown,
        }
    }

    /// Upper-case name used in logs.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Connected => "CONNECTED",
            Self::ConnectDelayed => "CONNECT_DELAYED",
            Self::ConnectRetried => "CONNECT_RETRIED",
            Self::Listening => "LISTENING",
            Self::BindFailed => "BIND_FAILED",
            Self::Accepted => "ACCEPTED",
            Self::AcceptFailed => "ACCEPT_FAILED",
            Self::Closed => "CLOSED",
            Self::CloseFailed => "CLOSE_FAILED",
            Self::Disconnected => "DISCONNECTED",
            Self::Unknown => "UNKNOWN",
        }
    }

    /// Whether the event reports a failure.
    #[must_use]
    pub const fn is_failure(&self) -> bool {
        matches!(self, Self::BindFailed | Self::AcceptFailed | Self::CloseFailed)
    }
}

impl fmt::Display for MonitorEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One lifecycle transition on a monitored endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorEvent {
    pub code: u16,
    pub value: u32,
    pub peer_address: String,
}

impl MonitorEvent {
    #[must_use]
    pub const fn kind(&self) -> MonitorEventKind {
        MonitorEventKind::from_code(self.code)
    }

    /// True for the terminal notification sent when monitoring stops.
    #[must_use]
    pub const fn is_monitor_stopped(&self) -> bool {
        self.code == MONITOR_STOPPED
    }

    /// Decode an event from its two parts and their "more" flags.
    ///
    /// # Errors
    ///
    /// Returns a [`FramingError`] if the header is not marked "more", the
    /// address is not final, or the header is not [`HEADER_LEN`] bytes.
    pub fn decode(
        header: &[u8],
        header_more: bool,
        address: &[u8],
        address_more: bool,
    ) -> Result<Self, FramingError> {
        if !header_more {
            return Err(FramingError::MissingMoreFlag { part: "header" });
        }
        if address_more {
            return Err(FramingError::UnexpectedMoreFlag { part: "address" });
        }
        let (code, value) = decode_header(header)?;

        Ok(Self {
            code,
            value,
            peer_address: String::from_utf8_lossy(address).into_owned(),
        })
    }

    /// Encode the header part (used by tests and loopback tooling).
    #[must_use]
    pub fn encode_header(&self) -> [u8; HEADER_LEN] {
        let mut header = [0u8; HEADER_LEN];
        header[..2].copy_from_slice(&self.code.to_ne_bytes());
        header[2..].copy_from_slice(&self.value.to_ne_bytes());
        header
    }
}

impl fmt::Display for MonitorEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} event {} with value={} for address={}",
            self.kind(),
            self.code,
            self.value,
            self.peer_address
        )
    }
}

fn decode_header(header: &[u8]) -> Result<(u16, u32), FramingError> {
    let header: &[u8; HEADER_LEN] = header.try_into().map_err(|_| FramingError::HeaderSize {
        expected: HEADER_LEN,
        actual: header.len(),
    })?;
    let code = u16::from_ne_bytes([header[0], header[1]]);
    let value = u32::from_ne_bytes([header[2], header[3], header[4], header[5]]);
    Ok((code, value))
}
