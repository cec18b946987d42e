//! Control-channel vocabulary for relay and monitor workers.
//!
//! Workers watch a side channel alongside their data endpoints. Commands are
//! single-frame ASCII words, the same vocabulary as libzmq's steerable proxy.

use bytes::Bytes;
use std::fmt;

/// A command delivered over a worker's control channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProxyCommand {
    /// Stop relaying; messages stay queued in the transport.
    Pause,
    /// Resume relaying after a pause.
    Resume,
    /// Exit the loop and release the endpoints.
    Terminate,
    /// Reply with a [`ProxyStats`] snapshot.
    Statistics,
}

impl ProxyCommand {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pause => "PAUSE",
            Self::Resume => "RESUME",
            Self::Terminate => "TERMINATE",
            Self::Statistics => "STATISTICS",
        }
    }

    /// Parse a command frame. Unknown words return `None`.
    #[must_use]
    pub fn parse(frame: &[u8]) -> Option<Self> {
        match frame {
            b"PAUSE" => Some(Self::Pause),
            b"RESUME" => Some(Self::Resume),
            b"TERMINATE" => Some(Self::Terminate),
            b"STATISTICS" => Some(Self::Statistics),
            _ => None,
        }
    }
}

impl fmt::Display for ProxyCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Counters kept by a relay loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProxyStats {
    /// Data messages relayed ingress → egress
    pub ingress_messages: u64,
    pub ingress_frames: u64,
    pub ingress_bytes: u64,
    /// Messages relayed egress → ingress
    pub egress_messages: u64,
    pub egress_frames: u64,
    pub egress_bytes: u64,
    /// Upstream messages that were not a subscription control frame
    /// (relayed like any other message)
    pub upstream_non_control: u64,
    /// Messages dropped because the destination refused the send
    pub dropped_sends: u64,
}

impl ProxyStats {
    const FIELDS: usize = 8;

    /// Encode as eight big-endian `u64` frames.
    #[must_use]
    pub fn to_frames(&self) -> Vec<Bytes> {
        [
            self.ingress_messages,
            self.ingress_frames,
            self.ingress_bytes,
            self.egress_messages,
            self.egress_frames,
            self.egress_bytes,
            self.upstream_non_control,
            self.dropped_sends,
        ]
        .iter()
        .map(|n| Bytes::copy_from_slice(&n.to_be_bytes()))
        .collect()
    }

    /// Decode a statistics reply. `None` if the shape is wrong.
    #[must_use]
    pub fn from_frames<F: AsRef<[u8]>>(frames: &[F]) -> Option<Self> {
        if frames.len() != Self::FIELDS {
            return None;
        }
        let mut values = [0u64; Self::FIELDS];
        for (slot, frame) in values.iter_mut().zip(frames) {
            *slot = u64::from_be_bytes(frame.as_ref().try_into().ok()?);
        }
        let [ingress_messages, ingress_frames, ingress_bytes, egress_messages, egress_frames, egress_bytes, upstream_non_control, dropped_sends] =
            values;
        Some(Self {
            ingress_messages,
            ingress_frames,
            ingress_bytes,
            egress_messages,
            egress_frames,
            egress_bytes,
            upstream_non_control,
            dropped_sends,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        for cmd in [
            ProxyCommand::Pause,
            ProxyCommand::Resume,
            ProxyCommand::Terminate,
            ProxyCommand::Statistics,
        ] {
            assert_eq!(ProxyCommand::parse(cmd.as_str().as_bytes()), Some(cmd));
        }
        assert_eq!(ProxyCommand::parse(b"terminate"), None);
        assert_eq!(ProxyCommand::parse(b"$TERM"), None);
    }

    #[test]
    fn test_stats_reply_shape() {
        let stats = ProxyStats {
            ingress_messages: 3,
            ingress_bytes: 30,
            upstream_non_control: 1,
            ..ProxyStats::default()
        };
        let frames = stats.to_frames();
        assert_eq!(frames.len(), 8);
        assert_eq!(ProxyStats::from_frames(&frames), Some(stats));

        assert_eq!(ProxyStats::from_frames(&frames[..7]), None);
        let mut short = frames.clone();
        short[0] = Bytes::from_static(b"\x01");
        assert_eq!(ProxyStats::from_frames(&short), None);
    }
}
