//! Transport-agnostic error types.
//!
//! Transport-specific failures (bind, receive, context teardown) live in the
//! transport crate; this module holds the errors the sans-IO codecs produce.

use thiserror::Error;

/// A message did not have the multi-frame shape the reader expected.
///
/// Aborts the one read that produced it; the reading loop may continue with
/// the next message.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FramingError {
    /// Message carried no frames at all
    #[error("empty message")]
    EmptyMessage,

    /// Wrong number of frames
    #[error("expected {expected} frame(s), got {actual}")]
    UnexpectedFrameCount { expected: usize, actual: usize },

    /// Upstream-bound message is not a subscription control frame
    #[error("not a subscription control frame (leading byte {leading:?})")]
    NotAControlFrame { leading: Option<u8> },

    /// A part that must be followed by more frames was marked final
    #[error("{part} part must be followed by more frames")]
    MissingMoreFlag { part: &'static str },

    /// A part that must be final was marked as having more frames
    #[error("{part} part must be the final frame")]
    UnexpectedMoreFlag { part: &'static str },

    /// Monitor event header has the wrong size
    #[error("monitor event header must be {expected} bytes, got {actual}")]
    HeaderSize { expected: usize, actual: usize },
}

impl FramingError {
    /// Check if this error came from a monitor event rather than a relayed message
    #[must_use]
    pub const fn is_monitor_framing(&self) -> bool {
        matches!(
            self,
            Self::MissingMoreFlag { .. } | Self::UnexpectedMoreFlag { .. } | Self::HeaderSize { .. }
        )
    }
}
