//! Subscription control frames.
//!
//! Subscribers tell an XPUB which topics they want with a single frame whose
//! first byte is `0x01` (subscribe) or `0x00` (unsubscribe), followed by the
//! topic prefix. The relay forwards these frames upstream untouched; this
//! module only classifies and validates them.

use bytes::Bytes;

use crate::error::FramingError;

/// Leading byte of a subscribe control frame.
pub const SUBSCRIBE: u8 = 0x01;

/// Leading byte of an unsubscribe control frame.
pub const UNSUBSCRIBE: u8 = 0x00;

/// A decoded subscription control frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscriptionControl {
    /// A peer subscribed to a topic prefix
    Subscribe(Bytes),
    /// A peer unsubscribed from a topic prefix
    Unsubscribe(Bytes),
}

impl SubscriptionControl {
    /// Decode a control frame.
    ///
    /// Format: `[0x01|0x00] [topic prefix...]`. Returns `None` for an empty
    /// frame or an unknown leading byte.
    #[must_use]
    pub fn from_frame(frame: &Bytes) -> Option<Self> {
        let (&marker, _) = frame.split_first()?;
        let topic = frame.slice(1..);
        match marker {
            SUBSCRIBE => Some(Self::Subscribe(topic)),
            UNSUBSCRIBE => Some(Self::Unsubscribe(topic)),
            _ => None,
        }
    }

    /// Encode this control message as a single frame.
    #[must_use]
    pub fn to_frame(&self) -> Bytes {
        let (marker, topic) = match self {
            Self::Subscribe(t) => (SUBSCRIBE, t),
            Self::Unsubscribe(t) => (UNSUBSCRIBE, t),
        };

        let mut frame = Vec::with_capacity(1 + topic.len());
        frame.push(marker);
        frame.extend_from_slice(topic);
        Bytes::from(frame)
    }

    /// Topic prefix carried by the frame
    #[must_use]
    pub const fn topic(&self) -> &Bytes {
        match self {
            Self::Subscribe(t) | Self::Unsubscribe(t) => t,
        }
    }

    #[must_use]
    pub const fn is_subscribe(&self) -> bool {
        matches!(self, Self::Subscribe(_))
    }
}

/// Check that a message travelling upstream is exactly one control frame.
///
/// # Errors
///
/// [`FramingError::EmptyMessage`], [`FramingError::UnexpectedFrameCount`] or
/// [`FramingError::NotAControlFrame`] when the shape does not conform.
pub fn validate_control_message(msg: &[Bytes]) -> Result<SubscriptionControl, FramingError> {
    match msg {
        [] => Err(FramingError::EmptyMessage),
        [frame] => SubscriptionControl::from_frame(frame).ok_or_else(|| {
            FramingError::NotAControlFrame {
                leading: frame.first().copied(),
            }
        }),
        frames => Err(FramingError::UnexpectedFrameCount {
            expected: 1,
            actual: frames.len(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subscribe_frame() {
        let sub = SubscriptionControl::Subscribe(Bytes::from_static(b"topic"));
        let frame = sub.to_frame();

        assert_eq!(frame[0], SUBSCRIBE);
        assert_eq!(&frame[1..], b"topic");
        assert_eq!(SubscriptionControl::from_frame(&frame), Some(sub));
    }

    #[test]
    fn test_unsubscribe_frame() {
        let frame = Bytes::from_static(b"\x00weather.");
        let parsed = SubscriptionControl::from_frame(&frame).unwrap();

        assert!(!parsed.is_subscribe());
        assert_eq!(parsed.topic(), &Bytes::from_static(b"weather."));
    }

    #[test]
    fn test_subscribe_all_is_single_byte() {
        let frame = Bytes::from_static(b"\x01");
        let parsed = SubscriptionControl::from_frame(&frame).unwrap();
        assert!(parsed.is_subscribe());
        assert!(parsed.topic().is_empty());
    }

    #[test]
    fn test_unknown_marker_rejected() {
        assert_eq!(SubscriptionControl::from_frame(&Bytes::from_static(b"PUB-A")), None);
        assert_eq!(SubscriptionControl::from_frame(&Bytes::new()), None);
    }

    #[test]
    fn test_validate_control_message() {
        let ok = validate_control_message(&[Bytes::from_static(b"\x01X")]).unwrap();
        assert_eq!(ok, SubscriptionControl::Subscribe(Bytes::from_static(b"X")));

        assert_eq!(validate_control_message(&[]), Err(FramingError::EmptyMessage));
        assert_eq!(
            validate_control_message(&[Bytes::from_static(b"\x01X"), Bytes::from_static(b"y")]),
            Err(FramingError::UnexpectedFrameCount {
                expected: 1,
                actual: 2
            })
        );
        assert_eq!(
            validate_control_message(&[Bytes::from_static(b"hello")]),
            Err(FramingError::NotAControlFrame { leading: Some(b'h') })
        );
    }
}
