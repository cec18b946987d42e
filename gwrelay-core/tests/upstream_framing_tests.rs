//! Integration tests for the upstream framing rules

use bytes::Bytes;
use gwrelay_core::command::{ProxyCommand, ProxyStats};
use gwrelay_core::error::FramingError;
use gwrelay_core::subscription::{validate_control_message, SubscriptionControl};

#[test]
fn test_consumer_subscription_shapes() {
    // What a SUB socket emits for set_subscribe("X") and set_unsubscribe("X")
    let sub = vec![Bytes::from_static(b"\x01X")];
    let unsub = vec![Bytes::from_static(b"\x00X")];

    let parsed = validate_control_message(&sub).unwrap();
    assert!(parsed.is_subscribe());
    assert_eq!(parsed.topic(), &Bytes::from_static(b"X"));

    let parsed = validate_control_message(&unsub).unwrap();
    assert!(!parsed.is_subscribe());
    assert_eq!(parsed.to_frame(), unsub[0]);
}

#[test]
fn test_catch_all_subscription() {
    let msg = vec![SubscriptionControl::Subscribe(Bytes::new()).to_frame()];
    assert_eq!(msg[0].as_ref(), b"\x01");

    let parsed = validate_control_message(&msg).unwrap();
    assert!(parsed.topic().is_empty());
}

#[test]
fn test_data_shaped_messages_rejected() {
    let data = vec![Bytes::from_static(b"PUB-A-00001")];
    assert_eq!(
        validate_control_message(&data),
        Err(FramingError::NotAControlFrame { leading: Some(b'P') })
    );

    let multipart = vec![Bytes::from_static(b"\x01X"), Bytes::from_static(b"payload")];
    assert_eq!(
        validate_control_message(&multipart),
        Err(FramingError::UnexpectedFrameCount {
            expected: 1,
            actual: 2
        })
    );

    assert_eq!(validate_control_message(&[]), Err(FramingError::EmptyMessage));
    assert_eq!(
        validate_control_message(&[Bytes::new()]),
        Err(FramingError::NotAControlFrame { leading: None })
    );
}

#[test]
fn test_statistics_reply_shape() {
    let stats = ProxyStats {
        ingress_messages: 500_001,
        ingress_bytes: 5_000_010,
        upstream_non_control: 3,
        ..ProxyStats::default()
    };

    let frames = stats.to_frames();
    assert_eq!(frames.len(), 8);
    assert!(frames.iter().all(|f| f.len() == 8));
    assert_eq!(ProxyStats::from_frames(&frames), Some(stats));
    assert_eq!(ProxyStats::from_frames(&frames[..7]), None);
}

#[test]
fn test_command_names_are_case_sensitive() {
    assert_eq!(ProxyCommand::parse(b"TERMINATE"), Some(ProxyCommand::Terminate));
    assert_eq!(ProxyCommand::parse(b"Terminate"), None);
    assert_eq!(ProxyCommand::parse(b""), None);
}
