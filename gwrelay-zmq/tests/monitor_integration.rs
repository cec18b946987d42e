//! Event monitor tests.

use bytes::Bytes;
use gwrelay_core::error::FramingError;
use gwrelay_core::monitor::{MonitorEvent, MonitorEventKind, ALL_EVENTS, MONITOR_STOPPED};
use gwrelay_core::role::Role;
use gwrelay_zmq::{binder, spawn_monitor, EventMonitor, LifecycleContext, MonitorError};
use std::time::Duration;

fn next_of_kind(monitor: &mut EventMonitor, kind: MonitorEventKind) -> MonitorEvent {
    while let Some(item) = monitor.next() {
        let event = item.unwrap_or_else(|e| panic!("waiting for {kind}: {e}"));
        if event.kind() == kind {
            return event;
        }
    }
    panic!("monitor stream ended before {kind}");
}

#[test]
fn test_listening_and_accepted_events() {
    let ctx = LifecycleContext::init().unwrap();
    let egress = binder::bind(&ctx, "tcp://127.0.0.1:*", Role::EgressPublish).unwrap();

    egress
        .socket()
        .monitor("inproc://monitor/test-xpub", ALL_EVENTS)
        .unwrap();
    let mut monitor = EventMonitor::attach(&ctx, "inproc://monitor/test-xpub").unwrap();
    monitor.set_read_timeout(Some(Duration::from_secs(5))).unwrap();

    // A second listener on the monitored socket.
    egress.socket().bind("tcp://127.0.0.1:*").unwrap();
    let listening = next_of_kind(&mut monitor, MonitorEventKind::Listening);
    assert!(listening.peer_address.starts_with("tcp://127.0.0.1:"));

    let peers = zmq::Context::new();
    let consumer = peers.socket(zmq::SUB).unwrap();
    consumer.set_linger(0).unwrap();
    consumer.connect(egress.last_endpoint()).unwrap();

    let accepted = next_of_kind(&mut monitor, MonitorEventKind::Accepted);
    assert!(accepted.peer_address.starts_with("tcp://127.0.0.1:"));

    // Closing the monitored socket ends the stream.
    drop(egress);
    let mut remaining = 0;
    while let Some(item) = monitor.next() {
        assert!(item.is_ok(), "{item:?}");
        remaining += 1;
        assert!(remaining < 100, "monitor stream did not end");
    }
    assert!(monitor.next().is_none());

    drop(consumer);
    drop(monitor);
    ctx.destroy().unwrap();
}

#[test]
fn test_malformed_events_fail_single_read() {
    let ctx = LifecycleContext::init().unwrap();
    let source = binder::bind(&ctx, "inproc://fake-monitor", Role::MonitorPair).unwrap();
    let mut monitor = EventMonitor::attach(&ctx, "inproc://fake-monitor").unwrap();
    monitor.set_read_timeout(Some(Duration::from_secs(5))).unwrap();

    let accepted = MonitorEvent {
        code: 0x0020,
        value: 12,
        peer_address: "tcp://127.0.0.1:6001".into(),
    };
    let header = Bytes::copy_from_slice(&accepted.encode_header());
    let address = Bytes::from_static(b"tcp://127.0.0.1:6001");

    // Header without the "more" flag.
    source.send_message(&[header.clone()]).unwrap();
    // Address followed by an extra part.
    source
        .send_message(&[header.clone(), address.clone(), Bytes::from_static(b"extra")])
        .unwrap();
    // Short header.
    source
        .send_message(&[header.slice(..4), address.clone()])
        .unwrap();
    // Well formed.
    source.send_message(&[header, address.clone()]).unwrap();

    assert_eq!(
        monitor.next(),
        Some(Err(MonitorError::Framing(FramingError::MissingMoreFlag {
            part: "header"
        })))
    );
    assert_eq!(
        monitor.next(),
        Some(Err(MonitorError::Framing(FramingError::UnexpectedMoreFlag {
            part: "address"
        })))
    );
    assert_eq!(
        monitor.next(),
        Some(Err(MonitorError::Framing(FramingError::HeaderSize {
            expected: 6,
            actual: 4
        })))
    );
    assert_eq!(monitor.next(), Some(Ok(accepted)));

    let stopped = MonitorEvent {
        code: MONITOR_STOPPED,
        value: 0,
        peer_address: String::new(),
    };
    source
        .send_message(&[Bytes::copy_from_slice(&stopped.encode_header()), Bytes::new()])
        .unwrap();
    assert_eq!(monitor.next(), None);

    drop(monitor);
    drop(source);
    ctx.destroy().unwrap();
}

#[test]
fn test_read_timeout() {
    let ctx = LifecycleContext::init().unwrap();
    let source = binder::bind(&ctx, "inproc://quiet-monitor", Role::MonitorPair).unwrap();
    let mut monitor = EventMonitor::attach(&ctx, "inproc://quiet-monitor").unwrap();
    monitor.set_read_timeout(Some(Duration::from_millis(20))).unwrap();

    assert_eq!(monitor.next(), Some(Err(MonitorError::Timeout)));

    drop(monitor);
    drop(source);
    ctx.destroy().unwrap();
}

#[test]
fn test_spawned_monitor_stops_when_socket_closes() {
    let ctx = LifecycleContext::init().unwrap();
    let ingress = binder::bind(&ctx, "tcp://127.0.0.1:*", Role::IngressSubscribe).unwrap();
    let handle = spawn_monitor(&ctx, &ingress, "ingress").unwrap();
    assert!(handle.address().starts_with("inproc://monitor/xsub-"));
    assert_eq!(ctx.worker_count(), 1);

    drop(ingress);
    handle.join();
    assert_eq!(ctx.worker_count(), 0);
    ctx.destroy().unwrap();
}

#[test]
fn test_monitor_stop_command() {
    let ctx = LifecycleContext::init().unwrap();
    let egress = binder::bind(&ctx, "tcp://127.0.0.1:*", Role::EgressPublish).unwrap();
    let handle = spawn_monitor(&ctx, &egress, "egress").unwrap();

    handle.stop().unwrap();
    handle.join();
    assert_eq!(ctx.worker_count(), 0);

    drop(egress);
    ctx.destroy().unwrap();
}
