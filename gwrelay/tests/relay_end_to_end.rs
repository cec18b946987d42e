//! Relay facade against real libzmq peers.

use gwrelay::{dev_tracing, ContextError, Error, Relay, RelayConfig};
use std::time::{Duration, Instant};

fn egress_address() -> String {
    let port = portpicker::pick_unused_port().expect("no free port");
    format!("tcp://127.0.0.1:{port}")
}

fn ingress_address(name: &str) -> String {
    format!("ipc:///tmp/gwrelay-{}-{}", name, std::process::id())
}

#[test]
fn test_test_publisher_reaches_consumer() {
    dev_tracing::init_tracing();
    let config = RelayConfig::new()
        .with_ingress(ingress_address("e2e"))
        .with_egress(egress_address())
        .with_test_publisher(true);
    let relay = Relay::start(config).unwrap();

    // proxy, debug subscriber, test publisher and two endpoint monitors
    assert_eq!(relay.context().worker_count(), 5);

    let peers = zmq::Context::new();
    let consumer = peers.socket(zmq::SUB).unwrap();
    consumer.set_linger(0).unwrap();
    consumer.set_rcvtimeo(5000).unwrap();
    consumer.set_subscribe(b"PUB-").unwrap();
    consumer.connect(relay.proxy().egress_endpoint()).unwrap();

    let msg = consumer.recv_bytes(0).expect("no synthetic message within 5s");
    let msg = String::from_utf8(msg).unwrap();
    assert_eq!(msg.len(), 11, "{msg}");
    assert!(msg.starts_with("PUB-"));

    drop(consumer);
    let started = Instant::now();
    relay.shutdown().unwrap();
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[test]
fn test_start_failure_is_reported() {
    dev_tracing::init_tracing();
    let taken = egress_address();
    let first = Relay::start(
        RelayConfig::new()
            .with_ingress(ingress_address("first"))
            .with_egress(taken.clone()),
    )
    .unwrap();

    let second = Relay::start(
        RelayConfig::new()
            .with_ingress(ingress_address("second"))
            .with_egress(taken),
    );
    assert!(matches!(second, Err(Error::Bind(_))));

    first.shutdown().unwrap();
}

#[test]
fn test_shutdown_twice_is_rejected() {
    dev_tracing::init_tracing();
    let relay = Relay::start(
        RelayConfig::new()
            .with_ingress(ingress_address("twice"))
            .with_egress(egress_address()),
    )
    .unwrap();
    let ctx = relay.context().clone();

    relay.shutdown().unwrap();
    assert!(ctx.is_destroyed());
    assert!(matches!(ctx.destroy(), Err(ContextError::AlreadyDestroyed)));
}
