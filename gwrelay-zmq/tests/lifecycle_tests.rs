//! Context lifecycle and binder error tests.

use gwrelay_core::options::EndpointOptions;
use gwrelay_core::role::Role;
use gwrelay_zmq::{binder, BindError, ContextConfig, ContextError, LifecycleContext};
use std::time::Duration;

#[test]
fn test_init_then_destroy() {
    let ctx = LifecycleContext::init().unwrap();
    assert_eq!(ctx.endpoint_count(), 0);
    assert_eq!(ctx.worker_count(), 0);
    ctx.destroy().unwrap();
}

#[test]
fn test_destroy_is_not_repeatable() {
    let ctx = LifecycleContext::init().unwrap();
    ctx.destroy().unwrap();
    assert!(matches!(ctx.destroy(), Err(ContextError::AlreadyDestroyed)));
}

#[test]
fn test_destroy_waits_for_released_endpoints() {
    let ctx = LifecycleContext::init().unwrap();
    let ingress = binder::bind(&ctx, "tcp://127.0.0.1:*", Role::IngressSubscribe).unwrap();
    let egress = binder::bind(&ctx, "tcp://127.0.0.1:*", Role::EgressPublish).unwrap();
    assert_eq!(ctx.endpoint_count(), 2);

    drop(ingress);
    drop(egress);
    ctx.destroy().unwrap();
}

#[test]
fn test_destroy_reports_held_endpoint() {
    let ctx = LifecycleContext::init_with_config(
        ContextConfig::default().with_shutdown_timeout(Duration::from_millis(100)),
    )
    .unwrap();
    let held = binder::bind(&ctx, "tcp://127.0.0.1:*", Role::EgressPublish).unwrap();

    match ctx.destroy() {
        Err(ContextError::Leaked { endpoints, workers }) => {
            assert_eq!(endpoints, 1);
            assert_eq!(workers, 0);
        }
        other => panic!("expected Leaked, got {:?}", other),
    }

    // Still usable as a socket after the failed teardown; released on drop.
    assert!(held.last_endpoint().starts_with("tcp://"));
    drop(held);
    assert_eq!(ctx.endpoint_count(), 0);
}

#[test]
fn test_address_in_use() {
    let ctx = LifecycleContext::init().unwrap();
    let first = binder::bind(&ctx, "tcp://127.0.0.1:*", Role::EgressPublish).unwrap();
    let taken = first.last_endpoint().to_string();

    let err = binder::bind(&ctx, &taken, Role::EgressPublish).unwrap_err();
    assert!(matches!(err, BindError::AddressInUse { ref address } if *address == taken));
    assert_eq!(ctx.endpoint_count(), 1);

    drop(first);
    ctx.destroy().unwrap();
}

#[test]
fn test_unresolvable_addresses() {
    let ctx = LifecycleContext::init().unwrap();

    let err = binder::bind(&ctx, "tcp://no-such-interface-gwrelay:6001", Role::IngressSubscribe)
        .unwrap_err();
    assert!(matches!(err, BindError::Unresolvable { .. }), "{err:?}");

    let err = binder::bind(
        &ctx,
        "ipc:///nonexistent-gwrelay-dir/nginx_queue_listen",
        Role::IngressSubscribe,
    )
    .unwrap_err();
    assert!(matches!(err, BindError::Unresolvable { .. }), "{err:?}");

    assert_eq!(ctx.endpoint_count(), 0);
    ctx.destroy().unwrap();
}

#[test]
fn test_malformed_addresses() {
    let ctx = LifecycleContext::init().unwrap();
    for address in ["", "tcp://127.0.0.1", "tcp://127.0.0.1:port", "ws://x:1", "inproc://"] {
        let err = binder::bind(&ctx, address, Role::EgressPublish).unwrap_err();
        assert!(matches!(err, BindError::InvalidAddress(_)), "{address}: {err:?}");
    }
    ctx.destroy().unwrap();
}

#[test]
fn test_bind_after_destroy() {
    let ctx = LifecycleContext::init().unwrap();
    ctx.destroy().unwrap();
    assert!(matches!(
        binder::bind(&ctx, "tcp://127.0.0.1:*", Role::EgressPublish),
        Err(BindError::ContextDestroyed)
    ));
}

#[test]
fn test_ipc_abstract_and_inproc() {
    let ctx = LifecycleContext::init().unwrap();
    let name = format!("ipc://@gwrelay_test_{}", std::process::id());
    let ipc = binder::bind(&ctx, &name, Role::IngressSubscribe).unwrap();
    let inproc = binder::bind(&ctx, "inproc://gwrelay-test", Role::EgressPublish).unwrap();

    assert!(ipc.address().is_ipc());
    assert!(inproc.address().is_inproc());

    let consumer = binder::connect(&ctx, "inproc://gwrelay-test", Role::IngressSubscribe).unwrap();
    assert_eq!(consumer.role(), Role::IngressSubscribe);
    assert_eq!(ctx.endpoint_count(), 3);

    drop(consumer);
    drop(ipc);
    drop(inproc);
    ctx.destroy().unwrap();
}

#[test]
fn test_options_applied() {
    let ctx = LifecycleContext::init().unwrap();
    let options = EndpointOptions::new()
        .with_send_hwm(10_000)
        .with_recv_hwm(20_000)
        .with_linger(Some(Duration::from_millis(250)));
    let ep = binder::bind_with_options(&ctx, "tcp://127.0.0.1:*", Role::EgressPublish, &options)
        .unwrap();

    let socket = ep.socket();
    assert_eq!(socket.get_sndhwm().unwrap(), 10_000);
    assert_eq!(socket.get_rcvhwm().unwrap(), 20_000);
    assert_eq!(socket.get_linger().unwrap(), 250);
    assert_eq!(socket.get_tcp_keepalive().unwrap(), 1);
    assert_eq!(socket.get_tcp_keepalive_idle().unwrap(), 300);

    drop(ep);
    ctx.destroy().unwrap();
}
