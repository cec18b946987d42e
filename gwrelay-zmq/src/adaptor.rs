//! Gateway listener setup.

use tracing::info;

use gwrelay_core::options::EndpointOptions;
use gwrelay_core::role::Role;

use crate::binder::Binder;
use crate::context::LifecycleContext;
use crate::error::Error;
use crate::proxy::{ForwardingProxy, ProxyHandle};

/// Bind ingress and egress, optionally monitor them, and start the relay.
///
/// Bind failures are returned before any thread is started. The relay keeps
/// running until [`ProxyHandle::stop`] or [`LifecycleContext::destroy`].
pub fn start_proxy(
    ctx: &LifecycleContext,
    ingress_address: &str,
    egress_address: &str,
    debug: bool,
) -> Result<ProxyHandle, Error> {
    start_proxy_with_options(
        ctx,
        ingress_address,
        egress_address,
        debug,
        &EndpointOptions::default(),
    )
}

/// [`start_proxy`] with explicit endpoint options.
pub fn start_proxy_with_options(
    ctx: &LifecycleContext,
    ingress_address: &str,
    egress_address: &str,
    debug: bool,
    options: &EndpointOptions,
) -> Result<ProxyHandle, Error> {
    info!("Starting Gateway Listener");

    let binder = Binder::new(ctx)
        .with_options(options.clone())
        .with_monitor(debug);
    let ingress = binder.bind(ingress_address, Role::IngressSubscribe)?;
    let egress = binder.bind(egress_address, Role::EgressPublish)?;

    ForwardingProxy::new(ingress, egress).run(ctx)
}
