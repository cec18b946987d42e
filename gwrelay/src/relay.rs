//! A running relay: context, proxy and diagnostics together.

use tracing::{error, info};

use gwrelay_zmq::{start_proxy_with_options, Error, LifecycleContext, ProxyHandle};

use crate::config::RelayConfig;
use crate::diagnostics::Diagnostics;

/// Owns the lifecycle context and everything started under it.
#[derive(Debug)]
pub struct Relay {
    ctx: LifecycleContext,
    proxy: ProxyHandle,
    diagnostics: Diagnostics,
}

impl Relay {
    /// Create a context, bind both endpoints and start relaying.
    ///
    /// On failure the context is destroyed before the error is returned.
    pub fn start(config: RelayConfig) -> Result<Self, Error> {
        let ctx = LifecycleContext::init_with_config(config.context.clone())?;

        match Self::start_in(&ctx, &config) {
            Ok((proxy, diagnostics)) => Ok(Self {
                ctx,
                proxy,
                diagnostics,
            }),
            Err(e) => {
                error!("Relay failed to start: {}", e);
                if let Err(teardown) = ctx.destroy() {
                    error!("Teardown after failed start: {}", teardown);
                }
                Err(e)
            }
        }
    }

    fn start_in(
        ctx: &LifecycleContext,
        config: &RelayConfig,
    ) -> Result<(ProxyHandle, Diagnostics), Error> {
        let proxy = start_proxy_with_options(
            ctx,
            &config.ingress,
            &config.egress,
            config.debug_enabled(),
            &config.endpoint_options,
        )?;
        let diagnostics = Diagnostics::start(
            ctx,
            proxy.ingress_endpoint(),
            proxy.egress_endpoint(),
            config.debug,
            config.test_publisher,
        )?;
        Ok((proxy, diagnostics))
    }

    pub fn context(&self) -> &LifecycleContext {
        &self.ctx
    }

    pub fn proxy(&self) -> &ProxyHandle {
        &self.proxy
    }

    /// Destroy the context, then collect the workers' results.
    pub fn shutdown(self) -> Result<(), Error> {
        let Self {
            ctx,
            proxy,
            diagnostics,
        } = self;

        ctx.destroy()?;

        let report = proxy.join()?;
        info!(
            "Relay stopped ({:?}): {} messages, {} bytes relayed",
            report.reason, report.stats.ingress_messages, report.stats.ingress_bytes
        );
        diagnostics.join()
    }
}
