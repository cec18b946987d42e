//! Relay configuration.

use gwrelay_core::options::EndpointOptions;
use gwrelay_zmq::ContextConfig;

/// Where gateway publishers connect.
pub const DEFAULT_INGRESS: &str = "ipc:///tmp/nginx_queue_listen";

/// Where downstream consumers connect.
pub const DEFAULT_EGRESS: &str = "tcp://0.0.0.0:6001";

/// Everything needed to start a [`Relay`](crate::Relay).
///
/// # Examples
///
/// ```
/// use gwrelay::RelayConfig;
///
/// let config = RelayConfig::default()
///     .with_egress("tcp://127.0.0.1:7001")
///     .with_test_publisher(true);
/// assert!(config.debug_enabled());
/// assert_eq!(config.ingress, gwrelay::DEFAULT_INGRESS);
/// ```
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Ingress (XSUB) address, bound by the relay
    pub ingress: String,
    /// Egress (XPUB) address, bound by the relay
    pub egress: String,
    /// Monitor both endpoints and run the debug subscriber
    pub debug: bool,
    /// Run the synthetic publisher; implies `debug`
    pub test_publisher: bool,
    /// Options applied to the ingress and egress endpoints
    pub endpoint_options: EndpointOptions,
    pub context: ContextConfig,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            ingress: DEFAULT_INGRESS.to_string(),
            egress: DEFAULT_EGRESS.to_string(),
            debug: false,
            test_publisher: false,
            endpoint_options: EndpointOptions::default(),
            context: ContextConfig::default(),
        }
    }
}

impl RelayConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ingress(mut self, address: impl Into<String>) -> Self {
        self.ingress = address.into();
        self
    }

    pub fn with_egress(mut self, address: impl Into<String>) -> Self {
        self.egress = address.into();
        self
    }

    pub fn with_debug(mut self, enabled: bool) -> Self {
        self.debug = enabled;
        self
    }

    pub fn with_test_publisher(mut self, enabled: bool) -> Self {
        self.test_publisher = enabled;
        self
    }

    pub fn with_endpoint_options(mut self, options: EndpointOptions) -> Self {
        self.endpoint_options = options;
        self
    }

    pub fn with_context(mut self, context: ContextConfig) -> Self {
        self.context = context;
        self
    }

    /// Whether monitors and the debug subscriber run.
    pub fn debug_enabled(&self) -> bool {
        self.debug || self.test_publisher
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_defaults() {
        let config = RelayConfig::default();
        assert_eq!(config.ingress, "ipc:///tmp/nginx_queue_listen");
        assert_eq!(config.egress, "tcp://0.0.0.0:6001");
        assert!(!config.debug_enabled());
        assert_eq!(config.context, ContextConfig::default());
    }

    #[test]
    fn test_test_publisher_implies_debug() {
        let config = RelayConfig::new().with_test_publisher(true);
        assert!(!config.debug);
        assert!(config.debug_enabled());

        let config = RelayConfig::new().with_debug(true);
        assert!(config.debug_enabled());
        assert!(!config.test_publisher);
    }

    #[test]
    fn test_builder_overrides() {
        let config = RelayConfig::new()
            .with_ingress("ipc://@gwrelay")
            .with_egress("tcp://127.0.0.1:*")
            .with_endpoint_options(EndpointOptions::default().with_send_hwm(10))
            .with_context(ContextConfig::default().with_shutdown_timeout(Duration::from_secs(1)));

        assert_eq!(config.ingress, "ipc://@gwrelay");
        assert_eq!(config.egress, "tcp://127.0.0.1:*");
        assert_eq!(config.endpoint_options.send_hwm, 10);
        assert_eq!(config.context.shutdown_timeout, Duration::from_secs(1));
    }
}
