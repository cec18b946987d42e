//! Lifecycle context and resource registry.
//!
//! A [`LifecycleContext`] wraps one libzmq context and tracks every endpoint
//! and worker thread created under it. [`LifecycleContext::destroy`] asks each
//! worker to terminate over its control channel and then blocks until the
//! registry is empty, so no endpoint outlives the context it was created in.

use parking_lot::{Condvar, Mutex};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use gwrelay_core::command::ProxyCommand;
use gwrelay_core::role::Role;

use crate::control::ControlHandle;
use crate::error::ContextError;

/// Tuning for a [`LifecycleContext`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextConfig {
    /// libzmq I/O threads (ZMQ_IO_THREADS)
    pub io_threads: i32,
    /// Upper bound on how long `destroy()` waits for resources to drain
    pub shutdown_timeout: Duration,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            io_threads: 1,
            shutdown_timeout: Duration::from_secs(5),
        }
    }
}

impl ContextConfig {
    pub fn with_io_threads(mut self, io_threads: i32) -> Self {
        self.io_threads = io_threads;
        self
    }

    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Running,
    Destroying,
    Destroyed,
}

struct EndpointRecord {
    address: String,
    role: Role,
}

struct WorkerRecord {
    name: String,
    control: Option<Arc<ControlHandle>>,
}

struct Registry {
    phase: Phase,
    endpoints: HashMap<u64, EndpointRecord>,
    workers: HashMap<u64, WorkerRecord>,
}

struct Inner {
    zmq: Mutex<Option<zmq::Context>>,
    registry: Mutex<Registry>,
    released: Condvar,
    next_id: AtomicU64,
    config: ContextConfig,
}

impl Inner {
    fn release_endpoint(&self, id: u64) {
        let mut registry = self.registry.lock();
        if let Some(record) = registry.endpoints.remove(&id) {
            debug!(
                "[{}] Released endpoint {} ({})",
                record.role.socket_type_name(),
                id,
                record.address
            );
        }
        self.released.notify_all();
    }

    fn release_worker(&self, id: u64) {
        let mut registry = self.registry.lock();
        if let Some(record) = registry.workers.remove(&id) {
            debug!("Worker {} ({}) exited", id, record.name);
        }
        self.released.notify_all();
    }
}

/// Process-wide owner of the transport context and its resources.
///
/// Cloning yields another handle to the same context.
#[derive(Clone)]
pub struct LifecycleContext {
    inner: Arc<Inner>,
}

impl LifecycleContext {
    /// Create a context with default configuration.
    pub fn init() -> Result<Self, ContextError> {
        Self::init_with_config(ContextConfig::default())
    }

    /// Create a context with explicit configuration.
    pub fn init_with_config(config: ContextConfig) -> Result<Self, ContextError> {
        let zmq_ctx = zmq::Context::new();
        zmq_ctx.set_io_threads(config.io_threads)?;
        info!("Lifecycle context initialised (io_threads={})", config.io_threads);

        Ok(Self {
            inner: Arc::new(Inner {
                zmq: Mutex::new(Some(zmq_ctx)),
                registry: Mutex::new(Registry {
                    phase: Phase::Running,
                    endpoints: HashMap::new(),
                    workers: HashMap::new(),
                }),
                released: Condvar::new(),
                next_id: AtomicU64::new(1),
                config,
            }),
        })
    }

    pub fn config(&self) -> &ContextConfig {
        &self.inner.config
    }

    /// Whether `destroy()` has been called.
    pub fn is_destroyed(&self) -> bool {
        self.inner.registry.lock().phase != Phase::Running
    }

    /// Number of live endpoints registered under this context.
    pub fn endpoint_count(&self) -> usize {
        self.inner.registry.lock().endpoints.len()
    }

    /// Number of live worker threads registered under this context.
    pub fn worker_count(&self) -> usize {
        self.inner.registry.lock().workers.len()
    }

    /// Allocate an identifier unique within this context.
    pub(crate) fn next_id(&self) -> u64 {
        self.inner.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Create a raw libzmq socket. Fails once teardown has started.
    pub(crate) fn socket(&self, kind: zmq::SocketType) -> Result<zmq::Socket, zmq::Error> {
        if self.is_destroyed() {
            return Err(zmq::Error::ETERM);
        }
        match self.inner.zmq.lock().as_ref() {
            Some(zmq_ctx) => zmq_ctx.socket(kind),
            None => Err(zmq::Error::ETERM),
        }
    }

    /// Record a live endpoint. The returned guard unregisters it on drop.
    pub(crate) fn register_endpoint(
        &self,
        address: &str,
        role: Role,
    ) -> Result<Registration, zmq::Error> {
        let id = self.next_id();
        let mut registry = self.inner.registry.lock();
        if registry.phase != Phase::Running {
            return Err(zmq::Error::ETERM);
        }
        registry.endpoints.insert(
            id,
            EndpointRecord {
                address: address.to_string(),
                role,
            },
        );
        Ok(Registration {
            inner: Arc::clone(&self.inner),
            id,
        })
    }

    /// Record a worker thread. `control` receives `TERMINATE` on destroy.
    pub(crate) fn register_worker(
        &self,
        name: &str,
        control: Option<Arc<ControlHandle>>,
    ) -> Result<WorkerGuard, ContextError> {
        let id = self.next_id();
        let mut registry = self.inner.registry.lock();
        if registry.phase != Phase::Running {
            return Err(ContextError::AlreadyDestroyed);
        }
        registry.workers.insert(
            id,
            WorkerRecord {
                name: name.to_string(),
                control,
            },
        );
        Ok(WorkerGuard {
            inner: Arc::clone(&self.inner),
            id,
        })
    }

    /// Tear the context down.
    ///
    /// Signals every registered worker, then waits up to
    /// [`ContextConfig::shutdown_timeout`] for all endpoints and workers to
    /// be released before dropping the libzmq context.
    ///
    /// Control channels of [`WorkerHandle`](crate::WorkerHandle)s and
    /// [`ProxyHandle`](crate::ProxyHandle)s still held by the caller are not
    /// registered here. A successful return therefore does not mean the
    /// libzmq context is gone: each such handle keeps it alive until the
    /// handle is dropped or joined.
    ///
    /// # Errors
    ///
    /// - [`ContextError::AlreadyDestroyed`] on a second call
    /// - [`ContextError::Leaked`] if resources were still registered when the
    ///   timeout elapsed
    pub fn destroy(&self) -> Result<(), ContextError> {
        let controls: Vec<(String, Arc<ControlHandle>)> = {
            let mut registry = self.inner.registry.lock();
            if registry.phase != Phase::Running {
                return Err(ContextError::AlreadyDestroyed);
            }
            registry.phase = Phase::Destroying;
            registry
                .workers
                .values()
                .filter_map(|w| w.control.as_ref().map(|c| (w.name.clone(), Arc::clone(c))))
                .collect()
        };

        info!("Destroying lifecycle context ({} worker(s) to stop)", controls.len());
        for (name, control) in &controls {
            if let Err(e) = control.send(ProxyCommand::Terminate) {
                warn!("Failed to signal worker {} on {}: {}", name, control.address(), e);
            }
        }
        drop(controls);

        let deadline = Instant::now() + self.inner.config.shutdown_timeout;
        let mut registry = self.inner.registry.lock();
        while !(registry.endpoints.is_empty() && registry.workers.is_empty()) {
            if self
                .inner
                .released
                .wait_until(&mut registry, deadline)
                .timed_out()
            {
                break;
            }
        }
        let endpoints = registry.endpoints.len();
        let workers = registry.workers.len();
        for record in registry.endpoints.values() {
            error!(
                "[{}] Endpoint {} still open at teardown",
                record.role.socket_type_name(),
                record.address
            );
        }
        for record in registry.workers.values() {
            error!("Worker {} still running at teardown", record.name);
        }
        registry.phase = Phase::Destroyed;
        drop(registry);

        // Sockets hold their own reference to the raw context, so leaked
        // endpoints keep it alive instead of blocking here.
        drop(self.inner.zmq.lock().take());

        if endpoints > 0 || workers > 0 {
            return Err(ContextError::Leaked { endpoints, workers });
        }
        info!("Lifecycle context destroyed");
        Ok(())
    }
}

impl fmt::Debug for LifecycleContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let registry = self.inner.registry.lock();
        f.debug_struct("LifecycleContext")
            .field("phase", &registry.phase)
            .field("endpoints", &registry.endpoints.len())
            .field("workers", &registry.workers.len())
            .finish()
    }
}

/// Registry entry for a live endpoint; unregisters on drop.
pub(crate) struct Registration {
    inner: Arc<Inner>,
    id: u64,
}

impl Registration {
    pub(crate) fn id(&self) -> u64 {
        self.id
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.inner.release_endpoint(self.id);
    }
}

/// Registry entry for a running worker thread; unregisters on drop.
pub(crate) struct WorkerGuard {
    inner: Arc<Inner>,
    id: u64,
}

impl Drop for WorkerGuard {
    fn drop(&mut self) {
        self.inner.release_worker(self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_destroy() {
        let ctx = LifecycleContext::init().unwrap();
        assert_eq!(ctx.endpoint_count(), 0);
        assert!(!ctx.is_destroyed());
        ctx.destroy().unwrap();
        assert!(ctx.is_destroyed());
    }

    #[test]
    fn test_second_destroy() {
        let ctx = LifecycleContext::init().unwrap();
        let clone = ctx.clone();
        ctx.destroy().unwrap();
        assert!(matches!(clone.destroy(), Err(ContextError::AlreadyDestroyed)));
    }

    #[test]
    fn test_registration_drop_releases() {
        let ctx = LifecycleContext::init().unwrap();
        let reg = ctx
            .register_endpoint("inproc://test", Role::MonitorPair)
            .unwrap();
        assert_eq!(ctx.endpoint_count(), 1);
        drop(reg);
        assert_eq!(ctx.endpoint_count(), 0);
        ctx.destroy().unwrap();
    }

    #[test]
    fn test_destroy_reports_leak() {
        let ctx = LifecycleContext::init_with_config(
            ContextConfig::default().with_shutdown_timeout(Duration::from_millis(50)),
        )
        .unwrap();
        let _reg = ctx
            .register_endpoint("inproc://held", Role::IngressSubscribe)
            .unwrap();
        let _worker = ctx.register_worker("idle", None).unwrap();

        match ctx.destroy() {
            Err(ContextError::Leaked { endpoints, workers }) => {
                assert_eq!(endpoints, 1);
                assert_eq!(workers, 1);
            }
            other => panic!("expected leak, got {:?}", other),
        }
    }

    #[test]
    fn test_no_sockets_after_destroy() {
        let ctx = LifecycleContext::init().unwrap();
        ctx.destroy().unwrap();
        assert_eq!(ctx.socket(zmq::PAIR).err(), Some(zmq::Error::ETERM));
        assert!(ctx.register_endpoint("inproc://late", Role::MonitorPair).is_err());
        assert!(matches!(
            ctx.register_worker("late", None),
            Err(ContextError::AlreadyDestroyed)
        ));
    }
}
