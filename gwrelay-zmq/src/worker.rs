//! Worker threads under a lifecycle context.
//!
//! Every background thread (relay loop, monitor logger, diagnostics) is
//! started the same way: a control channel is created and registered with
//! the context, the thread acknowledges readiness over a `flume` channel,
//! and from then on it watches the control channel next to its own
//! endpoints. `destroy()` reaches every worker through that channel.

use std::fmt;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use gwrelay_core::command::ProxyCommand;

use crate::context::{LifecycleContext, WorkerGuard};
use crate::control::{self, ControlEndpoint, ControlHandle};
use crate::endpoint::Endpoint;
use crate::error::{ContextError, Error};

/// Outcome of [`Worker::wait`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wake {
    /// A command arrived on the control channel
    Command(ProxyCommand),
    /// The watched endpoint has a message
    Readable,
    /// The timeout elapsed
    Timeout,
}

/// The worker's side of its control channel, handed to the thread body.
pub struct Worker {
    name: String,
    control: ControlEndpoint,
}

impl Worker {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn control(&self) -> &ControlEndpoint {
        &self.control
    }

    /// Block until `endpoint` is readable, a command arrives, or `timeout`
    /// elapses (`None` waits indefinitely). Commands take precedence.
    pub fn wait(&self, endpoint: &Endpoint, timeout: Option<Duration>) -> Result<Wake, zmq::Error> {
        self.wait_on(Some(endpoint), timeout)
    }

    /// Sleep for `duration` unless a command arrives first.
    pub fn sleep(&self, duration: Duration) -> Result<Option<ProxyCommand>, zmq::Error> {
        match self.wait_on(None, Some(duration))? {
            Wake::Command(command) => Ok(Some(command)),
            Wake::Readable | Wake::Timeout => Ok(None),
        }
    }

    fn wait_on(
        &self,
        endpoint: Option<&Endpoint>,
        timeout: Option<Duration>,
    ) -> Result<Wake, zmq::Error> {
        let deadline = timeout.map(|t| Instant::now() + t);

        loop {
            let millis = match deadline {
                None => -1,
                Some(deadline) => {
                    let left = deadline.saturating_duration_since(Instant::now());
                    i64::try_from(left.as_millis()).unwrap_or(i64::MAX)
                }
            };

            let (control_ready, endpoint_ready) = {
                let mut items = Vec::with_capacity(2);
                items.push(self.control.socket().as_poll_item(zmq::POLLIN));
                if let Some(endpoint) = endpoint {
                    items.push(endpoint.socket().as_poll_item(zmq::POLLIN));
                }
                match zmq::poll(&mut items, millis) {
                    Ok(_) => {}
                    Err(zmq::Error::EINTR) => continue,
                    Err(e) => return Err(e),
                }
                (
                    items[0].is_readable(),
                    items.get(1).is_some_and(zmq::PollItem::is_readable),
                )
            };

            if control_ready {
                if let Some(command) = self.control.recv_command()? {
                    return Ok(Wake::Command(command));
                }
                continue;
            }
            if endpoint_ready {
                return Ok(Wake::Readable);
            }
            if millis >= 0 {
                return Ok(Wake::Timeout);
            }
        }
    }
}

impl fmt::Debug for Worker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Worker").field("name", &self.name).finish()
    }
}

/// Register the calling thread as a worker named `name`.
pub(crate) fn enlist(
    ctx: &LifecycleContext,
    name: &str,
) -> Result<(Worker, Arc<ControlHandle>, WorkerGuard), Error> {
    let (handle, control) = control::channel(ctx, name).map_err(ContextError::Transport)?;
    let handle = Arc::new(handle);
    let guard = ctx.register_worker(name, Some(Arc::clone(&handle)))?;
    let worker = Worker {
        name: name.to_string(),
        control,
    };
    Ok((worker, handle, guard))
}

/// Start `body` on a named thread registered with `ctx`.
///
/// Returns once the thread is running. The body should return promptly
/// after receiving [`ProxyCommand::Terminate`].
pub fn spawn_worker<F, T>(ctx: &LifecycleContext, name: &str, body: F) -> Result<WorkerHandle<T>, Error>
where
    F: FnOnce(&Worker) -> T + Send + 'static,
    T: Send + 'static,
{
    let (worker, control, guard) = enlist(ctx, name)?;
    let (ready_tx, ready_rx) = flume::bounded(1);
    let thread_name = format!("gwrelay-{name}");

    let thread = thread::Builder::new()
        .name(thread_name.clone())
        .spawn(move || {
            // Declared first so the worker deregisters after its sockets close.
            let _guard = guard;
            let worker = worker;
            let _ = ready_tx.send(());
            body(&worker)
        })
        .map_err(ContextError::Spawn)?;

    ready_rx
        .recv()
        .map_err(|_| ContextError::WorkerNotReady { name: thread_name })?;
    debug!("Worker {} started", name);

    Ok(WorkerHandle {
        name: name.to_string(),
        control,
        thread,
    })
}

/// Handle to a worker thread.
///
/// Dropping the handle detaches the thread; it keeps running until
/// stopped or the context is destroyed.
pub struct WorkerHandle<T> {
    name: String,
    control: Arc<ControlHandle>,
    thread: JoinHandle<T>,
}

impl<T> WorkerHandle<T> {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Deliver a command without blocking.
    pub fn command(&self, command: ProxyCommand) -> Result<(), Error> {
        self.control
            .send(command)
            .map_err(|e| ContextError::Transport(e).into())
    }

    pub(crate) fn control(&self) -> &ControlHandle {
        &self.control
    }

    /// Send `TERMINATE` and wait for the thread to exit.
    pub fn stop(self) -> Result<T, Error> {
        if let Err(e) = self.control.send(ProxyCommand::Terminate) {
            debug!("Terminate not delivered to {} (already stopped?): {}", self.name, e);
        }
        self.join()
    }

    /// Wait for the thread to exit on its own.
    pub fn join(self) -> Result<T, Error> {
        let Self { name, thread, .. } = self;
        thread.join().map_err(|_| {
            warn!("Worker {} panicked", name);
            ContextError::WorkerPanicked { name }.into()
        })
    }

    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }
}

impl<T> fmt::Debug for WorkerHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerHandle")
            .field("name", &self.name)
            .field("finished", &self.is_finished())
            .finish()
    }
}
