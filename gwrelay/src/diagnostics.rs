//! Debug subscriber and synthetic publisher.
//!
//! Both run as workers under the relay's lifecycle context, so
//! `destroy()` stops them together with the proxy. The debug subscriber
//! subscribes to everything on the egress and logs throughput once per
//! second; the synthetic publisher feeds `PUB-<A..J>-<nnnnn>` messages into
//! the ingress once per second.

use bytes::Bytes;
use rand::Rng;
use std::fmt;
use std::time::{Duration, Instant};
use tracing::{debug, info, trace};

use gwrelay_core::command::ProxyCommand;
use gwrelay_core::options::{EndpointOptions, TcpKeepalive};
use gwrelay_core::role::Role;
use gwrelay_zmq::{
    binder, spawn_worker, ContextError, Endpoint, Error, LifecycleContext, Wake, Worker,
    WorkerHandle,
};

/// How often the debug subscriber reports.
pub const REPORT_PERIOD: Duration = Duration::from_secs(1);

/// Delay between synthetic messages.
pub const PUBLISH_INTERVAL: Duration = Duration::from_secs(1);

/// One reporting window of the debug subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowReport {
    pub messages: u64,
    /// Wall time covered by the window, waits included
    pub elapsed: Duration,
    pub min_latency: Duration,
    pub max_latency: Duration,
    pub avg_latency: Duration,
}

impl fmt::Display for WindowReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} messages processed in {} [ms] with latency min={:.4}[ms], max={:.4}[ms], avg={:.4}[ms]",
            self.messages,
            self.elapsed.as_millis(),
            millis(self.min_latency),
            millis(self.max_latency),
            millis(self.avg_latency)
        )
    }
}

fn millis(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

/// Accumulates per-message timings until a period's worth has elapsed.
#[derive(Debug, Clone)]
pub struct ThroughputWindow {
    period: Duration,
    messages: u64,
    elapsed: Duration,
    latency_total: Duration,
    min_latency: Duration,
    max_latency: Duration,
}

impl ThroughputWindow {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            messages: 0,
            elapsed: Duration::ZERO,
            latency_total: Duration::ZERO,
            min_latency: Duration::MAX,
            max_latency: Duration::ZERO,
        }
    }

    /// Record one message: `waited` for it to arrive, `latency` to handle it.
    ///
    /// Returns a report and starts a new window once the covered time
    /// reaches the period.
    pub fn record(&mut self, waited: Duration, latency: Duration) -> Option<WindowReport> {
        self.messages += 1;
        self.latency_total += latency;
        self.min_latency = self.min_latency.min(latency);
        self.max_latency = self.max_latency.max(latency);
        self.elapsed += waited + latency;

        if self.elapsed < self.period {
            return None;
        }

        let divisor = u32::try_from(self.messages).unwrap_or(u32::MAX);
        let report = WindowReport {
            messages: self.messages,
            elapsed: self.elapsed,
            min_latency: self.min_latency,
            max_latency: self.max_latency,
            avg_latency: self.latency_total / divisor,
        };
        *self = Self::new(self.period);
        Some(report)
    }
}

/// Format one synthetic publisher message.
pub fn synthetic_message<R: Rng>(rng: &mut R) -> String {
    let letter = char::from(b'A' + rng.gen_range(0..10u8));
    format!("PUB-{}-{:05}", letter, rng.gen_range(0..100_000u32))
}

/// Connect a catch-all consumer to `egress` and log what flows through it.
///
/// The worker returns the number of messages it received.
pub fn spawn_debug_subscriber(
    ctx: &LifecycleContext,
    egress: &str,
) -> Result<WorkerHandle<u64>, Error> {
    let options = EndpointOptions::default().with_tcp_keepalive(Some(TcpKeepalive::default()));
    let subscriber = binder::connect_with_options(ctx, egress, Role::Consumer, &options)?;
    subscriber.subscribe(b"").map_err(ContextError::Transport)?;

    info!("Starting debug subscriber [{}]", egress);
    spawn_worker(ctx, "debug-subscriber", move |worker| {
        run_subscriber(&subscriber, worker)
    })
}

fn run_subscriber(subscriber: &Endpoint, worker: &Worker) -> u64 {
    let mut window = ThroughputWindow::new(REPORT_PERIOD);
    let mut received = 0u64;
    let mut waiting = Instant::now();

    loop {
        match worker.wait(subscriber, None) {
            Ok(Wake::Command(ProxyCommand::Terminate)) => break,
            Ok(Wake::Readable) => {}
            Ok(_) => continue,
            Err(e) => {
                debug!("Debug subscriber stopped waiting: {}", e);
                break;
            }
        }

        let waited = waiting.elapsed();
        let started = Instant::now();
        match subscriber.recv_message() {
            Ok(msg) => trace!("Debug subscriber got {:?}", msg.first()),
            Err(e) => {
                debug!("Debug subscriber receive failed: {}", e);
                break;
            }
        }
        received += 1;

        if let Some(report) = window.record(waited, started.elapsed()) {
            info!("{}", report);
        }
        waiting = Instant::now();
    }

    debug!("Debug subscriber exiting after {} messages", received);
    received
}

/// Connect a publisher to `ingress` and send one synthetic message per
/// `interval`.
///
/// The worker returns the number of messages it sent.
pub fn spawn_test_publisher(
    ctx: &LifecycleContext,
    ingress: &str,
    interval: Duration,
) -> Result<WorkerHandle<u64>, Error> {
    let publisher = binder::connect(ctx, ingress, Role::Publisher)?;

    info!("Starting test publisher [{}]", ingress);
    spawn_worker(ctx, "test-publisher", move |worker| {
        run_publisher(&publisher, worker, interval)
    })
}

fn run_publisher(publisher: &Endpoint, worker: &Worker, interval: Duration) -> u64 {
    let mut rng = rand::thread_rng();
    let mut sent = 0u64;

    loop {
        let message = synthetic_message(&mut rng);
        if let Err(e) = publisher.send_message(&[Bytes::from(message.clone())]) {
            debug!("Test publisher send failed: {}", e);
            break;
        }
        sent += 1;
        info!(" ... sending:{}", message);

        match worker.sleep(interval) {
            Ok(Some(ProxyCommand::Terminate)) => break,
            Ok(_) => {}
            Err(e) => {
                debug!("Test publisher stopped waiting: {}", e);
                break;
            }
        }
    }

    sent
}

/// The diagnostics workers started for one relay.
#[derive(Debug, Default)]
pub struct Diagnostics {
    subscriber: Option<WorkerHandle<u64>>,
    publisher: Option<WorkerHandle<u64>>,
}

impl Diagnostics {
    /// Start the workers the flags ask for.
    ///
    /// `ingress` and `egress` should be resolved addresses, since the
    /// workers connect to them.
    pub fn start(
        ctx: &LifecycleContext,
        ingress: &str,
        egress: &str,
        debug: bool,
        test_publisher: bool,
    ) -> Result<Self, Error> {
        let publisher = if test_publisher {
            Some(spawn_test_publisher(ctx, ingress, PUBLISH_INTERVAL)?)
        } else {
            None
        };
        let subscriber = if debug || test_publisher {
            Some(spawn_debug_subscriber(ctx, egress)?)
        } else {
            None
        };
        Ok(Self {
            subscriber,
            publisher,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.subscriber.is_none() && self.publisher.is_none()
    }

    /// Wait for the workers after the context told them to stop.
    pub fn join(self) -> Result<(), Error> {
        if let Some(publisher) = self.publisher {
            let sent = publisher.join()?;
            info!("Test publisher sent {} messages", sent);
        }
        if let Some(subscriber) = self.subscriber {
            let received = subscriber.join()?;
            info!("Debug subscriber received {} messages", received);
        }
        Ok(())
    }
}
