//! gwrelay: relay gateway messages from an XSUB ingress to an XPUB egress.
//!
//! ```text
//! gwrelay -d -p tcp://127.0.0.1:6001 -b ipc:///tmp/nginx_queue_listen
//! ```

use clap::error::{ContextKind, ContextValue, ErrorKind};
use clap::Parser;
use std::process::ExitCode;
use tracing::{error, info, warn};

use gwrelay::{dev_tracing, Relay, RelayConfig, DEFAULT_EGRESS, DEFAULT_INGRESS};

#[derive(Parser, Debug)]
#[command(name = "gwrelay", version, about = "Gateway message relay over ZeroMQ")]
struct Cli {
    /// Address the gateway publishers connect to (XSUB bind)
    #[arg(short = 'b', value_name = "ADDRESS", default_value = DEFAULT_INGRESS)]
    ingress: String,

    /// Address the consumers connect to (XPUB bind)
    #[arg(short = 'p', value_name = "ADDRESS", default_value = DEFAULT_EGRESS)]
    egress: String,

    /// Monitor both endpoints and log throughput from a debug subscriber
    #[arg(short = 'd')]
    debug: bool,

    /// Also publish a synthetic message every second (implies -d)
    #[arg(short = 't')]
    test: bool,
}

impl Cli {
    fn config(&self) -> RelayConfig {
        RelayConfig::new()
            .with_ingress(self.ingress.clone())
            .with_egress(self.egress.clone())
            .with_debug(self.debug)
            .with_test_publisher(self.test)
    }
}

/// Parse the command line, dropping unknown flags instead of failing.
fn parse_cli() -> (Cli, Vec<String>) {
    let mut args: Vec<String> = std::env::args().collect();
    let mut ignored = Vec::new();

    loop {
        let err = match Cli::try_parse_from(&args) {
            Ok(cli) => return (cli, ignored),
            Err(err) => err,
        };
        if err.kind() != ErrorKind::UnknownArgument {
            err.exit();
        }
        let unknown = match err.get(ContextKind::InvalidArg) {
            Some(ContextValue::String(arg)) => arg.clone(),
            _ => err.exit(),
        };
        let with_value = format!("{unknown}=");
        match args
            .iter()
            .skip(1)
            .position(|a| *a == unknown || a.starts_with(&with_value))
        {
            Some(i) => ignored.push(args.remove(i + 1)),
            None => err.exit(),
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let (cli, ignored) = parse_cli();
    dev_tracing::init_cli_tracing(cli.debug || cli.test);

    for arg in &ignored {
        warn!("Unrecognized option {}, ignoring", arg);
    }

    let (major, minor, patch) = zmq::version();
    info!("ZeroMQ version {}.{}.{}", major, minor, patch);
    if cli.test {
        info!("Running in test mode and debug mode for XPUB -> XSUB");
    } else if cli.debug {
        info!("Running in debugging mode");
    }

    let relay = match Relay::start(cli.config()) {
        Ok(relay) => relay,
        Err(e) => {
            error!("Failed to start relay: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to wait for Ctrl-C: {}", e);
    }
    info!("... interrupted");

    match relay.shutdown() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Teardown failed: {}", e);
            ExitCode::FAILURE
        }
    }
}
