//! Statusline
//!
//! i3bar status-line aggregator. Reads the i3bar protocol on stdin, adds the
//! configured modules' blocks to every line and writes the result to stdout.
//!
//! # Usage
//!
//! ```bash
//! # In the i3/sway bar config, wrapping i3status
//! status_command i3status | statusline
//!
//! # Standalone, with a specific config
//! statusline --config ~/.config/statusline/work.toml
//!
//! # With verbose logging to a file (stdout belongs to the protocol)
//! RUST_LOG=debug statusline --log-file /tmp/statusline.log
//! ```
//!
//! # Environment Variables
//!
//! - `STATUSLINE_CONFIG`: Config file path
//! - `STATUSLINE_ORDER`: `prepend` | `append`
//! - `STATUSLINE_STRICT`: Abort on the first module failure
//! - `STATUSLINE_TICK_TIMEOUT_MS`: Per-module tick bound
//! - `STATUSLINE_FORWARD_PREAMBLE`, `STATUSLINE_MERGE_UPSTREAM`: booleans
//! - `RUST_LOG`: Log level (trace, debug, info, warn, error)
//!
//! Command-line flags override the environment, which overrides the file.
//!
//! # Exit Codes
//!
//! - 3: input closed (empty line or end of stream)
//! - 1: any other failure
//! - 130 / 143: SIGINT / SIGTERM

use std::fs::OpenOptions;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::Context;
use clap::Parser;
use tokio::io::BufReader;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use statusline_core::{
    load_config, ConfigOverrides, EngineError, FailurePolicy, ModuleRegistry, OrderPolicy,
    ProtocolEngine,
};

const EXIT_SIGINT: i32 = 130;
const EXIT_SIGTERM: i32 = 143;

/// Command-line arguments
#[derive(Debug, Parser)]
#[command(name = "statusline", version, about = "Add module blocks to an i3bar status stream")]
struct Args {
    /// Config file (default: $XDG_CONFIG_HOME/statusline/config.toml)
    #[arg(short, long, env = "STATUSLINE_CONFIG")]
    config: Option<PathBuf>,

    /// Placement of module blocks: prepend (legacy, reversed) or append
    #[arg(long, value_name = "POLICY")]
    order: Option<OrderPolicy>,

    /// Abort on the first module failure instead of omitting the module
    #[arg(long)]
    strict: bool,

    /// Per-module tick bound in milliseconds (0 = unbounded)
    #[arg(long, value_name = "MS")]
    tick_timeout_ms: Option<u64>,

    /// Do not copy the two preamble lines to output
    #[arg(long)]
    no_forward_preamble: bool,

    /// Drop blocks found in the input line
    #[arg(long)]
    no_merge_upstream: bool,

    /// Write logs to this file instead of stderr
    #[arg(long, value_name = "PATH")]
    log_file: Option<PathBuf>,
}

impl Args {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            order: self.order,
            failure_policy: self.strict.then_some(FailurePolicy::Strict),
            tick_timeout_ms: self.tick_timeout_ms,
            forward_preamble: self.no_forward_preamble.then_some(false),
            merge_upstream: self.no_merge_upstream.then_some(false),
        }
    }
}

fn init_logging(log_file: Option<&Path>) -> anyhow::Result<()> {
    let filter = EnvFilter::from_default_env()
        .add_directive("statusline=info".parse()?)
        .add_directive("statusline_core=info".parse()?);

    match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("failed to open log file {}", path.display()))?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(Mutex::new(file))
                .with_ansi(false)
                .with_target(true)
                .init();
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .with_target(true)
                .init();
        }
    }
    Ok(())
}

/// Wait for whichever signal arrives first and return its exit code
///
/// A missing handler (`None`, or an interrupt future that errors) is logged
/// and never fires; it does not end the run.
async fn first_signal<I, T>(interrupt: I, terminate: Option<T>) -> i32
where
    I: Future<Output = std::io::Result<()>>,
    T: Future<Output = ()>,
{
    let interrupt = async {
        if let Err(e) = interrupt.await {
            warn!(error = %e, "Ctrl+C handler unavailable");
            std::future::pending::<()>().await;
        }
    };
    let terminate = async {
        match terminate {
            Some(terminate) => terminate.await,
            None => std::future::pending::<()>().await,
        }
    };

    tokio::select! {
        () = interrupt => {
            info!("Received Ctrl+C, shutting down");
            EXIT_SIGINT
        }
        () = terminate => {
            info!("Received SIGTERM, shutting down");
            EXIT_SIGTERM
        }
    }
}

/// Wait for SIGINT or SIGTERM
async fn shutdown_signal() -> i32 {
    #[cfg(unix)]
    let terminate = match signal::unix::signal(signal::unix::SignalKind::terminate()) {
        Ok(mut stream) => Some(async move {
            stream.recv().await;
        }),
        Err(e) => {
            warn!(error = %e, "Failed to install SIGTERM handler, only Ctrl+C will stop the run");
            None
        }
    };

    #[cfg(not(unix))]
    let terminate: Option<std::future::Pending<()>> = None;

    first_signal(signal::ctrl_c(), terminate).await
}

fn exit_code_for(err: &EngineError) -> i32 {
    if err.is_input_closed() {
        info!("Input closed, exiting");
    } else {
        error!(error = %err, "Protocol engine failed");
    }
    err.exit_code()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(args.log_file.as_deref())?;

    info!(pid = std::process::id(), "Starting statusline");

    let (mut config, source) = load_config(args.config.as_deref()).map_err(|e| {
        error!(error = %e, "Failed to load configuration");
        e
    })?;
    config.apply(&ConfigOverrides::from_env());
    config.apply(&args.overrides());
    info!(source = ?source, modules = config.modules.len(), "Configuration loaded");

    let engine_config = config.engine_config();

    // Push modules spawn their listeners on registration, so this runs inside the runtime
    let mut registry = ModuleRegistry::new();
    for module in config.modules {
        registry.register(module.build());
    }

    let mut engine = ProtocolEngine::new(
        BufReader::new(tokio::io::stdin()),
        tokio::io::stdout(),
        registry,
        engine_config,
    );

    let code = tokio::select! {
        result = engine.run() => match result {
            Ok(never) => match never {},
            Err(err) => exit_code_for(&err),
        },
        code = shutdown_signal() => code,
    };

    info!(code, cycles = engine.cycles(), "Statusline stopped");
    std::process::exit(code);
}
