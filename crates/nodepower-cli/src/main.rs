mod commands;

use clap::{Parser, Subcommand};
use commands::{EndpointArgs, EXIT_CONFIG_ERROR, EXIT_FAILURE, EXIT_RESOURCE_ERROR};
use nodepower_client::{Context, InventorySchema};
use nodepower_core::install_signal_handler;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "nodepower",
    version,
    about = "Reconcile node power state against SMD and PCS"
)]
struct Cli {
    /// Path to the endpoint config file (default: ~/.config/nodepower/config.toml).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// SMD base URL (overrides config file).
    #[arg(long, global = true)]
    smd_url: Option<String>,

    /// PCS base URL (overrides config file).
    #[arg(long, global = true)]
    pcs_url: Option<String>,

    /// SMD record shape to read: component-endpoint or redfish-endpoint.
    #[arg(long, global = true)]
    inventory_schema: Option<InventorySchema>,

    /// Per-request timeout in seconds (overrides config file).
    #[arg(long, global = true)]
    timeout_secs: Option<u64>,

    /// Output results as structured JSON.
    #[arg(long, default_value_t = false, global = true)]
    json: bool,

    /// Enable verbose (debug) logging output.
    #[arg(short, long, default_value_t = false, global = true)]
    verbose: bool,

    /// Enable trace-level logging (more detailed than --verbose).
    #[arg(long, default_value_t = false, global = true)]
    trace: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run a single reconciliation pass and write the resulting status back.
    Reconcile {
        /// Path to the node resource JSON file.
        node: PathBuf,
    },
    /// Reconcile repeatedly until interrupted.
    Watch {
        /// Path to the node resource JSON file.
        node: PathBuf,
        /// Seconds to wait after a pass that found the node Ready.
        #[arg(long, default_value_t = 30)]
        interval: u64,
        /// Seconds to wait after a pass that left the node Syncing.
        #[arg(long, default_value_t = 5)]
        requeue: u64,
        /// Upper bound in seconds on the wait after consecutive failed passes.
        #[arg(long, default_value_t = 300)]
        max_backoff: u64,
        /// Stop after this many passes.
        #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
        max_passes: Option<u64>,
    },
    /// Show the last recorded status of a node.
    Status {
        /// Path to the node resource JSON file.
        node: PathBuf,
    },
}

fn main() -> ExitCode {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let msg = info.to_string();
        if msg.contains("Broken pipe")
            || msg.contains("broken pipe")
            || msg.contains("os error 32")
            || msg.contains("failed printing to stdout")
        {
            std::process::exit(0);
        }
        default_hook(info);
    }));

    let cli = Cli::parse();

    let default_level = if cli.trace {
        "trace"
    } else if cli.verbose {
        "debug"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("NODEPOWER_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();

    let endpoints = EndpointArgs {
        config: cli.config,
        smd_url: cli.smd_url,
        pcs_url: cli.pcs_url,
        inventory_schema: cli.inventory_schema,
        timeout_secs: cli.timeout_secs,
    };
    let json_output = cli.json;

    let result = match cli.command {
        Commands::Reconcile { node } => {
            let ctx = Context::background();
            install_signal_handler(&ctx);
            commands::reconcile::run(&endpoints, &node, &ctx, json_output)
        }
        Commands::Watch {
            node,
            interval,
            requeue,
            max_backoff,
            max_passes,
        } => {
            let ctx = Context::background();
            install_signal_handler(&ctx);
            commands::watch::run(
                &endpoints,
                &node,
                &ctx,
                &commands::watch::WatchOptions {
                    interval: std::time::Duration::from_secs(interval),
                    requeue: std::time::Duration::from_secs(requeue),
                    max_backoff: std::time::Duration::from_secs(max_backoff),
                    max_passes,
                },
                json_output,
            )
        }
        Commands::Status { node } => commands::status::run(&node, json_output),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(msg) => {
            eprintln!("error: {msg}");
            let code = if msg.starts_with("config error:") {
                EXIT_CONFIG_ERROR
            } else if msg.starts_with("resource error:") || msg.starts_with("node lock:") {
                EXIT_RESOURCE_ERROR
            } else {
                EXIT_FAILURE
            };
            ExitCode::from(code)
        }
    }
}
