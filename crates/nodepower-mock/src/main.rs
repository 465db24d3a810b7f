use clap::Parser;
use nodepower_mock::{Fleet, MockNode};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};

#[derive(Parser)]
#[command(
    name = "nodepower-mock",
    about = "Serve a fake SMD (/hsm/v2) and PCS (/v1) for local testing"
)]
struct Cli {
    /// Port to listen on.
    #[arg(long, default_value_t = 28007)]
    port: u16,

    /// Node to register, as `<xname>=<on|off>[,<fqdn>[,<mac>]]`. Repeatable.
    #[arg(long = "node", value_name = "SPEC")]
    nodes: Vec<String>,
}

fn parse_node(spec: &str) -> Result<(String, MockNode), String> {
    let (xname, rest) = spec
        .split_once('=')
        .ok_or_else(|| format!("invalid node '{spec}', expected <xname>=<state>"))?;
    let mut parts = rest.split(',');
    let state = parts.next().unwrap_or_default();
    if xname.is_empty() || state.is_empty() {
        return Err(format!("invalid node '{spec}', expected <xname>=<state>"));
    }
    let mut node = MockNode::new(state);
    if let Some(fqdn) = parts.next() {
        node = node.with_fqdn(fqdn);
    }
    if let Some(mac) = parts.next() {
        node = node.with_mac(mac);
    }
    Ok((xname.to_owned(), node))
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let fleet = Arc::new(Fleet::new());
    for spec in &cli.nodes {
        match parse_node(spec) {
            Ok((xname, node)) => {
                info!("registered {xname} ({})", node.power_state);
                fleet.add_node(&xname, node);
            }
            Err(msg) => {
                eprintln!("error: {msg}");
                return ExitCode::from(2);
            }
        }
    }

    let addr = format!("0.0.0.0:{}", cli.port);
    info!("starting nodepower-mock on {addr}");
    match nodepower_mock::run_server(&fleet, &addr) {
        Ok(()) => ExitCode::SUCCESS,
        Err(msg) => {
            error!("{msg}");
            ExitCode::FAILURE
        }
    }
}
