//! `stage` - command line entry point.
//!
//! The only subcommand so far runs the upstream relay that federates
//! stages. Exit code 0 means a clean SIGINT-driven shutdown; failing to
//! bind the listener (or any other startup error) exits non-zero.

// Layer 1: Standard library imports
// (none)

// Layer 2: Third-party crate imports
use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

// Layer 3: Internal module imports
use stage_upstream::{serve, Relay, RelayConfig};

/// Default TCP port of the upstream relay.
const DEFAULT_RELAY_PORT: u16 = 31400;

#[derive(Parser)]
#[command(name = "stage", about = "Actor stages", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the upstream relay that buffers cross-stage traffic.
    Upstream {
        /// Address to bind for incoming stage sessions.
        #[arg(long, env = "ADDR", default_value = "127.0.0.1")]
        addr: String,

        /// TCP port to listen on.
        #[arg(long, env = "PORT", default_value_t = DEFAULT_RELAY_PORT)]
        port: u16,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Upstream { addr, port } => run_upstream(&addr, port).await,
    }
}

async fn run_upstream(addr: &str, port: u16) -> anyhow::Result<()> {
    let bind = format!("{addr}:{port}");
    let listener = TcpListener::bind(bind.as_str())
        .await
        .with_context(|| format!("unable to setup tcp listener on {bind}"))?;
    info!(%bind, "starting upstream relay");

    let cancel = CancellationToken::new();
    let stop = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received; shutting down");
            stop.cancel();
        }
    });

    serve(listener, Relay::new(RelayConfig::default()), cancel)
        .await
        .context("relay serve loop failed")?;
    info!("upstream relay stopped");
    Ok(())
}
