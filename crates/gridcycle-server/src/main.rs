use std::net::SocketAddr;

use clap::Parser;
use gridcycle_config::Config;

/// Runs the gridcycle game server.
///
/// Configuration beyond the listen address (grid size, client cap, tick
/// pacing) comes from a TOML file; CLI flags here only cover the ambient
/// concerns the core explicitly leaves out (§1 Out of scope).
#[derive(Parser)]
struct Args {
    /// Address to listen on.
    #[arg(long, default_value = "0.0.0.0:7878")]
    listen: SocketAddr,

    /// Path to a TOML configuration file; falls back to defaults if absent.
    #[arg(long, default_value = "gridcycle.toml")]
    config: std::path::PathBuf,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let config = Config::load(&args.config)?;

    let mut server = gridcycle_server::Server::bind(args.listen, config)?;
    server.run()
}
