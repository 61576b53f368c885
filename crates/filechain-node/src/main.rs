use anyhow::Context;
use clap::Parser;
use filechain_node::{api, Network, NodeConfig};
use std::{net::SocketAddr, path::PathBuf, sync::Arc, time::Duration};
use tracing::{info, Level};

#[derive(Parser, Debug)]
struct Args {
    /// Address the HTTP API listens on, e.g. 127.0.0.1:5000
    #[arg(long, default_value = "127.0.0.1:5000")]
    listen: String,

    /// Parent directory for per-node file storage
    #[arg(long, default_value = "./data")]
    data_dir: PathBuf,

    /// Leading zero hex digits required of a block hash
    #[arg(long, default_value_t = filechain_core::constants::DEFAULT_DIFFICULTY)]
    difficulty: usize,

    /// Amount credited to a miner per block
    #[arg(long, default_value_t = filechain_core::constants::DEFAULT_MINING_REWARD)]
    reward: u64,

    /// Timeout for peer connects, reads and writes
    #[arg(long, default_value_t = 30)]
    io_timeout_secs: u64,

    /// Node to start with, as id:port (repeatable)
    #[arg(long = "node", value_parser = parse_node_spec)]
    nodes: Vec<(String, u16)>,
}

fn parse_node_spec(s: &str) -> Result<(String, u16), String> {
    let (id, port) = s
        .rsplit_once(':')
        .ok_or_else(|| format!("expected id:port, got {s:?}"))?;
    let port = port.parse().map_err(|e| format!("bad port in {s:?}: {e}"))?;
    Ok((id.to_string(), port))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for ctrl-c");
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let config = NodeConfig {
        storage_root: args.data_dir,
        difficulty: args.difficulty,
        mining_reward: args.reward,
        io_timeout: Duration::from_secs(args.io_timeout_secs),
        ..NodeConfig::default()
    };
    let network = Arc::new(Network::new(config));

    for (id, port) in &args.nodes {
        network
            .add_node(id, *port)
            .await
            .with_context(|| format!("starting node {id} on port {port}"))?;
    }

    let app = api::router(Arc::clone(&network));
    let addr: SocketAddr = args.listen.parse()?;
    info!("filechain-node API listening on http://{addr}");
    axum::serve(tokio::net::TcpListener::bind(addr).await?, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    network.shutdown();
    info!("filechain-node stopped");
    Ok(())
}
