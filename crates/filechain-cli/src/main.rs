use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::Value;
use std::path::PathBuf;
use tracing::debug;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "filechain")]
#[command(about = "CLI client for a filechain node network")]
struct Cli {
    /// API base URL of the filechain-node process
    #[arg(long, global = true, default_value = "http://127.0.0.1:5000")]
    api: String,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start a node and join it to the network
    AddNode {
        id: String,
        /// Peer-protocol port; 0 picks a free one
        #[arg(long, default_value_t = 0)]
        port: u16,
    },
    /// List nodes with their peers, files and chain length
    Nodes,
    /// Publish a local file from a node
    Upload {
        node: String,
        file: PathBuf,
    },
    /// Pull a file by fingerprint from one of the node's peers
    Request {
        node: String,
        #[arg(long)]
        peer: String,
        #[arg(long)]
        fingerprint: String,
    },
    /// Show a node's blocks and pending pool
    Chain { node: String },
    /// Check a node's stored hashes and links
    Integrity { node: String },
    /// Tamper with one block on a node
    Hack {
        node: String,
        #[arg(long)]
        block: usize,
    },
    /// Re-hash a node's stored files
    VerifyFiles { node: String },
    /// Integrity and file alerts across all nodes
    Notifications,
}

#[derive(Serialize)]
struct AddNode<'a> {
    node_id: &'a str,
    port: u16,
}

#[derive(Serialize)]
struct RequestFile<'a> {
    peer_id: &'a str,
    fingerprint: &'a str,
}

#[derive(Serialize)]
struct Hack {
    block_index: usize,
}

async fn print_response(res: reqwest::Response) -> Result<()> {
    let status = res.status();
    let body = res.text().await?;
    println!("status: {}", status);
    match serde_json::from_str::<Value>(&body) {
        Ok(json) => println!("{}", serde_json::to_string_pretty(&json)?),
        Err(_) => println!("{body}"),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .pretty()
        .init();

    let cli = Cli::parse();
    let api = cli.api.trim_end_matches('/');
    let client = reqwest::Client::new();

    let res = match cli.cmd {
        Command::AddNode { id, port } => {
            let body = AddNode { node_id: &id, port };
            client.post(format!("{api}/api/nodes")).json(&body).send().await?
        }
        Command::Nodes => client.get(format!("{api}/api/nodes")).send().await?,
        Command::Upload { node, file } => {
            let name = file
                .file_name()
                .and_then(|n| n.to_str())
                .with_context(|| format!("no usable file name in {}", file.display()))?
                .to_string();
            let bytes = tokio::fs::read(&file)
                .await
                .with_context(|| format!("reading {}", file.display()))?;
            debug!(file = %name, size = bytes.len(), "uploading");
            client
                .post(format!("{api}/api/nodes/{node}/files"))
                .query(&[("name", name)])
                .body(bytes)
                .send()
                .await?
        }
        Command::Request {
            node,
            peer,
            fingerprint,
        } => {
            let body = RequestFile {
                peer_id: &peer,
                fingerprint: &fingerprint,
            };
            client
                .post(format!("{api}/api/nodes/{node}/request"))
                .json(&body)
                .send()
                .await?
        }
        Command::Chain { node } => client.get(format!("{api}/api/nodes/{node}/chain")).send().await?,
        Command::Integrity { node } => {
            client
                .get(format!("{api}/api/nodes/{node}/integrity"))
                .send()
                .await?
        }
        Command::Hack { node, block } => {
            client
                .post(format!("{api}/api/nodes/{node}/hack"))
                .json(&Hack { block_index: block })
                .send()
                .await?
        }
        Command::VerifyFiles { node } => {
            client
                .get(format!("{api}/api/nodes/{node}/files/verify"))
                .send()
                .await?
        }
        Command::Notifications => client.get(format!("{api}/api/notifications")).send().await?,
    };
    print_response(res).await
}
