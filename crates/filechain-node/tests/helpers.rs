#![allow(dead_code)]

use filechain_core::{Block, Chain, Transaction};
use filechain_node::{Network, NodeConfig};
use rand::RngCore;
use std::{net::SocketAddr, path::Path, time::Duration};
use tempfile::{tempdir, TempDir};
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    net::TcpListener,
};

pub fn test_config(root: &Path) -> NodeConfig {
    NodeConfig {
        storage_root: root.to_path_buf(),
        difficulty: 2,
        mining_reward: 10,
        io_timeout: Duration::from_secs(5),
        ..NodeConfig::default()
    }
}

pub async fn create_network(ids: &[&str]) -> (TempDir, Network) {
    let temp_dir = tempdir().expect("Failed to create temp dir");
    let network = Network::new(test_config(temp_dir.path()));
    for id in ids {
        network.add_node(id, 0).await.expect("Failed to add node");
    }
    (temp_dir, network)
}

pub fn random_payload(len: usize) -> Vec<u8> {
    let mut bytes = vec![0u8; len];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes
}

/// A chain of `blocks` mined blocks after genesis, at difficulty 1.
pub fn mined_chain(blocks: usize) -> Chain {
    let mut chain = Chain::new(1, 10);
    for i in 0..blocks {
        chain
            .add_transaction(Transaction::new("alice", "bob", i as u64 + 1, None))
            .expect("transaction accepted");
        chain.mine_pending("alice").expect("mined");
    }
    chain
}

/// Genesis plus one block with a fixed timestamp.
pub fn chain_with_tail_at(timestamp: u64) -> Vec<Block> {
    let genesis = filechain_core::chain::genesis_block();
    let mut tail = Block::with_timestamp(1, genesis.hash.clone(), vec![], timestamp);
    tail.mine(1);
    vec![genesis, tail]
}

/// Peer that answers one request with `header`, waits for READY, then sends `body`.
pub async fn spawn_fake_peer(header: String, body: Vec<u8>) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.expect("accept");
        let (read_half, mut write_half) = stream.into_split();
        let mut reader = BufReader::new(read_half);
        let mut line = String::new();
        reader.read_line(&mut line).await.expect("request");
        if write_half.write_all(format!("{header}\n").as_bytes()).await.is_err() {
            return;
        }
        line.clear();
        // The client hangs up instead of acknowledging when it rejects the header.
        if matches!(reader.read_line(&mut line).await, Ok(0) | Err(_)) {
            return;
        }
        let _ = write_half.write_all(&body).await;
        let _ = write_half.shutdown().await;
    });
    addr
}

/// Peer that accepts and then never answers.
pub async fn spawn_silent_peer() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.expect("accept");
        tokio::time::sleep(Duration::from_secs(30)).await;
        drop(stream);
    });
    addr
}
