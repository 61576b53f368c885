mod helpers;

use filechain_core::{ChainError, ChainSnapshot, SyncOutcome, Transaction};
use filechain_node::{NodeError, PeerNode, StaticDirectory};
use helpers::{chain_with_tail_at, create_network, mined_chain, test_config};
use std::sync::Arc;
use tempfile::tempdir;

fn encode(blocks: Vec<filechain_core::Block>) -> Vec<u8> {
    ChainSnapshot { blocks }.encode()
}

#[tokio::test]
async fn test_longer_chain_replaces_local() -> anyhow::Result<()> {
    let temp_dir = tempdir()?;
    let node = PeerNode::start("solo", 0, test_config(temp_dir.path())).await?;

    let three = mined_chain(2);
    let four = mined_chain(3);

    let outcome = node.receive_blockchain(&three.snapshot().encode()).await?;
    assert!(matches!(outcome, SyncOutcome::Adopted { .. }));
    assert_eq!(node.chain().len(), 3);

    let outcome = node.receive_blockchain(&four.snapshot().encode()).await?;
    assert!(matches!(outcome, SyncOutcome::Adopted { .. }));
    assert_eq!(node.chain().blocks(), four.blocks());

    let outcome = node.receive_blockchain(&three.snapshot().encode()).await?;
    assert_eq!(outcome, SyncOutcome::NotLonger);
    assert_eq!(node.chain().len(), 4);
    Ok(())
}

#[tokio::test]
async fn test_equal_length_prefers_newer_tail() -> anyhow::Result<()> {
    let temp_dir = tempdir()?;
    let node = PeerNode::start("solo", 0, test_config(temp_dir.path())).await?;

    let older = chain_with_tail_at(1_700_000_000_000);
    let newer = chain_with_tail_at(1_700_000_500_000);

    node.receive_blockchain(&encode(older.clone())).await?;
    let outcome = node.receive_blockchain(&encode(newer.clone())).await?;
    assert!(matches!(outcome, SyncOutcome::Adopted { .. }));
    assert_eq!(node.chain().blocks(), newer);

    let outcome = node.receive_blockchain(&encode(older)).await?;
    assert_eq!(outcome, SyncOutcome::NotLonger);
    assert_eq!(node.chain().blocks(), newer);
    Ok(())
}

#[tokio::test]
async fn test_invalid_chain_is_rejected() -> anyhow::Result<()> {
    let temp_dir = tempdir()?;
    let node = PeerNode::start("solo", 0, test_config(temp_dir.path())).await?;

    let mut blocks = mined_chain(3).blocks().to_vec();
    blocks[2].transactions[0].receiver = "mallory".to_string();

    let outcome = node.receive_blockchain(&encode(blocks)).await?;
    assert_eq!(outcome, SyncOutcome::Invalid);
    assert_eq!(node.chain().len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_malformed_payload_is_an_error() -> anyhow::Result<()> {
    let temp_dir = tempdir()?;
    let node = PeerNode::start("solo", 0, test_config(temp_dir.path())).await?;

    let err = node.receive_blockchain(b"{not json").await.unwrap_err();
    assert!(matches!(err, NodeError::Chain(ChainError::Decode(_))));

    let err = node.receive_blockchain(br#"{"blocks":[]}"#).await.unwrap_err();
    assert!(matches!(err, NodeError::Chain(ChainError::Malformed(_))));
    assert_eq!(node.chain().len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_adoption_purges_confirmed_file_transactions() -> anyhow::Result<()> {
    let (_temp_dir, network) = create_network(&["alice", "bob"]).await;
    let alice = network.get("alice")?;
    let bob = network.get("bob")?;

    let fingerprint = alice.publish("shared.txt", b"shared").await?;
    bob.request_file("alice", &fingerprint).await?;
    let transfer = Transaction::transfer("alice", "bob", fingerprint.clone());
    assert!(alice.chain().pending().contains(&transfer));

    // Alice mines the transfer; Bob's copy leaves his pool once he adopts.
    alice.chain().mine_pending("alice").await?;
    alice.propagate_blockchain().await;

    assert_eq!(bob.chain().blocks(), alice.chain().blocks());
    assert!(!bob.chain().pending().contains(&transfer));
    Ok(())
}

#[tokio::test]
async fn test_new_node_syncs_to_longest_chain() -> anyhow::Result<()> {
    let (_temp_dir, network) = create_network(&["alice"]).await;
    let alice = network.get("alice")?;
    alice.publish("one.txt", b"one").await?;
    alice.publish("two.txt", b"two").await?;
    assert_eq!(alice.chain().len(), 3);

    let bob = network.add_node("bob", 0).await?;
    assert_eq!(bob.chain().blocks(), alice.chain().blocks());
    assert!(bob.peers().contains_key("alice"));
    assert!(alice.peers().contains_key("bob"));
    Ok(())
}

#[tokio::test]
async fn test_bootstrap_from_static_directory() -> anyhow::Result<()> {
    let temp_dir = tempdir()?;
    let config = test_config(temp_dir.path());
    let alice = PeerNode::start("alice", 0, config.clone()).await?;
    alice.publish("seed.txt", b"seed").await?;

    let bob = PeerNode::start("bob", 0, config).await?;
    assert!(bob.peers().is_empty());

    let directory = StaticDirectory::new(vec![Arc::clone(&alice)]);
    let outcome = bob.bootstrap(&directory).await?;
    assert!(matches!(outcome, Some(SyncOutcome::Adopted { .. })));
    assert_eq!(bob.chain().len(), 2);
    assert_eq!(bob.peers().get("alice"), Some(&alice.endpoint()));
    Ok(())
}

#[tokio::test]
async fn test_pending_gossip_deduplicates() -> anyhow::Result<()> {
    let (_temp_dir, network) = create_network(&["alice", "bob"]).await;
    let alice = network.get("alice")?;
    let bob = network.get("bob")?;

    let tx = Transaction::new("alice", "bob", 3, None);
    assert!(alice.chain().add_transaction(tx.clone())?);
    alice.propagate_pending().await;
    alice.propagate_pending().await;

    assert_eq!(bob.chain().pending(), vec![tx.clone()]);
    // Same value, later timestamp: still a duplicate.
    assert_eq!(bob.receive_pending(vec![tx.with_timestamp(1)]), 0);
    assert_eq!(bob.chain().pending().len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_duplicate_ids_and_ports_are_refused() -> anyhow::Result<()> {
    let (_temp_dir, network) = create_network(&["alice"]).await;
    let alice = network.get("alice")?;

    let err = network.add_node("alice", 0).await.unwrap_err();
    assert!(matches!(err, NodeError::DuplicateNode(_)));

    let err = network.add_node("bob", alice.port()).await.unwrap_err();
    assert!(matches!(err, NodeError::PortInUse(p) if p == alice.port()));

    let err = network.add_node("../etc", 0).await.unwrap_err();
    assert!(matches!(err, NodeError::InvalidNodeId(_)));

    assert_eq!(network.list_nodes()?.len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_port_held_outside_the_network_is_refused() -> anyhow::Result<()> {
    let (_temp_dir, network) = create_network(&[]).await;
    let squatter = std::net::TcpListener::bind("127.0.0.1:0")?;
    let port = squatter.local_addr()?.port();

    let err = network.add_node("carol", port).await.unwrap_err();
    assert!(matches!(err, NodeError::PortInUse(p) if p == port));
    assert!(err.is_caller_error());
    assert!(network.list_nodes()?.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_unknown_node_lookup_fails() {
    let (_temp_dir, network) = create_network(&[]).await;
    assert!(matches!(network.get("ghost"), Err(NodeError::UnknownNode(_))));
}
