mod helpers;

use filechain_core::{constants::TAMPERED_RECEIVER, IntegrityReport, TamperRefusal};
use filechain_node::{NodeError, Notification};
use filechain_storage::FileAlert;
use helpers::create_network;

#[tokio::test]
async fn test_hack_is_detected_at_its_block() -> anyhow::Result<()> {
    let (_temp_dir, network) = create_network(&["alice", "bob"]).await;
    let alice = network.get("alice")?;
    alice.publish("ledger.txt", b"entries").await?;
    assert!(alice.check_integrity().is_valid());

    let outcome = alice.simulate_hack(1).await?;
    assert_eq!(outcome.block_index, 1);
    assert_eq!(outcome.new_receiver, TAMPERED_RECEIVER);
    assert_ne!(outcome.original_hash, outcome.recalculated_hash);

    match alice.check_integrity() {
        IntegrityReport::HashMismatch {
            block_index,
            stored_hash,
            calculated_hash,
        } => {
            assert_eq!(block_index, 1);
            assert_eq!(stored_hash, outcome.original_hash);
            assert_eq!(calculated_hash, outcome.recalculated_hash);
        }
        other => panic!("expected hash mismatch, got {other:?}"),
    }
    assert!(!alice.chain().is_valid());

    // The fault stays local: Bob's copy is untouched.
    assert!(network.get("bob")?.check_integrity().is_valid());
    Ok(())
}

#[tokio::test]
async fn test_tampered_chain_is_not_adopted_by_peers() -> anyhow::Result<()> {
    let (_temp_dir, network) = create_network(&["alice", "bob"]).await;
    let alice = network.get("alice")?;
    let bob = network.get("bob")?;
    alice.publish("one.txt", b"one").await?;
    alice.simulate_hack(1).await?;
    alice.chain().mine_pending("alice").await?;

    let before = bob.chain().blocks();
    alice.propagate_blockchain().await;
    assert_eq!(bob.chain().blocks(), before);
    Ok(())
}

#[tokio::test]
async fn test_hack_refusals() -> anyhow::Result<()> {
    let (_temp_dir, network) = create_network(&["alice", "bob"]).await;
    let alice = network.get("alice")?;
    let bob = network.get("bob")?;
    let fingerprint = alice.publish("only-alice.txt", b"private").await?;
    // A block holding nothing but the pending reward.
    alice.chain().mine_pending("alice").await?;

    let err = alice.simulate_hack(9).await.unwrap_err();
    assert!(matches!(
        err,
        NodeError::Tamper(TamperRefusal::OutOfRange { index: 9, len: 3 })
    ));

    let err = alice.simulate_hack(0).await.unwrap_err();
    assert!(matches!(err, NodeError::Tamper(TamperRefusal::NoTransactions(0))));

    let err = alice.simulate_hack(2).await.unwrap_err();
    assert!(matches!(err, NodeError::Tamper(TamperRefusal::NoFileTransactions(2))));

    // Bob has the block through gossip but never pulled the file.
    let err = bob.simulate_hack(1).await.unwrap_err();
    assert!(matches!(err, NodeError::Tamper(TamperRefusal::FileNotHeld(ref fp)) if *fp == fingerprint));

    assert!(alice.check_integrity().is_valid());
    assert!(bob.check_integrity().is_valid());
    Ok(())
}

#[tokio::test]
async fn test_verify_files_reports_modified_and_missing() -> anyhow::Result<()> {
    let (_temp_dir, network) = create_network(&["alice"]).await;
    let alice = network.get("alice")?;
    let edited = alice.publish("edited.txt", b"original").await?;
    let removed = alice.publish("removed.txt", b"short lived").await?;
    assert!(alice.verify_files()?.is_empty());

    let edited_path = alice.store().root().join("edited.txt");
    std::fs::write(&edited_path, b"changed behind our back")?;
    std::fs::remove_file(alice.store().root().join("removed.txt"))?;

    let alerts = alice.verify_files()?;
    assert_eq!(alerts.len(), 2);
    assert!(alerts.iter().any(|a| matches!(
        a,
        FileAlert::Modified { fingerprint, .. } if *fingerprint == edited
    )));
    assert!(alerts.iter().any(|a| matches!(
        a,
        FileAlert::Missing { fingerprint, .. } if *fingerprint == removed
    )));
    Ok(())
}

#[tokio::test]
async fn test_notifications_collect_every_node() -> anyhow::Result<()> {
    let (_temp_dir, network) = create_network(&["alice", "bob"]).await;
    assert!(network.notifications().is_empty());

    let alice = network.get("alice")?;
    let bob = network.get("bob")?;
    alice.publish("a.txt", b"alpha").await?;
    bob.publish("b.txt", b"beta").await?;

    alice.simulate_hack(1).await?;
    std::fs::write(bob.store().root().join("b.txt"), b"gamma")?;

    let notifications = network.notifications();
    assert_eq!(notifications.len(), 2);
    assert!(notifications.iter().any(|n| matches!(
        n,
        Notification::IntegrityViolation { node_id, .. } if node_id == "alice"
    )));
    assert!(notifications.iter().any(|n| matches!(
        n,
        Notification::FileModification { node_id, details: FileAlert::Modified { .. } } if node_id == "bob"
    )));
    Ok(())
}
