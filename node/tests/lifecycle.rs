use std::path::Path;

use ballot_node::{BallotNode, NodeConfig};
use ballot_types::{Timestamp, VoterId};

fn config(data_dir: &Path) -> NodeConfig {
    NodeConfig {
        data_dir: data_dir.to_path_buf(),
        enable_rpc: false,
        enable_websocket: false,
        prune_interval_secs: 1,
        lmdb_map_size: 16 << 20,
        ..NodeConfig::default()
    }
}

#[tokio::test]
async fn votes_survive_a_restart() {
    let dir = tempfile::tempdir().unwrap();
    let data_dir = dir.path().join("data");

    let (category, candidate) = {
        let mut node = BallotNode::new(config(&data_dir)).unwrap();
        node.spawn_tasks();

        let ledger = node.ledger();
        let c = ledger
            .catalog()
            .create_category("Best Talk", None, None, Timestamp::now())
            .unwrap();
        let a = ledger.catalog().add_candidate(c.id, "A", None).unwrap();
        ledger.catalog().set_voting(c.id, true).unwrap();
        for voter in ["u1", "u2", "u3"] {
            ledger
                .attempt_vote(&VoterId::parse(voter).unwrap(), c.id, a.id)
                .unwrap();
        }

        node.stop().await.unwrap();
        (c.id, a.id)
    };

    let node = BallotNode::new(config(&data_dir)).unwrap();
    let tally = node.ledger().get_tally(category).unwrap();
    assert_eq!(tally.votes_for(candidate), Some(3));
    assert_eq!(
        node.ledger()
            .attempt_vote(&VoterId::parse("u1").unwrap(), category, candidate),
        Err(ballot_ledger::AdmissionError::AlreadyVoted)
    );
}

#[tokio::test]
async fn prune_task_drops_abandoned_channels() {
    let dir = tempfile::tempdir().unwrap();
    let mut node = BallotNode::new(config(&dir.path().join("data"))).unwrap();

    let ledger = node.ledger().clone();
    let c = ledger
        .catalog()
        .create_category("Poll", None, None, Timestamp::now())
        .unwrap();
    drop(ledger.subscribe(c.id).unwrap());
    assert_eq!(ledger.hub().channel_count(), 1);

    node.spawn_tasks();
    let deadline = tokio::time::Instant::now() + std::time::Duration::from_secs(5);
    while ledger.hub().channel_count() > 0 {
        assert!(tokio::time::Instant::now() < deadline, "channel never pruned");
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    }

    node.stop().await.unwrap();
}

#[tokio::test]
async fn servers_start_and_stop_on_ephemeral_ports() {
    let dir = tempfile::tempdir().unwrap();
    let mut node = BallotNode::new(NodeConfig {
        enable_rpc: true,
        rpc_port: 0,
        enable_websocket: true,
        websocket_port: 0,
        ..config(&dir.path().join("data"))
    })
    .unwrap();

    node.spawn_tasks();
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    tokio::time::timeout(std::time::Duration::from_secs(10), node.stop())
        .await
        .unwrap()
        .unwrap();
}
