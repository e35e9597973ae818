//! End-to-end replication over a real loopback listener: a leader node pushes
//! mutations to a follower node through the framed TCP protocol and the
//! follower applies them without touching its own WAL.

use fusekv_core::index::{BruteForceIndex, VectorIndex};
use fusekv_core::{Metrics, Store};
use fusekv_server::cluster::{ClusterConfig, Node, NodeConfig};
use fusekv_server::rpc::{
    protocol, ReplicaHandler, ReplicationClient, ReplicationMessage, ReplicationServer,
};
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::watch;

const RPC_TIMEOUT: Duration = Duration::from_secs(1);

fn open_store(dir: &Path) -> Arc<Store> {
    Arc::new(
        Store::open(
            dir,
            VectorIndex::BruteForce(BruteForceIndex::new()),
            0,
            Arc::new(Metrics::new()),
            Arc::new(AtomicBool::new(false)),
        )
        .unwrap(),
    )
}

fn build_node(local: (&str, &str), peers: &[(&str, &str)], store: Arc<Store>) -> Arc<Node> {
    let local = NodeConfig {
        id: local.0.to_string(),
        address: local.1.to_string(),
    };
    let peers = peers
        .iter()
        .map(|(id, address)| NodeConfig {
            id: id.to_string(),
            address: address.to_string(),
        })
        .collect();
    Node::new(
        ClusterConfig::new(local, peers),
        store,
        Duration::from_millis(50),
        Duration::from_millis(200),
        RPC_TIMEOUT,
    )
}

/// Follower node listening on an ephemeral loopback port. Returns the node,
/// its address, and the sender that stops the listener.
async fn spawn_follower(
    id: &str,
    dir: &Path,
) -> (Arc<Node>, String, watch::Sender<bool>) {
    let listener = ReplicationServer::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();

    // The follower only needs to know some smaller id exists so it does not
    // consider itself leader.
    let node = build_node((id, addr.as_str()), &[("n1", "127.0.0.1:1")], open_store(dir));
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handler: Arc<dyn ReplicaHandler> = node.clone();
    tokio::spawn(listener.serve(handler, shutdown_rx));

    (node, addr, shutdown_tx)
}

#[tokio::test]
async fn leader_replicates_sets_and_deletes_to_follower() {
    let leader_dir = TempDir::new().unwrap();
    let follower_dir = TempDir::new().unwrap();
    let (follower, addr, stop) = spawn_follower("n2", follower_dir.path()).await;

    let leader = build_node(
        ("n1", "127.0.0.1:0"),
        &[("n2", addr.as_str())],
        open_store(leader_dir.path()),
    );
    assert!(leader.is_leader());

    // Replication is synchronous: once set() returns, the follower has acked.
    leader.set("user:1", b"ada".to_vec()).await.unwrap();
    leader.set("user:2", b"grace".to_vec()).await.unwrap();
    assert_eq!(follower.get("user:1"), Some(b"ada".to_vec()));
    assert_eq!(follower.get("user:2"), Some(b"grace".to_vec()));

    leader.delete("user:1").await.unwrap();
    assert_eq!(follower.get("user:1"), None);
    assert_eq!(follower.get("user:2"), Some(b"grace".to_vec()));

    // Healthy peer: no failures recorded on either side.
    assert!(leader.unhealthy_peers().is_empty());
    assert_eq!(
        leader.store().metrics().snapshot()["replication_failures"],
        0
    );

    let _ = stop.send(true);
}

#[tokio::test]
async fn heartbeat_refreshes_follower_window() {
    let dir = TempDir::new().unwrap();
    let (follower, addr, stop) = spawn_follower("n2", dir.path()).await;

    // Age the follower's view of the leader, then deliver a heartbeat.
    tokio::time::sleep(Duration::from_millis(20)).await;
    let before = follower.millis_since_heartbeat();
    assert!(before >= 20);

    let client = ReplicationClient::new(addr, RPC_TIMEOUT);
    client.send_heartbeat().await.unwrap();
    assert!(follower.millis_since_heartbeat() < before);

    let _ = stop.send(true);
}

#[tokio::test]
async fn malformed_record_is_rejected_with_failed_ack() {
    let dir = TempDir::new().unwrap();
    let (follower, addr, stop) = spawn_follower("n2", dir.path()).await;

    let mut stream = tokio::net::TcpStream::connect(&addr).await.unwrap();
    let bogus = ReplicationMessage {
        op: 9,
        key: "k".to_string(),
        value: None,
    };
    let payload = protocol::encode(&bogus).unwrap();
    protocol::write_message(&mut stream, protocol::MSG_REPLICATE, &payload)
        .await
        .unwrap();

    let (msg_type, reply) = protocol::read_message(&mut stream).await.unwrap();
    assert_eq!(msg_type, protocol::MSG_REPLICATE_ACK);
    let ack: protocol::Ack = protocol::decode(&reply).unwrap();
    assert!(!ack.success);
    assert_eq!(follower.get("k"), None);

    let _ = stop.send(true);
}

#[tokio::test]
async fn one_connection_carries_many_records() {
    let dir = TempDir::new().unwrap();
    let (follower, addr, stop) = spawn_follower("n2", dir.path()).await;

    let mut stream = tokio::net::TcpStream::connect(&addr).await.unwrap();
    for i in 0..10u8 {
        let msg = ReplicationMessage::set(&format!("k{i}"), vec![i]);
        let payload = protocol::encode(&msg).unwrap();
        protocol::write_message(&mut stream, protocol::MSG_REPLICATE, &payload)
            .await
            .unwrap();
        let (msg_type, reply) = protocol::read_message(&mut stream).await.unwrap();
        assert_eq!(msg_type, protocol::MSG_REPLICATE_ACK);
        let ack: protocol::Ack = protocol::decode(&reply).unwrap();
        assert!(ack.success);
    }
    drop(stream);

    for i in 0..10u8 {
        assert_eq!(follower.get(&format!("k{i}")), Some(vec![i]));
    }
    assert_eq!(follower.store().len(), 10);

    let _ = stop.send(true);
}

#[tokio::test]
async fn replicated_records_survive_follower_restart_only_via_snapshot() {
    // Inbound application bypasses the follower's WAL: after a crash the
    // follower has nothing, which is the contract — durability for the
    // record lives on the leader.
    let dir = TempDir::new().unwrap();
    {
        let (follower, addr, stop) = spawn_follower("n2", dir.path()).await;
        let client = ReplicationClient::new(addr, RPC_TIMEOUT);
        client
            .replicate(&ReplicationMessage::set("ephemeral", b"x".to_vec()))
            .await
            .unwrap();
        assert_eq!(follower.get("ephemeral"), Some(b"x".to_vec()));
        let _ = stop.send(true);
    }

    let reopened = open_store(dir.path());
    assert_eq!(reopened.get("ephemeral"), None);
}
