//! End-to-end tests driving two real nodes over loopback QUIC: no mocked
//! transport, only the exchange client is faked (these tests never touch
//! the network for exchange probing).

use std::collections::HashMap;
use std::time::Duration;

use fabric_p2p::probe::peer::handle_inbound;
use fabric_p2p::{ExchangeLatency, FabricState, Message, Node, NodeConfig, Payload, ProbeTuning, RequestType};

fn peer_map(a_port: u16, b_port: u16) -> HashMap<String, (String, u16)> {
    let mut m = HashMap::new();
    m.insert("node-a".to_string(), ("127.0.0.1".to_string(), a_port));
    m.insert("node-b".to_string(), ("127.0.0.1".to_string(), b_port));
    m
}

async fn start_pair(a_port: u16, b_port: u16) -> (
    (std::sync::Arc<Node>, tokio::sync::mpsc::Receiver<Message>),
    (std::sync::Arc<Node>, tokio::sync::mpsc::Receiver<Message>),
) {
    let peers = peer_map(a_port, b_port);

    let node_a = Node::start(NodeConfig {
        local_peer_name: "node-a".into(),
        local_host: "127.0.0.1".into(),
        local_port: a_port,
        peers: peers.clone(),
        probe: ProbeTuning::default(),
    })
    .await
    .unwrap();

    let node_b = Node::start(NodeConfig {
        local_peer_name: "node-b".into(),
        local_host: "127.0.0.1".into(),
        local_port: b_port,
        peers,
        probe: ProbeTuning::default(),
    })
    .await
    .unwrap();

    (node_a, node_b)
}

#[tokio::test]
async fn ping_smooths_network_latency_between_two_nodes() {
    let ((node_a, _rx_a), (node_b, mut rx_b)) = start_pair(18901, 18902).await;
    let state_b = FabricState::default();

    let now = fabric_p2p::message::now_nanos();
    let payload = Payload::request(RequestType::Latency, now.to_string());
    let json = serde_json::to_string(&payload).unwrap();
    node_a.send("node-b", json, true).await.unwrap();

    let msg = tokio::time::timeout(Duration::from_secs(5), rx_b.recv())
        .await
        .expect("timed out waiting for ping")
        .expect("channel closed");
    handle_inbound(msg, &node_b, &state_b).await;

    assert!(state_b.peer_network_latency.contains_key("node-a"));
}

#[tokio::test]
async fn exchange_latency_pull_request_receives_peer_reading() {
    let ((node_a, mut rx_a), (node_b, mut rx_b)) = start_pair(18903, 18904).await;
    let state_a = FabricState::default();
    let state_b = FabricState::default();

    let mut reading = ExchangeLatency::default();
    reading.http_spot_latency_ns = 777;
    state_b.replace_local_exchange(reading).await;

    let request = Payload::request(RequestType::ExchangeLatency, String::new());
    let json = serde_json::to_string(&request).unwrap();
    node_a.send("node-b", json, false).await.unwrap();

    let msg_b = tokio::time::timeout(Duration::from_secs(5), rx_b.recv())
        .await
        .expect("timed out waiting for pull request")
        .expect("channel closed");
    handle_inbound(msg_b, &node_b, &state_b).await;

    let reply = tokio::time::timeout(Duration::from_secs(5), rx_a.recv())
        .await
        .expect("timed out waiting for pull reply")
        .expect("channel closed");
    handle_inbound(reply, &node_a, &state_a).await;

    let stored = state_a.peer_exchange_latency.get("node-b").unwrap();
    assert_eq!(stored.http_spot_latency_ns, 777);
}

#[test]
fn identity_is_deterministic_across_process_restarts() {
    let seed = fabric_p2p::identity::seed_for("127.0.0.1", 4001);
    let first = fabric_p2p::identity::derive_peer_id(&seed);
    let second = fabric_p2p::identity::derive_peer_id(&seed);
    assert_eq!(first, second);
}
