// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT

//! Integration test covering the path from an on-disk config file to a
//! running node: `fabric_config::load` into `fabric_p2p::NodeConfig`, then
//! starting the node and exchanging a ping with a second node it never
//! dialed first.

use std::collections::HashMap;
use std::io::Write;
use std::time::Duration;

use fabric_p2p::{FabricState, Node, NodeConfig, Payload, ProbeTuning, RequestType};

fn node_config_from_yaml(yaml: &str, local_peer_name: &str) -> NodeConfig {
    let mut f = tempfile::NamedTempFile::new().unwrap();
    writeln!(f, "{yaml}").unwrap();
    let config = fabric_config::load(Some(f.path())).unwrap();

    let mut peers: HashMap<String, (String, u16)> = config
        .peers
        .iter()
        .map(|(name, peer)| (name.clone(), (peer.host.clone(), peer.port)))
        .collect();
    peers.insert(
        local_peer_name.to_string(),
        (config.node.host.clone(), config.node.udp_port),
    );

    NodeConfig {
        local_peer_name: local_peer_name.to_string(),
        local_host: config.node.host,
        local_port: config.node.udp_port,
        peers,
        probe: ProbeTuning {
            time_sync_timeout: Duration::from_millis(config.probe.time_sync_timeout_ms),
            skew_sample_count: config.probe.skew_sample_count,
            http_sample_count: config.probe.http_sample_count,
            ws_sample_count: config.probe.ws_sample_count,
            http_warmup: Duration::from_secs(config.probe.http_warmup_secs),
            enable_outlier_guard: config.probe.enable_outlier_guard,
        },
    }
}

#[tokio::test]
async fn node_started_from_config_files_exchanges_a_ping() {
    let a_yaml = r#"
node:
  name: node-a
  host: 127.0.0.1
  udp_port: 18911
peers:
  node-b:
    host: 127.0.0.1
    port: 18912
"#;
    let b_yaml = r#"
node:
  name: node-b
  host: 127.0.0.1
  udp_port: 18912
peers:
  node-a:
    host: 127.0.0.1
    port: 18911
"#;

    let (node_a, _rx_a) = Node::start(node_config_from_yaml(a_yaml, "node-a"))
        .await
        .unwrap();
    let (node_b, mut rx_b) = Node::start(node_config_from_yaml(b_yaml, "node-b"))
        .await
        .unwrap();

    let state_b = FabricState::default();
    let now = fabric_p2p::message::now_nanos();
    let payload = Payload::request(RequestType::Latency, now.to_string());
    let json = serde_json::to_string(&payload).unwrap();
    node_a.send("node-b", json, true).await.unwrap();

    let msg = tokio::time::timeout(Duration::from_secs(5), rx_b.recv())
        .await
        .expect("timed out waiting for ping")
        .expect("channel closed");
    fabric_p2p::probe::peer::handle_inbound(msg, &node_b, &state_b).await;

    assert!(state_b.peer_network_latency.contains_key("node-a"));
}

#[test]
fn missing_explicit_config_path_is_an_error() {
    let result = fabric_config::load(Some(std::path::Path::new(
        "/tmp/latency_fabric_integration_test_missing_xyz.yaml",
    )));
    assert!(result.is_err());
}
