//! Peer liveness ping and exchange-latency gossip: a once-a-minute ping
//! that feeds the smoothed network-latency average, and a once-a-minute
//! exchange-latency push that doubles as a direct pull when a peer asks.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    exchange::{ExchangeLatency, SecondaryExchangeLatency},
    message::{now_nanos, Message},
    node::Node,
    payload::{Payload, RequestType},
    state::FabricState,
};

/// What a node gossips about its own exchange readings: both latency
/// shapes in one envelope so a single broadcast also covers the optional
/// secondary exchange.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GossipRecord {
    pub primary: ExchangeLatency,
    #[serde(default)]
    pub secondary: Option<SecondaryExchangeLatency>,
}

/// Broadcast a liveness ping (the current timestamp) to every peer once a
/// minute. The reply is the transport-level ack; a ping never gets an
/// application-level response payload.
pub async fn run_ping_loop(node: Arc<Node>) {
    let mut interval = tokio::time::interval(Duration::from_secs(60));
    loop {
        interval.tick().await;
        let payload = Payload::request(RequestType::Latency, now_nanos().to_string());
        let Ok(json) = serde_json::to_string(&payload) else {
            continue;
        };
        node.broadcast(json, true).await;
    }
}

/// Broadcast this node's current exchange-latency reading to every peer
/// once a minute, so an idle peer still converges without asking for it.
pub async fn run_gossip_loop(node: Arc<Node>, state: Arc<FabricState>) {
    let mut interval = tokio::time::interval(Duration::from_secs(60));
    loop {
        interval.tick().await;
        let record = snapshot_record(&state).await;
        let Ok(data) = serde_json::to_string(&record) else {
            continue;
        };
        let payload = Payload::response_to(
            &Uuid::new_v4().to_string(),
            RequestType::ExchangeLatency,
            data,
            now_nanos(),
        );
        let Ok(json) = serde_json::to_string(&payload) else {
            continue;
        };
        node.broadcast(json, true).await;
    }
}

async fn snapshot_record(state: &FabricState) -> GossipRecord {
    GossipRecord {
        primary: state.snapshot_local_exchange().await,
        secondary: *state.local_exchange_latency_secondary.read().await,
    }
}

/// Dispatch one inbound application payload by request type and
/// request/response direction.
pub async fn handle_inbound(message: Message, node: &Node, state: &FabricState) {
    let payload: Payload = match serde_json::from_str(&message.msg) {
        Ok(p) => p,
        Err(e) => {
            tracing::warn!(error = %e, from = %message.from_peer_name, "dropping malformed payload");
            return;
        }
    };

    if payload.is_request {
        let Some(request) = payload.request else {
            return;
        };
        match request.request_type {
            RequestType::Latency => {
                handle_ping_request(&message.from_peer_name, &request.request_data, state)
            }
            RequestType::ExchangeLatency => {
                handle_exchange_pull(&message.from_peer_name, &request.request_id, node, state)
                    .await
            }
        }
    } else {
        let Some(response) = payload.response else {
            return;
        };
        if response.request_type == RequestType::ExchangeLatency {
            handle_exchange_push(&message.from_peer_name, &response.response_data, state);
        }
    }
}

fn handle_ping_request(from_peer_name: &str, request_data: &str, state: &FabricState) {
    let Ok(sent_at) = request_data.parse::<i64>() else {
        return;
    };
    let sample = now_nanos() - sent_at;
    state.record_network_latency(from_peer_name, sample);
}

/// Reply directly to a peer that asked for our exchange-latency reading
/// ("pull" mode) instead of making it wait for the next gossip tick.
async fn handle_exchange_pull(from_peer_name: &str, request_id: &str, node: &Node, state: &FabricState) {
    let record = snapshot_record(state).await;
    let Ok(data) = serde_json::to_string(&record) else {
        return;
    };
    let payload = Payload::response_to(request_id, RequestType::ExchangeLatency, data, now_nanos());
    let Ok(json) = serde_json::to_string(&payload) else {
        return;
    };
    if let Err(e) = node.send(from_peer_name, json, false).await {
        tracing::warn!(peer = %from_peer_name, error = %e, "failed replying to exchange-latency pull");
    }
}

fn handle_exchange_push(from_peer_name: &str, response_data: &str, state: &FabricState) {
    let Ok(record) = serde_json::from_str::<GossipRecord>(response_data) else {
        return;
    };
    state
        .peer_exchange_latency
        .insert(from_peer_name.to_string(), record.primary);
    if let Some(secondary) = record.secondary {
        state
            .peer_exchange_latency_secondary
            .insert(from_peer_name.to_string(), secondary);
    }
}
