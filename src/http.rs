// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT

//! Read-only query surface: lets an operator or dashboard pull the latency
//! readings this node has measured and gossiped, without joining the fabric
//! itself.

use std::sync::Arc;

use axum::{extract::State, routing::get, Json, Router};
use fabric_p2p::Fabric;
use serde::Serialize;
use tower_http::limit::RequestBodyLimitLayer;

/// Every route here is a parameterless GET, so no request ever legitimately
/// carries a body; cap it small rather than trusting clients to behave.
const MAX_REQUEST_BODY_BYTES: usize = 4 * 1024;

/// Response envelope every endpoint returns, matching the upstream
/// measurement node's `{code, message, data}` shape: 200 on success, 500
/// when the fabric's state hasn't been populated yet (never in practice,
/// since every map starts non-nil at construction, but kept for wire parity).
#[derive(Debug, Serialize)]
struct Envelope<T> {
    code: u16,
    message: &'static str,
    data: T,
}

impl<T> Envelope<T> {
    fn ok(data: T) -> Json<Self> {
        Json(Self {
            code: 200,
            message: "ok",
            data,
        })
    }
}

#[derive(Debug, Serialize)]
struct NodeExchangeLatency {
    node_name: String,
    latency: fabric_p2p::ExchangeLatency,
}

#[derive(Debug, Serialize)]
struct NodeSecondaryExchangeLatency {
    node_name: String,
    latency: fabric_p2p::SecondaryExchangeLatency,
}

#[derive(Debug, Serialize)]
struct NodeNetworkLatency {
    node_name: String,
    latency_us: i64,
}

pub fn router(fabric: Arc<Fabric>, enable_secondary: bool) -> Router {
    let mut router = Router::new()
        .route("/api/bn-latency", get(bn_latency))
        .route("/api/node-latency", get(node_latency));

    if enable_secondary {
        router = router.route("/api/okx-latency", get(okx_latency));
    }

    router
        .layer(RequestBodyLimitLayer::new(MAX_REQUEST_BODY_BYTES))
        .with_state(fabric)
}

/// All known peers' exchange-latency readings, including this node's own
/// (keyed under its configured name), as a flat array.
async fn bn_latency(State(fabric): State<Arc<Fabric>>) -> Json<Envelope<Vec<NodeExchangeLatency>>> {
    let mut data = vec![NodeExchangeLatency {
        node_name: fabric.node.local_peer_name.clone(),
        latency: fabric.state.snapshot_local_exchange().await,
    }];
    data.extend(fabric.state.peer_exchange_latency.iter().map(|entry| {
        NodeExchangeLatency {
            node_name: entry.key().clone(),
            latency: *entry.value(),
        }
    }));
    Envelope::ok(data)
}

async fn okx_latency(
    State(fabric): State<Arc<Fabric>>,
) -> Json<Envelope<Vec<NodeSecondaryExchangeLatency>>> {
    let mut data = Vec::new();
    if let Some(latency) = *fabric.state.local_exchange_latency_secondary.read().await {
        data.push(NodeSecondaryExchangeLatency {
            node_name: fabric.node.local_peer_name.clone(),
            latency,
        });
    }
    data.extend(
        fabric
            .state
            .peer_exchange_latency_secondary
            .iter()
            .map(|entry| NodeSecondaryExchangeLatency {
                node_name: entry.key().clone(),
                latency: *entry.value(),
            }),
    );
    Envelope::ok(data)
}

/// Every peer with a known smoothed network latency, converted from
/// nanoseconds (the internal unit) to microseconds (the wire unit).
async fn node_latency(State(fabric): State<Arc<Fabric>>) -> Json<Envelope<Vec<NodeNetworkLatency>>> {
    let data = fabric
        .state
        .peer_network_latency
        .iter()
        .map(|entry| NodeNetworkLatency {
            node_name: entry.key().clone(),
            latency_us: entry.value() / 1_000,
        })
        .collect();
    Envelope::ok(data)
}
