// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
mod cli;
mod http;

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

use cli::Cli;
use fabric_p2p::{Fabric, NodeConfig, ProbeTuning, ReqwestExchangeClient};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = fabric_config::load(cli.config.as_deref())?;
    init_logging(&config.node.log_level, cli.json_logs);

    tracing::info!(
        name = %config.node.name,
        host = %config.node.host,
        udp_port = config.node.udp_port,
        peers = config.peers.len(),
        "starting latency-fabric node"
    );

    let http_port = config.node.http_port;
    let enable_secondary = config.probe.enable_secondary_exchange;
    let node_config = to_node_config(&config);

    let exchange_client = Arc::new(ReqwestExchangeClient::new());
    let fabric = Fabric::start(node_config, exchange_client, enable_secondary)
        .await
        .context("starting fabric node")?;

    let app = http::router(fabric, enable_secondary);
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", http_port))
        .await
        .with_context(|| format!("binding query HTTP surface to port {http_port}"))?;
    tracing::info!(port = http_port, "query HTTP surface listening");
    axum::serve(listener, app)
        .await
        .context("serving query HTTP surface")?;

    Ok(())
}

/// Translate the on-disk configuration schema into the shape `fabric_p2p`
/// actually runs on. The local node is folded into the peer map too (and
/// then filtered back out by the connection manager) so every member's
/// identity is derived the same way, local or remote.
fn to_node_config(config: &fabric_config::Config) -> NodeConfig {
    let mut peers: HashMap<String, (String, u16)> = config
        .peers
        .iter()
        .map(|(name, peer)| (name.clone(), (peer.host.clone(), peer.port)))
        .collect();
    peers.insert(
        config.node.name.clone(),
        (config.node.host.clone(), config.node.udp_port),
    );

    NodeConfig {
        local_peer_name: config.node.name.clone(),
        local_host: config.node.host.clone(),
        local_port: config.node.udp_port,
        peers,
        probe: ProbeTuning {
            time_sync_timeout: std::time::Duration::from_millis(config.probe.time_sync_timeout_ms),
            skew_sample_count: config.probe.skew_sample_count,
            http_sample_count: config.probe.http_sample_count,
            ws_sample_count: config.probe.ws_sample_count,
            http_warmup: std::time::Duration::from_secs(config.probe.http_warmup_secs),
            enable_outlier_guard: config.probe.enable_outlier_guard,
        },
    }
}

fn init_logging(log_level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }
}
