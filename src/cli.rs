// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT

use std::path::PathBuf;

use clap::Parser;

/// Measure cross-exchange and inter-peer latency and gossip the readings
/// across a fabric of nodes.
#[derive(Parser, Debug)]
#[command(name = "latency-fabric", version, about)]
pub struct Cli {
    /// Path to the node config file. Layered on top of the standard search
    /// path (see `fabric_config::load`).
    #[arg(long, short = 'c')]
    pub config: Option<PathBuf>,

    /// Emit logs as JSON instead of the default human-readable format.
    #[arg(long)]
    pub json_logs: bool,
}
