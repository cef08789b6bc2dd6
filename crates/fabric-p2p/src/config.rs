use std::{collections::HashMap, time::Duration};

/// Configuration needed to start a [`crate::node::LatencyNode`].
///
/// Peer identity is never configured directly — every peer's [`PeerId`] is
/// derived from its `host:port`, so all a node needs is the address book.
pub struct NodeConfig {
    /// This node's own name, used as the key into `peers` that identifies
    /// "me" so it can be filtered out of the dial set.
    pub local_peer_name: String,

    /// This node's public host (identity seed input, dial target for peers).
    pub local_host: String,

    /// UDP port the QUIC transport listens on (identity seed input).
    pub local_port: u16,

    /// Every peer in the fabric, including this node itself, by name.
    pub peers: HashMap<String, (String, u16)>,

    pub probe: ProbeTuning,
}

/// Tuning knobs for the probe loops, mirrored from [`fabric_config::ProbeConfig`]
/// so this crate has no compile-time dependency on the config crate.
#[derive(Debug, Clone, Copy)]
pub struct ProbeTuning {
    pub time_sync_timeout: Duration,
    pub skew_sample_count: usize,
    pub http_sample_count: usize,
    pub ws_sample_count: usize,
    pub http_warmup: Duration,
    pub enable_outlier_guard: bool,
}

impl Default for ProbeTuning {
    fn default() -> Self {
        Self {
            time_sync_timeout: Duration::from_secs(3),
            skew_sample_count: 10,
            http_sample_count: 100,
            ws_sample_count: 500,
            http_warmup: Duration::from_secs(5),
            enable_outlier_guard: false,
        }
    }
}
