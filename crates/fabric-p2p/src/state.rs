//! Shared, concurrently-accessed state: this node's own latest exchange
//! readings plus what every peer last gossiped about theirs.

use dashmap::DashMap;
use tokio::sync::RwLock;

use crate::exchange::{ExchangeLatency, SecondaryExchangeLatency};

#[derive(Default)]
pub struct FabricState {
    /// This node's own latest exchange-latency reading. Replaced atomically
    /// by the exchange probe loop; a tick with zero successful samples
    /// leaves the previous value untouched.
    pub local_exchange_latency: RwLock<ExchangeLatency>,
    pub local_exchange_latency_secondary: RwLock<Option<SecondaryExchangeLatency>>,

    /// Smoothed round-trip latency to each peer, keyed by peer name.
    pub peer_network_latency: DashMap<String, i64>,

    /// Last exchange-latency reading gossiped by each peer.
    pub peer_exchange_latency: DashMap<String, ExchangeLatency>,
    pub peer_exchange_latency_secondary: DashMap<String, SecondaryExchangeLatency>,
}

impl FabricState {
    pub async fn snapshot_local_exchange(&self) -> ExchangeLatency {
        *self.local_exchange_latency.read().await
    }

    pub async fn replace_local_exchange(&self, value: ExchangeLatency) {
        *self.local_exchange_latency.write().await = value;
    }

    pub async fn replace_local_exchange_secondary(&self, value: SecondaryExchangeLatency) {
        *self.local_exchange_latency_secondary.write().await = Some(value);
    }

    /// Exponentially smooth a new network-latency sample for `peer_name`:
    /// `(previous + sample) / 2`, or just `sample` if this is the first one.
    pub fn record_network_latency(&self, peer_name: &str, sample_ns: i64) -> i64 {
        let new_avg = match self.peer_network_latency.get(peer_name) {
            Some(prev) => (*prev + sample_ns) / 2,
            None => sample_ns,
        };
        self.peer_network_latency
            .insert(peer_name.to_string(), new_avg);
        new_avg
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_sample_is_the_average() {
        let state = FabricState::default();
        let avg = state.record_network_latency("node-b", 100);
        assert_eq!(avg, 100);
    }

    #[test]
    fn subsequent_samples_are_smoothed() {
        let state = FabricState::default();
        state.record_network_latency("node-b", 100);
        let avg = state.record_network_latency("node-b", 300);
        assert_eq!(avg, 200);
    }
}
