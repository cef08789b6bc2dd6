//! Top-level composition: starts the node, wires its inbound stream into
//! the ping/gossip handlers, and spawns the three background loops that
//! keep a fabric member's latency picture current.

use std::sync::Arc;

use crate::{
    config::NodeConfig, error::P2pError, exchange::ExchangeClient, node::Node, probe,
    state::FabricState,
};

pub struct Fabric {
    pub node: Arc<Node>,
    pub state: Arc<FabricState>,
}

impl Fabric {
    /// Start the node, then spawn the inbound dispatch loop and the
    /// ping/gossip/exchange-probe loops. Returns once the node is listening;
    /// the background loops keep running for the life of the process.
    pub async fn start(
        config: NodeConfig,
        exchange_client: Arc<dyn ExchangeClient>,
        probe_secondary_exchange: bool,
    ) -> Result<Arc<Fabric>, P2pError> {
        let tuning = config.probe;
        let (node, mut inbound_rx) = Node::start(config).await?;
        let state = Arc::new(FabricState::default());

        let dispatch_node = node.clone();
        let dispatch_state = state.clone();
        tokio::spawn(async move {
            while let Some(msg) = inbound_rx.recv().await {
                probe::peer::handle_inbound(msg, &dispatch_node, &dispatch_state).await;
            }
        });

        tokio::spawn(probe::peer::run_ping_loop(node.clone()));
        tokio::spawn(probe::peer::run_gossip_loop(node.clone(), state.clone()));
        tokio::spawn(probe::exchange::run_loop(
            exchange_client,
            state.clone(),
            tuning,
            probe_secondary_exchange,
        ));

        Ok(Arc::new(Fabric { node, state }))
    }
}
