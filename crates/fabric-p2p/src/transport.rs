//! Swarm construction: QUIC transport over a deterministically derived identity.

use std::time::Duration;

use libp2p::{identity, swarm::Config as SwarmConfig, Swarm, SwarmBuilder};

use crate::{behaviour::FabricBehaviour, error::P2pError};

/// Idle timeout before a QUIC connection with no open streams is dropped.
/// Generous enough that a quiet minute between probe ticks never tears down
/// the link to a peer that is still configured.
const IDLE_CONNECTION_TIMEOUT: Duration = Duration::from_secs(90);

/// Build a swarm bound to `listen_addr` (a `/ip4/.../udp/<port>/quic-v1`
/// multiaddr) using the supplied identity.
pub fn build_swarm(
    key: identity::Keypair,
    listen_addr: libp2p::Multiaddr,
) -> Result<Swarm<FabricBehaviour>, P2pError> {
    let mut swarm = SwarmBuilder::with_existing_identity(key)
        .with_tokio()
        .with_quic()
        .with_behaviour(|key| Ok::<_, std::convert::Infallible>(FabricBehaviour::new(key)))
        .map_err(|e| P2pError::Transport(e.to_string()))?
        .with_swarm_config(|cfg: SwarmConfig| {
            cfg.with_idle_connection_timeout(IDLE_CONNECTION_TIMEOUT)
        })
        .build();

    swarm
        .listen_on(listen_addr)
        .map_err(|e| P2pError::Transport(e.to_string()))?;
    Ok(swarm)
}
