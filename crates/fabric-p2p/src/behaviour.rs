//! libp2p `NetworkBehaviour` composition.
//!
//! The fabric needs no relay, DCUtR or NAT traversal — peers are configured
//! with a static, directly dialable address — so this is much smaller than a
//! general-purpose mesh behaviour. `stream` hands us raw bidirectional
//! substreams per protocol id; everything above that (framing, the pending-ack
//! table, message dispatch) is built by hand in [`crate::connection`].

use libp2p::{identify, identity, ping, stream, swarm::NetworkBehaviour};

/// Protocol id negotiated for the latency-fabric message stream.
pub const PROTOCOL_ID: &str = "/latency-p2p/1.0.0";

const AGENT_VERSION: &str = "/latency-fabric/1.0.0";

#[derive(NetworkBehaviour)]
#[behaviour(out_event = "FabricBehaviourEvent")]
pub struct FabricBehaviour {
    pub identify: identify::Behaviour,
    pub ping: ping::Behaviour,
    pub stream: stream::Behaviour,
}

#[derive(Debug)]
pub enum FabricBehaviourEvent {
    Identify(identify::Event),
    Ping(ping::Event),
    Stream(()),
}

impl From<identify::Event> for FabricBehaviourEvent {
    fn from(e: identify::Event) -> Self {
        FabricBehaviourEvent::Identify(e)
    }
}
impl From<ping::Event> for FabricBehaviourEvent {
    fn from(e: ping::Event) -> Self {
        FabricBehaviourEvent::Ping(e)
    }
}
impl From<()> for FabricBehaviourEvent {
    fn from(e: ()) -> Self {
        FabricBehaviourEvent::Stream(e)
    }
}

impl FabricBehaviour {
    pub fn new(key: &identity::Keypair) -> Self {
        Self {
            identify: identify::Behaviour::new(identify::Config::new(
                AGENT_VERSION.into(),
                key.public(),
            )),
            ping: ping::Behaviour::new(ping::Config::new()),
            stream: stream::Behaviour::new(),
        }
    }
}
