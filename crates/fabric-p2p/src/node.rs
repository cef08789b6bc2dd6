//! The base node: QUIC transport over a derived identity, driving a swarm
//! that accepts inbound streams and dials outbound ones on request.

use std::sync::Arc;

use futures::StreamExt;
use libp2p::{swarm::SwarmEvent, Multiaddr, PeerId, StreamProtocol};
use tokio::sync::mpsc;

use crate::{
    behaviour::PROTOCOL_ID,
    config::NodeConfig,
    connection::INBOUND_CHANNEL_CAPACITY,
    error::P2pError,
    identity,
    manager::ConnectionManager,
    message::Message,
    transport,
};

pub struct Node {
    pub local_peer_id: PeerId,
    pub local_peer_name: String,
    manager: Arc<ConnectionManager>,
}

impl Node {
    /// Build the swarm, spawn its driving tasks, and return a handle plus the
    /// channel of inbound `data` messages (bounded at
    /// [`INBOUND_CHANNEL_CAPACITY`], as every connection shares it).
    pub async fn start(
        config: NodeConfig,
    ) -> Result<(Arc<Node>, mpsc::Receiver<Message>), P2pError> {
        let seed = identity::seed_for(&config.local_host, config.local_port);
        let keypair = identity::derive_keypair(&seed);
        let local_peer_id = PeerId::from(keypair.public());

        let listen_addr: Multiaddr = format!("/ip4/0.0.0.0/udp/{}/quic-v1", config.local_port)
            .parse()
            .map_err(|e| P2pError::Transport(format!("invalid listen address: {e}")))?;

        let mut swarm = transport::build_swarm(keypair, listen_addr)?;

        let mut control = swarm.behaviour().stream.new_control();
        let mut incoming = control
            .accept(StreamProtocol::new(PROTOCOL_ID))
            .map_err(|e| P2pError::Transport(e.to_string()))?;

        let (dial_tx, mut dial_rx) = mpsc::unbounded_channel::<Multiaddr>();
        let (inbound_tx, inbound_rx) = mpsc::channel::<Message>(INBOUND_CHANNEL_CAPACITY);

        let manager = Arc::new(ConnectionManager::new(
            local_peer_id,
            config.local_peer_name.clone(),
            config.peers,
            control,
            dial_tx,
            inbound_tx,
        ));

        let accept_manager = manager.clone();
        tokio::spawn(async move {
            while let Some((peer_id, stream)) = incoming.next().await {
                accept_manager.accept_stream(peer_id, stream);
            }
        });

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    event = swarm.select_next_some() => {
                        match &event {
                            SwarmEvent::ConnectionEstablished { peer_id, .. } => {
                                tracing::debug!(peer = %peer_id, "connection established");
                            }
                            SwarmEvent::ConnectionClosed { peer_id, .. } => {
                                tracing::debug!(peer = %peer_id, "connection closed");
                            }
                            SwarmEvent::OutgoingConnectionError { peer_id, error, .. } => {
                                tracing::warn!(?peer_id, %error, "outgoing connection failed");
                            }
                            SwarmEvent::NewListenAddr { address, .. } => {
                                tracing::info!(%address, "listening");
                            }
                            _ => {}
                        }
                    }
                    Some(addr) = dial_rx.recv() => {
                        if let Err(e) = swarm.dial(addr.clone()) {
                            tracing::warn!(%addr, error = %e, "dial failed");
                        }
                    }
                }
            }
        });

        let node = Arc::new(Node {
            local_peer_id,
            local_peer_name: config.local_peer_name,
            manager,
        });
        Ok((node, inbound_rx))
    }

    pub fn peer_names(&self) -> Vec<String> {
        self.manager.peer_names()
    }

    /// Send `payload_json` to exactly one peer, waiting for its ack if
    /// `needs_ack` is set.
    pub async fn send(
        &self,
        peer_name: &str,
        payload_json: String,
        needs_ack: bool,
    ) -> Result<(), P2pError> {
        let conn = self.manager.get_or_dial(peer_name).await?;
        let msg = Message::new_data(
            self.local_peer_id,
            conn.remote_peer_id,
            &self.local_peer_name,
            peer_name,
            payload_json,
            needs_ack,
        );
        if needs_ack {
            conn.send_with_ack(msg).await
        } else {
            conn.send_without_ack(msg).await
        }
    }

    /// Send `payload_json` to every configured peer in parallel. Individual
    /// failures are logged, never propagated — one unreachable peer must not
    /// stop the broadcast from reaching the rest.
    pub async fn broadcast(&self, payload_json: String, needs_ack: bool) {
        let local_id = self.local_peer_id;
        let local_name = self.local_peer_name.clone();
        self.manager
            .broadcast(
                move |peer_name, peer_id| {
                    Message::new_data(
                        local_id,
                        peer_id,
                        &local_name,
                        peer_name,
                        payload_json.clone(),
                        needs_ack,
                    )
                },
                needs_ack,
            )
            .await;
    }
}
