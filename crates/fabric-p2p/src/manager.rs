//! Tracks one [`Connection`] per configured peer, dialing lazily and caching
//! the result; demultiplexes every connection's inbound `data` messages onto
//! a single channel the base node reads from.

use std::{collections::HashMap, sync::Arc, time::Duration};

use dashmap::DashMap;
use libp2p::{stream, Multiaddr, PeerId, StreamProtocol};
use tokio::sync::mpsc;

use crate::{
    behaviour::PROTOCOL_ID,
    connection::Connection,
    error::P2pError,
    identity,
    message::Message,
};

/// How long `get_or_dial` retries opening a stream before giving up. The
/// swarm dial itself happens out-of-band in the event loop; this is the
/// budget for that dial to land before a connection attempt is a failure.
const DIAL_TIMEOUT: Duration = Duration::from_secs(5);
const DIAL_RETRY_INTERVAL: Duration = Duration::from_millis(150);

#[derive(Debug, Clone)]
struct TargetPeer {
    addr: Multiaddr,
    peer_id: PeerId,
}

pub struct ConnectionManager {
    local_peer_id: PeerId,
    local_peer_name: String,
    target_peers: HashMap<String, TargetPeer>,
    outbound: DashMap<String, Arc<Connection>>,
    inbound: DashMap<String, Arc<Connection>>,
    control: stream::Control,
    dial_tx: mpsc::UnboundedSender<Multiaddr>,
    inbound_tx: mpsc::Sender<Message>,
}

impl ConnectionManager {
    /// `peers` maps peer name to `(host, port)`; entries matching
    /// `local_peer_name` are dropped, mirroring the base node's own
    /// self-filtering on construction.
    pub fn new(
        local_peer_id: PeerId,
        local_peer_name: String,
        peers: HashMap<String, (String, u16)>,
        control: stream::Control,
        dial_tx: mpsc::UnboundedSender<Multiaddr>,
        inbound_tx: mpsc::Sender<Message>,
    ) -> Self {
        let target_peers = peers
            .into_iter()
            .filter(|(name, _)| name != &local_peer_name)
            .filter_map(|(name, (host, port))| {
                let seed = identity::seed_for(&host, port);
                let peer_id = identity::derive_peer_id(&seed);
                let addr: Multiaddr = format!("/ip4/{host}/udp/{port}/quic-v1").parse().ok()?;
                Some((name, TargetPeer { addr, peer_id }))
            })
            .collect();

        Self {
            local_peer_id,
            local_peer_name,
            target_peers,
            outbound: DashMap::new(),
            inbound: DashMap::new(),
            control,
            dial_tx,
            inbound_tx,
        }
    }

    pub fn peer_names(&self) -> Vec<String> {
        self.target_peers.keys().cloned().collect()
    }

    /// Return the cached outbound connection to `peer_name`, dialing and
    /// opening a fresh stream if none exists yet or the cached one's
    /// underlying stream has closed.
    pub async fn get_or_dial(&self, peer_name: &str) -> Result<Arc<Connection>, P2pError> {
        if let Some(conn) = self.outbound.get(peer_name) {
            if !conn.is_closed() {
                return Ok(conn.clone());
            }
            drop(conn);
            self.outbound.remove(peer_name);
        }

        let target = self
            .target_peers
            .get(peer_name)
            .ok_or_else(|| P2pError::PeerNotFound(peer_name.to_string()))?
            .clone();

        let _ = self.dial_tx.send(target.addr.clone());

        let protocol = StreamProtocol::new(PROTOCOL_ID);
        let mut control = self.control.clone();
        let deadline = tokio::time::Instant::now() + DIAL_TIMEOUT;

        loop {
            match control.open_stream(target.peer_id, protocol.clone()).await {
                Ok(stream) => {
                    let (conn, rx) = Connection::spawn(
                        stream,
                        target.peer_id,
                        peer_name.to_string(),
                        self.local_peer_id,
                        self.local_peer_name.clone(),
                    );
                    self.outbound.insert(peer_name.to_string(), conn.clone());
                    self.forward_inbound(rx);
                    return Ok(conn);
                }
                Err(e) => {
                    if tokio::time::Instant::now() >= deadline {
                        return Err(P2pError::Dial(format!(
                            "could not open stream to {peer_name}: {e}"
                        )));
                    }
                    tokio::time::sleep(DIAL_RETRY_INTERVAL).await;
                }
            }
        }
    }

    /// Register a stream accepted from an inbound dial, keyed by the remote
    /// peer's id (translated to its configured name when known).
    pub fn accept_stream(&self, remote_peer_id: PeerId, stream: libp2p::Stream) {
        let remote_peer_name = self
            .target_peers
            .iter()
            .find(|(_, t)| t.peer_id == remote_peer_id)
            .map(|(name, _)| name.clone())
            .unwrap_or_else(|| remote_peer_id.to_string());

        let (conn, rx) = Connection::spawn(
            stream,
            remote_peer_id,
            remote_peer_name,
            self.local_peer_id,
            self.local_peer_name.clone(),
        );
        self.inbound.insert(remote_peer_id.to_string(), conn);
        self.forward_inbound(rx);
    }

    fn forward_inbound(&self, mut rx: mpsc::Receiver<Message>) {
        let tx = self.inbound_tx.clone();
        tokio::spawn(async move {
            while let Some(msg) = rx.recv().await {
                if tx.send(msg).await.is_err() {
                    break;
                }
            }
        });
    }

    /// Send `msg_for` per peer to every configured target, in parallel,
    /// logging (not propagating) individual failures — a partner being
    /// unreachable must never stop the fabric from reaching the rest.
    pub async fn broadcast<F>(&self, msg_for: F, needs_ack: bool)
    where
        F: Fn(&str, PeerId) -> Message,
    {
        let names = self.peer_names();
        let mut tasks = Vec::with_capacity(names.len());
        for name in names {
            let peer_id = match self.target_peers.get(&name) {
                Some(t) => t.peer_id,
                None => continue,
            };
            let msg = msg_for(&name, peer_id);
            tasks.push(async move {
                match self.get_or_dial(&name).await {
                    Ok(conn) => {
                        let result = if needs_ack {
                            conn.send_with_ack(msg).await
                        } else {
                            conn.send_without_ack(msg).await
                        };
                        if let Err(e) = result {
                            tracing::warn!(peer = %name, error = %e, "broadcast send failed");
                        }
                    }
                    Err(e) => tracing::warn!(peer = %name, error = %e, "broadcast dial failed"),
                }
            });
        }
        futures::future::join_all(tasks).await;
    }
}
