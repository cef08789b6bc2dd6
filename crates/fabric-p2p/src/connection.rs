//! A single peer connection: one raw libp2p stream, framed, with an inbound
//! dispatch loop and a pending-ack table for request/reply semantics layered
//! on top of fire-and-forget messaging.

use std::sync::atomic::{AtomicBool, Ordering};
use std::{sync::Arc, time::Duration};

use dashmap::DashMap;
use futures::{AsyncRead, AsyncWrite, AsyncWriteExt};
use libp2p::PeerId;
use tokio::sync::{mpsc, oneshot, Mutex};

use crate::{
    codec::{read_frame, write_frame, Frame},
    error::P2pError,
    message::{Message, MsgType},
};

/// How long `send_with_ack` waits for the matching ack before giving up.
const ACK_TIMEOUT: Duration = Duration::from_secs(5);

/// Capacity of the channel that carries demultiplexed inbound `data`
/// messages out to the base node.
pub const INBOUND_CHANNEL_CAPACITY: usize = 100;

/// A connection to one remote peer, backed by a single bidirectional stream.
///
/// Splitting the stream lets the inbound loop read concurrently with
/// outbound sends; writes are serialized behind a mutex since a stream only
/// supports one writer.
pub struct Connection {
    pub remote_peer_id: PeerId,
    pub remote_peer_name: String,
    write_half: Mutex<Box<dyn AsyncWrite + Unpin + Send>>,
    pending_acks: DashMap<String, oneshot::Sender<()>>,
    /// Set once the inbound loop observes a clean close or a fault, or an
    /// outbound write fails. `get_or_dial` treats a closed connection as
    /// absent and redials rather than handing out a dead handle.
    closed: AtomicBool,
}

impl Connection {
    /// Spawn the inbound read loop and return the connection handle plus the
    /// channel of inbound `data` messages (the base node drains this).
    pub fn spawn<S>(
        stream: S,
        remote_peer_id: PeerId,
        remote_peer_name: String,
        local_peer_id: PeerId,
        local_peer_name: String,
    ) -> (Arc<Connection>, mpsc::Receiver<Message>)
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let (read_half, write_half) = futures::AsyncReadExt::split(stream);
        let conn = Arc::new(Connection {
            remote_peer_id,
            remote_peer_name,
            write_half: Mutex::new(Box::new(write_half)),
            pending_acks: DashMap::new(),
            closed: AtomicBool::new(false),
        });

        let (inbound_tx, inbound_rx) = mpsc::channel(INBOUND_CHANNEL_CAPACITY);
        let inbound_conn = conn.clone();
        tokio::spawn(async move {
            inbound_conn
                .inbound_loop(read_half, inbound_tx, local_peer_id, local_peer_name)
                .await;
        });

        (conn, inbound_rx)
    }

    async fn inbound_loop<R>(
        self: Arc<Self>,
        mut read_half: R,
        inbound_tx: mpsc::Sender<Message>,
        local_peer_id: PeerId,
        local_peer_name: String,
    ) where
        R: AsyncRead + Unpin + Send,
    {
        loop {
            let msg = match read_frame::<_, Message>(&mut read_half).await {
                Ok(Frame::Message(msg)) => msg,
                Ok(Frame::Closed) => {
                    tracing::debug!(peer = %self.remote_peer_name, "connection closed cleanly");
                    self.closed.store(true, Ordering::SeqCst);
                    break;
                }
                Err(e) => {
                    tracing::warn!(peer = %self.remote_peer_name, error = %e, "inbound frame error");
                    self.closed.store(true, Ordering::SeqCst);
                    break;
                }
            };

            match msg.msg_type {
                MsgType::Ack => {
                    if let Some(id) = &msg.ack_msg_id {
                        if let Some((_, tx)) = self.pending_acks.remove(id) {
                            let _ = tx.send(());
                        }
                    }
                }
                MsgType::Data => {
                    let needs_ack = msg.needs_ack;
                    let ack_target = msg.msg_id.clone();
                    if inbound_tx.send(msg).await.is_err() {
                        self.closed.store(true, Ordering::SeqCst);
                        break;
                    }
                    if needs_ack {
                        let ack = Message::new_ack(
                            &Message {
                                msg_id: ack_target,
                                ack_msg_id: None,
                                from_peer_id: String::new(),
                                to_peer_id: String::new(),
                                from_peer_name: self.remote_peer_name.clone(),
                                to_peer_name: local_peer_name.clone(),
                                msg_type: MsgType::Data,
                                msg: String::new(),
                                timestamp_nano: 0,
                                needs_ack: false,
                            },
                            local_peer_id,
                            &local_peer_name,
                        );
                        if let Err(e) = self.write_message(&ack).await {
                            tracing::warn!(peer = %self.remote_peer_name, error = %e, "failed to send ack");
                        }
                    }
                }
            }
        }
    }

    async fn write_message(&self, msg: &Message) -> Result<(), P2pError> {
        let mut guard = self.write_half.lock().await;
        let result = write_frame(&mut *guard, msg).await;
        if result.is_err() {
            self.closed.store(true, Ordering::SeqCst);
        }
        result
    }

    /// Whether the underlying stream is known to be closed — a clean close,
    /// a read/write fault, or the inbound loop dying outright. Callers
    /// (the connection manager) treat a closed connection as absent and
    /// dial a fresh one.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Send `msg` and wait up to [`ACK_TIMEOUT`] for its ack.
    pub async fn send_with_ack(&self, msg: Message) -> Result<(), P2pError> {
        let (tx, rx) = oneshot::channel();
        self.pending_acks.insert(msg.msg_id.clone(), tx);

        if let Err(e) = self.write_message(&msg).await {
            self.pending_acks.remove(&msg.msg_id);
            return Err(e);
        }

        match tokio::time::timeout(ACK_TIMEOUT, rx).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(_)) => Err(P2pError::AckTimeout),
            Err(_) => {
                self.pending_acks.remove(&msg.msg_id);
                Err(P2pError::AckTimeout)
            }
        }
    }

    /// Fire-and-forget send: no ack is awaited.
    pub async fn send_without_ack(&self, msg: Message) -> Result<(), P2pError> {
        self.write_message(&msg).await
    }

    pub async fn close(&self) {
        let mut guard = self.write_half.lock().await;
        let _ = guard.close().await;
    }
}
