//! The outer wire envelope exchanged between nodes.
//!
//! Every envelope is either a `data` message carrying an application
//! [`crate::payload::Payload`], or an `ack` synthesized in response to one
//! that requested it. Field names are fixed by the wire contract and must
//! not be renamed — other implementations of this protocol parse them by
//! name.

use libp2p::PeerId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MsgType {
    Data,
    Ack,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub msg_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ack_msg_id: Option<String>,
    pub from_peer_id: String,
    pub to_peer_id: String,
    pub from_peer_name: String,
    pub to_peer_name: String,
    pub msg_type: MsgType,
    /// The application payload, itself JSON-encoded, nested as a string —
    /// matching the wire contract's double-encoding.
    pub msg: String,
    pub timestamp_nano: i64,
    pub needs_ack: bool,
}

impl Message {
    /// Build a `data` message carrying `payload` (already JSON-serialized).
    pub fn new_data(
        from_peer_id: PeerId,
        to_peer_id: PeerId,
        from_peer_name: &str,
        to_peer_name: &str,
        payload_json: String,
        needs_ack: bool,
    ) -> Self {
        Self {
            msg_id: Uuid::new_v4().to_string(),
            ack_msg_id: None,
            from_peer_id: from_peer_id.to_string(),
            to_peer_id: to_peer_id.to_string(),
            from_peer_name: from_peer_name.to_string(),
            to_peer_name: to_peer_name.to_string(),
            msg_type: MsgType::Data,
            msg: payload_json,
            timestamp_nano: now_nanos(),
            needs_ack,
        }
    }

    /// Build the `ack` that acknowledges `original`.
    pub fn new_ack(
        original: &Message,
        from_peer_id: PeerId,
        from_peer_name: &str,
    ) -> Self {
        Self {
            msg_id: Uuid::new_v4().to_string(),
            ack_msg_id: Some(original.msg_id.clone()),
            from_peer_id: from_peer_id.to_string(),
            to_peer_id: original.from_peer_id.clone(),
            from_peer_name: from_peer_name.to_string(),
            to_peer_name: original.from_peer_name.clone(),
            msg_type: MsgType::Ack,
            msg: String::new(),
            timestamp_nano: now_nanos(),
            needs_ack: false,
        }
    }
}

pub fn now_nanos() -> i64 {
    chrono::Utc::now()
        .timestamp_nanos_opt()
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_message_round_trips_through_json() {
        let from = PeerId::random();
        let to = PeerId::random();
        let msg = Message::new_data(from, to, "node-a", "node-b", "{\"x\":1}".into(), true);
        let json = serde_json::to_string(&msg).unwrap();
        let back: Message = serde_json::from_str(&json).unwrap();
        assert_eq!(back.msg_id, msg.msg_id);
        assert_eq!(back.msg_type, MsgType::Data);
        assert!(back.needs_ack);
        assert!(json.contains("\"msg_type\":\"data\""));
    }

    #[test]
    fn ack_references_original_msg_id() {
        let from = PeerId::random();
        let to = PeerId::random();
        let original = Message::new_data(from, to, "node-a", "node-b", "{}".into(), true);
        let ack = Message::new_ack(&original, to, "node-b");
        assert_eq!(ack.ack_msg_id.as_deref(), Some(original.msg_id.as_str()));
        assert_eq!(ack.to_peer_name, "node-a");
        assert_eq!(ack.msg_type, MsgType::Ack);
    }
}
