//! The nested application envelope carried inside [`crate::message::Message::msg`].
//!
//! A payload is either a request (`is_request: true`, `request` populated) or
//! a response to one (`is_request: false`, `response` populated). The two
//! request types correspond to the peer-ping probe and the exchange-latency
//! gossip described in the module design; both ride the same envelope shape.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestType {
    Latency,
    ExchangeLatency,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    pub request_id: String,
    pub request_type: RequestType,
    pub request_data: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    pub request_id: String,
    pub request_type: RequestType,
    pub response_data: String,
    #[serde(default)]
    pub err_code: i32,
    #[serde(default)]
    pub err_msg: String,
    pub in_timestamp: i64,
    pub out_timestamp: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payload {
    pub is_request: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request: Option<Request>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<Response>,
}

impl Payload {
    pub fn request(request_type: RequestType, request_data: String) -> Self {
        Self {
            is_request: true,
            request: Some(Request {
                request_id: Uuid::new_v4().to_string(),
                request_type,
                request_data,
            }),
            response: None,
        }
    }

    /// Build a response echoing `request_id`, stamping `in_timestamp` as now
    /// and `out_timestamp` at send time (the caller fills it in just before
    /// writing the frame, so it reflects when the reply actually left).
    pub fn response_to(
        request_id: &str,
        request_type: RequestType,
        response_data: String,
        in_timestamp: i64,
    ) -> Self {
        Self {
            is_request: false,
            request: None,
            response: Some(Response {
                request_id: request_id.to_string(),
                request_type,
                response_data,
                err_code: 0,
                err_msg: String::new(),
                in_timestamp,
                out_timestamp: crate::message::now_nanos(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_round_trips() {
        let p = Payload::request(RequestType::Latency, "123".into());
        let json = serde_json::to_string(&p).unwrap();
        let back: Payload = serde_json::from_str(&json).unwrap();
        assert!(back.is_request);
        assert_eq!(back.request.unwrap().request_type, RequestType::Latency);
    }

    #[test]
    fn response_echoes_request_id() {
        let p = Payload::response_to("abc", RequestType::ExchangeLatency, "{}".into(), 10);
        assert!(!p.is_request);
        assert_eq!(p.response.unwrap().request_id, "abc");
    }
}
