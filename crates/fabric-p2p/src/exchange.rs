//! Exchange-latency data model and the external HTTP/WebSocket collaborator
//! interface the probe loop measures against.
//!
//! The probe itself never talks to `reqwest` or `tokio-tungstenite` directly —
//! it only calls [`ExchangeClient`], so tests can swap in a fake that returns
//! canned timings without opening a socket.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};

use crate::error::P2pError;

/// Latency readings against the primary exchange's HTTP and WebSocket
/// surfaces, grouped by market. A field stays `0` until at least one sample
/// for it has succeeded.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExchangeLatency {
    pub http_spot_latency_ns: i64,
    pub http_future_latency_ns: i64,
    pub http_delivery_latency_ns: i64,
    pub http_portfolio_latency_ns: i64,
    pub ws_spot_latency_ns: i64,
    pub ws_future_latency_ns: i64,
    pub ws_delivery_latency_ns: i64,
}

/// Latency readings against an optional second exchange. Smaller shape than
/// [`ExchangeLatency`] — only one HTTP and one WebSocket market are tracked.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SecondaryExchangeLatency {
    pub http_latency_ns: i64,
    pub ws_latency_ns: i64,
}

/// One HTTP endpoint probed for both round-trip latency and clock skew.
#[derive(Debug, Clone)]
pub struct HttpTarget {
    pub name: &'static str,
    pub ping_url: &'static str,
    pub time_url: &'static str,
}

/// One WebSocket stream probed for message-arrival latency.
#[derive(Debug, Clone)]
pub struct WsTarget {
    pub name: &'static str,
    pub url: &'static str,
    /// Subscription frame sent immediately after connecting, if the stream
    /// requires an explicit subscribe (as opposed to being pre-scoped by
    /// the URL path alone).
    pub subscribe: Option<&'static str>,
}

/// One HTTP round-trip sample: status code and, if the body carried a
/// server timestamp, the mid-request/server-clock skew contribution.
#[derive(Debug, Clone, Copy)]
pub struct HttpSample {
    pub status: u16,
    pub rtt: Duration,
    pub server_time_ns: Option<i64>,
}

/// One inbound WebSocket payload: the server-stamped event time and the
/// instant it was received locally.
#[derive(Debug, Clone, Copy)]
pub struct WsSample {
    pub server_time_ns: i64,
}

/// External collaborator seam: everything the exchange probe needs from an
/// HTTP client and a WebSocket client. The default implementation
/// ([`ReqwestExchangeClient`]) is a thin wrapper over `reqwest` and
/// `tokio-tungstenite`; tests provide a fake.
#[async_trait]
pub trait ExchangeClient: Send + Sync + 'static {
    async fn http_get(&self, url: &str, timeout: Duration) -> Result<HttpSample, P2pError>;

    /// Connect to `target`, sending its subscribe frame if present, then
    /// receive up to `count` payloads (or until `timeout` elapses on an
    /// individual recv), extracting the server event time from each.
    async fn ws_sample(
        &self,
        target: &WsTarget,
        count: usize,
        timeout: Duration,
    ) -> Result<Vec<WsSample>, P2pError>;
}

/// Minimal subset of a ticker payload's fields this probe actually reads.
/// Real exchange payloads carry much more; only the event timestamp and an
/// HTTP server-time field are relevant for latency measurement.
#[derive(Debug, Deserialize)]
struct ServerTimeBody {
    #[serde(alias = "serverTime")]
    server_time: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct WsEventBody {
    #[serde(alias = "E")]
    event_time_ms: Option<i64>,
    data: Option<WsEventData>,
}

#[derive(Debug, Deserialize)]
struct WsEventData {
    ts: Option<String>,
}

pub struct ReqwestExchangeClient {
    http: reqwest::Client,
}

impl ReqwestExchangeClient {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
        }
    }
}

impl Default for ReqwestExchangeClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ExchangeClient for ReqwestExchangeClient {
    async fn http_get(&self, url: &str, timeout: Duration) -> Result<HttpSample, P2pError> {
        let start = std::time::Instant::now();
        let resp = tokio::time::timeout(timeout, self.http.get(url).send())
            .await
            .map_err(|_| P2pError::Probe(format!("timed out GETing {url}")))?
            .map_err(|e| P2pError::Probe(e.to_string()))?;
        let status = resp.status().as_u16();
        let body = resp
            .text()
            .await
            .map_err(|e| P2pError::Probe(e.to_string()))?;
        let rtt = start.elapsed();

        let server_time_ns = serde_json::from_str::<ServerTimeBody>(&body)
            .ok()
            .and_then(|b| b.server_time)
            .map(|ms| ms * 1_000_000);

        Ok(HttpSample {
            status,
            rtt,
            server_time_ns,
        })
    }

    async fn ws_sample(
        &self,
        target: &WsTarget,
        count: usize,
        timeout: Duration,
    ) -> Result<Vec<WsSample>, P2pError> {
        let (mut ws, _) = tokio_tungstenite::connect_async(target.url)
            .await
            .map_err(|e| P2pError::Probe(e.to_string()))?;

        if let Some(sub) = target.subscribe {
            ws.send(tokio_tungstenite::tungstenite::Message::Text(
                sub.to_string(),
            ))
            .await
            .map_err(|e| P2pError::Probe(e.to_string()))?;
        }

        let mut samples = Vec::with_capacity(count);
        while samples.len() < count {
            let next = tokio::time::timeout(timeout, ws.next())
                .await
                .map_err(|_| P2pError::Probe(format!("ws recv from {} timed out", target.name)))?;
            let msg = match next {
                Some(Ok(m)) => m,
                Some(Err(e)) => return Err(P2pError::Probe(e.to_string())),
                None => break,
            };
            let text = match msg {
                tokio_tungstenite::tungstenite::Message::Text(t) => t,
                _ => continue,
            };
            let Ok(body) = serde_json::from_str::<WsEventBody>(&text) else {
                continue;
            };
            let server_time_ns = body
                .event_time_ms
                .map(|ms| ms * 1_000_000)
                .or_else(|| {
                    body.data
                        .and_then(|d| d.ts)
                        .and_then(|s| s.parse::<i64>().ok())
                        .map(|ms| ms * 1_000_000)
                });
            if let Some(server_time_ns) = server_time_ns {
                samples.push(WsSample { server_time_ns });
            }
        }
        Ok(samples)
    }
}
