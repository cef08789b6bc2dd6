//! Periodic exchange-latency measurement: clock-skew estimation, HTTP
//! round-trip sampling and WebSocket message-arrival sampling, folded into
//! one [`ExchangeLatency`] reading per minute.

use std::time::Duration;

use crate::{
    config::ProbeTuning,
    exchange::{ExchangeClient, ExchangeLatency, HttpTarget, SecondaryExchangeLatency, WsTarget},
    message::now_nanos,
    state::FabricState,
};

const PRIMARY_HTTP_TARGETS: [HttpTarget; 4] = [
    HttpTarget {
        name: "spot",
        ping_url: "https://api.primary-exchange.example/api/v3/ping",
        time_url: "https://api.primary-exchange.example/api/v3/time",
    },
    HttpTarget {
        name: "future",
        ping_url: "https://fapi.primary-exchange.example/fapi/v1/ping",
        time_url: "https://fapi.primary-exchange.example/fapi/v1/time",
    },
    HttpTarget {
        name: "delivery",
        ping_url: "https://dapi.primary-exchange.example/dapi/v1/ping",
        time_url: "https://dapi.primary-exchange.example/dapi/v1/time",
    },
    HttpTarget {
        name: "portfolio",
        ping_url: "https://papi.primary-exchange.example/papi/v1/ping",
        time_url: "https://papi.primary-exchange.example/papi/v1/time",
    },
];

const PRIMARY_WS_TARGETS: [WsTarget; 3] = [
    WsTarget {
        name: "spot",
        url: "wss://stream.primary-exchange.example/stream?streams=btcusdt@depth@100ms",
        subscribe: None,
    },
    WsTarget {
        name: "future",
        url: "wss://fstream.primary-exchange.example/stream?streams=btcusdt@depth@100ms",
        subscribe: None,
    },
    WsTarget {
        name: "delivery",
        url: "wss://dstream.primary-exchange.example/stream?streams=btcusd_perp@depth@100ms",
        subscribe: None,
    },
];

const SECONDARY_HTTP_TARGET: HttpTarget = HttpTarget {
    name: "secondary",
    ping_url: "https://www.secondary-exchange.example/api/v5/public/time",
    time_url: "https://www.secondary-exchange.example/api/v5/public/time",
};

const SECONDARY_WS_TARGET: WsTarget = WsTarget {
    name: "secondary",
    url: "wss://ws.secondary-exchange.example/public",
    subscribe: Some(
        r#"{"op":"subscribe","args":[{"channel":"bbo-tbt","instId":"BTC-USDT"}]}"#,
    ),
};

/// Average of mid-request-minus-server-clock deltas over up to
/// `tuning.skew_sample_count` samples, applying the optional 2x-running-mean
/// outlier guard when `tuning.enable_outlier_guard` is set.
async fn estimate_skew_ns(client: &dyn ExchangeClient, target: &HttpTarget, tuning: &ProbeTuning) -> i64 {
    let mut samples = Vec::with_capacity(tuning.skew_sample_count);
    let mut running_mean: i64 = 0;

    for _ in 0..tuning.skew_sample_count {
        let start = now_nanos();
        let Ok(sample) = client.http_get(target.time_url, tuning.time_sync_timeout).await else {
            continue;
        };
        let end = now_nanos();
        let Some(server_time_ns) = sample.server_time_ns else {
            continue;
        };
        let mid = (start + end) / 2;
        let skew = mid - server_time_ns;

        if tuning.enable_outlier_guard
            && running_mean != 0
            && skew.unsigned_abs() > 2 * running_mean.unsigned_abs()
        {
            continue;
        }

        samples.push(skew);
        running_mean = samples.iter().sum::<i64>() / samples.len() as i64;
    }

    if samples.is_empty() {
        0
    } else {
        samples.iter().sum::<i64>() / samples.len() as i64
    }
}

/// Average round-trip latency across up to `count` successful samples
/// (status in 100..=599); unreachable or timed-out attempts are skipped.
async fn sample_http_latency(
    client: &dyn ExchangeClient,
    target: &HttpTarget,
    count: usize,
    timeout: Duration,
) -> Option<i64> {
    let mut total = Duration::ZERO;
    let mut ok = 0usize;
    for _ in 0..count {
        let Ok(sample) = client.http_get(target.ping_url, timeout).await else {
            continue;
        };
        if !(100..=599).contains(&sample.status) {
            continue;
        }
        total += sample.rtt;
        ok += 1;
    }
    if ok == 0 {
        None
    } else {
        Some((total.as_nanos() / ok as u128) as i64)
    }
}

/// Average skew-corrected arrival latency (`now - (event_time + skew)`)
/// across up to `count` inbound payloads.
async fn sample_ws_latency(
    client: &dyn ExchangeClient,
    target: &WsTarget,
    count: usize,
    timeout: Duration,
    skew_ns: i64,
) -> Option<i64> {
    let samples = client.ws_sample(target, count, timeout).await.ok()?;
    if samples.is_empty() {
        return None;
    }
    let total: i64 = samples
        .iter()
        .map(|s| now_nanos() - (s.server_time_ns + skew_ns))
        .sum();
    Some(total / samples.len() as i64)
}

/// Run one full measurement tick against the primary exchange and, if
/// `secondary` is true, the secondary one. Replaces [`FabricState`]'s
/// readings only for the fields that produced at least one sample.
pub async fn run_tick(client: &dyn ExchangeClient, state: &FabricState, tuning: &ProbeTuning, secondary: bool) {
    let skew_ns = estimate_skew_ns(client, &PRIMARY_HTTP_TARGETS[0], tuning).await;

    tokio::time::sleep(tuning.http_warmup).await;

    let mut reading = state.snapshot_local_exchange().await;
    if let Some(v) = sample_http_latency(client, &PRIMARY_HTTP_TARGETS[0], tuning.http_sample_count, tuning.time_sync_timeout).await {
        reading.http_spot_latency_ns = v;
    }
    if let Some(v) = sample_http_latency(client, &PRIMARY_HTTP_TARGETS[1], tuning.http_sample_count, tuning.time_sync_timeout).await {
        reading.http_future_latency_ns = v;
    }
    if let Some(v) = sample_http_latency(client, &PRIMARY_HTTP_TARGETS[2], tuning.http_sample_count, tuning.time_sync_timeout).await {
        reading.http_delivery_latency_ns = v;
    }
    if let Some(v) = sample_http_latency(client, &PRIMARY_HTTP_TARGETS[3], tuning.http_sample_count, tuning.time_sync_timeout).await {
        reading.http_portfolio_latency_ns = v;
    }
    if let Some(v) = sample_ws_latency(client, &PRIMARY_WS_TARGETS[0], tuning.ws_sample_count, tuning.time_sync_timeout, skew_ns).await {
        reading.ws_spot_latency_ns = v;
    }
    if let Some(v) = sample_ws_latency(client, &PRIMARY_WS_TARGETS[1], tuning.ws_sample_count, tuning.time_sync_timeout, skew_ns).await {
        reading.ws_future_latency_ns = v;
    }
    if let Some(v) = sample_ws_latency(client, &PRIMARY_WS_TARGETS[2], tuning.ws_sample_count, tuning.time_sync_timeout, skew_ns).await {
        reading.ws_delivery_latency_ns = v;
    }
    state.replace_local_exchange(reading).await;

    if secondary {
        let secondary_skew = estimate_skew_ns(client, &SECONDARY_HTTP_TARGET, tuning).await;
        let http = sample_http_latency(client, &SECONDARY_HTTP_TARGET, tuning.http_sample_count.min(5), tuning.time_sync_timeout).await;
        let ws = sample_ws_latency(client, &SECONDARY_WS_TARGET, tuning.ws_sample_count.min(5), tuning.time_sync_timeout, secondary_skew).await;
        if http.is_some() || ws.is_some() {
            let mut current = (*state.local_exchange_latency_secondary.read().await).unwrap_or_default();
            if let Some(v) = http {
                current.http_latency_ns = v;
            }
            if let Some(v) = ws {
                current.ws_latency_ns = v;
            }
            state.replace_local_exchange_secondary(current).await;
        }
    }
}

/// Run [`run_tick`] every minute until the process exits.
pub async fn run_loop(client: std::sync::Arc<dyn ExchangeClient>, state: std::sync::Arc<FabricState>, tuning: ProbeTuning, secondary: bool) {
    let mut interval = tokio::time::interval(Duration::from_secs(60));
    loop {
        interval.tick().await;
        run_tick(client.as_ref(), &state, &tuning, secondary).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use crate::error::P2pError;
    use crate::exchange::{HttpSample, WsSample};

    struct FakeClient {
        server_time_ns: i64,
        rtt: Duration,
    }

    #[async_trait]
    impl ExchangeClient for FakeClient {
        async fn http_get(&self, _url: &str, _timeout: Duration) -> Result<HttpSample, P2pError> {
            Ok(HttpSample {
                status: 200,
                rtt: self.rtt,
                server_time_ns: Some(self.server_time_ns),
            })
        }

        async fn ws_sample(&self, _target: &WsTarget, count: usize, _timeout: Duration) -> Result<Vec<WsSample>, P2pError> {
            Ok((0..count)
                .map(|_| WsSample {
                    server_time_ns: self.server_time_ns,
                })
                .collect())
        }
    }

    #[tokio::test]
    async fn skew_is_mid_minus_server_time() {
        let client = FakeClient {
            server_time_ns: 0,
            rtt: Duration::from_millis(10),
        };
        let tuning = ProbeTuning {
            skew_sample_count: 1,
            ..ProbeTuning::default()
        };
        let skew = estimate_skew_ns(&client, &PRIMARY_HTTP_TARGETS[0], &tuning).await;
        assert!(skew >= 0);
    }

    #[tokio::test]
    async fn http_latency_averages_successful_samples() {
        let client = FakeClient {
            server_time_ns: 1,
            rtt: Duration::from_millis(20),
        };
        let latency = sample_http_latency(&client, &PRIMARY_HTTP_TARGETS[0], 5, Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(latency, Duration::from_millis(20).as_nanos() as i64);
    }

    #[tokio::test]
    async fn zero_success_tick_leaves_prior_reading() {
        struct DeadClient;
        #[async_trait]
        impl ExchangeClient for DeadClient {
            async fn http_get(&self, _url: &str, _timeout: Duration) -> Result<HttpSample, P2pError> {
                Err(P2pError::Probe("unreachable".into()))
            }
            async fn ws_sample(&self, _t: &WsTarget, _c: usize, _to: Duration) -> Result<Vec<WsSample>, P2pError> {
                Err(P2pError::Probe("unreachable".into()))
            }
        }

        let state = FabricState::default();
        let mut prior = ExchangeLatency::default();
        prior.http_spot_latency_ns = 4242;
        state.replace_local_exchange(prior).await;

        let tuning = ProbeTuning {
            http_warmup: Duration::ZERO,
            skew_sample_count: 1,
            http_sample_count: 1,
            ws_sample_count: 1,
            ..ProbeTuning::default()
        };
        run_tick(&DeadClient, &state, &tuning, false).await;

        assert_eq!(state.snapshot_local_exchange().await.http_spot_latency_ns, 4242);
    }
}
