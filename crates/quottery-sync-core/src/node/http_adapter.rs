use std::num::NonZeroU32;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use reqwest::header;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::error::{CoreError, NodeError};
use crate::types::TickInfo;

use super::connection::{parse_connection, Endpoint};
use super::{NodeTransport, QueryType, QUOTTERY_CONTRACT_INDEX};

const QUERY_PATH: &str = "/v1/querySmartContract";
const TICK_INFO_PATH: &str = "/v1/tick-info";

type DirectRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct QueryRequest {
    pub(super) contract_index: u32,
    pub(super) input_type: u16,
    pub(super) input_size: usize,
    pub(super) request_data: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryResponse {
    response_data: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TickInfoResponse {
    tick_info: TickInfo,
}

/// Contract queries over a node's HTTP RPC gateway. Payloads travel
/// base64-encoded inside a small JSON envelope.
pub struct HttpRpcTransport {
    client: reqwest::Client,
    base: String,
    limiter: Option<DirectRateLimiter>,
    next_id: AtomicU64,
}

impl HttpRpcTransport {
    /// `base` must be an `http://` or `https://` URL. If
    /// `requests_per_second` is set, every outbound HTTP request waits for
    /// the limiter first.
    pub fn new(base: &str, requests_per_second: Option<u32>) -> Result<Self, CoreError> {
        let Endpoint::Http { base, .. } = parse_connection(base)? else {
            return Err(CoreError::Config(format!(
                "HTTP transport needs an http(s) URL, got `{base}`"
            )));
        };

        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(30))
            .pool_max_idle_per_host(8)
            .tcp_nodelay(true)
            .build()
            .map_err(NodeError::Transport)?;

        let limiter = match requests_per_second {
            None => None,
            Some(limit) => {
                let limit = NonZeroU32::new(limit).ok_or_else(|| {
                    CoreError::Config("requests_per_second must be at least 1".to_owned())
                })?;
                Some(RateLimiter::direct(Quota::per_second(limit)))
            }
        };

        Ok(Self {
            client,
            base,
            limiter,
            next_id: AtomicU64::new(1),
        })
    }

    async fn wait_for_rate_limit(&self) {
        if let Some(limiter) = &self.limiter {
            limiter.until_ready().await;
        }
    }

    /// Sends `request` and returns the body of a 2xx response.
    async fn send(&self, id: u64, request: reqwest::RequestBuilder) -> Result<String, NodeError> {
        self.wait_for_rate_limit().await;
        let response = request
            .header(header::ACCEPT, "application/json")
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;
        debug!(rpc.id = id, %status, body_len = body.len(), "rpc response");
        trace!(rpc.id = id, body = %body, "rpc response body");

        if !status.is_success() {
            return Err(NodeError::HttpStatus(status.as_u16()));
        }
        Ok(body)
    }
}

#[async_trait]
impl NodeTransport for HttpRpcTransport {
    async fn query(&self, query: QueryType, input: &[u8]) -> Result<Vec<u8>, NodeError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        debug!(
            rpc.id = id,
            rpc.input_type = query.input_type(),
            rpc.input_size = input.len(),
            "rpc call {query}"
        );
        let envelope = QueryRequest {
            contract_index: QUOTTERY_CONTRACT_INDEX,
            input_type: query.input_type(),
            input_size: input.len(),
            request_data: BASE64.encode(input),
        };
        let request = self
            .client
            .post(format!("{}{QUERY_PATH}", self.base))
            .json(&envelope);
        let body = self.send(id, request).await?;

        let decoded: QueryResponse = serde_json::from_str(&body).map_err(|e| {
            NodeError::InvalidResponse(format!("decode {query} envelope: {e}; body={body}"))
        })?;
        BASE64
            .decode(decoded.response_data.as_bytes())
            .map_err(|e| NodeError::InvalidResponse(format!("responseData is not base64: {e}")))
    }

    async fn tick_info(&self) -> Result<TickInfo, NodeError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        debug!(rpc.id = id, "rpc call tick-info");
        let request = self.client.get(format!("{}{TICK_INFO_PATH}", self.base));
        let body = self.send(id, request).await?;

        let decoded: TickInfoResponse = serde_json::from_str(&body).map_err(|e| {
            NodeError::InvalidResponse(format!("decode tick-info response: {e}; body={body}"))
        })?;
        Ok(decoded.tick_info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_uses_camel_case_fields() {
        let envelope = QueryRequest {
            contract_index: QUOTTERY_CONTRACT_INDEX,
            input_type: QueryType::BetInfo.input_type(),
            input_size: 4,
            request_data: BASE64.encode(7u32.to_le_bytes()),
        };
        let json = serde_json::to_value(&envelope).expect("envelope must serialize");
        assert_eq!(
            json,
            serde_json::json!({
                "contractIndex": 2,
                "inputType": 2,
                "inputSize": 4,
                "requestData": "BwAAAA==",
            })
        );
    }

    #[test]
    fn tick_info_envelope_parses() {
        let parsed: TickInfoResponse = serde_json::from_str(
            r#"{"tickInfo":{"tick":15000123,"duration":2,"epoch":140,"initialTick":15000000}}"#,
        )
        .expect("must parse");
        assert_eq!(parsed.tick_info.tick, 15_000_123);
        assert_eq!(parsed.tick_info.tick_duration, 2);
        assert_eq!(parsed.tick_info.initial_tick, 15_000_000);
    }

    #[test]
    fn new_rejects_tcp_url() {
        assert!(HttpRpcTransport::new("tcp://127.0.0.1:21841", None).is_err());
    }

    #[test]
    fn new_rejects_zero_rate() {
        let err = HttpRpcTransport::new("http://127.0.0.1:8000", Some(0))
            .err()
            .expect("zero rate must be rejected");
        assert!(err.to_string().contains("requests_per_second"));
    }
}
