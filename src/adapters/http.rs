use crate::domain::ports::RpcTransport;
use crate::utils::error::{MarketError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

#[derive(Debug, Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    #[serde(default)]
    result: serde_json::Value,
    #[serde(default)]
    error: Option<JsonRpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcErrorObject {
    code: i64,
    message: String,
}

/// JSON-RPC over HTTP POST, the way geth / ganache expose their API.
pub struct HttpTransport {
    client: Client,
    endpoint: String,
    next_id: AtomicU64,
}

impl HttpTransport {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            next_id: AtomicU64::new(1),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl RpcTransport for HttpTransport {
    async fn request(&self, method: &str, params: serde_json::Value) -> Result<serde_json::Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = JsonRpcRequest {
            jsonrpc: "2.0",
            id,
            method,
            params,
        };

        tracing::debug!("RPC request #{} {} -> {}", id, method, self.endpoint);
        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await?;

        // 有些節點在 4xx/5xx 也會帶 JSON-RPC error，優先保留 code/message
        let status_error = response.error_for_status_ref().err();
        let raw = response.bytes().await?;
        let payload: JsonRpcResponse = match serde_json::from_slice(&raw) {
            Ok(payload) => payload,
            Err(e) => return Err(status_error.map_or_else(|| e.into(), MarketError::from)),
        };

        if let Some(error) = payload.error {
            tracing::debug!("RPC #{} failed: {} {}", id, error.code, error.message);
            return Err(MarketError::Rpc {
                code: error.code,
                message: error.message,
            });
        }
        if let Some(status_error) = status_error {
            return Err(status_error.into());
        }

        tracing::debug!("RPC response #{}: {}", id, payload.result);
        Ok(payload.result)
    }
}
