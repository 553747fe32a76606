use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, error};

use super::types::{JsonRpcError, JsonRpcRequest, JsonRpcResponse};
use super::LedgerTransport;
use crate::abi::decode_revert_reason;
use crate::error::ClientError;

/// Per-request timeout so no read blocks indefinitely.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP JSON-RPC transport for an Ethereum-compatible endpoint.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    http_client: Client,
    rpc_url: String,
    next_id: std::sync::Arc<AtomicU64>,
}

impl HttpTransport {
    /// Create a new transport for the given endpoint URL.
    pub fn new(rpc_url: &str) -> Self {
        Self {
            http_client: Client::new(),
            rpc_url: rpc_url.to_string(),
            next_id: std::sync::Arc::new(AtomicU64::new(1)),
        }
    }

    /// The endpoint URL this transport talks to.
    pub fn rpc_url(&self) -> &str {
        &self.rpc_url
    }
}

#[async_trait]
impl LedgerTransport for HttpTransport {
    async fn query(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<serde_json::Value, ClientError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = JsonRpcRequest::new(id, method, params);

        debug!("Sending JSON-RPC request: method={}", method);

        let response = self
            .http_client
            .post(&self.rpc_url)
            .timeout(REQUEST_TIMEOUT)
            .json(&request)
            .send()
            .await
            .map_err(|e| ClientError::transport(method, format!("failed to send request: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("JSON-RPC endpoint returned HTTP {}: {}", status, body);
            return Err(ClientError::transport(
                method,
                format!("HTTP {status}: {body}"),
            ));
        }

        let rpc_response: JsonRpcResponse = response
            .json()
            .await
            .map_err(|e| ClientError::transport(method, format!("failed to parse response: {e}")))?;

        if let Some(err) = rpc_response.error {
            error!(
                "JSON-RPC error from {}: code={}, message={}",
                method, err.code, err.message
            );
            return Err(classify_rpc_error(method, err));
        }

        rpc_response
            .result
            .ok_or_else(|| ClientError::transport(method, "no result in response"))
    }
}

/// Map a JSON-RPC error object onto the client taxonomy.
///
/// Nodes report rejected execution either with error code 3 (EIP-1474
/// execution error) or with a "revert" message; everything else is an
/// endpoint failure.
fn classify_rpc_error(method: &str, err: JsonRpcError) -> ClientError {
    let data = err.data.as_ref().and_then(|d| d.as_str()).map(String::from);
    let is_revert = err.code == 3 || err.message.to_lowercase().contains("revert");

    if is_revert {
        let reason = data
            .as_deref()
            .and_then(decode_hex_revert_reason)
            .unwrap_or_else(|| err.message.clone());
        ClientError::Revert { reason, data }
    } else {
        ClientError::transport(method, format!("RPC error {}: {}", err.code, err.message))
    }
}

/// Decode an `Error(string)` revert payload from its 0x-hex form.
fn decode_hex_revert_reason(data: &str) -> Option<String> {
    let bytes = hex::decode(data.strip_prefix("0x").unwrap_or(data)).ok()?;
    decode_revert_reason(&bytes)
}
