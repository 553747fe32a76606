use serde::{Deserialize, Serialize};

use crate::error::ClientError;

/// JSON-RPC request sent to the ledger endpoint.
#[derive(Debug, Serialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub id: u64,
    pub method: String,
    pub params: serde_json::Value,
}

impl JsonRpcRequest {
    pub fn new(id: u64, method: &str, params: serde_json::Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            method: method.to_string(),
            params,
        }
    }
}

/// JSON-RPC response from the ledger endpoint.
#[derive(Debug, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    pub id: u64,
    pub result: Option<serde_json::Value>,
    pub error: Option<JsonRpcError>,
}

/// JSON-RPC error object.
#[derive(Debug, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
    pub data: Option<serde_json::Value>,
}

/// One log entry as returned by `eth_getLogs`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawLog {
    pub address: String,
    pub topics: Vec<String>,
    pub data: String,
    pub block_number: String,
    #[serde(default)]
    pub transaction_hash: Option<String>,
    #[serde(default)]
    pub transaction_index: Option<String>,
    pub log_index: String,
    #[serde(default)]
    pub removed: bool,
}

/// Parse a `0x`-prefixed hex quantity into a u64.
pub fn parse_quantity(method: &str, raw: &str) -> Result<u64, ClientError> {
    let digits = raw.strip_prefix("0x").unwrap_or(raw);
    if digits.is_empty() {
        return Err(ClientError::transport(method, "empty hex quantity"));
    }
    u64::from_str_radix(digits, 16)
        .map_err(|e| ClientError::transport(method, format!("invalid hex quantity {raw:?}: {e}")))
}

/// Format a block number as a `0x`-prefixed hex quantity.
pub fn to_quantity(value: u64) -> String {
    format!("0x{value:x}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_quantity() {
        assert_eq!(parse_quantity("eth_blockNumber", "0x2a").unwrap(), 42);
        assert_eq!(parse_quantity("eth_blockNumber", "0x0").unwrap(), 0);
        assert!(parse_quantity("eth_blockNumber", "0x").is_err());
        assert!(parse_quantity("eth_blockNumber", "0xzz").is_err());
    }

    #[test]
    fn test_to_quantity() {
        assert_eq!(to_quantity(0), "0x0");
        assert_eq!(to_quantity(22966000), "0x15e6ff0");
    }

    #[test]
    fn test_raw_log_deserializes_camel_case() {
        let raw: RawLog = serde_json::from_str(
            r#"{
                "address": "0x51d4bfac115f338fb33173df16615868fd483a9d",
                "topics": ["0xddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef"],
                "data": "0x",
                "blockNumber": "0x15e6ff0",
                "logIndex": "0x1",
                "transactionHash": "0xabc",
                "removed": false
            }"#,
        )
        .unwrap();
        assert_eq!(raw.block_number, "0x15e6ff0");
        assert_eq!(raw.log_index, "0x1");
        assert_eq!(raw.topics.len(), 1);
    }
}
