pub mod http;
pub mod types;

pub use http::HttpTransport;

use async_trait::async_trait;

use crate::error::ClientError;
use self::types::parse_quantity;

/// Abstract JSON-RPC capability all components read the ledger through.
///
/// The production implementation is [`HttpTransport`]; tests substitute a
/// scripted mock. Implementations must be safe for concurrent use.
#[async_trait]
pub trait LedgerTransport: Send + Sync {
    /// Issue a single JSON-RPC request and return the raw `result` value.
    async fn query(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<serde_json::Value, ClientError>;
}

/// Fetch the current chain head via `eth_blockNumber`.
pub async fn block_number(transport: &dyn LedgerTransport) -> Result<u64, ClientError> {
    let method = "eth_blockNumber";
    let result = transport.query(method, serde_json::json!([])).await?;
    let raw = result
        .as_str()
        .ok_or_else(|| ClientError::transport(method, "result is not a hex string"))?;
    parse_quantity(method, raw)
}
