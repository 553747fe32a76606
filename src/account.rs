use std::fmt;
use std::sync::Arc;

use alloy_primitives::{Address, U256};
use k256::ecdsa::SigningKey;
use k256::elliptic_curve::sec1::ToEncodedPoint;
use sha3::{Digest, Keccak256};
use tracing::debug;

use crate::error::ClientError;
use crate::transport::types::parse_quantity;
use crate::transport::LedgerTransport;

/// A secp256k1 private key identifying the local account.
///
/// The key material is never printed, logged or serialized; `Debug` is
/// redacted and the type deliberately implements neither `Display` nor
/// `Serialize`.
#[derive(Clone)]
pub struct Credential {
    key: SigningKey,
}

impl Credential {
    /// Parse a 32-byte hex private key, with or without the 0x prefix.
    pub fn from_hex(raw: &str) -> Result<Self, ClientError> {
        let digits = raw.trim().strip_prefix("0x").unwrap_or_else(|| raw.trim());
        let bytes = hex::decode(digits)
            .map_err(|e| ClientError::Config(format!("private key is not valid hex: {e}")))?;
        let key = SigningKey::from_slice(&bytes).map_err(|e| {
            ClientError::Config(format!("private key is not a valid secp256k1 key: {e}"))
        })?;
        Ok(Self { key })
    }

    /// Derive the account address: keccak256 of the uncompressed public
    /// key, last 20 bytes. Deterministic, no I/O.
    pub fn address(&self) -> Address {
        let point = self.key.verifying_key().to_encoded_point(false);
        // Skip the 0x04 uncompressed-point marker byte.
        let hash = Keccak256::digest(&point.as_bytes()[1..]);
        Address::from_slice(&hash[12..])
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

/// Read-only account state queries against the ledger endpoint.
pub struct AccountResolver {
    transport: Arc<dyn LedgerTransport>,
}

impl AccountResolver {
    pub fn new(transport: Arc<dyn LedgerTransport>) -> Self {
        Self { transport }
    }

    /// Get the balance of an address in wei. Unknown addresses read as
    /// zero on the node side, never as an error.
    pub async fn balance(&self, address: Address) -> Result<U256, ClientError> {
        let method = "eth_getBalance";
        let params = serde_json::json!([address.to_string(), "latest"]);
        let result = self.transport.query(method, params).await?;
        let raw = result
            .as_str()
            .ok_or_else(|| ClientError::transport(method, "result is not a hex string"))?;
        let balance = U256::from_str_radix(raw.strip_prefix("0x").unwrap_or(raw), 16)
            .map_err(|e| ClientError::transport(method, format!("invalid balance {raw:?}: {e}")))?;
        debug!("Balance of {}: {} wei", address, balance);
        Ok(balance)
    }

    /// Get the transaction count (nonce) of an address.
    pub async fn transaction_count(&self, address: Address) -> Result<u64, ClientError> {
        let method = "eth_getTransactionCount";
        let params = serde_json::json!([address.to_string(), "latest"]);
        let result = self.transport.query(method, params).await?;
        let raw = result
            .as_str()
            .ok_or_else(|| ClientError::transport(method, "result is not a hex string"))?;
        let nonce = parse_quantity(method, raw)?;
        debug!("Nonce of {}: {}", address, nonce);
        Ok(nonce)
    }
}
