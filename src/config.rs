use std::env;
use std::path::PathBuf;
use std::time::Duration;

use alloy_primitives::Address;

use crate::account::Credential;
use crate::error::ClientError;

/// Client configuration loaded from environment variables.
///
/// Loaded once at startup and passed to each component; optional values
/// stay `None` so dependent operations can be skipped instead of failing
/// with an invalid target.
#[derive(Debug, Clone)]
pub struct Config {
    /// JSON-RPC endpoint URL
    pub api_url: String,
    /// Account credential (key material is redacted in Debug output)
    pub credential: Credential,
    /// Target contract, if deployed/configured
    pub contract_address: Option<Address>,
    /// Default argument for example reads
    pub player_address: Option<Address>,
    /// ABI artifact path
    pub abi_path: PathBuf,
    /// Default starting block for event watches
    pub from_block: Option<u64>,
    /// Cadence between event polls
    pub poll_interval: Duration,
}

impl Config {
    /// Load configuration from environment variables.
    /// Call dotenvy::dotenv() before calling this.
    pub fn from_env() -> Result<Self, ClientError> {
        let api_url = env::var("API_URL").map_err(|_| {
            ClientError::Config("API_URL must be set in environment or .env file".to_string())
        })?;

        let raw_key = env::var("PRIVATE_KEY").map_err(|_| {
            ClientError::Config("PRIVATE_KEY must be set in environment or .env file".to_string())
        })?;
        let credential = Credential::from_hex(&raw_key)?;

        let contract_address = optional_address("CONTRACT_ADDRESS")?;
        let player_address = optional_address("PLAYER_ADDRESS")?;

        let abi_path = env::var("ABI_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("abi/arcade_casino.json"));

        let from_block = match env::var("FROM_BLOCK") {
            Ok(raw) => Some(raw.parse::<u64>().map_err(|e| {
                ClientError::Config(format!("FROM_BLOCK must be a block number: {e}"))
            })?),
            Err(_) => None,
        };

        let poll_interval_ms: u64 = env::var("POLL_INTERVAL_MS")
            .unwrap_or_else(|_| "5000".to_string())
            .parse()
            .map_err(|e| {
                ClientError::Config(format!("POLL_INTERVAL_MS must be milliseconds: {e}"))
            })?;

        Ok(Config {
            api_url,
            credential,
            contract_address,
            player_address,
            abi_path,
            from_block,
            poll_interval: Duration::from_millis(poll_interval_ms),
        })
    }
}

/// Read an optional address variable; empty values count as unset.
fn optional_address(var: &str) -> Result<Option<Address>, ClientError> {
    match env::var(var) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| ClientError::Config(format!("{var} is not a valid address: {e}"))),
        _ => Ok(None),
    }
}
