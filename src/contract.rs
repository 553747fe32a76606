use std::sync::Arc;

use alloy_primitives::Address;
use tracing::{debug, info};

use crate::abi::{decode_params, encode_call, AbiValue, ContractAbi};
use crate::error::ClientError;
use crate::transport::LedgerTransport;

/// An ABI bound to a deployed contract address. Immutable once built.
#[derive(Debug, Clone)]
pub struct ContractBinding {
    pub address: Address,
    pub abi: ContractAbi,
}

impl ContractBinding {
    pub fn new(address: Address, abi: ContractAbi) -> Self {
        Self { address, abi }
    }

    /// Build a binding from an optional configured address. A missing
    /// address is a configuration error, caught before any request is
    /// issued with an invalid target.
    pub fn from_config(address: Option<Address>, abi: ContractAbi) -> Result<Self, ClientError> {
        let address = address.ok_or_else(|| {
            ClientError::Config("CONTRACT_ADDRESS is not set; cannot bind contract".to_string())
        })?;
        Ok(Self::new(address, abi))
    }
}

/// Read-only contract method invocation over a shared transport.
pub struct ContractReader {
    transport: Arc<dyn LedgerTransport>,
}

impl ContractReader {
    pub fn new(transport: Arc<dyn LedgerTransport>) -> Self {
        Self { transport }
    }

    /// Call a read-only method and decode the result per the declared
    /// return types.
    ///
    /// The method name and argument shape are validated against the ABI
    /// before any network request; an unknown method or mismatched
    /// arguments never reach the endpoint.
    pub async fn call(
        &self,
        binding: &ContractBinding,
        method_name: &str,
        args: &[AbiValue],
    ) -> Result<Vec<AbiValue>, ClientError> {
        let function = binding.abi.function(method_name).ok_or_else(|| {
            ClientError::AbiMismatch(format!(
                "method {method_name} not found in ABI for contract {}",
                binding.address
            ))
        })?;
        let call_data = encode_call(function, args)?;

        info!("eth_call: {} on {}", method_name, binding.address);

        let method = "eth_call";
        let params = serde_json::json!([
            {
                "to": binding.address.to_string(),
                "data": format!("0x{}", hex::encode(&call_data)),
            },
            "latest"
        ]);
        let result = self.transport.query(method, params).await?;
        let raw = result
            .as_str()
            .ok_or_else(|| ClientError::transport(method, "result is not a hex string"))?;
        let return_data = hex::decode(raw.strip_prefix("0x").unwrap_or(raw))
            .map_err(|e| ClientError::transport(method, format!("invalid return data: {e}")))?;

        debug!(
            "eth_call returned {} byte(s) for {}",
            return_data.len(),
            method_name
        );

        decode_params(&return_data, &function.outputs)
    }
}
