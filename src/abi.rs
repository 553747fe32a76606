use std::fmt;
use std::path::Path;

use alloy_primitives::{Address, B256, U256};
use serde::{Deserialize, Serialize};
use sha3::{Digest, Keccak256};
use tracing::debug;

use crate::error::ClientError;

/// ABI function/event parameter definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AbiParam {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type")]
    pub param_type: String,
    #[serde(default)]
    pub indexed: bool,
    #[serde(default)]
    pub components: Option<Vec<AbiParam>>,
}

/// One entry of a JSON ABI array.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AbiEntry {
    #[serde(rename = "type")]
    pub entry_type: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub inputs: Vec<AbiParam>,
    #[serde(default)]
    pub outputs: Vec<AbiParam>,
    #[serde(default, rename = "stateMutability")]
    pub state_mutability: Option<String>,
}

/// A callable function resolved from the ABI.
#[derive(Debug, Clone)]
pub struct AbiFunction {
    pub name: String,
    pub selector: [u8; 4],
    pub inputs: Vec<AbiParam>,
    pub outputs: Vec<AbiParam>,
    pub state_mutability: String,
}

/// An event resolved from the ABI, with its precomputed topic0.
#[derive(Debug, Clone)]
pub struct AbiEvent {
    pub name: String,
    pub topic: B256,
    pub inputs: Vec<AbiParam>,
}

/// Parsed contract interface: functions and events by name.
#[derive(Debug, Clone, Default)]
pub struct ContractAbi {
    functions: Vec<AbiFunction>,
    events: Vec<AbiEvent>,
}

impl ContractAbi {
    /// Resolve functions and events from raw ABI entries.
    pub fn from_entries(entries: &[AbiEntry]) -> Self {
        let mut functions = Vec::new();
        let mut events = Vec::new();

        for entry in entries {
            let Some(name) = &entry.name else { continue };
            match entry.entry_type.as_str() {
                "function" => {
                    let signature = build_signature(name, &entry.inputs);
                    let selector = compute_selector(&signature);
                    debug!(
                        "Resolved function: {} selector=0x{}",
                        signature,
                        hex::encode(selector)
                    );
                    functions.push(AbiFunction {
                        name: name.clone(),
                        selector,
                        inputs: entry.inputs.clone(),
                        outputs: entry.outputs.clone(),
                        state_mutability: entry
                            .state_mutability
                            .clone()
                            .unwrap_or_else(|| "nonpayable".to_string()),
                    });
                }
                "event" => {
                    let signature = build_signature(name, &entry.inputs);
                    let topic = event_topic(&signature);
                    debug!("Resolved event: {} topic0={}", signature, topic);
                    events.push(AbiEvent {
                        name: name.clone(),
                        topic,
                        inputs: entry.inputs.clone(),
                    });
                }
                _ => {}
            }
        }

        Self { functions, events }
    }

    /// Parse an ABI artifact: either a plain JSON ABI array, or a compiler
    /// artifact object carrying it (`{"abi": ...}` or solc combined-json
    /// `{"contracts": {"<file>:<name>": {"abi": ...}}}`).
    pub fn from_json_str(raw: &str) -> Result<Self, ClientError> {
        let value: serde_json::Value = serde_json::from_str(raw)
            .map_err(|e| ClientError::Config(format!("ABI artifact is not valid JSON: {e}")))?;
        let entries_value = extract_abi_value(value)?;
        let entries: Vec<AbiEntry> = serde_json::from_value(entries_value)
            .map_err(|e| ClientError::Config(format!("ABI entries are malformed: {e}")))?;
        Ok(Self::from_entries(&entries))
    }

    /// Load an ABI artifact from disk.
    pub fn load(path: &Path) -> Result<Self, ClientError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            ClientError::Config(format!("cannot read ABI artifact {}: {e}", path.display()))
        })?;
        Self::from_json_str(&raw)
    }

    /// Look up a function by name.
    pub fn function(&self, name: &str) -> Option<&AbiFunction> {
        self.functions.iter().find(|f| f.name == name)
    }

    /// Look up an event by name.
    pub fn event(&self, name: &str) -> Option<&AbiEvent> {
        self.events.iter().find(|e| e.name == name)
    }
}

/// Pull the ABI entry array out of whatever artifact shape was supplied.
fn extract_abi_value(value: serde_json::Value) -> Result<serde_json::Value, ClientError> {
    match value {
        serde_json::Value::Array(_) => Ok(value),
        serde_json::Value::Object(mut obj) => {
            if let Some(abi) = obj.remove("abi") {
                return unwrap_abi_field(abi);
            }
            if let Some(serde_json::Value::Object(contracts)) = obj.remove("contracts") {
                for (_, contract) in contracts {
                    if let serde_json::Value::Object(mut fields) = contract {
                        if let Some(abi) = fields.remove("abi") {
                            return unwrap_abi_field(abi);
                        }
                    }
                }
            }
            Err(ClientError::Config(
                "ABI artifact object has no \"abi\" field".to_string(),
            ))
        }
        _ => Err(ClientError::Config(
            "ABI artifact must be an array or an object".to_string(),
        )),
    }
}

/// Older solc versions emit the abi field as a JSON-encoded string.
fn unwrap_abi_field(abi: serde_json::Value) -> Result<serde_json::Value, ClientError> {
    match abi {
        serde_json::Value::String(s) => serde_json::from_str(&s)
            .map_err(|e| ClientError::Config(format!("embedded ABI string is malformed: {e}"))),
        other => Ok(other),
    }
}

/// Compute the 4-byte function selector from a canonical signature.
/// e.g., "getTickets(address)" -> first 4 bytes of keccak256
pub fn compute_selector(signature: &str) -> [u8; 4] {
    let hash = Keccak256::digest(signature.as_bytes());
    let mut selector = [0u8; 4];
    selector.copy_from_slice(&hash[..4]);
    selector
}

/// Compute the 32-byte event topic (topic0) from a canonical signature.
/// e.g., "Transfer(address,address,uint256)" -> keccak256 hash
pub fn event_topic(signature: &str) -> B256 {
    let hash = Keccak256::digest(signature.as_bytes());
    B256::from_slice(&hash)
}

/// Build the canonical signature from a name and its inputs.
/// e.g., name "getTickets", inputs [address] -> "getTickets(address)"
pub fn build_signature(name: &str, inputs: &[AbiParam]) -> String {
    let param_types: Vec<String> = inputs
        .iter()
        .map(|p| canonical_type(&p.param_type, &p.components))
        .collect();
    format!("{}({})", name, param_types.join(","))
}

/// Get the canonical ABI type string, expanding tuples.
fn canonical_type(param_type: &str, components: &Option<Vec<AbiParam>>) -> String {
    if param_type == "tuple" || param_type.starts_with("tuple") {
        if let Some(comps) = components {
            let inner: Vec<String> = comps
                .iter()
                .map(|c| canonical_type(&c.param_type, &c.components))
                .collect();
            let suffix = if param_type.ends_with("[]") { "[]" } else { "" };
            format!("({}){}", inner.join(","), suffix)
        } else {
            param_type.to_string()
        }
    } else {
        param_type.to_string()
    }
}

/// A decoded ABI value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbiValue {
    Address(Address),
    Uint(U256),
    Bool(bool),
    FixedBytes(B256),
    Bytes(Vec<u8>),
    String(String),
}

impl AbiValue {
    fn kind(&self) -> &'static str {
        match self {
            AbiValue::Address(_) => "address",
            AbiValue::Uint(_) => "uint",
            AbiValue::Bool(_) => "bool",
            AbiValue::FixedBytes(_) => "fixed bytes",
            AbiValue::Bytes(_) => "bytes",
            AbiValue::String(_) => "string",
        }
    }
}

impl fmt::Display for AbiValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbiValue::Address(a) => write!(f, "{a}"),
            AbiValue::Uint(v) => write!(f, "{v}"),
            AbiValue::Bool(b) => write!(f, "{b}"),
            AbiValue::FixedBytes(b) => write!(f, "{b}"),
            AbiValue::Bytes(b) => write!(f, "0x{}", hex::encode(b)),
            AbiValue::String(s) => write!(f, "{s}"),
        }
    }
}

/// True for types encoded out-of-line with an offset pointer.
fn is_dynamic_type(param_type: &str) -> bool {
    param_type == "bytes" || param_type == "string" || param_type.ends_with("[]")
}

/// Encode a function call: selector followed by ABI-encoded arguments.
///
/// Argument arity and types are validated against the declared inputs
/// before anything is encoded, so a mismatch never reaches the wire.
pub fn encode_call(function: &AbiFunction, args: &[AbiValue]) -> Result<Vec<u8>, ClientError> {
    if args.len() != function.inputs.len() {
        return Err(ClientError::AbiMismatch(format!(
            "{} expects {} argument(s), got {}",
            function.name,
            function.inputs.len(),
            args.len()
        )));
    }

    let head_size = function.inputs.len() * 32;
    let mut head = Vec::with_capacity(head_size);
    let mut tail = Vec::new();

    for (param, value) in function.inputs.iter().zip(args) {
        check_value_type(&function.name, param, value)?;
        if is_dynamic_type(&param.param_type) {
            head.extend_from_slice(&usize_word(head_size + tail.len()));
            let payload = match value {
                AbiValue::Bytes(b) => b.clone(),
                AbiValue::String(s) => s.as_bytes().to_vec(),
                other => {
                    return Err(ClientError::AbiMismatch(format!(
                        "{}: parameter {:?} is declared {} but a {} value was supplied",
                        function.name,
                        param.name,
                        param.param_type,
                        other.kind()
                    )))
                }
            };
            tail.extend_from_slice(&usize_word(payload.len()));
            tail.extend_from_slice(&payload);
            let padding = (32 - (payload.len() % 32)) % 32;
            tail.extend(std::iter::repeat(0u8).take(padding));
        } else {
            head.extend_from_slice(&encode_word(value));
        }
    }

    let mut out = function.selector.to_vec();
    out.extend(head);
    out.extend(tail);
    Ok(out)
}

/// Validate that a supplied value matches the declared parameter type.
fn check_value_type(
    function: &str,
    param: &AbiParam,
    value: &AbiValue,
) -> Result<(), ClientError> {
    let t = param.param_type.as_str();
    if t.ends_with("[]") || t.starts_with("tuple") {
        return Err(ClientError::AbiMismatch(format!(
            "{function}: unsupported parameter type {t}"
        )));
    }
    let matches = match value {
        AbiValue::Address(_) => t == "address",
        AbiValue::Uint(_) => t.starts_with("uint") || t.starts_with("int"),
        AbiValue::Bool(_) => t == "bool",
        AbiValue::FixedBytes(_) => t.starts_with("bytes") && t != "bytes",
        AbiValue::Bytes(_) => t == "bytes",
        AbiValue::String(_) => t == "string",
    };
    if matches {
        Ok(())
    } else {
        Err(ClientError::AbiMismatch(format!(
            "{function}: parameter {:?} is declared {t} but a {} value was supplied",
            param.name,
            value.kind()
        )))
    }
}

/// Encode a static value into one 32-byte word.
fn encode_word(value: &AbiValue) -> [u8; 32] {
    let mut word = [0u8; 32];
    match value {
        AbiValue::Address(a) => word[12..].copy_from_slice(a.as_slice()),
        AbiValue::Uint(v) => word = v.to_be_bytes::<32>(),
        AbiValue::Bool(b) => word[31] = *b as u8,
        AbiValue::FixedBytes(b) => word.copy_from_slice(b.as_slice()),
        // Dynamic values never reach here; callers branch on the type first.
        AbiValue::Bytes(_) | AbiValue::String(_) => {}
    }
    word
}

fn usize_word(value: usize) -> [u8; 32] {
    let mut word = [0u8; 32];
    word[24..].copy_from_slice(&(value as u64).to_be_bytes());
    word
}

/// Decode ABI-encoded data against a list of declared parameters.
pub fn decode_params(data: &[u8], params: &[AbiParam]) -> Result<Vec<AbiValue>, ClientError> {
    let mut values = Vec::with_capacity(params.len());

    for (i, param) in params.iter().enumerate() {
        let head = i * 32;
        let word = data.get(head..head + 32).ok_or_else(|| {
            ClientError::AbiMismatch(format!(
                "data too short for parameter {i} ({})",
                param.param_type
            ))
        })?;
        if is_dynamic_type(&param.param_type) {
            let offset = word_to_usize(word)?;
            values.push(decode_dynamic(data, offset, &param.param_type)?);
        } else {
            values.push(decode_word(&param.param_type, word)?);
        }
    }

    Ok(values)
}

/// Decode one static 32-byte word into a typed value.
fn decode_word(param_type: &str, word: &[u8]) -> Result<AbiValue, ClientError> {
    if word.len() != 32 {
        return Err(ClientError::AbiMismatch(format!(
            "expected a 32-byte word for {param_type}, got {} bytes",
            word.len()
        )));
    }
    if param_type == "address" {
        Ok(AbiValue::Address(Address::from_slice(&word[12..])))
    } else if param_type == "bool" {
        Ok(AbiValue::Bool(word[31] != 0))
    } else if param_type.starts_with("uint") || param_type.starts_with("int") {
        Ok(AbiValue::Uint(U256::from_be_slice(word)))
    } else if param_type.starts_with("bytes") && param_type != "bytes" {
        Ok(AbiValue::FixedBytes(B256::from_slice(word)))
    } else {
        Err(ClientError::AbiMismatch(format!(
            "unsupported parameter type {param_type}"
        )))
    }
}

/// Decode a dynamic value (bytes/string) from its out-of-line location.
fn decode_dynamic(data: &[u8], offset: usize, param_type: &str) -> Result<AbiValue, ClientError> {
    let length_word = data.get(offset..offset + 32).ok_or_else(|| {
        ClientError::AbiMismatch(format!("dynamic {param_type} offset out of bounds"))
    })?;
    let length = word_to_usize(length_word)?;
    let start = offset + 32;
    let payload = data.get(start..start + length).ok_or_else(|| {
        ClientError::AbiMismatch(format!("dynamic {param_type} data out of bounds"))
    })?;

    match param_type {
        "bytes" => Ok(AbiValue::Bytes(payload.to_vec())),
        "string" => Ok(AbiValue::String(
            String::from_utf8_lossy(payload).into_owned(),
        )),
        _ => Err(ClientError::AbiMismatch(format!(
            "unsupported parameter type {param_type}"
        ))),
    }
}

/// Read a 256-bit big-endian integer as usize (upper bytes must be zero).
fn word_to_usize(word: &[u8]) -> Result<usize, ClientError> {
    if word.len() < 32 || word[..24].iter().any(|b| *b != 0) {
        return Err(ClientError::AbiMismatch(
            "offset or length word out of range".to_string(),
        ));
    }
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&word[24..32]);
    Ok(u64::from_be_bytes(bytes) as usize)
}

/// Decode an event occurrence into (name, value) pairs in declaration order.
///
/// Indexed parameters are recovered from topics[1..]; the rest are decoded
/// from the data section. A dynamic indexed parameter is only present as
/// its keccak hash, so it is surfaced as the raw 32-byte topic.
pub fn decode_event(
    event: &AbiEvent,
    topics: &[B256],
    data: &[u8],
) -> Result<Vec<(String, AbiValue)>, ClientError> {
    let non_indexed: Vec<AbiParam> = event
        .inputs
        .iter()
        .filter(|p| !p.indexed)
        .cloned()
        .collect();
    let mut data_values = decode_params(data, &non_indexed)?.into_iter();
    let mut topic_iter = topics.iter().skip(1);

    let mut args = Vec::with_capacity(event.inputs.len());
    for param in &event.inputs {
        let value = if param.indexed {
            let topic = topic_iter.next().ok_or_else(|| {
                ClientError::AbiMismatch(format!(
                    "{}: missing topic for indexed parameter {:?}",
                    event.name, param.name
                ))
            })?;
            if is_dynamic_type(&param.param_type) {
                AbiValue::FixedBytes(*topic)
            } else {
                decode_word(&param.param_type, topic.as_slice())?
            }
        } else {
            data_values.next().ok_or_else(|| {
                ClientError::AbiMismatch(format!(
                    "{}: missing data value for parameter {:?}",
                    event.name, param.name
                ))
            })?
        };
        args.push((param.name.clone(), value));
    }

    Ok(args)
}

/// Selector of the standard `Error(string)` revert payload.
const ERROR_STRING_SELECTOR: [u8; 4] = [0x08, 0xc3, 0x79, 0xa0];

/// Decode the human-readable reason out of an `Error(string)` revert
/// payload, if that is what the bytes are.
pub fn decode_revert_reason(data: &[u8]) -> Option<String> {
    if data.len() < 4 || data[..4] != ERROR_STRING_SELECTOR {
        return None;
    }
    let reason_param = [AbiParam {
        name: "reason".to_string(),
        param_type: "string".to_string(),
        indexed: false,
        components: None,
    }];
    match decode_params(&data[4..], &reason_param).ok()?.pop()? {
        AbiValue::String(s) => Some(s),
        _ => None,
    }
}
