use thiserror::Error;

/// Errors surfaced by the client components.
///
/// `Config`, `Transport`, `AbiMismatch` and `Revert` are returned
/// synchronously from the failing operation. `SubscriptionTerminated` is
/// only ever delivered through a watch handle's error callback, after the
/// poll loop has exhausted its retries.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Missing or malformed configuration input.
    #[error("configuration error: {0}")]
    Config(String),

    /// Network or endpoint failure while issuing an RPC request.
    #[error("transport error during {method}: {message}")]
    Transport { method: String, message: String },

    /// Method or event absent from the ABI, or argument shape mismatch.
    #[error("ABI mismatch: {0}")]
    AbiMismatch(String),

    /// Remote execution explicitly rejected the call.
    #[error("execution reverted: {reason}")]
    Revert {
        reason: String,
        /// Raw revert payload as returned by the node, if any.
        data: Option<String>,
    },

    /// Watch retries exhausted. Terminal for the subscription handle.
    #[error("subscription terminated after {attempts} failed polls: {message}")]
    SubscriptionTerminated { attempts: u32, message: String },
}

impl ClientError {
    /// Build a transport error for `method` from any displayable cause.
    pub fn transport(method: &str, cause: impl std::fmt::Display) -> Self {
        ClientError::Transport {
            method: method.to_string(),
            message: cause.to_string(),
        }
    }
}
