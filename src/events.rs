use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::{Address, B256};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::abi::{decode_event, AbiEvent, AbiValue};
use crate::contract::ContractBinding;
use crate::error::ClientError;
use crate::transport::types::{parse_quantity, to_quantity, RawLog};
use crate::transport::{block_number, LedgerTransport};

/// One decoded event occurrence.
#[derive(Debug, Clone)]
pub struct LogEntry {
    /// Emitting contract.
    pub address: Address,
    /// Event name as declared in the ABI.
    pub event: String,
    /// Decoded arguments in declaration order.
    pub args: Vec<(String, AbiValue)>,
    /// Block height the event was emitted at.
    pub block_number: u64,
    /// Position within the block.
    pub log_index: u64,
    pub transaction_hash: Option<String>,
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} @ block {} log {}: ",
            self.event, self.block_number, self.log_index
        )?;
        for (i, (name, value)) in self.args.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{name}={value}")?;
        }
        Ok(())
    }
}

/// Tuning knobs for a watch.
#[derive(Debug, Clone)]
pub struct WatchOptions {
    /// Cadence between successful polls.
    pub poll_interval: Duration,
    /// Consecutive failed polls tolerated before the watch terminates.
    pub max_retries: u32,
    /// First retry delay; doubled per failure up to `max_backoff`.
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            max_retries: 5,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(60),
        }
    }
}

/// Callback receiving each ordered batch of decoded entries.
pub type BatchHandler = Box<dyn FnMut(Vec<LogEntry>) + Send>;

/// Callback receiving the single terminal error, if the watch dies.
pub type ErrorHandler = Box<dyn FnOnce(ClientError) + Send>;

/// An active watch. Owns the polling task; canceling stops delivery and
/// releases the task. Dropping the handle cancels too.
#[derive(Debug)]
pub struct SubscriptionHandle {
    shutdown: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
}

impl SubscriptionHandle {
    /// Stop delivery. Idempotent: calling this any number of times is
    /// safe, and no batch is delivered after the first call takes effect.
    /// An in-flight poll is abandoned rather than waited out.
    pub fn cancel(&self) {
        // Errors only mean the poll task is already gone.
        let _ = self.shutdown.send(true);
    }

    /// Cancel and wait for the polling task to wind down.
    pub async fn join(mut self) {
        self.cancel();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }

    /// True once the polling task has ended (canceled or terminated).
    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map(|t| t.is_finished()).unwrap_or(true)
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        let _ = self.shutdown.send(true);
    }
}

/// Polling subscription to a contract's event logs.
pub struct EventSubscriber {
    transport: Arc<dyn LedgerTransport>,
}

impl EventSubscriber {
    pub fn new(transport: Arc<dyn LedgerTransport>) -> Self {
        Self { transport }
    }

    /// Watch `event_name` emitted by the bound contract, starting at
    /// `from_block` (inclusive; current head when `None`).
    ///
    /// Matching entries are delivered to `on_batch` in non-decreasing
    /// (block, log index) order, each entry exactly once, from a single
    /// task per handle. Transient poll failures are retried with
    /// exponential backoff; once `max_retries` consecutive polls have
    /// failed, the terminal error is handed to `on_error` and the watch
    /// ends without auto-restart.
    ///
    /// Fails synchronously with `AbiMismatch` for an unknown event name
    /// and with `Transport` when the endpoint cannot be reached at all.
    pub async fn watch(
        &self,
        binding: ContractBinding,
        event_name: &str,
        from_block: Option<u64>,
        options: WatchOptions,
        on_batch: BatchHandler,
        on_error: ErrorHandler,
    ) -> Result<SubscriptionHandle, ClientError> {
        let event = binding.abi.event(event_name).cloned().ok_or_else(|| {
            ClientError::AbiMismatch(format!(
                "event {event_name} not found in ABI for contract {}",
                binding.address
            ))
        })?;

        // Initial probe: establishes the endpoint is reachable and gives
        // the default starting position.
        let head = block_number(&*self.transport).await?;
        let start = from_block.unwrap_or(head);

        info!(
            "Watching {} on {} from block {}",
            event.name, binding.address, start
        );

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(poll_loop(
            self.transport.clone(),
            binding,
            event,
            start,
            options,
            on_batch,
            on_error,
            shutdown_rx,
        ));

        Ok(SubscriptionHandle {
            shutdown: shutdown_tx,
            task: Some(task),
        })
    }
}

#[allow(clippy::too_many_arguments)]
async fn poll_loop(
    transport: Arc<dyn LedgerTransport>,
    binding: ContractBinding,
    event: AbiEvent,
    mut next_block: u64,
    options: WatchOptions,
    mut on_batch: BatchHandler,
    on_error: ErrorHandler,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut on_error = Some(on_error);
    let mut failures: u32 = 0;
    let mut backoff = options.initial_backoff;

    loop {
        let outcome = tokio::select! {
            _ = shutdown.changed() => break,
            outcome = poll_once(&*transport, &binding, &event, next_block) => outcome,
        };

        match outcome {
            Ok(Some((entries, polled_to))) => {
                failures = 0;
                backoff = options.initial_backoff;
                next_block = polled_to + 1;
                if !entries.is_empty() {
                    info!(
                        "Delivering {} {} entr(ies) up to block {}",
                        entries.len(),
                        event.name,
                        polled_to
                    );
                    on_batch(entries);
                }
            }
            // Head has not reached the start of our range yet.
            Ok(None) => {
                failures = 0;
                backoff = options.initial_backoff;
            }
            Err(err) => {
                failures += 1;
                if failures > options.max_retries {
                    error!(
                        "Watch on {} giving up after {} failed poll(s): {}",
                        binding.address, failures, err
                    );
                    if let Some(callback) = on_error.take() {
                        callback(ClientError::SubscriptionTerminated {
                            attempts: failures,
                            message: err.to_string(),
                        });
                    }
                    break;
                }
                warn!(
                    "Poll failed (attempt {}/{}), retrying in {:?}: {}",
                    failures, options.max_retries, backoff, err
                );
            }
        }

        let delay = if failures == 0 {
            options.poll_interval
        } else {
            let current = backoff;
            backoff = (backoff * 2).min(options.max_backoff);
            current
        };
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = tokio::time::sleep(delay) => {}
        }
    }

    debug!("Watch on {} stopped", binding.address);
}

/// One poll: read the head, fetch logs for [from, head] and decode them.
/// Returns None when the head has not reached `from` yet.
async fn poll_once(
    transport: &dyn LedgerTransport,
    binding: &ContractBinding,
    event: &AbiEvent,
    from: u64,
) -> Result<Option<(Vec<LogEntry>, u64)>, ClientError> {
    let head = block_number(transport).await?;
    if head < from {
        return Ok(None);
    }

    let method = "eth_getLogs";
    let filter = serde_json::json!({
        "address": binding.address.to_string(),
        "topics": [event.topic.to_string()],
        "fromBlock": to_quantity(from),
        "toBlock": to_quantity(head),
    });
    let result = transport.query(method, serde_json::json!([filter])).await?;
    let raw_logs: Vec<RawLog> = serde_json::from_value(result)
        .map_err(|e| ClientError::transport(method, format!("malformed log array: {e}")))?;

    let mut entries = Vec::with_capacity(raw_logs.len());
    for raw in &raw_logs {
        if raw.removed {
            continue;
        }
        match decode_raw_log(event, raw) {
            Ok(entry) => entries.push(entry),
            Err(e) => debug!("Skipping undecodable log: {e}"),
        }
    }
    entries.sort_by_key(|e| (e.block_number, e.log_index));

    Ok(Some((entries, head)))
}

fn decode_raw_log(event: &AbiEvent, raw: &RawLog) -> Result<LogEntry, ClientError> {
    let method = "eth_getLogs";
    let address: Address = raw
        .address
        .parse()
        .map_err(|e| ClientError::transport(method, format!("invalid log address: {e}")))?;
    let topics: Vec<B256> = raw
        .topics
        .iter()
        .map(|t| {
            t.parse()
                .map_err(|e| ClientError::transport(method, format!("invalid log topic: {e}")))
        })
        .collect::<Result<_, _>>()?;
    let data = hex::decode(raw.data.strip_prefix("0x").unwrap_or(&raw.data))
        .map_err(|e| ClientError::transport(method, format!("invalid log data: {e}")))?;

    let args = decode_event(event, &topics, &data)?;

    Ok(LogEntry {
        address,
        event: event.name.clone(),
        args,
        block_number: parse_quantity(method, &raw.block_number)?,
        log_index: parse_quantity(method, &raw.log_index)?,
        transaction_hash: raw.transaction_hash.clone(),
    })
}
