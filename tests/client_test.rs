// Integration tests for the arcade-client components, exercised against a
// scripted in-process transport and (for HttpTransport itself) a mock
// HTTP JSON-RPC endpoint.

use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use alloy_primitives::{Address, U256};
use async_trait::async_trait;
use httpmock::prelude::*;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

use arcade_client::abi::{compute_selector, AbiValue, ContractAbi};
use arcade_client::account::AccountResolver;
use arcade_client::contract::{ContractBinding, ContractReader};
use arcade_client::error::ClientError;
use arcade_client::events::{EventSubscriber, LogEntry, WatchOptions};
use arcade_client::transport::{HttpTransport, LedgerTransport};

const CONTRACT: &str = "0x51d4bfAc115F338fb33173df16615868Fd483A9d";
const PLAYER: &str = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266";

fn arcade_abi() -> ContractAbi {
    let path = Path::new(concat!(env!("CARGO_MANIFEST_DIR"), "/abi/arcade_casino.json"));
    ContractAbi::load(path).unwrap()
}

fn arcade_binding() -> ContractBinding {
    ContractBinding::new(CONTRACT.parse().unwrap(), arcade_abi())
}

/// Transport double: per-method queues of scripted responses, plus a call
/// log. Unscripted calls fail like a flaky endpoint so long-running watch
/// loops just keep retrying.
#[derive(Default)]
struct MockTransport {
    inner: Mutex<MockInner>,
}

#[derive(Default)]
struct MockInner {
    calls: Vec<(String, Value)>,
    scripts: HashMap<String, VecDeque<Result<Value, String>>>,
}

impl MockTransport {
    fn script_ok(&self, method: &str, response: Value) {
        self.script(method, Ok(response));
    }

    fn script_err(&self, method: &str, message: &str) {
        self.script(method, Err(message.to_string()));
    }

    fn script(&self, method: &str, response: Result<Value, String>) {
        self.inner
            .lock()
            .unwrap()
            .scripts
            .entry(method.to_string())
            .or_default()
            .push_back(response);
    }

    fn calls(&self, method: &str) -> Vec<Value> {
        self.inner
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|(m, _)| m == method)
            .map(|(_, p)| p.clone())
            .collect()
    }

    fn call_count(&self) -> usize {
        self.inner.lock().unwrap().calls.len()
    }
}

#[async_trait]
impl LedgerTransport for MockTransport {
    async fn query(&self, method: &str, params: Value) -> Result<Value, ClientError> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.push((method.to_string(), params));
        match inner.scripts.get_mut(method).and_then(|q| q.pop_front()) {
            Some(Ok(value)) => Ok(value),
            Some(Err(message)) => Err(ClientError::Transport {
                method: method.to_string(),
                message,
            }),
            None => Err(ClientError::Transport {
                method: method.to_string(),
                message: "no scripted response".to_string(),
            }),
        }
    }
}

fn quantity(value: u64) -> Value {
    json!(format!("0x{value:x}"))
}

fn minted_log(topic0: &str, block: u64, index: u64, count: u64) -> Value {
    let player_topic = format!("0x000000000000000000000000{}", &PLAYER[2..].to_lowercase());
    json!({
        "address": CONTRACT.to_lowercase(),
        "topics": [topic0, player_topic],
        "data": format!("0x{count:064x}"),
        "blockNumber": format!("0x{block:x}"),
        "logIndex": format!("0x{index:x}"),
        "transactionHash": "0x0101010101010101010101010101010101010101010101010101010101010101",
        "transactionIndex": "0x0",
        "removed": false,
    })
}

async fn wait_for<F: Fn() -> bool>(condition: F, what: &str) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("timed out waiting for {what}");
}

fn fast_watch_options() -> WatchOptions {
    WatchOptions {
        poll_interval: Duration::from_millis(10),
        max_retries: 50,
        initial_backoff: Duration::from_millis(5),
        max_backoff: Duration::from_millis(20),
    }
}

#[tokio::test]
async fn fresh_account_reads_zero_balance_and_nonce() {
    let transport = Arc::new(MockTransport::default());
    transport.script_ok("eth_getBalance", json!("0x0"));
    transport.script_ok("eth_getTransactionCount", json!("0x0"));

    let resolver = AccountResolver::new(transport.clone() as Arc<dyn LedgerTransport>);
    let address: Address = PLAYER.parse().unwrap();

    assert_eq!(resolver.balance(address).await.unwrap(), U256::ZERO);
    assert_eq!(resolver.transaction_count(address).await.unwrap(), 0);
}

#[tokio::test]
async fn read_decodes_uint_result() {
    let transport = Arc::new(MockTransport::default());
    transport.script_ok("eth_call", json!(format!("0x{:064x}", 42)));

    let binding = arcade_binding();
    let reader = ContractReader::new(transport.clone() as Arc<dyn LedgerTransport>);
    let player: Address = PLAYER.parse().unwrap();

    let results = reader
        .call(&binding, "getTickets", &[AbiValue::Address(player)])
        .await
        .unwrap();
    assert_eq!(results, vec![AbiValue::Uint(U256::from(42))]);

    // The request carried the selector for getTickets(address).
    let calls = transport.calls("eth_call");
    assert_eq!(calls.len(), 1);
    let data = calls[0][0]["data"].as_str().unwrap();
    let selector = hex::encode(compute_selector("getTickets(address)"));
    assert!(data.starts_with(&format!("0x{selector}")));
}

#[tokio::test]
async fn unknown_method_never_reaches_the_transport() {
    let transport = Arc::new(MockTransport::default());
    let reader = ContractReader::new(transport.clone() as Arc<dyn LedgerTransport>);

    let err = reader
        .call(&arcade_binding(), "changeX", &[])
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::AbiMismatch(_)));
    assert_eq!(transport.call_count(), 0);
}

#[tokio::test]
async fn mismatched_argument_types_never_reach_the_transport() {
    let transport = Arc::new(MockTransport::default());
    let reader = ContractReader::new(transport.clone() as Arc<dyn LedgerTransport>);

    let err = reader
        .call(&arcade_binding(), "getTickets", &[AbiValue::Uint(U256::from(1))])
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::AbiMismatch(_)));
    assert_eq!(transport.call_count(), 0);
}

#[tokio::test]
async fn missing_contract_address_is_a_config_error() {
    let err = ContractBinding::from_config(None, arcade_abi()).unwrap_err();
    assert!(matches!(err, ClientError::Config(_)));
}

#[tokio::test]
async fn watch_recovers_from_transient_failures_without_gaps() {
    let transport = Arc::new(MockTransport::default());
    let binding = arcade_binding();
    let topic0 = binding.abi.event("GameTicketsMinted").unwrap().topic.to_string();

    // Connectivity probe.
    transport.script_ok("eth_blockNumber", quantity(100));
    // First two polls fail before the head is even read.
    transport.script_err("eth_blockNumber", "connection reset");
    transport.script_err("eth_blockNumber", "connection reset");
    // Third poll succeeds and returns three entries across two blocks.
    transport.script_ok("eth_blockNumber", quantity(101));
    transport.script_ok(
        "eth_getLogs",
        json!([
            minted_log(&topic0, 100, 0, 1),
            minted_log(&topic0, 100, 1, 2),
            minted_log(&topic0, 101, 0, 3),
        ]),
    );
    // Fourth poll picks up one more block.
    transport.script_ok("eth_blockNumber", quantity(102));
    transport.script_ok("eth_getLogs", json!([minted_log(&topic0, 102, 0, 4)]));

    let received: Arc<Mutex<Vec<LogEntry>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = received.clone();

    let subscriber = EventSubscriber::new(transport.clone() as Arc<dyn LedgerTransport>);
    let handle = subscriber
        .watch(
            binding,
            "GameTicketsMinted",
            Some(100),
            fast_watch_options(),
            Box::new(move |batch| sink.lock().unwrap().extend(batch)),
            Box::new(|err| panic!("unexpected terminal error: {err}")),
        )
        .await
        .unwrap();

    wait_for(|| received.lock().unwrap().len() >= 4, "4 log entries").await;

    handle.cancel();
    tokio::time::sleep(Duration::from_millis(50)).await;

    let entries = received.lock().unwrap().clone();
    assert_eq!(entries.len(), 4, "no batch may arrive after cancel");

    // Delivery is ordered by (block, log index) with no duplicates.
    let positions: Vec<(u64, u64)> = entries
        .iter()
        .map(|e| (e.block_number, e.log_index))
        .collect();
    assert_eq!(positions, vec![(100, 0), (100, 1), (101, 0), (102, 0)]);

    // Decoded values came through in order.
    let counts: Vec<U256> = entries
        .iter()
        .map(|e| match &e.args[1].1 {
            AbiValue::Uint(v) => *v,
            other => panic!("unexpected count value {other:?}"),
        })
        .collect();
    let expected: Vec<U256> = (1..=4).map(U256::from).collect();
    assert_eq!(counts, expected);

    // Each block range was fetched exactly once: [100,101] then [102,102].
    let log_calls = transport.calls("eth_getLogs");
    assert_eq!(log_calls.len(), 2);
    assert_eq!(log_calls[0][0]["fromBlock"], json!("0x64"));
    assert_eq!(log_calls[0][0]["toBlock"], json!("0x65"));
    assert_eq!(log_calls[1][0]["fromBlock"], json!("0x66"));
    assert_eq!(log_calls[1][0]["toBlock"], json!("0x66"));
}

#[tokio::test]
async fn watch_cancel_is_idempotent() {
    let transport = Arc::new(MockTransport::default());
    transport.script_ok("eth_blockNumber", quantity(100));

    let subscriber = EventSubscriber::new(transport.clone() as Arc<dyn LedgerTransport>);
    let handle = subscriber
        .watch(
            arcade_binding(),
            "GameTicketsMinted",
            None,
            fast_watch_options(),
            Box::new(|_| {}),
            Box::new(|_| {}),
        )
        .await
        .unwrap();

    handle.cancel();
    handle.cancel();
    handle.join().await;
}

#[tokio::test]
async fn watch_rejects_unknown_event_before_any_request() {
    let transport = Arc::new(MockTransport::default());
    let subscriber = EventSubscriber::new(transport.clone() as Arc<dyn LedgerTransport>);

    let result = subscriber
        .watch(
            arcade_binding(),
            "NoSuchEvent",
            None,
            WatchOptions::default(),
            Box::new(|_| {}),
            Box::new(|_| {}),
        )
        .await;
    assert!(matches!(result.unwrap_err(), ClientError::AbiMismatch(_)));
    assert_eq!(transport.call_count(), 0);
}

#[tokio::test]
async fn watch_fails_synchronously_when_endpoint_is_unreachable() {
    let transport = Arc::new(MockTransport::default());
    transport.script_err("eth_blockNumber", "connection refused");

    let subscriber = EventSubscriber::new(transport.clone() as Arc<dyn LedgerTransport>);
    let result = subscriber
        .watch(
            arcade_binding(),
            "GameTicketsMinted",
            None,
            WatchOptions::default(),
            Box::new(|_| {}),
            Box::new(|_| {}),
        )
        .await;
    assert!(matches!(result.unwrap_err(), ClientError::Transport { .. }));
}

#[tokio::test]
async fn watch_terminates_after_exhausted_retries() {
    let transport = Arc::new(MockTransport::default());
    transport.script_ok("eth_blockNumber", quantity(100));
    // Every poll after the probe fails (nothing else is scripted).

    let options = WatchOptions {
        poll_interval: Duration::from_millis(10),
        max_retries: 2,
        initial_backoff: Duration::from_millis(5),
        max_backoff: Duration::from_millis(10),
    };

    let (error_tx, error_rx) = tokio::sync::oneshot::channel();
    let subscriber = EventSubscriber::new(transport.clone() as Arc<dyn LedgerTransport>);
    let handle = subscriber
        .watch(
            arcade_binding(),
            "GameTicketsMinted",
            Some(100),
            options,
            Box::new(|batch| panic!("unexpected batch: {batch:?}")),
            Box::new(move |err| {
                let _ = error_tx.send(err);
            }),
        )
        .await
        .unwrap();

    let err = tokio::time::timeout(Duration::from_secs(5), error_rx)
        .await
        .expect("terminal error not delivered")
        .unwrap();
    match err {
        ClientError::SubscriptionTerminated { attempts, .. } => assert_eq!(attempts, 3),
        other => panic!("expected SubscriptionTerminated, got {other}"),
    }

    wait_for(|| handle.is_finished(), "poll task to stop").await;
}

#[tokio::test]
async fn abi_artifact_loads_from_disk_in_combined_json_form() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ArcadeCasino.json");
    std::fs::write(
        &path,
        r#"{"contracts": {"contracts/ArcadeCasino.sol:ArcadeCasino": {
            "abi": [{"type": "function", "name": "getTickets",
                     "stateMutability": "view",
                     "inputs": [{"name": "player", "type": "address"}],
                     "outputs": [{"name": "", "type": "uint256"}]}],
            "bin": "6080604052"
        }}}"#,
    )
    .unwrap();

    let abi = ContractAbi::load(&path).unwrap();
    assert!(abi.function("getTickets").is_some());
}

#[tokio::test]
async fn http_transport_returns_raw_results() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST).path("/rpc");
            then.status(200)
                .json_body(json!({"jsonrpc": "2.0", "id": 1, "result": "0x2a"}));
        })
        .await;

    let transport = HttpTransport::new(&server.url("/rpc"));
    let result = transport.query("eth_blockNumber", json!([])).await.unwrap();
    assert_eq!(result, json!("0x2a"));
    mock.assert_async().await;
}

#[tokio::test]
async fn http_transport_surfaces_revert_reason() {
    // Error("not owner"), ABI-encoded.
    let mut payload = hex::decode("08c379a0").unwrap();
    payload.extend_from_slice(&{
        let mut w = [0u8; 32];
        w[31] = 32;
        w
    });
    payload.extend_from_slice(&{
        let mut w = [0u8; 32];
        w[31] = 9;
        w
    });
    let mut reason = b"not owner".to_vec();
    reason.resize(32, 0);
    payload.extend_from_slice(&reason);

    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/rpc");
            then.status(200).json_body(json!({
                "jsonrpc": "2.0",
                "id": 1,
                "error": {
                    "code": 3,
                    "message": "execution reverted",
                    "data": format!("0x{}", hex::encode(&payload)),
                }
            }));
        })
        .await;

    let transport = HttpTransport::new(&server.url("/rpc"));
    let err = transport.query("eth_call", json!([])).await.unwrap_err();
    match err {
        ClientError::Revert { reason, data } => {
            assert_eq!(reason, "not owner");
            assert!(data.unwrap().starts_with("0x08c379a0"));
        }
        other => panic!("expected Revert, got {other}"),
    }
}

#[tokio::test]
async fn http_transport_maps_http_failures_to_transport_errors() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/rpc");
            then.status(503).body("overloaded");
        })
        .await;

    let transport = HttpTransport::new(&server.url("/rpc"));
    let err = transport.query("eth_blockNumber", json!([])).await.unwrap_err();
    match err {
        ClientError::Transport { method, message } => {
            assert_eq!(method, "eth_blockNumber");
            assert!(message.contains("503"));
        }
        other => panic!("expected Transport, got {other}"),
    }
}
