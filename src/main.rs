//! Arcade Ledger Client
//!
//! Entry point for the arcade-client CLI. Loads configuration from the
//! environment/.env file and runs one of the three operating modes:
//! `account` (address, balance, nonce), `read` (read-only contract call)
//! or `watch` (event log subscription).

use std::sync::Arc;

use alloy_primitives::{utils::format_ether, Address, U256};
use anyhow::{anyhow, bail, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use arcade_client::abi::{AbiFunction, AbiValue, ContractAbi};
use arcade_client::account::AccountResolver;
use arcade_client::config::Config;
use arcade_client::contract::{ContractBinding, ContractReader};
use arcade_client::events::{EventSubscriber, WatchOptions};
use arcade_client::transport::{HttpTransport, LedgerTransport};

#[derive(Parser)]
#[command(name = "arcade-client", about, version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the resolved account address, its balance and its nonce
    Account,
    /// Call a read-only contract method and print the decoded result
    Read {
        /// Method name from the ABI
        #[arg(default_value = "getTickets")]
        method: String,
        /// Arguments, parsed per the ABI input types
        args: Vec<String>,
    },
    /// Watch contract events and print each delivered batch
    Watch {
        /// Event name from the ABI
        #[arg(default_value = "GameTicketsMinted")]
        event: String,
        /// Starting block (defaults to FROM_BLOCK, else the current head)
        #[arg(long)]
        from_block: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    info!("Arcade Ledger Client v{}", env!("CARGO_PKG_VERSION"));
    info!("Endpoint: {}", config.api_url);

    let transport: Arc<dyn LedgerTransport> = Arc::new(HttpTransport::new(&config.api_url));

    match cli.command {
        Command::Account => run_account(&config, transport).await,
        Command::Read { method, args } => run_read(&config, transport, method, args).await,
        Command::Watch { event, from_block } => {
            run_watch(&config, transport, event, from_block).await
        }
    }
}

async fn run_account(config: &Config, transport: Arc<dyn LedgerTransport>) -> Result<()> {
    let address = config.credential.address();
    println!("{address}");

    let resolver = AccountResolver::new(transport);

    let balance = resolver.balance(address).await?;
    println!("{}", format_ether(balance));

    let nonce = resolver.transaction_count(address).await?;
    println!("{nonce}");

    Ok(())
}

async fn run_read(
    config: &Config,
    transport: Arc<dyn LedgerTransport>,
    method: String,
    args: Vec<String>,
) -> Result<()> {
    let Some(contract_address) = config.contract_address else {
        warn!("CONTRACT_ADDRESS is not set, skipping contract read");
        return Ok(());
    };

    let abi = ContractAbi::load(&config.abi_path)?;
    let binding = ContractBinding::new(contract_address, abi);
    let function = binding
        .abi
        .function(&method)
        .ok_or_else(|| anyhow!("method {method} not found in {}", config.abi_path.display()))?
        .clone();
    let call_args = parse_args(&function, &args, config.player_address)?;

    let reader = ContractReader::new(transport);
    let results = reader.call(&binding, &method, &call_args).await?;
    for value in &results {
        println!("{value}");
    }
    println!("contract: {contract_address}");

    Ok(())
}

async fn run_watch(
    config: &Config,
    transport: Arc<dyn LedgerTransport>,
    event: String,
    from_block: Option<u64>,
) -> Result<()> {
    let Some(contract_address) = config.contract_address else {
        warn!("CONTRACT_ADDRESS is not set, skipping event watch");
        return Ok(());
    };

    let abi = ContractAbi::load(&config.abi_path)?;
    let binding = ContractBinding::new(contract_address, abi);
    let options = WatchOptions {
        poll_interval: config.poll_interval,
        ..WatchOptions::default()
    };

    let (error_tx, error_rx) = tokio::sync::oneshot::channel();
    let subscriber = EventSubscriber::new(transport);
    let handle = subscriber
        .watch(
            binding,
            &event,
            from_block.or(config.from_block),
            options,
            Box::new(|batch| {
                for entry in batch {
                    println!("{entry}");
                }
            }),
            Box::new(move |err| {
                let _ = error_tx.send(err);
            }),
        )
        .await?;

    info!("Press Ctrl-C to stop");

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Shutting down");
            handle.join().await;
        }
        err = error_rx => {
            handle.join().await;
            if let Ok(err) = err {
                return Err(err.into());
            }
        }
    }

    Ok(())
}

/// Parse CLI arguments against the method's declared input types. With no
/// arguments given, a single-address method falls back to PLAYER_ADDRESS,
/// mirroring the example read.
fn parse_args(
    function: &AbiFunction,
    raw: &[String],
    player_address: Option<Address>,
) -> Result<Vec<AbiValue>> {
    if raw.is_empty() && function.inputs.len() == 1 && function.inputs[0].param_type == "address" {
        if let Some(player) = player_address {
            return Ok(vec![AbiValue::Address(player)]);
        }
    }
    if raw.len() != function.inputs.len() {
        bail!(
            "{} expects {} argument(s), got {}",
            function.name,
            function.inputs.len(),
            raw.len()
        );
    }
    function
        .inputs
        .iter()
        .zip(raw)
        .map(|(param, value)| parse_abi_arg(&param.param_type, value))
        .collect()
}

fn parse_abi_arg(param_type: &str, raw: &str) -> Result<AbiValue> {
    if param_type == "address" {
        Ok(AbiValue::Address(raw.parse()?))
    } else if param_type.starts_with("uint") || param_type.starts_with("int") {
        let value = match raw.strip_prefix("0x") {
            Some(hex_digits) => U256::from_str_radix(hex_digits, 16)?,
            None => U256::from_str_radix(raw, 10)?,
        };
        Ok(AbiValue::Uint(value))
    } else if param_type == "bool" {
        Ok(AbiValue::Bool(raw.parse()?))
    } else if param_type == "string" {
        Ok(AbiValue::String(raw.to_string()))
    } else if param_type == "bytes" {
        let bytes = hex::decode(raw.strip_prefix("0x").unwrap_or(raw))?;
        Ok(AbiValue::Bytes(bytes))
    } else {
        bail!("cannot parse a {param_type} argument from the command line")
    }
}
