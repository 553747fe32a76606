//! Arcade Ledger Client
//!
//! A small Ethereum JSON-RPC client for the ArcadeCasino contract: it
//! derives the local account from a private key and reads its balance and
//! nonce, calls read-only contract methods through a JSON ABI binding,
//! and watches contract event logs with a resilient polling subscription.
//!
//! # Architecture
//!
//! ```text
//! CLI (account / read / watch)
//!     |
//!     v
//! AccountResolver   ContractReader   EventSubscriber
//!     \                 |                /
//!      \                v               /
//!       `------> LedgerTransport <-----'
//!                      |
//!                      | eth_* JSON-RPC over HTTP
//!                      v
//!             Ledger endpoint (API_URL)
//! ```
//!
//! # Modules
//!
//! - `config` - Environment and configuration management
//! - `error` - Error taxonomy shared by all components
//! - `transport` - `LedgerTransport` trait and the HTTP JSON-RPC client
//! - `abi` - JSON ABI model, call encoding, result/log decoding
//! - `account` - Credential handling and account state reads
//! - `contract` - Contract binding and read-only method calls
//! - `events` - Polling event subscription with backoff and cancellation

pub mod abi;
pub mod account;
pub mod config;
pub mod contract;
pub mod error;
pub mod events;
pub mod transport;
