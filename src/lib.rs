//! Affidavit - on-chain evidence assembly for dispute adjudication
//!
//! Given a transaction hash and a contract address, this library
//! fetches the receipt, classifies the event logs against known schema
//! families with a heuristic fallback, reconstructs relevant contract
//! state, optionally backfills recent history, and labels the overall
//! transaction pattern. The assembled report is memoized in a local
//! TTL cache.

pub mod backfill;
pub mod cache;
pub mod classify;
pub mod config;
pub mod engine;
pub mod error;
pub mod heuristic;
pub mod keys;
pub mod pattern;
pub mod retry;
pub mod rpc;
pub mod schema;
pub mod state;
pub mod types;

// Re-export the main types for convenience
pub use cache::ReportCache;
pub use classify::{ClassifiedEvent, EvidenceBundle, LogClassifier};
pub use config::EngineConfig;
pub use engine::{EvidenceEngine, EvidenceReport, ReceiptSummary};
pub use error::ProviderInitError;
pub use heuristic::{HeuristicPattern, UnknownEvent};
pub use pattern::{PatternAnalysis, PatternTag, TransactionType};
pub use rpc::{ChainClient, RpcClient};
pub use schema::{ContractFamily, EventKind, SchemaRegistry};
pub use state::ContractState;
pub use types::{RawLog, Receipt, Transaction};
