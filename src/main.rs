//! evidencectl - on-chain evidence assembly CLI
//!
//! Fetches a transaction, classifies its event logs, reconstructs
//! contract state, and prints the assembled evidence report as JSON.

use affidavit::cache::{ReportCache, DEFAULT_TTL_SECS};
use affidavit::config::{parse_address, parse_tx_hash, EngineConfig};
use affidavit::engine::EvidenceEngine;
use affidavit::rpc::RpcClient;
use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::{info, Level};

/// Assemble an on-chain evidence bundle for a transaction
#[derive(Parser)]
#[command(name = "evidencectl")]
#[command(about = "Assemble an on-chain evidence bundle for a dispute transaction")]
struct Args {
    /// RPC endpoint URL (e.g., https://eth.llamarpc.com)
    #[arg(short, long, default_value = "http://127.0.0.1:8545")]
    rpc_url: String,

    /// Path to the report cache directory
    #[arg(short, long, default_value = "./evidence_cache")]
    cache_path: PathBuf,

    /// Skip the report cache entirely
    #[arg(long)]
    no_cache: bool,

    /// Cache time-to-live in seconds
    #[arg(long, default_value_t = DEFAULT_TTL_SECS)]
    ttl: u64,

    /// Transaction hash to assemble evidence for
    tx_hash: String,

    /// Contract address the dispute concerns
    contract: String,

    /// Optional target address for balance and ownership reads
    target: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .init();

    let args = Args::parse();

    let tx_hash = parse_tx_hash(&args.tx_hash).context("Invalid transaction hash")?;
    let contract = parse_address(&args.contract).context("Invalid contract address")?;
    let target = args
        .target
        .as_deref()
        .map(parse_address)
        .transpose()
        .context("Invalid target address")?;

    info!("RPC URL: {}", args.rpc_url);
    info!("Transaction: {:?}", tx_hash);
    info!("Contract: {:?}", contract);

    // Connect with bounded retry; failure here is fatal.
    let rpc = RpcClient::connect(args.rpc_url).await?;

    let cache = if args.no_cache {
        ReportCache::disabled()
    } else {
        ReportCache::open(&args.cache_path)
    };

    let config = EngineConfig {
        cache_ttl_secs: args.ttl,
        ..Default::default()
    };
    let engine = EvidenceEngine::new(rpc, cache, config);

    match engine.assemble(tx_hash, contract, target).await? {
        Some(report) => {
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
        None => {
            eprintln!("Transaction not found: {}", args.tx_hash);
            std::process::exit(1);
        }
    }
}
