//! Evidence assembly orchestration
//!
//! Drives one evidence-assembly run end to end: cache probe, concurrent
//! receipt and transaction fetch, log classification, state
//! reconstruction, conditional historical backfill, pattern analysis,
//! and cache store. Each run is an independent unit of work; the only
//! shared state is the provider connection and the cache backend.

use crate::backfill::backfill_transfers;
use crate::cache::ReportCache;
use crate::classify::{EvidenceBundle, LogClassifier};
use crate::config::EngineConfig;
use crate::keys::encode_report_key;
use crate::pattern::{self, PatternAnalysis};
use crate::rpc::ChainClient;
use crate::state::{read_contract_state, ContractState};
use crate::types::Receipt;
use alloy_primitives::{Address, B256};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Receipt metadata carried into the report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReceiptSummary {
    pub success: bool,
    pub block_number: Option<u64>,
    /// Gas used, decimal string.
    pub gas_used: String,
    /// Effective gas price, decimal string.
    pub effective_gas_price: Option<String>,
}

impl ReceiptSummary {
    fn from_receipt(receipt: &Receipt) -> Self {
        Self {
            success: receipt.is_success(),
            block_number: receipt.block_number,
            gas_used: receipt.gas_used.to_string(),
            effective_gas_price: receipt.effective_gas_price.map(|p| p.to_string()),
        }
    }
}

/// The fully assembled result of one evidence-assembly run.
///
/// This is the shape handed to downstream consumers and stored in the
/// cache; its serde field names are the stability contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceReport {
    pub tx_hash: B256,
    pub contract: Address,
    pub target: Option<Address>,
    pub receipt: ReceiptSummary,
    pub bundle: EvidenceBundle,
    pub state: ContractState,
    pub pattern: PatternAnalysis,
}

/// Per-process evidence-assembly engine.
///
/// Holds the long-lived provider connection and cache handle;
/// everything else is created fresh per run.
pub struct EvidenceEngine<C: ChainClient> {
    chain: C,
    cache: ReportCache,
    classifier: LogClassifier,
    config: EngineConfig,
}

impl<C: ChainClient> EvidenceEngine<C> {
    pub fn new(chain: C, cache: ReportCache, config: EngineConfig) -> Self {
        Self {
            chain,
            cache,
            classifier: LogClassifier::new(),
            config,
        }
    }

    /// Assemble the evidence bundle for one transaction.
    ///
    /// Returns `Ok(None)` when the transaction is unknown to the node
    /// after the fetch retry budget; that is a normal outcome, not an
    /// error. Backfill runs exactly when the transaction's own logs
    /// produced zero transfers, and at most once.
    pub async fn assemble(
        &self,
        tx_hash: B256,
        contract: Address,
        target: Option<Address>,
    ) -> Result<Option<EvidenceReport>> {
        let key = encode_report_key(tx_hash, contract, target);
        if let Some(report) = self.cache.get(&key) {
            debug!("Cache hit for tx {:?}", tx_hash);
            return Ok(Some(report));
        }

        // The receipt and transaction fetches are independent; issue
        // them concurrently and await both before proceeding.
        let (receipt, tx) = tokio::join!(
            self.chain.get_receipt(tx_hash),
            self.chain.get_transaction(tx_hash)
        );
        let receipt = receipt.context("Receipt fetch failed")?;
        let tx = tx.context("Transaction fetch failed")?;

        let Some(receipt) = receipt else {
            info!("Transaction {:?} not found", tx_hash);
            return Ok(None);
        };

        let mut bundle = self.classifier.classify(&receipt.logs);
        info!(
            "Classified {} log(s): {} transfer(s), {} failure(s), {} partial, {} unknown",
            receipt.logs.len(),
            bundle.transfers.len(),
            bundle.failures.len(),
            bundle.partial_transfers.len(),
            bundle.unknown_events.len()
        );

        let state = read_contract_state(&self.chain, contract, target, &bundle).await;
        bundle.contract_info = state.contract_info.clone();

        if bundle.transfers.is_empty() {
            self.run_backfill(contract, &mut bundle).await?;
        }

        let pattern = pattern::analyze(tx.as_ref(), &bundle);

        let report = EvidenceReport {
            tx_hash,
            contract,
            target,
            receipt: ReceiptSummary::from_receipt(&receipt),
            bundle,
            state,
            pattern,
        };

        self.cache.put(&key, &report, self.config.cache_ttl_secs);
        Ok(Some(report))
    }

    async fn run_backfill(&self, contract: Address, bundle: &mut EvidenceBundle) -> Result<()> {
        info!(
            "No transfers in transaction scope; backfilling the last {} blocks",
            self.config.backfill_window
        );
        backfill_transfers(
            &self.chain,
            &self.classifier,
            contract,
            self.config.backfill_window,
            bundle,
        )
        .await
        .context("Historical backfill failed")?;
        Ok(())
    }
}
