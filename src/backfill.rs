//! Historical log backfill
//!
//! When a transaction's own receipt shows no transfer evidence, the
//! search window widens to the most recent blocks for the same
//! contract. Only transfer events found there are merged into the
//! bundle; failures and partial transfers discovered during backfill
//! are dropped. Runs at most once per request and never recurses.

use crate::classify::{EvidenceBundle, LogClassifier};
use crate::rpc::ChainClient;
use alloy_primitives::Address;
use anyhow::{Context, Result};
use tracing::info;

/// Widen the search window and append historical transfer events.
///
/// Queries the last `window` blocks (clamped at genesis), reclassifies
/// the logs with a scratch bundle, and appends only the transfers. The
/// main bundle's `contract_type` is left untouched.
///
/// Returns the number of transfers appended.
pub async fn backfill_transfers<C: ChainClient>(
    chain: &C,
    classifier: &LogClassifier,
    contract: Address,
    window: u64,
    bundle: &mut EvidenceBundle,
) -> Result<usize> {
    let height = chain
        .get_block_number()
        .await
        .context("Failed to get block height for backfill")?;
    let from_block = height.saturating_sub(window);

    let logs = chain
        .get_logs(contract, from_block, height)
        .await
        .with_context(|| {
            format!(
                "Failed to fetch historical logs for {:?} in blocks {}..={}",
                contract, from_block, height
            )
        })?;

    let scratch = classifier.classify(&logs);
    let found = scratch.transfers.len();
    bundle.transfers.extend(scratch.transfers);

    info!(
        "Backfill over blocks {}..={} found {} transfer(s) in {} log(s)",
        from_block,
        height,
        found,
        logs.len()
    );
    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::mock::MockChain;
    use crate::schema::{ContractFamily, TOKEN_MINTED_SELECTOR, TRANSFER_FAILED_SELECTOR, TRANSFER_SELECTOR};
    use crate::types::RawLog;
    use alloy_primitives::{address, Address};

    fn topic_hex(word: &[u8; 32]) -> String {
        format!("0x{}", hex::encode(word))
    }

    fn topic_for_address(addr: Address) -> String {
        let mut word = [0u8; 32];
        word[12..].copy_from_slice(addr.as_slice());
        topic_hex(&word)
    }

    fn word_for_u64(value: u64) -> [u8; 32] {
        let mut word = [0u8; 32];
        word[24..].copy_from_slice(&value.to_be_bytes());
        word
    }

    fn mk_log(index: u64, topics: Vec<String>, data: Vec<u8>) -> RawLog {
        RawLog {
            address: address!("0742d35cc6634c0532925a3b844bc9e7595f0beb"),
            topics,
            data,
            log_index: Some(index),
            transaction_index: Some(0),
            block_number: Some(1),
        }
    }

    #[tokio::test]
    async fn test_backfill_appends_only_transfers() {
        let from = address!("70997970c51812dc3a010c7d01b50e0d17dc79c8");
        let to = address!("3c44cdddb6a900fa2b585dd299e03d12fa4293bc");
        let reason = "nope";

        let mut failed_data = Vec::new();
        failed_data.extend_from_slice(&word_for_u64(10));
        failed_data.extend_from_slice(&word_for_u64(64));
        failed_data.extend_from_slice(&word_for_u64(reason.len() as u64));
        let mut tail = reason.as_bytes().to_vec();
        tail.resize(32, 0);
        failed_data.extend_from_slice(&tail);

        let chain = MockChain {
            block_number: 5_000,
            logs: vec![
                mk_log(
                    0,
                    vec![
                        topic_hex(&TRANSFER_SELECTOR),
                        topic_for_address(from),
                        topic_for_address(to),
                    ],
                    word_for_u64(250).to_vec(),
                ),
                // A historical failure: found but deliberately not merged.
                mk_log(
                    1,
                    vec![
                        topic_hex(&TRANSFER_FAILED_SELECTOR),
                        topic_for_address(from),
                        topic_for_address(to),
                    ],
                    failed_data,
                ),
            ],
            ..Default::default()
        };

        let classifier = LogClassifier::new();
        let mut bundle = EvidenceBundle {
            contract_type: Some(ContractFamily::Dispute),
            ..Default::default()
        };
        let contract = address!("dac17f958d2ee523a2206206994597c13d831ec7");
        let found = backfill_transfers(&chain, &classifier, contract, 1_000, &mut bundle)
            .await
            .unwrap();

        assert_eq!(found, 1);
        assert_eq!(bundle.transfers.len(), 1);
        assert_eq!(bundle.transfers[0].amount.as_deref(), Some("250"));
        assert!(bundle.failures.is_empty());
        assert_eq!(chain.logs_queried(), 1);
    }

    #[tokio::test]
    async fn test_backfill_preserves_contract_type() {
        let to = address!("3c44cdddb6a900fa2b585dd299e03d12fa4293bc");
        let chain = MockChain {
            block_number: 100,
            logs: vec![mk_log(
                0,
                vec![topic_hex(&TOKEN_MINTED_SELECTOR), topic_for_address(to)],
                word_for_u64(1).to_vec(),
            )],
            ..Default::default()
        };

        let classifier = LogClassifier::new();
        // Heuristics pinned the fungible family before backfill ran.
        let mut bundle = EvidenceBundle {
            contract_type: Some(ContractFamily::Erc20),
            ..Default::default()
        };
        let contract = address!("dac17f958d2ee523a2206206994597c13d831ec7");
        backfill_transfers(&chain, &classifier, contract, 1_000, &mut bundle)
            .await
            .unwrap();

        assert_eq!(bundle.contract_type, Some(ContractFamily::Erc20));
        assert_eq!(bundle.transfers.len(), 1);
    }

    #[tokio::test]
    async fn test_window_clamps_at_genesis() {
        // Height below the window: the range must start at block zero,
        // which saturating_sub guarantees; the query must still run.
        let chain = MockChain {
            block_number: 12,
            ..Default::default()
        };
        let classifier = LogClassifier::new();
        let mut bundle = EvidenceBundle::default();
        let contract = address!("dac17f958d2ee523a2206206994597c13d831ec7");
        let found = backfill_transfers(&chain, &classifier, contract, 1_000, &mut bundle)
            .await
            .unwrap();
        assert_eq!(found, 0);
        assert_eq!(chain.logs_queried(), 1);
    }
}
