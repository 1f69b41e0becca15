//! Transaction pattern analysis
//!
//! Derives a coarse transaction-intent label from three signals: native
//! value moved, contract call data present, and token-transfer events
//! observed. A fixed decision table, nothing learned or probabilistic.

use crate::classify::EvidenceBundle;
use crate::heuristic::HeuristicPattern;
use crate::types::Transaction;
use alloy_primitives::U256;
use serde::{Deserialize, Serialize};

/// Coarse transaction-intent label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    /// Contract call that also moved native value.
    ContractCallWithValue,
    /// Token transfer events dominate.
    TokenTransfer,
    /// Contract call without native value.
    ContractCall,
    /// Plain native-value transfer.
    ValueTransfer,
    Unknown,
}

/// A signal that contributed to the label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternTag {
    ValueTransfer,
    ContractInteraction,
    TokenTransfer,
}

/// Result of pattern analysis for one transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternAnalysis {
    pub transaction_type: TransactionType,
    /// Signals that were observed, independent of which one won.
    pub patterns: Vec<PatternTag>,
}

/// Label the transaction from its value, call data, and decoded events.
///
/// Priority: contract call with value > token transfer > contract call
/// > value transfer > unknown. With no transaction available both
/// transaction-derived signals read false.
pub fn analyze(tx: Option<&Transaction>, bundle: &EvidenceBundle) -> PatternAnalysis {
    let value_moved = tx.map_or(false, |t| t.value > U256::ZERO);
    let has_call_data = tx.map_or(false, Transaction::has_call_data);
    let token_transfer = observed_token_transfer(bundle);

    let mut patterns = Vec::new();
    if value_moved {
        patterns.push(PatternTag::ValueTransfer);
    }
    if has_call_data {
        patterns.push(PatternTag::ContractInteraction);
    }
    if token_transfer {
        patterns.push(PatternTag::TokenTransfer);
    }

    let transaction_type = if value_moved && has_call_data {
        TransactionType::ContractCallWithValue
    } else if token_transfer {
        TransactionType::TokenTransfer
    } else if has_call_data {
        TransactionType::ContractCall
    } else if value_moved {
        TransactionType::ValueTransfer
    } else {
        TransactionType::Unknown
    };

    PatternAnalysis {
        transaction_type,
        patterns,
    }
}

/// Any schema transfer carrying an amount or token id, or any
/// transfer-shaped heuristic event with a decoded amount.
fn observed_token_transfer(bundle: &EvidenceBundle) -> bool {
    bundle
        .transfers
        .iter()
        .any(|t| t.amount.is_some() || t.token_id.is_some())
        || bundle.unknown_events.iter().any(|u| {
            matches!(
                &u.pattern,
                HeuristicPattern::Transfer { amount: Some(_), .. }
            )
        })
}
