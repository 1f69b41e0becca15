//! Log classification and evidence bundle assembly
//!
//! Runs every raw log through the schema registry in priority order,
//! hands total misses to the heuristic decoder, and collects the
//! results into an `EvidenceBundle`. The first successful
//! classification in a batch pins the bundle's contract family; later
//! logs never change it, even when they match a different family.

use crate::heuristic::{self, HeuristicPattern, UnknownEvent};
use crate::schema::{ContractFamily, DecodedEvent, EventKind, FieldValue, SchemaRegistry};
use crate::types::RawLog;
use alloy_primitives::Address;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// A log decoded by a schema family, with named fields resolved.
///
/// Numeric fields are decimal strings so downstream consumers never
/// lose precision; absent fields stay `None` rather than empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedEvent {
    pub family: ContractFamily,
    pub kind: EventKind,
    /// Event name from the matching definition (e.g. "TransferFailed").
    pub name: String,
    pub from: Option<Address>,
    pub to: Option<Address>,
    pub amount: Option<String>,
    pub token_id: Option<String>,
    pub requested: Option<String>,
    pub reason: Option<String>,
    /// Originating log index for ordering.
    pub log_index: u64,
}

impl ClassifiedEvent {
    fn from_decoded(decoded: &DecodedEvent, log_index: u64) -> Self {
        let mut event = Self {
            family: decoded.def.family,
            kind: decoded.def.kind,
            name: decoded.def.name.to_string(),
            from: None,
            to: None,
            amount: None,
            token_id: None,
            requested: None,
            reason: None,
            log_index,
        };

        for (name, value) in &decoded.fields {
            match (*name, value) {
                ("from", FieldValue::Address(addr)) => event.from = Some(*addr),
                ("to", FieldValue::Address(addr)) => event.to = Some(*addr),
                ("amount", FieldValue::Uint(v)) | ("actual", FieldValue::Uint(v)) => {
                    event.amount = Some(v.to_string())
                }
                ("requested", FieldValue::Uint(v)) => event.requested = Some(v.to_string()),
                ("tokenId", FieldValue::Uint(v)) => event.token_id = Some(v.to_string()),
                ("reason", FieldValue::Str(s)) => event.reason = Some(s.clone()),
                _ => {}
            }
        }

        event
    }
}

/// The aggregate decoded result of one evidence-assembly run.
///
/// Mint events ride in `transfers` tagged with their kind. Heuristic
/// events live only in `unknown_events`, never in the schema-decoded
/// sequences.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvidenceBundle {
    pub transfers: Vec<ClassifiedEvent>,
    pub failures: Vec<ClassifiedEvent>,
    pub partial_transfers: Vec<ClassifiedEvent>,
    pub unknown_events: Vec<UnknownEvent>,
    /// Family of the first successful classification; set once, never
    /// overwritten by later logs matching a different family.
    pub contract_type: Option<ContractFamily>,
    /// Contract metadata collected by the state reader.
    pub contract_info: BTreeMap<String, String>,
}

impl EvidenceBundle {
    /// Total number of classified events, heuristic ones included.
    pub fn event_count(&self) -> usize {
        self.transfers.len()
            + self.failures.len()
            + self.partial_transfers.len()
            + self.unknown_events.len()
    }
}

/// Classifies raw logs against the schema registry with heuristic fallback.
pub struct LogClassifier {
    registry: SchemaRegistry,
}

impl LogClassifier {
    pub fn new() -> Self {
        Self {
            registry: SchemaRegistry::standard(),
        }
    }

    /// Classify a batch of logs into a fresh bundle.
    ///
    /// Each log yields exactly one event: the first schema definition
    /// that decodes it in registry order, or a heuristic event on a
    /// total miss. A transfer-shaped heuristic event counts as
    /// fungible-family evidence for the contract type when nothing has
    /// pinned it yet.
    pub fn classify(&self, logs: &[RawLog]) -> EvidenceBundle {
        let mut bundle = EvidenceBundle::default();

        for (position, log) in logs.iter().enumerate() {
            let log_index = log.log_index.unwrap_or(position as u64);

            match self.registry.try_decode(log) {
                Some(decoded) => {
                    if bundle.contract_type.is_none() {
                        bundle.contract_type = Some(decoded.def.family);
                    }
                    let event = ClassifiedEvent::from_decoded(&decoded, log_index);
                    debug!(
                        "Log {} classified as {:?} {}",
                        log_index, event.family, event.name
                    );
                    match event.kind {
                        EventKind::Transfer | EventKind::Mint => bundle.transfers.push(event),
                        EventKind::Failure => bundle.failures.push(event),
                        EventKind::PartialTransfer => bundle.partial_transfers.push(event),
                    }
                }
                None => {
                    let event = heuristic::decode_unmatched(log, log_index);
                    if bundle.contract_type.is_none()
                        && matches!(event.pattern, HeuristicPattern::Transfer { .. })
                    {
                        bundle.contract_type = Some(ContractFamily::Erc20);
                    }
                    debug!("Log {} unmatched, kept as heuristic event", log_index);
                    bundle.unknown_events.push(event);
                }
            }
        }

        bundle
    }
}

impl Default for LogClassifier {
    fn default() -> Self {
        Self::new()
    }
}
