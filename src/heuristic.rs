//! Heuristic decoder for unrecognized event logs
//!
//! Best-effort structural guessing for logs no schema family matched.
//! Topic0 stays an opaque selector; later topics are probed for
//! address-shaped words; the data payload is split into 32-byte chunks
//! read as unsigned integers. The decoder is total: any failure
//! degrades to an opaque value, never an error. Heuristic events are
//! lower confidence than schema matches and are kept strictly apart
//! from the schema-decoded sequences.

use crate::schema::{address_from_word, decode_topic_word};
use crate::types::RawLog;
use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};

/// A topic word after heuristic interpretation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TopicValue {
    /// The high 12 bytes were zero, so the word reads as an address.
    Address(Address),
    /// Anything else, kept verbatim as received.
    Word(String),
}

/// A 32-byte data chunk after heuristic interpretation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataChunk {
    /// A full chunk, read as an unsigned integer (decimal string).
    Uint(String),
    /// A trailing partial chunk that cannot be a whole word.
    Bytes(Vec<u8>),
}

/// Shape inferred from the decoded topics and chunks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeuristicPattern {
    /// At least two leading topics decoded as addresses.
    Transfer {
        from: Address,
        to: Address,
        amount: Option<String>,
    },
    /// Exactly one address-shaped topic anywhere in the log.
    SingleAddress { address: Address },
    /// No usable structure.
    Unknown,
}

/// A log that only the heuristic decoder could interpret.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnknownEvent {
    /// Raw topic0, kept opaque (never resolved to an event name).
    pub selector: Option<String>,
    /// Topics after topic0, each probed for address shape.
    pub topics: Vec<TopicValue>,
    /// The data payload split into 32-byte chunks.
    pub data_chunks: Vec<DataChunk>,
    /// Inferred event shape.
    pub pattern: HeuristicPattern,
    /// Originating log index for ordering.
    pub log_index: u64,
}

/// Check whether a 32-byte word looks like a left-padded address.
fn is_address_shaped(word: &[u8; 32]) -> bool {
    word[..12].iter().all(|b| *b == 0)
}

/// Decode a log no schema family matched.
///
/// Never fails; every branch degrades to an opaque representation.
pub fn decode_unmatched(log: &RawLog, log_index: u64) -> UnknownEvent {
    let selector = log.topics.first().cloned();

    let topics: Vec<TopicValue> = log
        .topics
        .iter()
        .skip(1)
        .map(|raw| match decode_topic_word(raw) {
            Some(word) if is_address_shaped(&word) => {
                TopicValue::Address(address_from_word(&word))
            }
            _ => TopicValue::Word(raw.clone()),
        })
        .collect();

    let data_chunks: Vec<DataChunk> = log
        .data
        .chunks(32)
        .map(|chunk| {
            if chunk.len() == 32 {
                DataChunk::Uint(U256::from_be_slice(chunk).to_string())
            } else {
                DataChunk::Bytes(chunk.to_vec())
            }
        })
        .collect();

    let pattern = infer_pattern(&topics, &data_chunks);

    UnknownEvent {
        selector,
        topics,
        data_chunks,
        pattern,
        log_index,
    }
}

/// Infer the event shape from decoded topics and data chunks.
///
/// Two or more leading address topics make a transfer shape with
/// from/to taken from the first two and the amount from the first
/// integer chunk. A single address-shaped topic anywhere makes a
/// single-address shape. Everything else stays unknown.
fn infer_pattern(topics: &[TopicValue], data_chunks: &[DataChunk]) -> HeuristicPattern {
    let leading_addresses: Vec<Address> = topics
        .iter()
        .map_while(|t| match t {
            TopicValue::Address(addr) => Some(*addr),
            TopicValue::Word(_) => None,
        })
        .collect();

    if leading_addresses.len() >= 2 {
        let amount = data_chunks.iter().find_map(|c| match c {
            DataChunk::Uint(v) => Some(v.clone()),
            DataChunk::Bytes(_) => None,
        });
        return HeuristicPattern::Transfer {
            from: leading_addresses[0],
            to: leading_addresses[1],
            amount,
        };
    }

    let mut addresses = topics.iter().filter_map(|t| match t {
        TopicValue::Address(addr) => Some(*addr),
        TopicValue::Word(_) => None,
    });
    match (addresses.next(), addresses.next()) {
        (Some(address), None) => HeuristicPattern::SingleAddress { address },
        _ => HeuristicPattern::Unknown,
    }
}
