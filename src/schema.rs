//! Event schema families and ABI decoding
//!
//! Holds the ordered catalog of known event families and the shared
//! word-level ABI decoder they all use. Families are static tables of
//! event definitions; a log decodes against a definition only if its
//! selector matches topic0 and the argument layout decodes cleanly.

use crate::types::RawLog;
use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};

/// keccak256("Transfer(address,address,uint256)")
///
/// Shared by the ERC-20 and ERC-721 transfer events (and the dispute
/// contract's success event); the layouts differ by topic count.
pub const TRANSFER_SELECTOR: [u8; 32] = [
    0xdd, 0xf2, 0x52, 0xad, 0x1b, 0xe2, 0xc8, 0x9b,
    0x69, 0xc2, 0xb0, 0x68, 0xfc, 0x37, 0x8d, 0xaa,
    0x95, 0x2b, 0xa7, 0xf1, 0x63, 0xc4, 0xa1, 0x16,
    0x28, 0xf5, 0x5a, 0x4d, 0xf5, 0x23, 0xb3, 0xef,
];

/// keccak256("TransferFailed(address,address,uint256,string)")
pub const TRANSFER_FAILED_SELECTOR: [u8; 32] = [
    0x84, 0x59, 0x16, 0x32, 0xda, 0x32, 0x97, 0xca,
    0xc8, 0xd3, 0xbf, 0xdd, 0x6f, 0xf9, 0x74, 0xfa,
    0xf0, 0x84, 0x43, 0xfe, 0x6e, 0x72, 0xf8, 0x9e,
    0xd8, 0x30, 0x76, 0xfe, 0x8a, 0xaa, 0x25, 0x92,
];

/// keccak256("PartialTransfer(address,address,uint256,uint256)")
pub const PARTIAL_TRANSFER_SELECTOR: [u8; 32] = [
    0x9f, 0x1f, 0xc1, 0xc5, 0x2d, 0x83, 0x3d, 0x5e,
    0xd3, 0x37, 0x91, 0x15, 0xd7, 0x40, 0xbd, 0xe7,
    0x4b, 0xf4, 0xb0, 0x92, 0xd2, 0x0b, 0x1d, 0xe7,
    0x27, 0xa4, 0x52, 0x71, 0xe0, 0x37, 0xe7, 0xce,
];

/// keccak256("TokenMinted(address,uint256)")
pub const TOKEN_MINTED_SELECTOR: [u8; 32] = [
    0xb9, 0x14, 0x4c, 0x96, 0xc8, 0x65, 0x41, 0xf6,
    0xfa, 0x89, 0xc9, 0xf2, 0xf0, 0x24, 0x95, 0xcc,
    0xcf, 0x4b, 0x08, 0xcd, 0x66, 0x43, 0xe2, 0x6d,
    0x34, 0xee, 0x00, 0xaa, 0x58, 0x65, 0x58, 0xa8,
];

/// keccak256("TokenTransferFailed(address,address,uint256,string)")
pub const TOKEN_TRANSFER_FAILED_SELECTOR: [u8; 32] = [
    0x97, 0x12, 0x4f, 0x32, 0xff, 0x5a, 0x46, 0x42,
    0xe0, 0xcd, 0x3f, 0xe8, 0x1f, 0xdd, 0x86, 0xf2,
    0xa1, 0x34, 0x4f, 0x24, 0xf4, 0xe0, 0xdb, 0xcd,
    0x10, 0x42, 0x3d, 0x27, 0x02, 0xb5, 0x42, 0x31,
];

/// Schema family a definition belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContractFamily {
    /// Fungible-token transfer convention (ERC-20).
    Erc20,
    /// Non-fungible-token transfer convention (ERC-721).
    Erc721,
    /// The dispute/escrow contract's own event vocabulary.
    Dispute,
}

/// Semantic kind of a classified event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Transfer,
    Failure,
    PartialTransfer,
    Mint,
}

/// How a parameter's 32-byte word is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    Address,
    Uint,
    Str,
}

/// One typed event parameter.
#[derive(Debug, Clone, Copy)]
pub struct EventParam {
    pub name: &'static str,
    pub kind: ParamKind,
    /// Indexed parameters arrive in topics, the rest in the data payload.
    pub indexed: bool,
}

/// A named event signature: selector plus ordered parameter layout.
#[derive(Debug, Clone, Copy)]
pub struct EventDef {
    pub name: &'static str,
    pub family: ContractFamily,
    pub kind: EventKind,
    pub selector: [u8; 32],
    pub params: &'static [EventParam],
}

const fn param(name: &'static str, kind: ParamKind, indexed: bool) -> EventParam {
    EventParam { name, kind, indexed }
}

/// Fungible-transfer family: Transfer(address indexed, address indexed, uint256).
pub static ERC20_EVENTS: &[EventDef] = &[EventDef {
    name: "Transfer",
    family: ContractFamily::Erc20,
    kind: EventKind::Transfer,
    selector: TRANSFER_SELECTOR,
    params: &[
        param("from", ParamKind::Address, true),
        param("to", ParamKind::Address, true),
        param("amount", ParamKind::Uint, false),
    ],
}];

/// Non-fungible-transfer family: same selector as ERC-20 but the token
/// id is a third indexed parameter, so the topic count disambiguates.
pub static ERC721_EVENTS: &[EventDef] = &[EventDef {
    name: "Transfer",
    family: ContractFamily::Erc721,
    kind: EventKind::Transfer,
    selector: TRANSFER_SELECTOR,
    params: &[
        param("from", ParamKind::Address, true),
        param("to", ParamKind::Address, true),
        param("tokenId", ParamKind::Uint, true),
    ],
}];

/// Dispute-contract family: five event kinds.
///
/// The success `Transfer` shares its selector with ERC-20; by registry
/// order the fungible family always wins that selector.
pub static DISPUTE_EVENTS: &[EventDef] = &[
    EventDef {
        name: "Transfer",
        family: ContractFamily::Dispute,
        kind: EventKind::Transfer,
        selector: TRANSFER_SELECTOR,
        params: &[
            param("from", ParamKind::Address, true),
            param("to", ParamKind::Address, true),
            param("amount", ParamKind::Uint, false),
        ],
    },
    EventDef {
        name: "TransferFailed",
        family: ContractFamily::Dispute,
        kind: EventKind::Failure,
        selector: TRANSFER_FAILED_SELECTOR,
        params: &[
            param("from", ParamKind::Address, true),
            param("to", ParamKind::Address, true),
            param("amount", ParamKind::Uint, false),
            param("reason", ParamKind::Str, false),
        ],
    },
    EventDef {
        name: "PartialTransfer",
        family: ContractFamily::Dispute,
        kind: EventKind::PartialTransfer,
        selector: PARTIAL_TRANSFER_SELECTOR,
        params: &[
            param("from", ParamKind::Address, true),
            param("to", ParamKind::Address, true),
            param("requested", ParamKind::Uint, false),
            param("actual", ParamKind::Uint, false),
        ],
    },
    EventDef {
        name: "TokenMinted",
        family: ContractFamily::Dispute,
        kind: EventKind::Mint,
        selector: TOKEN_MINTED_SELECTOR,
        params: &[
            param("to", ParamKind::Address, true),
            param("tokenId", ParamKind::Uint, false),
        ],
    },
    EventDef {
        name: "TokenTransferFailed",
        family: ContractFamily::Dispute,
        kind: EventKind::Failure,
        selector: TOKEN_TRANSFER_FAILED_SELECTOR,
        params: &[
            param("from", ParamKind::Address, true),
            param("to", ParamKind::Address, true),
            param("tokenId", ParamKind::Uint, false),
            param("reason", ParamKind::Str, false),
        ],
    },
];

/// A decoded parameter value.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Address(Address),
    Uint(U256),
    Str(String),
}

/// A log successfully decoded against one event definition.
#[derive(Debug, Clone)]
pub struct DecodedEvent {
    pub def: &'static EventDef,
    pub fields: Vec<(&'static str, FieldValue)>,
}

impl DecodedEvent {
    /// Look up a decoded field by parameter name.
    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.fields
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| v)
    }
}

/// Ordered catalog of event families.
///
/// Families are tried in fixed priority order; the first definition
/// that decodes a log wins.
pub struct SchemaRegistry {
    families: Vec<&'static [EventDef]>,
}

impl SchemaRegistry {
    /// The standard priority order: ERC-20, ERC-721, dispute contract.
    pub fn standard() -> Self {
        Self {
            families: vec![ERC20_EVENTS, ERC721_EVENTS, DISPUTE_EVENTS],
        }
    }

    /// Try every definition in registry order; first success wins.
    pub fn try_decode(&self, log: &RawLog) -> Option<DecodedEvent> {
        for family in &self.families {
            for def in family.iter() {
                if let Some(decoded) = try_decode_event(def, log) {
                    return Some(decoded);
                }
            }
        }
        None
    }
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

/// Decode a hex topic string into a 32-byte word.
///
/// Returns None unless the topic is exactly 32 bytes of valid hex.
pub fn decode_topic_word(topic: &str) -> Option<[u8; 32]> {
    let s = topic.strip_prefix("0x").unwrap_or(topic);
    if s.len() != 64 {
        return None;
    }
    let bytes = hex::decode(s).ok()?;
    let mut word = [0u8; 32];
    word.copy_from_slice(&bytes);
    Some(word)
}

/// Extract the address from a 32-byte word (last 20 bytes).
pub fn address_from_word(word: &[u8; 32]) -> Address {
    Address::from_slice(&word[12..])
}

/// Read the nth 32-byte head word from the data payload.
fn data_word(data: &[u8], slot: usize) -> Option<[u8; 32]> {
    let start = slot.checked_mul(32)?;
    let end = start.checked_add(32)?;
    let bytes = data.get(start..end)?;
    let mut word = [0u8; 32];
    word.copy_from_slice(bytes);
    Some(word)
}

/// Interpret a word as a usize offset/length. The high 24 bytes must be
/// zero; anything larger cannot address a real payload.
fn usize_from_word(word: &[u8; 32]) -> Option<usize> {
    if word[..24].iter().any(|b| *b != 0) {
        return None;
    }
    let value = u64::from_be_bytes(word[24..].try_into().ok()?);
    usize::try_from(value).ok()
}

/// Decode a dynamic string from the data payload given its offset word.
fn decode_str_at(data: &[u8], offset_word: &[u8; 32]) -> Option<String> {
    let offset = usize_from_word(offset_word)?;
    let len_bytes = data.get(offset..offset.checked_add(32)?)?;
    let mut len_word = [0u8; 32];
    len_word.copy_from_slice(len_bytes);
    let len = usize_from_word(&len_word)?;

    let start = offset.checked_add(32)?;
    let bytes = data.get(start..start.checked_add(len)?)?;
    String::from_utf8(bytes.to_vec()).ok()
}

/// Try to decode one log against one event definition.
///
/// Succeeds only when the selector matches topic0, the topic count
/// matches the indexed parameter count exactly, and every parameter
/// decodes from its slot. Any mismatch is a miss, not an error.
pub fn try_decode_event(def: &'static EventDef, log: &RawLog) -> Option<DecodedEvent> {
    let topic0 = decode_topic_word(log.topics.first()?)?;
    if topic0 != def.selector {
        return None;
    }

    let indexed_count = def.params.iter().filter(|p| p.indexed).count();
    if log.topics.len() != indexed_count + 1 {
        return None;
    }

    let mut fields = Vec::with_capacity(def.params.len());
    let mut topics = log.topics[1..].iter();
    let mut head_slot = 0usize;

    for p in def.params {
        let value = if p.indexed {
            let word = decode_topic_word(topics.next()?)?;
            match p.kind {
                ParamKind::Address => FieldValue::Address(address_from_word(&word)),
                ParamKind::Uint => FieldValue::Uint(U256::from_be_slice(&word)),
                // An indexed dynamic value is only its hash; no family
                // declares one, so treat it as undecodable.
                ParamKind::Str => return None,
            }
        } else {
            let word = data_word(&log.data, head_slot)?;
            head_slot += 1;
            match p.kind {
                ParamKind::Address => FieldValue::Address(address_from_word(&word)),
                ParamKind::Uint => FieldValue::Uint(U256::from_be_slice(&word)),
                ParamKind::Str => FieldValue::Str(decode_str_at(&log.data, &word)?),
            }
        };
        fields.push((p.name, value));
    }

    Some(DecodedEvent { def, fields })
}
