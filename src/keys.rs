//! Cache key encoding
//!
//! Keys use a single-byte prefix followed by fixed-width binary data,
//! keeping RocksDB keys deterministic and lexicographically ordered.

use alloy_primitives::{Address, B256};

/// Encode an evidence report key.
///
/// Format: byte 'E' (0x45) + tx hash (32 bytes) + contract (20 bytes)
/// + presence byte (0x01/0x00) + target (20 bytes when present)
/// Total length: 54 or 74 bytes
pub fn encode_report_key(tx_hash: B256, contract: Address, target: Option<Address>) -> Vec<u8> {
    let mut key = Vec::with_capacity(74);
    key.push(b'E');
    key.extend_from_slice(tx_hash.as_slice());
    key.extend_from_slice(contract.as_slice());
    match target {
        Some(target) => {
            key.push(0x01);
            key.extend_from_slice(target.as_slice());
        }
        None => key.push(0x00),
    }
    key
}
