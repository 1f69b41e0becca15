//! Engine configuration and input parsing
//!
//! Tunables for one evidence-assembly engine plus lenient parsing of
//! user-supplied hashes and addresses (with or without 0x prefix).

use alloy_primitives::{Address, B256};
use anyhow::{Context, Result};

/// Tunables for an evidence-assembly engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Time-to-live for cached reports, in seconds.
    pub cache_ttl_secs: u64,
    /// How many recent blocks the historical backfill covers.
    pub backfill_window: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cache_ttl_secs: crate::cache::DEFAULT_TTL_SECS,
            backfill_window: 1_000,
        }
    }
}

/// Pad an odd-length hex string with a leading zero.
fn pad_hex_string(s: &str) -> String {
    if s.is_empty() {
        return s.to_string();
    }
    if s.len() % 2 == 1 {
        format!("0{}", s)
    } else {
        s.to_string()
    }
}

/// Parse an address from a hex string.
///
/// Accepts addresses with or without 0x prefix.
pub fn parse_address(s: &str) -> Result<Address> {
    let s = s.strip_prefix("0x").unwrap_or(s);
    let s = pad_hex_string(s);
    let bytes = hex::decode(&s).with_context(|| format!("Invalid hex address: {}", s))?;

    if bytes.len() != 20 {
        anyhow::bail!(
            "Address must be 20 bytes (40 hex chars), got {} bytes",
            bytes.len()
        );
    }

    Ok(Address::from_slice(&bytes))
}

/// Parse a transaction hash from a hex string.
///
/// Accepts hashes with or without 0x prefix.
pub fn parse_tx_hash(s: &str) -> Result<B256> {
    let s = s.strip_prefix("0x").unwrap_or(s);
    let s = pad_hex_string(s);
    let bytes = hex::decode(&s).with_context(|| format!("Invalid hex hash: {}", s))?;

    if bytes.len() != 32 {
        anyhow::bail!(
            "Transaction hash must be 32 bytes (64 hex chars), got {} bytes",
            bytes.len()
        );
    }

    Ok(B256::from_slice(&bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_contract_values() {
        let config = EngineConfig::default();
        assert_eq!(config.cache_ttl_secs, 3_600);
        assert_eq!(config.backfill_window, 1_000);
    }

    #[test]
    fn test_parse_address() {
        let with_prefix = parse_address("0x0742d35Cc6634C0532925a3b844Bc9e7595f0bEb").unwrap();
        let without_prefix = parse_address("0742d35Cc6634C0532925a3b844Bc9e7595f0bEb").unwrap();
        assert_eq!(with_prefix, without_prefix);
        assert!(parse_address("0x1234").is_err());
        assert!(parse_address("zz").is_err());
    }

    #[test]
    fn test_parse_tx_hash() {
        let hash = parse_tx_hash(
            "0x88df016429689c079f3b2f6ad39fa052532c56795b733da78a91ebe6a713944b",
        )
        .unwrap();
        assert_eq!(hash.as_slice().len(), 32);
        assert!(parse_tx_hash("0xdead").is_err());
    }
}
