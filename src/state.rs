//! Contract state reconstruction
//!
//! Read-only state queries conditioned on the classified contract
//! family. Every read is independent and best-effort: a failing call is
//! logged and its field omitted, the rest of the reads proceed. With no
//! classified family the reader returns empty mappings without error.

use crate::classify::EvidenceBundle;
use crate::rpc::ChainClient;
use crate::schema::{ContractFamily, EventKind};
use alloy_primitives::{Address, U256};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// selector("symbol()")
const SYMBOL_SELECTOR: [u8; 4] = [0x95, 0xd8, 0x9b, 0x41];
/// selector("name()")
const NAME_SELECTOR: [u8; 4] = [0x06, 0xfd, 0xde, 0x03];
/// selector("decimals()")
const DECIMALS_SELECTOR: [u8; 4] = [0x31, 0x3c, 0xe5, 0x67];
/// selector("balanceOf(address)")
const BALANCE_OF_SELECTOR: [u8; 4] = [0x70, 0xa0, 0x82, 0x31];
/// selector("ownerOf(uint256)")
const OWNER_OF_SELECTOR: [u8; 4] = [0x63, 0x52, 0x21, 0x1e];
/// selector("totalSupply()")
const TOTAL_SUPPLY_SELECTOR: [u8; 4] = [0x18, 0x16, 0x0d, 0xdd];
/// selector("nextTokenId()")
const NEXT_TOKEN_ID_SELECTOR: [u8; 4] = [0x75, 0x79, 0x4a, 0x3c];

/// Contract state reconstructed for one evidence-assembly run.
///
/// Entries are present only when their underlying read succeeded.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContractState {
    /// Address -> balance (decimal string).
    pub balances: BTreeMap<Address, String>,
    /// Token id (decimal string) -> current owner.
    pub token_owners: BTreeMap<String, Address>,
    /// Metadata key -> value (symbol, name, decimals, counters).
    pub contract_info: BTreeMap<String, String>,
}

/// Read current contract state appropriate to the classified family.
///
/// Never fails; individual read errors are logged and skipped.
pub async fn read_contract_state<C: ChainClient>(
    chain: &C,
    contract: Address,
    target: Option<Address>,
    bundle: &EvidenceBundle,
) -> ContractState {
    let mut state = ContractState::default();

    match bundle.contract_type {
        Some(ContractFamily::Erc20) => {
            read_string_info(chain, contract, SYMBOL_SELECTOR, "symbol", &mut state).await;
            read_string_info(chain, contract, NAME_SELECTOR, "name", &mut state).await;
            read_uint_info(chain, contract, DECIMALS_SELECTOR, "decimals", &mut state).await;
            if let Some(target) = target {
                read_balance(chain, contract, target, &mut state).await;
            }
        }
        Some(ContractFamily::Erc721) => {
            read_string_info(chain, contract, SYMBOL_SELECTOR, "symbol", &mut state).await;
            read_string_info(chain, contract, NAME_SELECTOR, "name", &mut state).await;
            if let Some(target) = target {
                read_balance(chain, contract, target, &mut state).await;
                for event in transfers_to_target(bundle, target) {
                    if let Some(token_id) = &event.token_id {
                        read_token_owner(chain, contract, token_id, &mut state).await;
                    }
                }
            }
        }
        Some(ContractFamily::Dispute) => {
            read_uint_info(chain, contract, TOTAL_SUPPLY_SELECTOR, "totalSupply", &mut state)
                .await;
            read_uint_info(chain, contract, NEXT_TOKEN_ID_SELECTOR, "nextTokenId", &mut state)
                .await;
            if let Some(target) = target {
                read_balance(chain, contract, target, &mut state).await;
                for event in transfers_to_target(bundle, target) {
                    if event.kind != EventKind::Mint {
                        continue;
                    }
                    if let Some(token_id) = &event.token_id {
                        read_token_owner(chain, contract, token_id, &mut state).await;
                    }
                }
            }
        }
        None => {
            debug!("No contract family classified; skipping state reads");
        }
    }

    state
}

fn transfers_to_target(
    bundle: &EvidenceBundle,
    target: Address,
) -> impl Iterator<Item = &crate::classify::ClassifiedEvent> {
    bundle
        .transfers
        .iter()
        .filter(move |t| t.to == Some(target))
}

async fn read_string_info<C: ChainClient>(
    chain: &C,
    contract: Address,
    selector: [u8; 4],
    key: &str,
    state: &mut ContractState,
) {
    match call_string(chain, contract, selector).await {
        Ok(value) => {
            state.contract_info.insert(key.to_string(), value);
        }
        Err(e) => warn!("State read '{}' failed for {:?}: {:#}", key, contract, e),
    }
}

async fn read_uint_info<C: ChainClient>(
    chain: &C,
    contract: Address,
    selector: [u8; 4],
    key: &str,
    state: &mut ContractState,
) {
    match call_uint(chain, contract, selector, &[]).await {
        Ok(value) => {
            state.contract_info.insert(key.to_string(), value.to_string());
        }
        Err(e) => warn!("State read '{}' failed for {:?}: {:#}", key, contract, e),
    }
}

async fn read_balance<C: ChainClient>(
    chain: &C,
    contract: Address,
    target: Address,
    state: &mut ContractState,
) {
    match call_uint(chain, contract, BALANCE_OF_SELECTOR, &[word_for_address(target)]).await {
        Ok(balance) => {
            state.balances.insert(target, balance.to_string());
        }
        Err(e) => warn!(
            "State read 'balanceOf' failed for {:?} on {:?}: {:#}",
            target, contract, e
        ),
    }
}

async fn read_token_owner<C: ChainClient>(
    chain: &C,
    contract: Address,
    token_id: &str,
    state: &mut ContractState,
) {
    let id = match U256::from_str_radix(token_id, 10) {
        Ok(id) => id,
        Err(e) => {
            warn!("Unparseable token id '{}': {}", token_id, e);
            return;
        }
    };

    match call_uint(chain, contract, OWNER_OF_SELECTOR, &[id.to_be_bytes::<32>()]).await {
        Ok(owner_word) => {
            let owner = Address::from_slice(&owner_word.to_be_bytes::<32>()[12..]);
            state.token_owners.insert(token_id.to_string(), owner);
        }
        Err(e) => warn!(
            "State read 'ownerOf({})' failed for {:?}: {:#}",
            token_id, contract, e
        ),
    }
}

/// Build calldata: 4-byte selector followed by 32-byte argument words.
fn encode_call(selector: [u8; 4], args: &[[u8; 32]]) -> Vec<u8> {
    let mut data = Vec::with_capacity(4 + args.len() * 32);
    data.extend_from_slice(&selector);
    for arg in args {
        data.extend_from_slice(arg);
    }
    data
}

fn word_for_address(addr: Address) -> [u8; 32] {
    let mut word = [0u8; 32];
    word[12..].copy_from_slice(addr.as_slice());
    word
}

/// Call a method returning a single uint word.
async fn call_uint<C: ChainClient>(
    chain: &C,
    contract: Address,
    selector: [u8; 4],
    args: &[[u8; 32]],
) -> Result<U256> {
    let ret = chain.call(contract, encode_call(selector, args)).await?;
    decode_return_uint(&ret)
}

/// Call a method returning an ABI-encoded string.
async fn call_string<C: ChainClient>(
    chain: &C,
    contract: Address,
    selector: [u8; 4],
) -> Result<String> {
    let ret = chain.call(contract, encode_call(selector, &[])).await?;
    decode_return_string(&ret)
}

/// Decode a single uint return word.
fn decode_return_uint(data: &[u8]) -> Result<U256> {
    if data.is_empty() {
        anyhow::bail!("Empty return data");
    }
    let end = data.len().min(32);
    Ok(U256::from_be_slice(&data[..end]))
}

/// Decode an ABI-encoded dynamic string return value
/// (offset word, length word, then UTF-8 bytes).
fn decode_return_string(data: &[u8]) -> Result<String> {
    if data.len() < 64 {
        anyhow::bail!("Return data too short for a string ({} bytes)", data.len());
    }

    let offset = usize_word(&data[..32]).context("Bad string offset")?;
    let len_end = offset.checked_add(32).context("String offset overflow")?;
    let len_bytes = data
        .get(offset..len_end)
        .context("String offset out of range")?;
    let len = usize_word(len_bytes).context("Bad string length")?;

    let end = len_end.checked_add(len).context("String length overflow")?;
    let bytes = data.get(len_end..end).context("String body out of range")?;
    String::from_utf8(bytes.to_vec()).context("String is not valid UTF-8")
}

fn usize_word(word: &[u8]) -> Result<usize> {
    if word.len() != 32 || word[..24].iter().any(|b| *b != 0) {
        anyhow::bail!("Word does not fit usize");
    }
    let value = u64::from_be_bytes(word[24..].try_into()?);
    Ok(usize::try_from(value)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::ClassifiedEvent;
    use crate::rpc::mock::MockChain;
    use alloy_primitives::address;

    fn abi_uint(value: u64) -> Vec<u8> {
        let mut word = [0u8; 32];
        word[24..].copy_from_slice(&value.to_be_bytes());
        word.to_vec()
    }

    fn abi_address(addr: Address) -> Vec<u8> {
        word_for_address(addr).to_vec()
    }

    fn abi_string(s: &str) -> Vec<u8> {
        let mut data = abi_uint(32);
        data.extend_from_slice(&abi_uint(s.len() as u64));
        let mut tail = s.as_bytes().to_vec();
        tail.resize(tail.len().div_ceil(32).max(1) * 32, 0);
        data.extend_from_slice(&tail);
        data
    }

    fn transfer_event(to: Address, token_id: Option<&str>, kind: EventKind) -> ClassifiedEvent {
        ClassifiedEvent {
            family: ContractFamily::Erc721,
            kind,
            name: "Transfer".to_string(),
            from: Some(address!("70997970c51812dc3a010c7d01b50e0d17dc79c8")),
            to: Some(to),
            amount: None,
            token_id: token_id.map(str::to_string),
            requested: None,
            reason: None,
            log_index: 0,
        }
    }

    #[tokio::test]
    async fn test_erc20_reads_metadata_and_balance() {
        let target = address!("3c44cdddb6a900fa2b585dd299e03d12fa4293bc");
        let mut chain = MockChain::default();
        chain
            .call_responses
            .insert(SYMBOL_SELECTOR, Ok(abi_string("USDT")));
        chain
            .call_responses
            .insert(NAME_SELECTOR, Ok(abi_string("Tether USD")));
        chain
            .call_responses
            .insert(DECIMALS_SELECTOR, Ok(abi_uint(6)));
        chain
            .call_responses
            .insert(BALANCE_OF_SELECTOR, Ok(abi_uint(5000)));

        let bundle = EvidenceBundle {
            contract_type: Some(ContractFamily::Erc20),
            ..Default::default()
        };
        let contract = address!("dac17f958d2ee523a2206206994597c13d831ec7");
        let state = read_contract_state(&chain, contract, Some(target), &bundle).await;

        assert_eq!(state.contract_info.get("symbol").map(String::as_str), Some("USDT"));
        assert_eq!(
            state.contract_info.get("name").map(String::as_str),
            Some("Tether USD")
        );
        assert_eq!(state.contract_info.get("decimals").map(String::as_str), Some("6"));
        assert_eq!(state.balances.get(&target).map(String::as_str), Some("5000"));
    }

    #[tokio::test]
    async fn test_failing_read_omits_field_and_continues() {
        // symbol() reverts; everything else must still be read and the
        // key must be absent rather than empty.
        let target = address!("3c44cdddb6a900fa2b585dd299e03d12fa4293bc");
        let mut chain = MockChain::default();
        chain
            .call_responses
            .insert(SYMBOL_SELECTOR, Err("no symbol".to_string()));
        chain
            .call_responses
            .insert(NAME_SELECTOR, Ok(abi_string("Mystery Token")));
        chain
            .call_responses
            .insert(DECIMALS_SELECTOR, Ok(abi_uint(18)));
        chain
            .call_responses
            .insert(BALANCE_OF_SELECTOR, Ok(abi_uint(1)));

        let bundle = EvidenceBundle {
            contract_type: Some(ContractFamily::Erc20),
            ..Default::default()
        };
        let contract = address!("dac17f958d2ee523a2206206994597c13d831ec7");
        let state = read_contract_state(&chain, contract, Some(target), &bundle).await;

        assert!(!state.contract_info.contains_key("symbol"));
        assert_eq!(
            state.contract_info.get("name").map(String::as_str),
            Some("Mystery Token")
        );
        assert_eq!(state.balances.len(), 1);
    }

    #[tokio::test]
    async fn test_unclassified_bundle_reads_nothing() {
        let chain = MockChain::default();
        let bundle = EvidenceBundle::default();
        let contract = address!("dac17f958d2ee523a2206206994597c13d831ec7");
        let state = read_contract_state(&chain, contract, None, &bundle).await;

        assert_eq!(state, ContractState::default());
        assert_eq!(chain.call_calls.load(std::sync::atomic::Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_erc721_ownership_lookups_for_target_transfers() {
        let target = address!("3c44cdddb6a900fa2b585dd299e03d12fa4293bc");
        let other = address!("90f79bf6eb2c4f870365e785982e1f101e93b906");
        let mut chain = MockChain::default();
        chain
            .call_responses
            .insert(SYMBOL_SELECTOR, Ok(abi_string("NFT")));
        chain
            .call_responses
            .insert(NAME_SELECTOR, Ok(abi_string("Collectible")));
        chain
            .call_responses
            .insert(BALANCE_OF_SELECTOR, Ok(abi_uint(2)));
        chain
            .call_responses
            .insert(OWNER_OF_SELECTOR, Ok(abi_address(target)));

        let bundle = EvidenceBundle {
            contract_type: Some(ContractFamily::Erc721),
            transfers: vec![
                transfer_event(target, Some("7"), EventKind::Transfer),
                // Directed elsewhere: no lookup for this one.
                transfer_event(other, Some("9"), EventKind::Transfer),
            ],
            ..Default::default()
        };
        let contract = address!("dac17f958d2ee523a2206206994597c13d831ec7");
        let state = read_contract_state(&chain, contract, Some(target), &bundle).await;

        assert_eq!(state.token_owners.len(), 1);
        assert_eq!(state.token_owners.get("7"), Some(&target));
    }

    #[tokio::test]
    async fn test_dispute_reads_counters_and_mint_owners() {
        let target = address!("3c44cdddb6a900fa2b585dd299e03d12fa4293bc");
        let mut chain = MockChain::default();
        chain
            .call_responses
            .insert(TOTAL_SUPPLY_SELECTOR, Ok(abi_uint(42)));
        chain
            .call_responses
            .insert(NEXT_TOKEN_ID_SELECTOR, Ok(abi_uint(43)));
        chain
            .call_responses
            .insert(BALANCE_OF_SELECTOR, Ok(abi_uint(3)));
        chain
            .call_responses
            .insert(OWNER_OF_SELECTOR, Ok(abi_address(target)));

        let bundle = EvidenceBundle {
            contract_type: Some(ContractFamily::Dispute),
            transfers: vec![
                transfer_event(target, Some("5"), EventKind::Mint),
                // A plain transfer to the target must not trigger ownerOf
                // under the dispute family; only mints do.
                transfer_event(target, Some("6"), EventKind::Transfer),
            ],
            ..Default::default()
        };
        let contract = address!("dac17f958d2ee523a2206206994597c13d831ec7");
        let state = read_contract_state(&chain, contract, Some(target), &bundle).await;

        assert_eq!(state.contract_info.get("totalSupply").map(String::as_str), Some("42"));
        assert_eq!(state.contract_info.get("nextTokenId").map(String::as_str), Some("43"));
        assert_eq!(state.token_owners.len(), 1);
        assert_eq!(state.token_owners.get("5"), Some(&target));
    }

    #[tokio::test]
    async fn test_no_target_skips_balance_and_ownership() {
        let mut chain = MockChain::default();
        chain
            .call_responses
            .insert(SYMBOL_SELECTOR, Ok(abi_string("T")));
        chain
            .call_responses
            .insert(NAME_SELECTOR, Ok(abi_string("Token")));
        chain
            .call_responses
            .insert(DECIMALS_SELECTOR, Ok(abi_uint(18)));

        let bundle = EvidenceBundle {
            contract_type: Some(ContractFamily::Erc20),
            ..Default::default()
        };
        let contract = address!("dac17f958d2ee523a2206206994597c13d831ec7");
        let state = read_contract_state(&chain, contract, None, &bundle).await;

        assert!(state.balances.is_empty());
        assert_eq!(state.contract_info.len(), 3);
    }

    #[test]
    fn test_decode_return_string() {
        assert_eq!(decode_return_string(&abi_string("USDT")).unwrap(), "USDT");
        assert!(decode_return_string(&[]).is_err());
        assert!(decode_return_string(&abi_uint(1)).is_err());
    }

    #[test]
    fn test_decode_return_uint() {
        assert_eq!(decode_return_uint(&abi_uint(1500)).unwrap(), U256::from(1500u64));
        assert!(decode_return_uint(&[]).is_err());
    }
}
