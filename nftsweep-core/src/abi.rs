//! ERC-721 interface descriptor parsing and call encoding.
//!
//! The sweep only ever needs one entry point, `balanceOf(address)`, but the
//! selector is derived from the user-supplied ABI rather than hardcoded so a
//! descriptor that does not actually expose the function fails up front,
//! before any worker starts.

use serde::Deserialize;
use sha3::{Digest, Keccak256};

use nftsweep_model::{Address, ContractAddress};

use crate::error::{Result, SweepError};

/// One entry of a JSON ABI array. Fields we do not consult are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct AbiEntry {
    #[serde(default, rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub inputs: Vec<AbiParam>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AbiParam {
    #[serde(default, rename = "type")]
    pub kind: String,
}

/// Pre-built, immutable handle for one contract: its address plus the
/// resolved `balanceOf` selector. Shared read-only across all workers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContractHandle {
    pub address: ContractAddress,
    pub selector: [u8; 4],
}

/// Parse the descriptor and resolve the `balanceOf(address)` selector.
///
/// The descriptor must be a JSON array of entries (the standard ABI layout)
/// containing a function named `balanceOf` with exactly one `address` input.
pub fn balance_of_selector(raw: &str) -> Result<[u8; 4]> {
    let entries: Vec<AbiEntry> = serde_json::from_str(raw)
        .map_err(|e| SweepError::InvalidAbi(format!("not a JSON ABI array: {e}")))?;

    let function = entries
        .iter()
        .find(|entry| entry.kind == "function" && entry.name == "balanceOf")
        .ok_or_else(|| SweepError::InvalidAbi("no balanceOf function in descriptor".into()))?;

    if function.inputs.len() != 1 || function.inputs[0].kind != "address" {
        return Err(SweepError::InvalidAbi(
            "balanceOf must take a single address argument".into(),
        ));
    }

    let signature = "balanceOf(address)";
    let digest = Keccak256::digest(signature.as_bytes());
    let mut selector = [0u8; 4];
    selector.copy_from_slice(&digest[..4]);
    Ok(selector)
}

/// Build one immutable handle per contract, in list order.
pub fn build_handles(contracts: &[ContractAddress], abi_raw: &str) -> Result<Vec<ContractHandle>> {
    let selector = balance_of_selector(abi_raw)?;
    Ok(contracts
        .iter()
        .map(|&address| ContractHandle { address, selector })
        .collect())
}

/// ABI-encode a `balanceOf(owner)` call as `0x`-prefixed hex calldata.
pub fn encode_balance_of(handle: &ContractHandle, owner: &Address) -> String {
    // 4-byte selector + the address left-padded to a 32-byte word.
    let mut data = Vec::with_capacity(4 + 32);
    data.extend_from_slice(&handle.selector);
    data.extend_from_slice(&[0u8; 12]);
    data.extend_from_slice(owner.as_bytes());
    format!("0x{}", hex::encode(data))
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL_ABI: &str = r#"[
        {
            "type": "function",
            "name": "balanceOf",
            "inputs": [{ "name": "owner", "type": "address" }],
            "outputs": [{ "name": "", "type": "uint256" }]
        }
    ]"#;

    #[test]
    fn derives_the_canonical_selector() {
        // keccak256("balanceOf(address)")[..4]
        assert_eq!(balance_of_selector(MINIMAL_ABI).unwrap(), [0x70, 0xa0, 0x82, 0x31]);
    }

    #[test]
    fn rejects_descriptors_without_balance_of() {
        let abi = r#"[{ "type": "function", "name": "ownerOf", "inputs": [] }]"#;
        assert!(matches!(
            balance_of_selector(abi),
            Err(SweepError::InvalidAbi(_))
        ));
    }

    #[test]
    fn rejects_non_array_descriptors() {
        assert!(balance_of_selector(r#"{"name": "balanceOf"}"#).is_err());
    }

    #[test]
    fn encodes_owner_into_calldata() {
        let owner: Address = "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed"
            .parse()
            .unwrap();
        let contract: ContractAddress = "0xdbF03B407c01E7cD3CBea99509d93f8DDDC8C6FB"
            .parse()
            .unwrap();
        let handles = build_handles(&[contract], MINIMAL_ABI).unwrap();
        let calldata = encode_balance_of(&handles[0], &owner);
        assert_eq!(
            calldata,
            "0x70a08231\
             000000000000000000000000\
             5aaeb6053f3e94c9b9a09f33669435e7ef1beaed"
        );
    }
}
