//! Ethereum address newtypes with EIP-55 checksum validation.
//!
//! Both [`Address`] (a wallet being audited) and [`ContractAddress`] (an
//! ERC-721 contract it is audited against) can only be constructed through
//! validation, so every value flowing through the engine is already in
//! canonical checksummed form.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha3::{Digest, Keccak256};

use crate::error::ModelError;

/// A validated 20-byte Ethereum account address.
///
/// Stored as raw bytes; `Display` renders the EIP-55 checksummed form.
/// Parsing accepts all-lowercase and all-uppercase hex unconditionally and
/// requires mixed-case input to match its checksum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address([u8; 20]);

impl Address {
    pub fn from_bytes(bytes: [u8; 20]) -> Self {
        Address(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// The `0x`-prefixed EIP-55 checksummed rendering.
    pub fn to_checksummed(&self) -> String {
        let lower = hex::encode(self.0);
        let digest = Keccak256::digest(lower.as_bytes());
        let mut out = String::with_capacity(42);
        out.push_str("0x");
        for (i, ch) in lower.chars().enumerate() {
            let nibble = (digest[i / 2] >> (4 * (1 - i % 2))) & 0xf;
            if ch.is_ascii_alphabetic() && nibble >= 8 {
                out.push(ch.to_ascii_uppercase());
            } else {
                out.push(ch);
            }
        }
        out
    }
}

impl FromStr for Address {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex_part = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .ok_or_else(|| ModelError::InvalidAddress(format!("missing 0x prefix: {s}")))?;
        if hex_part.len() != 40 {
            return Err(ModelError::InvalidAddress(format!(
                "expected 40 hex digits, got {}: {s}",
                hex_part.len()
            )));
        }
        let mut bytes = [0u8; 20];
        hex::decode_to_slice(hex_part, &mut bytes)
            .map_err(|_| ModelError::InvalidAddress(format!("non-hex digit in {s}")))?;
        let address = Address(bytes);

        let has_upper = hex_part.chars().any(|c| c.is_ascii_uppercase());
        let has_lower = hex_part.chars().any(|c| c.is_ascii_lowercase());
        if has_upper && has_lower {
            // Mixed case carries checksum information and must round-trip.
            let checksummed = address.to_checksummed();
            if checksummed[2..] != *hex_part {
                return Err(ModelError::ChecksumMismatch(s.to_string()));
            }
        }
        Ok(address)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_checksummed())
    }
}

impl TryFrom<String> for Address {
    type Error = ModelError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Address> for String {
    fn from(value: Address) -> Self {
        value.to_checksummed()
    }
}

/// A validated address of an ERC-721 contract.
///
/// Same syntactic rules as [`Address`]; kept as a distinct type so a wallet
/// can never be passed where a contract is expected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContractAddress(Address);

impl ContractAddress {
    pub fn as_bytes(&self) -> &[u8; 20] {
        self.0.as_bytes()
    }

    pub fn to_checksummed(&self) -> String {
        self.0.to_checksummed()
    }
}

impl FromStr for ContractAddress {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(ContractAddress)
    }
}

impl fmt::Display for ContractAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for ContractAddress {
    type Error = ModelError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ContractAddress> for String {
    fn from(value: ContractAddress) -> Self {
        value.to_checksummed()
    }
}
