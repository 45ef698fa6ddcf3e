//! Input file loading: address lists and the ABI descriptor.

use std::collections::HashSet;
use std::path::Path;

use anyhow::Context;
use tracing::warn;

use nftsweep_model::{Address, ContractAddress};

/// Read a line-per-entry list: trimmed, blank lines dropped, duplicates
/// removed while preserving first-seen order.
pub fn load_lines(path: &Path) -> anyhow::Result<Vec<String>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    let mut seen = HashSet::new();
    Ok(raw
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter(|line| seen.insert(line.to_string()))
        .map(str::to_string)
        .collect())
}

/// Parse wallet addresses, skipping invalid entries with a warning.
///
/// Deduplicates on the parsed value: the same address spelled lowercase and
/// checksummed is still one wallet.
pub fn parse_addresses(lines: &[String]) -> Vec<Address> {
    let mut seen = HashSet::new();
    parse_skipping_invalid(lines, "address")
        .into_iter()
        .filter(|address| seen.insert(*address))
        .collect()
}

/// Parse contract addresses, skipping invalid entries with a warning.
pub fn parse_contracts(lines: &[String]) -> Vec<ContractAddress> {
    parse_skipping_invalid(lines, "contract address")
}

fn parse_skipping_invalid<T>(lines: &[String], what: &str) -> Vec<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let mut parsed = Vec::with_capacity(lines.len());
    for line in lines {
        match line.parse::<T>() {
            Ok(value) => parsed.push(value),
            Err(err) => warn!(%err, "invalid {what} skipped: {line}"),
        }
    }
    parsed
}

/// Read the ABI descriptor file as raw JSON text; validation happens when
/// the contract handles are built.
pub fn load_abi(path: &Path) -> anyhow::Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("reading ABI {}", path.display()))
}
