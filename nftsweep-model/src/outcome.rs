//! Evaluation outcomes and per-run result types.

use serde::{Deserialize, Serialize};

use crate::address::Address;

/// Classification of one failed evaluation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Worth retrying: timeouts, transport errors, rate limiting.
    Transient,
    /// The call is logically invalid for this input; retrying cannot help.
    Permanent,
}

/// Result of evaluating one address against one contract.
///
/// Produced once per attempt and never mutated. Failures are data, not
/// errors: the scanner folds them into the per-address record instead of
/// propagating them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EvalOutcome {
    /// The address holds at least one token in the contract.
    Positive,
    /// The address holds no tokens in the contract.
    Negative,
    /// The attempt failed; `kind` decides whether a retry makes sense.
    Failed { kind: FailureKind, message: String },
}

impl EvalOutcome {
    pub fn transient(message: impl Into<String>) -> Self {
        EvalOutcome::Failed {
            kind: FailureKind::Transient,
            message: message.into(),
        }
    }

    pub fn permanent(message: impl Into<String>) -> Self {
        EvalOutcome::Failed {
            kind: FailureKind::Permanent,
            message: message.into(),
        }
    }
}

/// Final disposition for one address: does it own anything, anywhere?
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnershipRecord {
    pub address: Address,
    pub owns: bool,
    /// Contracts that rejected the call outright (`Failed(Permanent)`).
    /// Counted as not-owning, but surfaced so logic errors stay visible.
    pub permanent_failures: u32,
}

impl OwnershipRecord {
    pub fn negative(address: Address) -> Self {
        OwnershipRecord {
            address,
            owns: false,
            permanent_failures: 0,
        }
    }
}

/// Aggregate counters reported at the end of a run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    /// Addresses that produced a record this run (partial under cancellation).
    pub checked: u64,
    /// Addresses owning at least one token.
    pub positive: u64,
    /// Total `Failed(Permanent)` contract attempts across all records.
    pub permanent_failures: u64,
    /// `positive / checked`, `0.0` when nothing was checked.
    pub ratio: f64,
}

impl Summary {
    pub fn from_counts(checked: u64, positive: u64, permanent_failures: u64) -> Self {
        let ratio = if checked == 0 {
            0.0
        } else {
            positive as f64 / checked as f64
        };
        Summary {
            checked,
            positive,
            permanent_failures,
            ratio,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ratio_handles_empty_run() {
        let summary = Summary::from_counts(0, 0, 0);
        assert_eq!(summary.ratio, 0.0);
    }

    #[test]
    fn ratio_is_positive_over_checked() {
        let summary = Summary::from_counts(3, 2, 0);
        assert!((summary.ratio - 2.0 / 3.0).abs() < 1e-9);
    }
}
