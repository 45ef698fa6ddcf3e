//! Per-address contract walk with first-positive short-circuiting.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use nftsweep_model::{Address, EvalOutcome, FailureKind, OwnershipRecord};

use crate::abi::ContractHandle;
use crate::evaluator::Evaluator;
use crate::retry::RetryPolicy;

/// Immutable, shared context for every scan in one run. Built once before
/// the worker pool starts; workers only ever read it.
#[derive(Clone)]
pub struct ScanContext {
    pub evaluator: Arc<dyn Evaluator>,
    pub retry: RetryPolicy,
    pub contracts: Arc<[ContractHandle]>,
    pub cancel: CancellationToken,
}

impl std::fmt::Debug for ScanContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScanContext")
            .field("retry", &self.retry)
            .field("contracts", &self.contracts.len())
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}

/// Walk the contract list in order and stop at the first positive balance.
///
/// Failures never abort the walk: a failed contract counts as not-owning and
/// the next contract still gets its chance. The cancellation token is checked
/// between contracts so an interrupted run winds down promptly without
/// abandoning the record accumulated so far.
pub async fn scan_address(ctx: &ScanContext, address: Address) -> OwnershipRecord {
    let mut record = OwnershipRecord::negative(address);
    for contract in ctx.contracts.iter() {
        if ctx.cancel.is_cancelled() {
            debug!(%address, "scan interrupted by cancellation");
            return record;
        }
        let outcome = ctx
            .retry
            .attempt(|| ctx.evaluator.evaluate(&address, contract))
            .await;
        match outcome {
            EvalOutcome::Positive => {
                record.owns = true;
                debug!(%address, contract = %contract.address, "owns a token");
                return record;
            }
            EvalOutcome::Negative => {}
            EvalOutcome::Failed { kind, message } => {
                debug!(%address, contract = %contract.address, ?kind, %message, "contract attempt failed");
                if kind == FailureKind::Permanent {
                    record.permanent_failures += 1;
                }
            }
        }
    }
    record
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;
    use nftsweep_model::ContractAddress;

    use crate::config::RetryConfig;

    fn test_address(tag: u8) -> Address {
        Address::from_bytes([tag; 20])
    }

    fn test_contracts(n: u8) -> Arc<[ContractHandle]> {
        (0..n)
            .map(|i| ContractHandle {
                address: format!("0x{}", hex::encode([i + 1; 20]))
                    .parse::<ContractAddress>()
                    .unwrap(),
                selector: [0x70, 0xa0, 0x82, 0x31],
            })
            .collect()
    }

    /// Evaluator scripted per (address, contract index); unscripted pairs
    /// answer `Negative`. Counts every call.
    struct ScriptedEvaluator {
        outcomes: HashMap<(Address, usize), EvalOutcome>,
        contracts: Vec<ContractAddress>,
        pub calls: AtomicU32,
    }

    impl ScriptedEvaluator {
        pub fn new(contracts: &[ContractHandle]) -> Self {
            Self {
                outcomes: HashMap::new(),
                contracts: contracts.iter().map(|c| c.address).collect(),
                calls: AtomicU32::new(0),
            }
        }

        pub fn script(mut self, address: Address, contract_idx: usize, outcome: EvalOutcome) -> Self {
            self.outcomes.insert((address, contract_idx), outcome);
            self
        }
    }

    #[async_trait]
    impl Evaluator for ScriptedEvaluator {
        async fn evaluate(&self, owner: &Address, contract: &ContractHandle) -> EvalOutcome {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let idx = self
                .contracts
                .iter()
                .position(|c| *c == contract.address)
                .unwrap();
            self.outcomes
                .get(&(*owner, idx))
                .cloned()
                .unwrap_or(EvalOutcome::Negative)
        }
    }

    fn context(evaluator: Arc<ScriptedEvaluator>, contracts: Arc<[ContractHandle]>) -> ScanContext {
        ScanContext {
            evaluator,
            retry: RetryPolicy::new(&RetryConfig {
                max_attempts: 1,
                base_delay_ms: 1,
                jitter: 0.0,
            }),
            contracts,
            cancel: CancellationToken::new(),
        }
    }

    #[tokio::test]
    async fn short_circuits_on_first_positive() {
        let contracts = test_contracts(3);
        let address = test_address(1);
        let evaluator = Arc::new(
            ScriptedEvaluator::new(&contracts).script(address, 0, EvalOutcome::Positive),
        );
        let ctx = context(evaluator.clone(), contracts);

        let record = scan_address(&ctx, address).await;
        assert!(record.owns);
        // Contracts after the first positive must never be called.
        assert_eq!(evaluator.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn positive_on_later_contract_counts_prior_calls() {
        let contracts = test_contracts(3);
        let address = test_address(2);
        let evaluator = Arc::new(
            ScriptedEvaluator::new(&contracts).script(address, 2, EvalOutcome::Positive),
        );
        let ctx = context(evaluator.clone(), contracts);

        let record = scan_address(&ctx, address).await;
        assert!(record.owns);
        assert_eq!(evaluator.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn all_negative_exhausts_the_list() {
        let contracts = test_contracts(4);
        let address = test_address(3);
        let evaluator = Arc::new(ScriptedEvaluator::new(&contracts));
        let ctx = context(evaluator.clone(), contracts);

        let record = scan_address(&ctx, address).await;
        assert!(!record.owns);
        assert_eq!(record.permanent_failures, 0);
        assert_eq!(evaluator.calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn failures_do_not_block_later_contracts() {
        let contracts = test_contracts(3);
        let address = test_address(4);
        let evaluator = Arc::new(
            ScriptedEvaluator::new(&contracts)
                .script(address, 0, EvalOutcome::permanent("reverted"))
                .script(address, 1, EvalOutcome::transient("flaky"))
                .script(address, 2, EvalOutcome::Positive),
        );
        let ctx = context(evaluator.clone(), contracts);

        let record = scan_address(&ctx, address).await;
        assert!(record.owns);
        assert_eq!(record.permanent_failures, 1);
        assert_eq!(evaluator.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn empty_contract_list_is_negative_without_calls() {
        let contracts = test_contracts(0);
        let address = test_address(5);
        let evaluator = Arc::new(ScriptedEvaluator::new(&contracts));
        let ctx = context(evaluator.clone(), contracts);

        let record = scan_address(&ctx, address).await;
        assert!(!record.owns);
        assert_eq!(evaluator.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn cancelled_token_stops_before_any_call() {
        let contracts = test_contracts(3);
        let address = test_address(6);
        let evaluator = Arc::new(ScriptedEvaluator::new(&contracts));
        let ctx = context(evaluator.clone(), contracts);
        ctx.cancel.cancel();

        let record = scan_address(&ctx, address).await;
        assert!(!record.owns);
        assert_eq!(evaluator.calls.load(Ordering::SeqCst), 0);
    }
}
