//! Bounded exponential backoff around a single evaluation call.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::warn;

use nftsweep_model::{EvalOutcome, FailureKind};

use crate::config::RetryConfig;

/// Retry policy for one evaluation call.
///
/// Pure apart from the sleeps: attempt counting restarts on every call to
/// [`RetryPolicy::attempt`] and no state is shared across calls.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    jitter: f64,
}

impl RetryPolicy {
    pub fn new(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: config.base_delay(),
            jitter: config.jitter,
        }
    }

    /// Drive `op` until it yields a result, a permanent failure, or the
    /// attempt budget is spent. Only `Failed(Transient)` consumes retries;
    /// the sleep before attempt `n+1` is `base * 2^(n-1) * (1 + U)` with
    /// `U ~ Uniform[0, jitter)`.
    pub async fn attempt<F, Fut>(&self, mut op: F) -> EvalOutcome
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = EvalOutcome>,
    {
        let mut delay = self.base_delay;
        let mut attempt = 1;
        loop {
            let outcome = op().await;
            let retryable = matches!(
                outcome,
                EvalOutcome::Failed {
                    kind: FailureKind::Transient,
                    ..
                }
            );
            if !retryable || attempt >= self.max_attempts {
                return outcome;
            }
            if let EvalOutcome::Failed { message, .. } = &outcome {
                warn!(attempt, max = self.max_attempts, %message, "transient failure, backing off");
            }
            tokio::time::sleep(self.jittered(delay)).await;
            delay = delay.saturating_mul(2);
            attempt += 1;
        }
    }

    fn jittered(&self, delay: Duration) -> Duration {
        if self.jitter <= 0.0 {
            return delay;
        }
        let factor = 1.0 + rand::rng().random_range(0.0..self.jitter);
        delay.mul_f64(factor)
    }
}
