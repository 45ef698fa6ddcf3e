//! The evaluation seam and its JSON-RPC production implementation.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;
use url::Url;

use nftsweep_model::{Address, EvalOutcome};

use crate::abi::{self, ContractHandle};
use crate::config::RpcConfig;
use crate::error::{Result, SweepError};

/// One blocking-from-the-worker's-perspective remote check.
///
/// Implementations classify their own failures: the engine never sees an
/// `Err` from an evaluation, only an [`EvalOutcome`].
#[async_trait]
pub trait Evaluator: Send + Sync {
    async fn evaluate(&self, owner: &Address, contract: &ContractHandle) -> EvalOutcome;
}

/// Checks `balanceOf(owner) > 0` through an Ethereum JSON-RPC endpoint.
///
/// The `reqwest::Client` is built once with the per-call timeout and shared
/// by every worker; it pools connections internally.
#[derive(Debug, Clone)]
pub struct RpcEvaluator {
    client: reqwest::Client,
    url: Url,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<String>,
    #[serde(default)]
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
}

impl RpcEvaluator {
    pub fn new(config: &RpcConfig) -> Result<Self> {
        if config.url.is_empty() {
            return Err(SweepError::InvalidConfig("rpc.url is required".into()));
        }
        let url = Url::parse(&config.url)
            .map_err(|e| SweepError::InvalidConfig(format!("rpc.url: {e}")))?;
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| SweepError::Internal(format!("http client: {e}")))?;
        Ok(Self { client, url })
    }
}

#[async_trait]
impl Evaluator for RpcEvaluator {
    async fn evaluate(&self, owner: &Address, contract: &ContractHandle) -> EvalOutcome {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "eth_call",
            "params": [
                {
                    "to": contract.address.to_checksummed(),
                    "data": abi::encode_balance_of(contract, owner),
                },
                "latest",
            ],
        });

        let response = match self.client.post(self.url.clone()).json(&body).send().await {
            Ok(response) => response,
            Err(err) if err.is_timeout() => {
                return EvalOutcome::transient(format!("request timed out: {err}"));
            }
            Err(err) => {
                return EvalOutcome::transient(format!("transport error: {err}"));
            }
        };

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return EvalOutcome::transient("rate limited (HTTP 429)");
        }
        if !status.is_success() {
            return EvalOutcome::transient(format!("HTTP {status}"));
        }

        let parsed: RpcResponse = match response.json().await {
            Ok(parsed) => parsed,
            Err(err) => return EvalOutcome::transient(format!("malformed response: {err}")),
        };

        classify_rpc_response(parsed)
    }
}

/// Map a decoded JSON-RPC body to an outcome.
///
/// Execution reverts are contract-level rejections of this exact call, so
/// they are permanent; every other RPC error is assumed to be a server-side
/// hiccup worth retrying.
fn classify_rpc_response(response: RpcResponse) -> EvalOutcome {
    if let Some(error) = response.error {
        let reverted = error.code == 3 || error.message.to_lowercase().contains("revert");
        debug!(code = error.code, message = %error.message, "rpc error");
        if reverted {
            return EvalOutcome::permanent(format!("execution reverted: {}", error.message));
        }
        return EvalOutcome::transient(format!("rpc error {}: {}", error.code, error.message));
    }

    match response.result {
        Some(result) => {
            let digits = result.trim_start_matches("0x");
            if digits.chars().any(|c| c != '0') {
                EvalOutcome::Positive
            } else {
                EvalOutcome::Negative
            }
        }
        None => EvalOutcome::transient("response carried neither result nor error"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nftsweep_model::FailureKind;

    fn decode(raw: &str) -> EvalOutcome {
        classify_rpc_response(serde_json::from_str(raw).unwrap())
    }

    #[test]
    fn nonzero_balance_is_positive() {
        let outcome = decode(
            r#"{"jsonrpc":"2.0","id":1,"result":"0x0000000000000000000000000000000000000000000000000000000000000002"}"#,
        );
        assert_eq!(outcome, EvalOutcome::Positive);
    }

    #[test]
    fn zero_balance_is_negative() {
        let outcome = decode(
            r#"{"jsonrpc":"2.0","id":1,"result":"0x0000000000000000000000000000000000000000000000000000000000000000"}"#,
        );
        assert_eq!(outcome, EvalOutcome::Negative);
    }

    #[test]
    fn revert_is_permanent() {
        let outcome = decode(
            r#"{"jsonrpc":"2.0","id":1,"error":{"code":3,"message":"execution reverted"}}"#,
        );
        assert!(matches!(
            outcome,
            EvalOutcome::Failed {
                kind: FailureKind::Permanent,
                ..
            }
        ));
    }

    #[test]
    fn server_errors_are_transient() {
        let outcome = decode(
            r#"{"jsonrpc":"2.0","id":1,"error":{"code":-32005,"message":"project limit exceeded"}}"#,
        );
        assert!(matches!(
            outcome,
            EvalOutcome::Failed {
                kind: FailureKind::Transient,
                ..
            }
        ));
    }

    #[test]
    fn empty_body_is_transient() {
        let outcome = decode(r#"{"jsonrpc":"2.0","id":1}"#);
        assert!(matches!(
            outcome,
            EvalOutcome::Failed {
                kind: FailureKind::Transient,
                ..
            }
        ));
    }
}
