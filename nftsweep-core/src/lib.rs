//! Concurrent ERC-721 ownership sweep engine.
//!
//! ## Scope
//! Given a deduplicated set of wallet addresses and an ordered list of
//! contracts, this crate answers "does each wallet own at least one token in
//! any contract" under a bounded concurrency budget, with:
//!
//! - bounded exponential backoff and jitter for transient RPC failures,
//!   failing fast on contract-level rejections ([`retry`]);
//! - first-positive short-circuiting per wallet ([`scanner`]);
//! - a fixed-size worker pool streaming completions in finish order
//!   ([`pool`]);
//! - incremental, crash-safe CSV checkpointing so an interrupted run loses
//!   at most one batch ([`sink`]);
//! - cooperative cancellation that still flushes completed work
//!   ([`orchestrator`]).
//!
//! ## Flow
//! `Addresses -> Orchestrator -> WorkerPool -> ContractScanner ->
//! RetryPolicy(Evaluator) -> completion stream -> batches -> CsvSink`
//!
//! The remote protocol lives behind the [`evaluator::Evaluator`] trait; the
//! production implementation speaks JSON-RPC `eth_call`, tests script
//! outcomes directly.

pub mod abi;
pub mod config;
pub mod error;
pub mod evaluator;
pub mod orchestrator;
pub mod pool;
pub mod retry;
pub mod scanner;
pub mod sink;

pub use abi::{ContractHandle, build_handles};
pub use config::{RetryConfig, RpcConfig, SweepConfig};
pub use error::{Result, SweepError};
pub use evaluator::{Evaluator, RpcEvaluator};
pub use orchestrator::Orchestrator;
pub use retry::RetryPolicy;
pub use scanner::ScanContext;
pub use sink::{CsvSink, ResultSink};
