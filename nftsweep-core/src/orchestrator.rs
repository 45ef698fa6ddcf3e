//! Run coordination: feed the pool, drain completions, checkpoint batches.

use std::mem;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use nftsweep_model::{Address, OwnershipRecord, RunId, Summary, SweepEvent};

use crate::abi::ContractHandle;
use crate::config::SweepConfig;
use crate::error::Result;
use crate::evaluator::Evaluator;
use crate::pool;
use crate::retry::RetryPolicy;
use crate::scanner::ScanContext;
use crate::sink::ResultSink;

/// Buffer for the observational progress stream. Events overflowing a slow
/// consumer are dropped, never awaited.
const EVENT_BUFFER: usize = 256;

/// Coordinates one sweep run end to end.
///
/// The orchestrator owns the cancellation token and the drain loop; it never
/// performs a remote call itself. Every record the pool yields lands in
/// exactly one flushed batch, including the partial batch at the end of a
/// normal or cancelled run.
#[derive(Debug)]
pub struct Orchestrator {
    config: SweepConfig,
    run_id: RunId,
    cancel: CancellationToken,
    events: Option<mpsc::Sender<SweepEvent>>,
}

impl Orchestrator {
    pub fn new(config: SweepConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            run_id: RunId::new(),
            cancel: CancellationToken::new(),
            events: None,
        })
    }

    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    /// Token to cancel this run cooperatively (for example from Ctrl-C).
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Subscribe to progress events. Call before [`Orchestrator::run`].
    pub fn subscribe(&mut self) -> mpsc::Receiver<SweepEvent> {
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        self.events = Some(tx);
        rx
    }

    /// Scan every address and checkpoint results until the stream ends,
    /// normally or through cancellation. Returns the aggregate summary.
    ///
    /// A sink failure is fatal: continuing with undetected data loss would
    /// silently break the durability guarantee, so the run is aborted and
    /// the error surfaced.
    pub async fn run<S: ResultSink>(
        &self,
        addresses: Vec<Address>,
        contracts: Arc<[ContractHandle]>,
        evaluator: Arc<dyn Evaluator>,
        sink: &mut S,
    ) -> Result<Summary> {
        let started = Instant::now();
        let total = addresses.len();
        info!(
            run_id = %self.run_id,
            addresses = total,
            contracts = contracts.len(),
            concurrency = self.config.concurrency,
            "sweep started"
        );

        let ctx = Arc::new(ScanContext {
            evaluator,
            retry: RetryPolicy::new(&self.config.retry),
            contracts,
            cancel: self.cancel.clone(),
        });

        let mut completions = pool::run(addresses, ctx, self.config.concurrency);

        let mut batch: Vec<OwnershipRecord> = Vec::with_capacity(self.config.batch_size);
        let mut checked: u64 = 0;
        let mut positive: u64 = 0;
        let mut permanent_failures: u64 = 0;

        while let Some(record) = completions.recv().await {
            checked += 1;
            if record.owns {
                positive += 1;
            }
            permanent_failures += u64::from(record.permanent_failures);

            self.emit(SweepEvent::AddressChecked {
                run_id: self.run_id,
                address: record.address,
                owns: record.owns,
                completed: checked as usize,
                total,
            });

            batch.push(record);
            if batch.len() >= self.config.batch_size {
                self.flush(sink, mem::take(&mut batch)).await?;
                batch.reserve(self.config.batch_size);
            }
        }

        // Final flush covers the partial batch left by stream end or
        // cancellation; nothing the pool produced is ever dropped.
        self.flush(sink, batch).await?;

        let summary = Summary::from_counts(checked, positive, permanent_failures);
        let duration_secs = started.elapsed().as_secs();
        if self.cancel.is_cancelled() {
            info!(run_id = %self.run_id, checked, positive, "sweep cancelled, partial results flushed");
        } else {
            info!(
                run_id = %self.run_id,
                checked,
                positive,
                ratio = summary.ratio,
                duration_secs,
                "sweep complete"
            );
        }
        self.emit(SweepEvent::SweepComplete {
            run_id: self.run_id,
            summary,
            duration_secs,
        });

        Ok(summary)
    }

    async fn flush<S: ResultSink>(&self, sink: &mut S, batch: Vec<OwnershipRecord>) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }
        if let Err(err) = sink.append(batch).await {
            error!(run_id = %self.run_id, %err, "persistence failed, aborting run");
            // Stop feeding workers; the caller gets the error either way.
            self.cancel.cancel();
            return Err(err);
        }
        Ok(())
    }

    fn emit(&self, event: SweepEvent) {
        if let Some(tx) = &self.events {
            // Observational only: a full or dropped consumer never blocks.
            let _ = tx.try_send(event);
        }
    }
}
