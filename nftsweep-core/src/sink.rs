//! Durable, batch-at-a-time CSV persistence.

use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, warn};

use nftsweep_model::{Address, OwnershipRecord};

use crate::error::{Result, SweepError};

/// Column header matching the historical output format.
const HEADER: &str = "Address,Owns NFT";

/// Destination for completed batches.
///
/// `&mut self` keeps appends serialized by construction: the orchestrator is
/// the single producer and at most one append is ever in flight.
#[async_trait]
pub trait ResultSink: Send {
    async fn append(&mut self, batch: Vec<OwnershipRecord>) -> Result<()>;
}

/// Appends result rows to a CSV file, one durable write per batch.
///
/// Every append serializes the whole batch (plus the header when the file is
/// fresh) into one buffer, hands it to a single `write_all` on the
/// append-mode handle, then `sync_data`s. No partial row is ever issued, so
/// an interrupted run loses at most the final unsynced batch and never
/// leaves the file structurally corrupt.
#[derive(Debug)]
pub struct CsvSink {
    path: PathBuf,
    file: Option<File>,
}

impl CsvSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            file: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Addresses already persisted by earlier runs against this file.
    ///
    /// Committed records are never re-checked: the caller subtracts these
    /// from the input set before starting the pool. Rows that fail to parse
    /// are skipped with a warning rather than aborting startup.
    pub fn existing_addresses(path: &Path) -> Result<HashSet<Address>> {
        if !path.exists() {
            return Ok(HashSet::new());
        }
        let raw = std::fs::read_to_string(path)?;
        let mut seen = HashSet::new();
        for (lineno, line) in raw.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line == HEADER {
                continue;
            }
            let Some((field, _)) = line.split_once(',') else {
                warn!(lineno, "skipping malformed result row");
                continue;
            };
            match field.parse::<Address>() {
                Ok(address) => {
                    seen.insert(address);
                }
                Err(err) => warn!(lineno, %err, "skipping unparseable address in results"),
            }
        }
        Ok(seen)
    }

    fn open(&self) -> std::io::Result<(File, bool)> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let fresh = file.metadata()?.len() == 0;
        Ok((file, fresh))
    }
}

#[async_trait]
impl ResultSink for CsvSink {
    async fn append(&mut self, batch: Vec<OwnershipRecord>) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }

        let (mut file, fresh) = match self.file.take() {
            Some(file) => (file, false),
            None => self
                .open()
                .map_err(|e| SweepError::Persistence(format!("open {}: {e}", self.path.display())))?,
        };

        let mut buffer = String::new();
        if fresh {
            buffer.push_str(HEADER);
            buffer.push('\n');
        }
        for record in &batch {
            buffer.push_str(&record.address.to_checksummed());
            buffer.push(',');
            buffer.push_str(if record.owns { "true" } else { "false" });
            buffer.push('\n');
        }

        let path = self.path.clone();
        let rows = batch.len();
        let written = tokio::task::spawn_blocking(move || -> std::io::Result<File> {
            file.write_all(buffer.as_bytes())?;
            file.sync_data()?;
            Ok(file)
        })
        .await
        .map_err(|e| SweepError::Persistence(format!("append task failed: {e}")))?;

        match written {
            Ok(file) => {
                debug!(rows, path = %path.display(), "batch persisted");
                self.file = Some(file);
                Ok(())
            }
            Err(e) => Err(SweepError::Persistence(format!(
                "append to {}: {e}",
                path.display()
            ))),
        }
    }
}
