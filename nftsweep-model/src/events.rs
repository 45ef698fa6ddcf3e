//! Progress events emitted while a sweep runs.
//!
//! Purely observational: consumers drive progress output from these, and a
//! slow or absent consumer never affects the run itself.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::address::Address;
use crate::outcome::Summary;

/// Identifier tying one run's events and log spans together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(pub Uuid);

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl RunId {
    pub fn new() -> Self {
        RunId(Uuid::now_v7())
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Events streamed from the orchestrator while addresses complete.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SweepEvent {
    AddressChecked {
        run_id: RunId,
        address: Address,
        owns: bool,
        completed: usize,
        total: usize,
    },
    SweepComplete {
        run_id: RunId,
        summary: Summary,
        duration_secs: u64,
    },
}
