//! Core data model definitions shared across nftsweep crates.

pub mod address;
pub mod error;
pub mod events;
pub mod outcome;

// Intentionally curated re-exports for downstream consumers.
pub use address::{Address, ContractAddress};
pub use error::{ModelError, Result as ModelResult};
pub use events::{RunId, SweepEvent};
pub use outcome::{EvalOutcome, FailureKind, OwnershipRecord, Summary};
