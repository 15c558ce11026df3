pub mod error;
pub mod file;

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;

use crate::types::event::EventId;
use crate::types::jobs::job_updates::LedgerUpdate;
use crate::types::jobs::record::JobRecord;
use crate::types::manifest::IterationManifest;
use crate::types::stage::Stage;
pub use error::LedgerError;
pub use file::FileJobLedger;

/// Durable store of the job records of one iteration.
///
/// It is the single source of truth for what has been dispatched and collected: every
/// mutation goes through [`JobLedger::update`] and is persisted before it returns.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait JobLedger: Send + Sync {
    /// get - The record of one (event, stage) pair
    async fn get(&self, event: &EventId, stage: Stage) -> Result<JobRecord, LedgerError>;
    /// update - Apply and persist a single-field mutation, returning the updated record
    async fn update(&self, event: &EventId, stage: Stage, update: LedgerUpdate) -> Result<JobRecord, LedgerError>;
    /// list_outstanding - Events with a submitted but not retrieved job for the stage
    async fn list_outstanding(&self, stage: Stage, events: &[EventId]) -> Result<BTreeSet<EventId>, LedgerError>;
    /// next_array_generation - Claim and persist a fresh array generation for the stage
    async fn next_array_generation(&self, stage: Stage) -> Result<u32, LedgerError>;
    async fn record_misfit(&self, event: &EventId, misfit: f64) -> Result<(), LedgerError>;
    async fn misfits(&self) -> Result<BTreeMap<EventId, f64>, LedgerError>;
    /// snapshot - A copy of the whole manifest, for reporting
    async fn snapshot(&self) -> Result<IterationManifest, LedgerError>;
}
