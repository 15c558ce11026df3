use std::collections::{BTreeMap, BTreeSet};
use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tempfile::NamedTempFile;
use tokio::sync::Mutex;

use super::{JobLedger, LedgerError};
use crate::types::batch::Batch;
use crate::types::event::EventId;
use crate::types::jobs::job_updates::LedgerUpdate;
use crate::types::jobs::record::JobRecord;
use crate::types::manifest::IterationManifest;
use crate::types::stage::{PipelineLayout, Stage};

/// Ledger backed by one JSON manifest per iteration (`<dir>/<iteration>.json`).
///
/// Each update is applied to a copy of the manifest, written to a temporary file next to
/// it and renamed over the original. The in-memory manifest is only replaced once the
/// rename succeeded, so memory never runs ahead of disk.
#[derive(Debug)]
pub struct FileJobLedger {
    path: PathBuf,
    manifest: Mutex<IterationManifest>,
}

impl FileJobLedger {
    /// Creates the manifest for an iteration, or re-opens it if it already exists.
    ///
    /// Re-opening is how a restarted run resumes: the existing records are kept as they are,
    /// provided the manifest was created for the same layout and covers every participant.
    pub async fn create_iteration(
        dir: &Path,
        iteration: &str,
        layout: PipelineLayout,
        batch: &Batch,
    ) -> Result<Self, LedgerError> {
        let path = manifest_path(dir, iteration)?;

        if tokio::fs::try_exists(&path).await.map_err(|e| LedgerError::io(&path, e))? {
            let ledger = Self::open(dir, iteration).await?;
            ledger.check_matches(layout, batch).await?;
            tracing::info!(iteration = %iteration, path = %path.display(), "Resuming iteration from existing manifest");
            return Ok(ledger);
        }

        tokio::fs::create_dir_all(dir).await.map_err(|e| LedgerError::io(dir, e))?;
        let manifest = IterationManifest::new(iteration, layout, batch);
        persist(&path, &manifest).await?;
        tracing::info!(
            iteration = %iteration,
            events = manifest.events.len(),
            path = %path.display(),
            "Created iteration manifest"
        );
        Ok(Self { path, manifest: Mutex::new(manifest) })
    }

    /// Loads the manifest of an existing iteration.
    pub async fn open(dir: &Path, iteration: &str) -> Result<Self, LedgerError> {
        let path = manifest_path(dir, iteration)?;
        let content = tokio::fs::read(&path).await.map_err(|e| LedgerError::io(&path, e))?;
        let manifest: IterationManifest = serde_json::from_slice(&content)?;
        if manifest.iteration != iteration {
            return Err(LedgerError::ManifestMismatch {
                path,
                reason: format!("manifest belongs to iteration {}", manifest.iteration),
            });
        }
        Ok(Self { path, manifest: Mutex::new(manifest) })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn check_matches(&self, layout: PipelineLayout, batch: &Batch) -> Result<(), LedgerError> {
        let manifest = self.manifest.lock().await;
        if manifest.layout != layout {
            return Err(LedgerError::ManifestMismatch {
                path: self.path.clone(),
                reason: "pipeline layout changed since the iteration was created".to_string(),
            });
        }
        if let Some(missing) = batch.participants().find(|event| !manifest.events.contains_key(*event)) {
            return Err(LedgerError::ManifestMismatch {
                path: self.path.clone(),
                reason: format!("event {missing} is not part of the iteration"),
            });
        }
        Ok(())
    }
}

fn manifest_path(dir: &Path, iteration: &str) -> Result<PathBuf, LedgerError> {
    if iteration.is_empty() || iteration.contains(['/', '\\']) || iteration.starts_with('.') {
        return Err(LedgerError::InvalidIterationName(iteration.to_string()));
    }
    Ok(dir.join(format!("{iteration}.json")))
}

/// Atomically replaces the manifest file with the serialized manifest.
async fn persist(path: &Path, manifest: &IterationManifest) -> Result<(), LedgerError> {
    let bytes = serde_json::to_vec_pretty(manifest)?;
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || write_atomically(&path, &bytes))
        .await
        .map_err(|e| LedgerError::WriterTask(e.to_string()))?
}

fn write_atomically(path: &Path, bytes: &[u8]) -> Result<(), LedgerError> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut file = NamedTempFile::new_in(dir).map_err(|e| LedgerError::io(dir, e))?;
    file.write_all(bytes).map_err(|e| LedgerError::io(file.path(), e))?;
    file.as_file().sync_all().map_err(|e| LedgerError::io(file.path(), e))?;
    file.persist(path).map_err(|e| LedgerError::io(path, e.error))?;
    Ok(())
}

#[async_trait]
impl JobLedger for FileJobLedger {
    async fn get(&self, event: &EventId, stage: Stage) -> Result<JobRecord, LedgerError> {
        self.manifest.lock().await.record(event, stage).cloned()
    }

    async fn update(&self, event: &EventId, stage: Stage, update: LedgerUpdate) -> Result<JobRecord, LedgerError> {
        let mut manifest = self.manifest.lock().await;
        let mut updated = manifest.clone();
        updated.apply(event, stage, &update)?;
        persist(&self.path, &updated).await?;

        *manifest = updated;
        tracing::debug!(
            event = %event,
            stage = %stage,
            field = update.field(),
            update = ?update,
            "Ledger updated"
        );
        manifest.record(event, stage).cloned()
    }

    async fn list_outstanding(&self, stage: Stage, events: &[EventId]) -> Result<BTreeSet<EventId>, LedgerError> {
        Ok(self.manifest.lock().await.outstanding(stage, events).into_iter().collect())
    }

    async fn next_array_generation(&self, stage: Stage) -> Result<u32, LedgerError> {
        let mut manifest = self.manifest.lock().await;
        let mut updated = manifest.clone();
        let generation = updated.next_array_generation(stage);
        persist(&self.path, &updated).await?;
        *manifest = updated;
        tracing::debug!(stage = %stage, generation, "Array generation claimed");
        Ok(generation)
    }

    async fn record_misfit(&self, event: &EventId, misfit: f64) -> Result<(), LedgerError> {
        let mut manifest = self.manifest.lock().await;
        if !manifest.events.contains_key(event) {
            return Err(LedgerError::ManifestMismatch {
                path: self.path.clone(),
                reason: format!("cannot record a misfit for unknown event {event}"),
            });
        }
        let mut updated = manifest.clone();
        updated.misfits.insert(event.clone(), misfit);
        persist(&self.path, &updated).await?;
        *manifest = updated;
        Ok(())
    }

    async fn misfits(&self) -> Result<BTreeMap<EventId, f64>, LedgerError> {
        Ok(self.manifest.lock().await.misfits.clone())
    }

    async fn snapshot(&self) -> Result<IterationManifest, LedgerError> {
        Ok(self.manifest.lock().await.clone())
    }
}
