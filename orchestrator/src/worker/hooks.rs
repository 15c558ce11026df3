use std::path::PathBuf;

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::job::HookError;
use crate::types::event::EventId;
use crate::types::stage::Stage;

pub const DEFAULT_MISFIT_FILE: &str = "misfit.json";

/// What the orchestrator knows about a job it just retrieved.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievalContext {
    pub iteration: String,
    pub event: EventId,
    pub stage: Stage,
    /// The stage is the one whose outputs carry the event's misfit.
    pub yields_misfit: bool,
    /// Local copy of the job outputs, when the stage fetches them.
    pub output_dir: Option<PathBuf>,
}

/// Light local post-step run after a job's outputs are fetched and before the job is
/// marked retrieved. It may yield a misfit value for the event.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RetrievalHook: Send + Sync {
    async fn after_retrieval(&self, ctx: &RetrievalContext) -> Result<Option<f64>, HookError>;
}

pub struct NoopRetrievalHook;

#[async_trait]
impl RetrievalHook for NoopRetrievalHook {
    async fn after_retrieval(&self, _ctx: &RetrievalContext) -> Result<Option<f64>, HookError> {
        Ok(None)
    }
}

/// Reads the misfit the remote processing wrote next to its outputs.
///
/// The file holds either a bare number or an object with a `misfit` field.
pub struct MisfitFileHook {
    file_name: String,
}

impl MisfitFileHook {
    pub fn new(file_name: impl Into<String>) -> Self {
        Self { file_name: file_name.into() }
    }
}

impl Default for MisfitFileHook {
    fn default() -> Self {
        Self::new(DEFAULT_MISFIT_FILE)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum MisfitDocument {
    Bare(f64),
    Object { misfit: f64 },
}

#[async_trait]
impl RetrievalHook for MisfitFileHook {
    async fn after_retrieval(&self, ctx: &RetrievalContext) -> Result<Option<f64>, HookError> {
        if !ctx.yields_misfit {
            return Ok(None);
        }
        let output_dir = ctx.output_dir.as_ref().ok_or(HookError::MissingOutputs)?;
        let path = output_dir.join(&self.file_name);

        let content =
            tokio::fs::read_to_string(&path).await.map_err(|source| HookError::Io { path: path.clone(), source })?;
        let document: MisfitDocument = serde_json::from_str(&content)
            .map_err(|e| HookError::InvalidMisfit { path: path.clone(), reason: e.to_string() })?;
        let misfit = match document {
            MisfitDocument::Bare(value) | MisfitDocument::Object { misfit: value } => value,
        };
        if !misfit.is_finite() || misfit < 0.0 {
            return Err(HookError::InvalidMisfit {
                path,
                reason: format!("misfit must be finite and non-negative, got {misfit}"),
            });
        }

        tracing::debug!(event = %ctx.event, stage = %ctx.stage, misfit, "Read event misfit");
        Ok(Some(misfit))
    }
}
