//! Inference pipeline
//!
//! Validate → allocate id → persist artifact → invoke backend → append row.
//! Allocation, backend execution and the ledger append happen under one
//! writer lock, and feedback rewrites take the same lock, so identifiers stay
//! unique, dense and in row order.
//!
//! Each locked section runs as its own task. Dropping the caller (a client
//! disconnect) detaches it instead of cancelling it, so the lock is only
//! released once the ledger write has finished.

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use glyph_common::config::RootFolder;
use glyph_common::{codec, BackendKind};

use crate::invoker::{BackendInvoker, InvokeError};
use crate::ledger::{InferenceResult, LedgerError, ResultLedger};

/// Pipeline errors; each variant keeps the underlying diagnostic
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Rejected before any side effect
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Inference(#[from] InvokeError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// Artifact could not be written
    #[error("Artifact error: {0}")]
    Artifact(glyph_common::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result of a successful inference
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InferenceOutcome {
    pub label: String,
    pub img_name: String,
}

/// Artifact filename for an identifier
pub fn artifact_name(id: u64) -> String {
    format!("raw-img-{}.png", id)
}

pub struct InferencePipeline {
    shared: Arc<Shared>,
}

struct Shared {
    ledger: ResultLedger,
    invoker: BackendInvoker,
    artifact_dir: PathBuf,
    writer: Mutex<()>,
}

impl InferencePipeline {
    pub fn new(ledger: ResultLedger, invoker: BackendInvoker, artifact_dir: impl Into<PathBuf>) -> Self {
        Self {
            shared: Arc::new(Shared {
                ledger,
                invoker,
                artifact_dir: artifact_dir.into(),
                writer: Mutex::new(()),
            }),
        }
    }

    /// Pipeline over the standard layout of a root folder
    pub fn for_root(root: &RootFolder, invoker: BackendInvoker) -> Self {
        Self::new(
            ResultLedger::new(root.ledger_path()),
            invoker,
            root.artifact_dir(),
        )
    }

    pub fn ledger(&self) -> &ResultLedger {
        &self.shared.ledger
    }

    pub fn invoker(&self) -> &BackendInvoker {
        &self.shared.invoker
    }

    /// Create the artifact directory and the ledger header
    pub async fn prepare(&self) -> Result<(), PipelineError> {
        let artifact_dir = self.shared.artifact_dir.clone();
        let ledger = self.shared.ledger.clone();
        blocking(move || {
            std::fs::create_dir_all(&artifact_dir)
                .map_err(|e| PipelineError::Artifact(glyph_common::Error::Io(e)))?;
            ledger.ensure_header()?;
            Ok(())
        })
        .await
    }

    /// Classify one pixel vector with the backend for `kind`
    pub async fn run(&self, kind: BackendKind, pixels: Vec<f32>) -> Result<InferenceOutcome, PipelineError> {
        codec::validate_pixels(&pixels).map_err(|e| PipelineError::InvalidRequest(e.to_string()))?;

        let shared = self.shared.clone();
        detached(async move { shared.run_locked(kind, pixels).await }).await
    }

    /// Attach feedback to every ledger row for `img_name`
    ///
    /// Returns the number of rows updated; zero is not an error.
    pub async fn feedback(&self, img_name: &str, user_feedback: &str) -> Result<usize, PipelineError> {
        let shared = self.shared.clone();
        let img_name = img_name.to_string();
        let text = user_feedback.to_string();
        detached(async move { shared.feedback_locked(img_name, text).await }).await
    }
}

impl Shared {
    async fn run_locked(&self, kind: BackendKind, pixels: Vec<f32>) -> Result<InferenceOutcome, PipelineError> {
        let _guard = self.writer.lock().await;

        let ledger = self.ledger.clone();
        let id = blocking(move || Ok(ledger.next_artifact_id()?)).await?;
        let img_name = artifact_name(id);
        let artifact_path = self.artifact_dir.join(&img_name);

        let artifact_dir = self.artifact_dir.clone();
        let path = artifact_path.clone();
        blocking(move || {
            std::fs::create_dir_all(&artifact_dir)
                .map_err(|e| PipelineError::Artifact(glyph_common::Error::Io(e)))?;
            codec::encode(&pixels, &path).map_err(PipelineError::Artifact)
        })
        .await?;
        debug!(artifact = %artifact_path.display(), "Artifact written");

        let label = match self.invoker.infer(kind, &artifact_path).await {
            Ok(label) => label,
            Err(e) => {
                warn!(img_name = %img_name, model = %kind, error = %e, "Inference failed");
                return Err(e.into());
            }
        };

        let row = InferenceResult::new(img_name.clone(), kind, label.clone());
        let ledger = self.ledger.clone();
        blocking(move || Ok(ledger.append(&row)?)).await?;

        info!(img_name = %img_name, model = %kind, label = %label, "Inference recorded");
        Ok(InferenceOutcome { label, img_name })
    }

    async fn feedback_locked(&self, img_name: String, text: String) -> Result<usize, PipelineError> {
        let _guard = self.writer.lock().await;

        let ledger = self.ledger.clone();
        let name = img_name.clone();
        let matched = blocking(move || Ok(ledger.apply_feedback(&name, &text)?)).await?;

        if matched == 0 {
            info!(img_name = %img_name, "Feedback for unknown artifact ignored");
        } else {
            info!(img_name = %img_name, rows = matched, "Feedback recorded");
        }
        Ok(matched)
    }
}

/// Run a locked section as its own task so dropping the caller cannot cut it short
async fn detached<T, F>(section: F) -> Result<T, PipelineError>
where
    F: Future<Output = Result<T, PipelineError>> + Send + 'static,
    T: Send + 'static,
{
    tokio::spawn(section)
        .await
        .map_err(|e| PipelineError::Internal(format!("pipeline task failed: {}", e)))?
}

/// Run blocking file I/O off the async workers
async fn blocking<T, F>(f: F) -> Result<T, PipelineError>
where
    F: FnOnce() -> Result<T, PipelineError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| PipelineError::Internal(format!("blocking task failed: {}", e)))?
}
