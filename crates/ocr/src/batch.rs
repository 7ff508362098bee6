use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;

use kanjo_core::{BatchEvent, ReceiptResult};
use kanjo_storage::{FileStore, StorageError};

use crate::backend::InferenceBackend;
use crate::classify::DocKind;
use crate::extract::{process_receipt, ExtractError};
use crate::normalize::{prepare_images, NormalizeError};
use crate::pdf::PdfRenderer;
use crate::statement::StatementExtractor;

/// Pause between files and between records of a multi-record file.
/// Keeps the live progress view watchable and spreads requests against
/// the inference service's rate limits.
pub const DEFAULT_PACING: Duration = Duration::from_millis(500);

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Normalize(#[from] NormalizeError),
    #[error(transparent)]
    Extract(#[from] ExtractError),
    #[error("Batch cancelled by the caller")]
    Cancelled,
}

/// Orchestrates a batch: download → normalize → dispatch by document
/// kind → extract/classify → emit events. Files are processed strictly
/// in order, one at a time — the external inference service is the
/// bottleneck, and sequential processing keeps the event order
/// deterministic.
pub struct ReceiptPipeline {
    files: Arc<dyn FileStore>,
    inference: Arc<dyn InferenceBackend>,
    pdf: Arc<dyn PdfRenderer>,
    statements: Arc<dyn StatementExtractor>,
    pacing: Duration,
}

impl ReceiptPipeline {
    pub fn new(
        files: Arc<dyn FileStore>,
        inference: Arc<dyn InferenceBackend>,
        pdf: Arc<dyn PdfRenderer>,
        statements: Arc<dyn StatementExtractor>,
    ) -> Self {
        Self { files, inference, pdf, statements, pacing: DEFAULT_PACING }
    }

    pub fn with_pacing(mut self, pacing: Duration) -> Self {
        self.pacing = pacing;
        self
    }

    /// Process one file outside a batch (the non-streaming endpoint).
    pub async fn process_single(
        &self,
        access_token: &str,
        file_path: &str,
    ) -> Result<ReceiptResult, PipelineError> {
        let (bytes, file_name) = self.files.download(access_token, file_path).await?;
        let pages = prepare_images(&bytes, &file_name, self.pdf.as_ref())?;
        let result =
            process_receipt(self.inference.as_ref(), &pages, &file_name, file_path).await?;
        Ok(result)
    }

    /// Run a batch, emitting [`BatchEvent`]s to `tx` as it goes.
    ///
    /// Failures are isolated per file: a failed download, decode, or
    /// extraction becomes one `error` event and the batch moves on.
    /// Exactly one `done` event terminates the stream. When the receiver
    /// goes away the batch stops promptly — every emission is a channel
    /// send, and the multi-page loop checks for a closed channel before
    /// each inference call.
    pub async fn run_batch(
        &self,
        access_token: &str,
        file_paths: &[String],
        tx: mpsc::Sender<BatchEvent>,
    ) {
        let total = file_paths.len();

        for (completed, path) in file_paths.iter().enumerate() {
            let display_name = basename(path).to_string();
            let progress = BatchEvent::Progress {
                completed,
                total,
                current_file: display_name.clone(),
            };
            if tx.send(progress).await.is_err() {
                tracing::info!("Batch caller disconnected; stopping");
                return;
            }

            match self.process_file(access_token, path, &tx).await {
                Ok(results) => {
                    let multi = results.len() > 1;
                    for result in results {
                        if tx.send(BatchEvent::Result(result)).await.is_err() {
                            tracing::info!("Batch caller disconnected; stopping");
                            return;
                        }
                        if multi {
                            tokio::time::sleep(self.pacing).await;
                        }
                    }
                }
                Err(PipelineError::Cancelled) => {
                    tracing::info!("Batch caller disconnected; stopping");
                    return;
                }
                Err(e) => {
                    tracing::warn!(file = %display_name, "File failed: {e}");
                    let event = BatchEvent::Error {
                        file_name: display_name,
                        error: e.to_string(),
                    };
                    if tx.send(event).await.is_err() {
                        return;
                    }
                }
            }

            tokio::time::sleep(self.pacing).await;
        }

        let _ = tx.send(BatchEvent::Done { total }).await;
    }

    /// Fetch and process one file, fanning out according to its kind.
    async fn process_file(
        &self,
        access_token: &str,
        path: &str,
        tx: &mpsc::Sender<BatchEvent>,
    ) -> Result<Vec<ReceiptResult>, PipelineError> {
        let (bytes, file_name) = self.files.download(access_token, path).await?;
        let pages = prepare_images(&bytes, &file_name, self.pdf.as_ref())?;

        match DocKind::classify(&file_name) {
            DocKind::MultiTransactionStatement => {
                let rows = self.statements.extract(&pages, &file_name, path).await?;
                Ok(rows)
            }
            DocKind::MultiReceiptPdf => {
                let mut results = Vec::with_capacity(pages.len());
                for (index, page) in pages.iter().enumerate() {
                    if tx.is_closed() {
                        return Err(PipelineError::Cancelled);
                    }
                    let label = format!("{file_name} (p{})", index + 1);
                    let result = process_receipt(
                        self.inference.as_ref(),
                        std::slice::from_ref(page),
                        &label,
                        path,
                    )
                    .await?;
                    results.push(result);
                }
                Ok(results)
            }
            DocKind::SingleDocument => {
                let result =
                    process_receipt(self.inference.as_ref(), &pages, &file_name, path).await?;
                Ok(vec![result])
            }
        }
    }
}

fn basename(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}
