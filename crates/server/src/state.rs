use std::sync::Arc;

use kanjo_ocr::{ClaudeBackend, PdfRenderer, ReceiptPipeline, UnsupportedStatements};
use kanjo_storage::{DropboxAuth, DropboxClient, MemoryStateStore};

use crate::config::AppConfig;

/// Shared application state, cloned into every handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub auth: Arc<DropboxAuth>,
    pub dropbox: Arc<DropboxClient>,
    pub pipeline: Arc<ReceiptPipeline>,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        auth: DropboxAuth,
        dropbox: DropboxClient,
        pipeline: ReceiptPipeline,
    ) -> Self {
        AppState {
            config: Arc::new(config),
            auth: Arc::new(auth),
            dropbox: Arc::new(dropbox),
            pipeline: Arc::new(pipeline),
        }
    }
}

/// Wire the production collaborators from the configuration.
pub fn build_app_state(config: AppConfig) -> anyhow::Result<AppState> {
    let auth = DropboxAuth::new(
        &config.dropbox_app_key,
        &config.dropbox_app_secret,
        &config.dropbox_redirect_uri,
        Arc::new(MemoryStateStore::new()),
    );
    let dropbox = DropboxClient::new();
    let inference = ClaudeBackend::new(&config.anthropic_api_key, &config.anthropic_model)
        .map_err(|e| anyhow::anyhow!("Failed to build inference backend: {e}"))?;

    let pipeline = ReceiptPipeline::new(
        Arc::new(DropboxClient::new()),
        Arc::new(inference),
        pdf_renderer(),
        Arc::new(UnsupportedStatements),
    );

    Ok(AppState::new(config, auth, dropbox, pipeline))
}

#[cfg(feature = "pdfium")]
fn pdf_renderer() -> Arc<dyn PdfRenderer> {
    use kanjo_ocr::pdf::pdfium_backend::PdfiumRenderer;

    match PdfiumRenderer::new() {
        Ok(renderer) => Arc::new(renderer),
        Err(e) => {
            tracing::warn!("PDF rendering disabled: {e}");
            Arc::new(kanjo_ocr::UnsupportedPdfRenderer)
        }
    }
}

#[cfg(not(feature = "pdfium"))]
fn pdf_renderer() -> Arc<dyn PdfRenderer> {
    tracing::warn!("Built without the `pdfium` feature; PDF files will be rejected");
    Arc::new(kanjo_ocr::UnsupportedPdfRenderer)
}
