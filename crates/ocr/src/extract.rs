use serde_json::Value;
use thiserror::Error;

use kanjo_core::{ExtractedRecord, ReceiptResult};

use crate::backend::{InferenceBackend, InferenceError};
use crate::classify::classify_category;
use crate::normalize::ImagePayload;
use crate::prompts;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error(transparent)]
    Inference(#[from] InferenceError),
    #[error("Model response was not valid JSON: {0}")]
    MalformedResponse(#[from] serde_json::Error),
    #[error("{0}")]
    Unsupported(String),
}

/// Strip a fenced code-block wrapper, if present, and parse the rest as
/// a JSON value. The model is told to answer with bare JSON but often
/// wraps it in ```json fences anyway.
pub fn parse_json_response(text: &str) -> Result<Value, serde_json::Error> {
    let text = text.trim();
    let body = if let Some(rest) = text.strip_prefix("```") {
        // Drop the opening fence line (``` or ```json) and a trailing
        // fence line when present.
        let rest = rest.split_once('\n').map(|(_, body)| body).unwrap_or("");
        match rest.trim_end().strip_suffix("```") {
            Some(inner) => inner.trim_end_matches(|c| c == ' ' || c == '\t'),
            None => rest,
        }
    } else {
        text
    };
    serde_json::from_str(body)
}

/// Run the extraction stage: one inference call carrying every page of
/// one logical document, parsed into an [`ExtractedRecord`].
pub async fn extract_record(
    backend: &dyn InferenceBackend,
    images: &[ImagePayload],
) -> Result<ExtractedRecord, ExtractError> {
    let response = backend.infer(images, prompts::EXTRACTION_PROMPT).await?;
    let value = parse_json_response(&response)?;
    Ok(ExtractedRecord::from_value(&value))
}

/// Process one logical document end to end: extract, then classify, then
/// assemble the caller-facing result. Extraction failures are fatal for
/// the document; classification is best-effort and never fails it.
pub async fn process_receipt(
    backend: &dyn InferenceBackend,
    images: &[ImagePayload],
    file_name: &str,
    file_path: &str,
) -> Result<ReceiptResult, ExtractError> {
    let record = extract_record(backend, images).await?;
    let (category, category_reason) = classify_category(backend, &record).await;
    Ok(ReceiptResult::from_extraction(
        file_name,
        file_path,
        record,
        category,
        category_reason,
    ))
}
