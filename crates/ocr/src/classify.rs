use regex::Regex;
use std::str::FromStr;
use std::sync::OnceLock;

use kanjo_core::{AccountingCategory, ExtractedRecord};

use crate::backend::InferenceBackend;
use crate::extract::parse_json_response;
use crate::prompts;

/// Processing strategy chosen for a source file, from its name alone.
/// A misnamed file runs against the wrong prompt/page semantics; the
/// naming conventions come from known upstream apps, so the risk is
/// accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocKind {
    /// One logical receipt (image, or a PDF treated as one document).
    SingleDocument,
    /// Scanner batch export: one independent receipt per PDF page.
    MultiReceiptPdf,
    /// Transit-card statement: many ledger rows in one image.
    MultiTransactionStatement,
}

fn re_batch_scan() -> &'static Regex {
    static R: OnceLock<Regex> = OnceLock::new();
    // The scanning app names batch exports `YYYY-MM-DD HH.MM.SS.pdf`.
    R.get_or_init(|| {
        Regex::new(r"^\d{4}-\d{2}-\d{2} \d{2}\.\d{2}\.\d{2}\.pdf$").expect("invalid regex")
    })
}

impl DocKind {
    pub fn classify(file_name: &str) -> DocKind {
        if file_name.to_lowercase().contains("suica") {
            DocKind::MultiTransactionStatement
        } else if re_batch_scan().is_match(file_name) {
            DocKind::MultiReceiptPdf
        } else {
            DocKind::SingleDocument
        }
    }
}

/// Ask the model to file an extracted record under one accounting
/// category. Best-effort by design:
/// - no company name and no description → no call, `(None, None)`;
/// - unknown label or malformed reply → catch-all 雑費;
/// - inference failure → `(None, None)`, logged, never fatal.
pub async fn classify_category(
    backend: &dyn InferenceBackend,
    record: &ExtractedRecord,
) -> (Option<AccountingCategory>, Option<String>) {
    if !record.has_classification_signal() {
        return (None, None);
    }

    let prompt = prompts::category_prompt(
        record.company_name.as_deref(),
        record.amount,
        record.description.as_deref(),
    );

    let response = match backend.infer(&[], &prompt).await {
        Ok(text) => text,
        Err(e) => {
            tracing::warn!("Category classification call failed: {e}");
            return (None, None);
        }
    };

    match parse_json_response(&response) {
        Ok(value) => {
            let reason = value
                .get("reason")
                .and_then(|v| v.as_str())
                .map(str::to_string);
            let category = value
                .get("category")
                .and_then(|v| v.as_str())
                .and_then(|label| AccountingCategory::from_str(label).ok())
                .unwrap_or(AccountingCategory::Miscellaneous);
            (Some(category), reason)
        }
        Err(e) => {
            tracing::warn!("Category classification reply was not JSON: {e}");
            (Some(AccountingCategory::Miscellaneous), None)
        }
    }
}
