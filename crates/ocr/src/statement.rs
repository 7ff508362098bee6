use async_trait::async_trait;

use kanjo_core::{ExtractedRecord, ReceiptResult};

use crate::extract::ExtractError;
use crate::normalize::ImagePayload;

/// Extraction of a transit-card statement: one image holding many
/// ledger-style rows, each becoming its own result. The algorithm is an
/// external capability; the pipeline only depends on this contract.
#[async_trait]
pub trait StatementExtractor: Send + Sync {
    async fn extract(
        &self,
        pages: &[ImagePayload],
        file_name: &str,
        file_path: &str,
    ) -> Result<Vec<ReceiptResult>, ExtractError>;
}

/// Default wiring until a real statement extractor is configured:
/// statement-classified files fail with a clear per-file error and the
/// batch moves on.
pub struct UnsupportedStatements;

#[async_trait]
impl StatementExtractor for UnsupportedStatements {
    async fn extract(
        &self,
        _pages: &[ImagePayload],
        file_name: &str,
        _file_path: &str,
    ) -> Result<Vec<ReceiptResult>, ExtractError> {
        Err(ExtractError::Unsupported(format!(
            "Statement extraction is not configured (file: {file_name})"
        )))
    }
}

/// Produces a fixed number of synthetic rows — lets the batch pipeline's
/// multi-record emission be tested without a real extractor.
pub struct MockStatementExtractor {
    pub rows: usize,
}

impl MockStatementExtractor {
    pub fn new(rows: usize) -> Self {
        Self { rows }
    }
}

#[async_trait]
impl StatementExtractor for MockStatementExtractor {
    async fn extract(
        &self,
        _pages: &[ImagePayload],
        file_name: &str,
        file_path: &str,
    ) -> Result<Vec<ReceiptResult>, ExtractError> {
        Ok((0..self.rows)
            .map(|i| {
                let record = ExtractedRecord {
                    description: Some(format!("乗車 {}", i + 1)),
                    amount: Some(200 * (i as i64 + 1)),
                    ..ExtractedRecord::default()
                };
                ReceiptResult::from_extraction(file_name, file_path, record, None, None)
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unsupported_extractor_names_the_file() {
        let err = UnsupportedStatements
            .extract(&[], "suica.png", "/suica.png")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("suica.png"));
    }

    #[tokio::test]
    async fn mock_extractor_yields_requested_rows() {
        let rows = MockStatementExtractor::new(3)
            .extract(&[], "suica.png", "/suica.png")
            .await
            .unwrap();
        assert_eq!(rows.len(), 3);
        assert!(rows.iter().all(|r| r.file_name == "suica.png"));
        assert_eq!(rows[2].amount, Some(600));
    }
}
