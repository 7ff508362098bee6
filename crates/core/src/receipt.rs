use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::category::AccountingCategory;

/// Structured fields pulled out of a single document image by the
/// extraction stage. Every field is optional: the model reports what it
/// can read and `None` means "unknown". An amount of `0` is a real
/// extracted value and is deliberately distinct from `None`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractedRecord {
    pub company_name: Option<String>,
    /// Tax-inclusive total in yen (the currency's smallest unit).
    pub amount: Option<i64>,
    pub tax_amount: Option<i64>,
    /// ISO-8601 date string (`YYYY-MM-DD`) as reported by the model.
    pub date: Option<String>,
    pub description: Option<String>,
    pub confidence: Option<f32>,
}

impl ExtractedRecord {
    /// Build a record from a parsed model response, field by field.
    ///
    /// Numeric fields are accepted only as JSON integers — a string,
    /// float, or null resolves to `None` rather than a guessed value.
    pub fn from_value(value: &Value) -> Self {
        let confidence = value
            .get("confidence")
            .and_then(Value::as_f64)
            .map(|c| (c as f32).clamp(0.0, 1.0));

        ExtractedRecord {
            company_name: string_field(value, "company_name"),
            amount: value.get("amount").and_then(Value::as_i64),
            tax_amount: value.get("tax_amount").and_then(Value::as_i64),
            date: string_field(value, "date")
                .filter(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").is_ok()),
            description: string_field(value, "description"),
            confidence,
        }
    }

    /// Whether there is any signal worth classifying on.
    pub fn has_classification_signal(&self) -> bool {
        self.company_name.is_some() || self.description.is_some()
    }
}

fn string_field(value: &Value, key: &str) -> Option<String> {
    value
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// The durable unit handed to callers: one logical receipt, page, or
/// statement row. A source file may yield many of these. The pipeline
/// constructs a result once and never mutates it; the caller owns any
/// later edits (and flips `is_manually_edited` when it makes them).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReceiptResult {
    pub id: String,
    pub file_name: String,
    pub file_path: String,
    #[serde(default)]
    pub company_name: Option<String>,
    #[serde(default)]
    pub amount: Option<i64>,
    #[serde(default)]
    pub tax_amount: Option<i64>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category: Option<AccountingCategory>,
    #[serde(default)]
    pub category_reason: Option<String>,
    #[serde(default)]
    pub confidence: Option<f32>,
    /// Set instead of the data fields when processing this document
    /// failed; such a result is skipped by the exporter.
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub is_manually_edited: bool,
}

impl ReceiptResult {
    /// Assemble a successful result from an extraction + classification.
    pub fn from_extraction(
        file_name: impl Into<String>,
        file_path: impl Into<String>,
        record: ExtractedRecord,
        category: Option<AccountingCategory>,
        category_reason: Option<String>,
    ) -> Self {
        ReceiptResult {
            id: Uuid::new_v4().to_string(),
            file_name: file_name.into(),
            file_path: file_path.into(),
            company_name: record.company_name,
            amount: record.amount,
            tax_amount: record.tax_amount,
            date: record.date,
            description: record.description,
            category,
            category_reason,
            confidence: record.confidence,
            error: None,
            is_manually_edited: false,
        }
    }

    pub fn is_exportable(&self) -> bool {
        self.error.is_none()
    }
}

/// Per-category aggregate computed at export time; never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryTotal {
    pub category: AccountingCategory,
    pub count: usize,
    pub total_amount: i64,
}
