use std::collections::BTreeMap;
use thiserror::Error;

use kanjo_core::{CategoryTotal, ReceiptResult};

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("CSV write failed: {0}")]
    Csv(#[from] csv::Error),
    #[error("CSV buffer flush failed: {0}")]
    Io(#[from] std::io::Error),
}

const HEADER: &[&str] = &[
    "No.",
    "ファイル名",
    "日付",
    "会社名・店名",
    "品目・但し書き",
    "金額（税込）",
    "消費税額",
    "勘定科目",
    "分類理由",
    "信頼度",
    "手動修正",
];

/// Marker written in the 手動修正 column for caller-edited rows.
const EDITED_MARK: &str = "○";

/// Aggregate the per-category counts and amount sums for a result set,
/// sorted by category label. Only error-free results with both a
/// category and a defined amount participate; an amount of 0 counts.
pub fn summarize(results: &[ReceiptResult]) -> Vec<CategoryTotal> {
    let mut totals: BTreeMap<&str, (usize, i64)> = BTreeMap::new();
    let mut categories = BTreeMap::new();

    for r in results.iter().filter(|r| r.is_exportable()) {
        if let (Some(category), Some(amount)) = (r.category, r.amount) {
            let entry = totals.entry(category.label()).or_insert((0, 0));
            entry.0 += 1;
            entry.1 += amount;
            categories.insert(category.label(), category);
        }
    }

    totals
        .into_iter()
        .map(|(label, (count, total_amount))| CategoryTotal {
            category: categories[label],
            count,
            total_amount,
        })
        .collect()
}

/// Render a result set as CSV encoded in CP932 (Shift-JIS), the encoding
/// Japanese Excel opens without mojibake. Characters outside the target
/// encoding are replaced, never fatal. Rows keep the caller's order; a
/// 勘定科目別集計 section and 合計 row close the file.
pub fn write_csv(results: &[ReceiptResult]) -> Result<Vec<u8>, ExportError> {
    // Flexible: the summary section has shorter records than the data rows.
    let mut writer = csv::WriterBuilder::new().flexible(true).from_writer(Vec::new());

    writer.write_record(HEADER)?;

    for (i, r) in results.iter().filter(|r| r.is_exportable()).enumerate() {
        writer.write_record(&[
            (i + 1).to_string(),
            r.file_name.clone(),
            r.date.clone().unwrap_or_default(),
            r.company_name.clone().unwrap_or_default(),
            r.description.clone().unwrap_or_default(),
            r.amount.map(|a| a.to_string()).unwrap_or_default(),
            r.tax_amount.map(|a| a.to_string()).unwrap_or_default(),
            r.category.map(|c| c.label().to_string()).unwrap_or_default(),
            r.category_reason.clone().unwrap_or_default(),
            r.confidence
                .map(|c| format!("{:.0}%", c * 100.0))
                .unwrap_or_default(),
            if r.is_manually_edited { EDITED_MARK.to_string() } else { String::new() },
        ])?;
    }

    // Category summary section, separated by a blank row.
    writer.write_record([""])?;
    writer.write_record(["勘定科目別集計"])?;
    writer.write_record(["勘定科目", "件数", "合計金額"])?;

    let totals = summarize(results);
    let grand_total: i64 = totals.iter().map(|t| t.total_amount).sum();
    for t in &totals {
        writer.write_record(&[
            t.category.label().to_string(),
            t.count.to_string(),
            t.total_amount.to_string(),
        ])?;
    }
    writer.write_record(&["合計".to_string(), String::new(), grand_total.to_string()])?;

    let utf8 = writer.into_inner().map_err(|e| e.into_error())?;
    let text = String::from_utf8_lossy(&utf8);
    let (encoded, _, _) = encoding_rs::SHIFT_JIS.encode(&text);
    Ok(encoded.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use kanjo_core::{AccountingCategory, ExtractedRecord};

    fn result(
        file_name: &str,
        amount: Option<i64>,
        category: Option<AccountingCategory>,
    ) -> ReceiptResult {
        let record = ExtractedRecord {
            company_name: Some("テスト商店".to_string()),
            amount,
            date: Some("2025-04-01".to_string()),
            confidence: Some(0.85),
            ..ExtractedRecord::default()
        };
        ReceiptResult::from_extraction(file_name, format!("/{file_name}"), record, category, None)
    }

    /// Decode CP932 output back to a UTF-8 string for assertions.
    fn decode(bytes: &[u8]) -> String {
        let (text, _, had_errors) = encoding_rs::SHIFT_JIS.decode(bytes);
        assert!(!had_errors);
        text.into_owned()
    }

    #[test]
    fn empty_result_set_still_has_header_and_zero_total() {
        let text = decode(&write_csv(&[]).unwrap());
        assert!(text.starts_with("No.,ファイル名,日付"));
        assert!(text.contains("勘定科目別集計"));
        assert!(text.contains("合計,,0"));
    }

    #[test]
    fn rows_keep_input_order_and_numbering() {
        let rows = [
            result("b.jpg", Some(500), Some(AccountingCategory::Transportation)),
            result("a.jpg", Some(300), Some(AccountingCategory::Consumables)),
        ];
        let text = decode(&write_csv(&rows).unwrap());
        let lines: Vec<&str> = text.lines().collect();
        assert!(lines[1].starts_with("1,b.jpg,2025-04-01,テスト商店"));
        assert!(lines[2].starts_with("2,a.jpg,"));
    }

    #[test]
    fn category_totals_sum_to_grand_total() {
        let rows = [
            result("a.jpg", Some(1000), Some(AccountingCategory::Transportation)),
            result("b.jpg", Some(2000), Some(AccountingCategory::Transportation)),
            result("c.jpg", Some(300), Some(AccountingCategory::Meetings)),
        ];
        let totals = summarize(&rows);
        let grand: i64 = totals.iter().map(|t| t.total_amount).sum();
        assert_eq!(grand, 3300);

        let text = decode(&write_csv(&rows).unwrap());
        assert!(text.contains("交通費,2,3000"));
        assert!(text.contains("会議費,1,300"));
        assert!(text.contains("合計,,3300"));
    }

    #[test]
    fn summary_is_sorted_by_label() {
        let rows = [
            result("a.jpg", Some(100), Some(AccountingCategory::Miscellaneous)), // 雑費
            result("b.jpg", Some(200), Some(AccountingCategory::Meetings)),     // 会議費
        ];
        let text = decode(&write_csv(&rows).unwrap());
        let meetings = text.find("会議費,1,200").unwrap();
        let misc = text.find("雑費,1,100").unwrap();
        assert!(meetings < misc);
    }

    #[test]
    fn zero_amount_exports_as_zero_and_counts_in_summary() {
        let rows = [result("a.jpg", Some(0), Some(AccountingCategory::Consumables))];
        let text = decode(&write_csv(&rows).unwrap());
        assert!(text.contains("1,a.jpg,2025-04-01,テスト商店,,0,"));
        assert!(text.contains("消耗品費,1,0"));
    }

    #[test]
    fn unknown_amount_exports_as_empty_and_skips_summary() {
        let rows = [result("a.jpg", None, Some(AccountingCategory::Consumables))];
        let text = decode(&write_csv(&rows).unwrap());
        assert!(text.contains("1,a.jpg,2025-04-01,テスト商店,,,"));
        // The row still names its category, but no summary row appears.
        assert!(!text.contains("消耗品費,1"));
        assert!(text.contains("合計,,0"));
    }

    #[test]
    fn uncategorized_rows_leave_the_column_empty() {
        let rows = [result("a.jpg", Some(700), None)];
        let text = decode(&write_csv(&rows).unwrap());
        assert!(text.lines().nth(1).unwrap().contains(",700,,"));
        assert!(text.contains("合計,,0"));
    }

    #[test]
    fn errored_results_are_skipped() {
        let mut bad = result("bad.jpg", Some(9999), Some(AccountingCategory::Transportation));
        bad.error = Some("download failed".to_string());
        let rows = [bad, result("good.jpg", Some(100), Some(AccountingCategory::Meetings))];
        let text = decode(&write_csv(&rows).unwrap());
        assert!(!text.contains("bad.jpg"));
        assert!(text.lines().nth(1).unwrap().starts_with("1,good.jpg"));
        assert!(text.contains("合計,,100"));
    }

    #[test]
    fn confidence_renders_as_whole_percent() {
        let text = decode(&write_csv(&[result("a.jpg", Some(1), None)]).unwrap());
        assert!(text.contains(",85%,"));
    }

    #[test]
    fn manual_edit_marker() {
        let mut r = result("a.jpg", Some(1), None);
        r.is_manually_edited = true;
        let text = decode(&write_csv(&[r]).unwrap());
        assert!(text.lines().nth(1).unwrap().ends_with(EDITED_MARK));
    }

    #[test]
    fn unencodable_characters_are_replaced_not_fatal() {
        let mut r = result("a.jpg", Some(1), None);
        r.company_name = Some("Café 🚀".to_string());
        let bytes = write_csv(&[r]).unwrap();
        // The emoji cannot exist in CP932; export still succeeds.
        let (text, _, _) = encoding_rs::SHIFT_JIS.decode(&bytes);
        assert!(text.contains("Caf"));
    }
}
