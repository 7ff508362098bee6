use kanjo_core::AccountingCategory;

/// Placeholder substituted for any field the extraction could not fill.
pub const UNKNOWN_PLACEHOLDER: &str = "不明";

/// Instruction sent with the document image(s). Directs the model to
/// prefer the order/purchase date over the print date and to read the
/// name before 様 as the addressee, not the vendor.
pub const EXTRACTION_PROMPT: &str = "\
この画像は日本の領収書です。以下の情報をJSON形式で抽出してください。

注意事項:
- 「様」の前に書かれている名前は宛名であり、会社名・店名ではありません
- 会社名・店名は領収書の発行元（下部や印鑑の近く）を確認してください
- 金額は税込み総額を抽出してください
- 手書きの領収書にも対応してください
- 日付は注文確定日または商品購入日をYYYY-MM-DD形式に変換してください。発行日や印刷日ではなく、実際に注文・購入した日付を優先してください
- 品目・但し書きがない場合はnullとしてください

出力JSON形式:
{
  \"company_name\": \"会社名・店名 または null\",
  \"amount\": 税込金額(整数) または null,
  \"tax_amount\": 消費税額(整数) または null,
  \"date\": \"YYYY-MM-DD\" または null,
  \"description\": \"品目・但し書き または null\",
  \"confidence\": 0.0〜1.0の信頼度
}

JSONのみを出力してください。";

/// Build the classification prompt for an extracted record.
pub fn category_prompt(
    company_name: Option<&str>,
    amount: Option<i64>,
    description: Option<&str>,
) -> String {
    let labels: Vec<&str> = AccountingCategory::ALL.iter().map(|c| c.label()).collect();
    let amount = amount
        .map(|a| a.to_string())
        .unwrap_or_else(|| UNKNOWN_PLACEHOLDER.to_string());

    format!(
        "以下の領収書情報から、最適な勘定科目を1つ選んでください。\n\n\
         領収書情報:\n\
         - 会社名: {company}\n\
         - 金額: {amount}円\n\
         - 品目: {description}\n\n\
         勘定科目の選択肢:\n\
         {labels}\n\n\
         出力JSON形式:\n\
         {{\"category\": \"勘定科目名\", \"reason\": \"分類理由\"}}\n\n\
         JSONのみを出力してください。",
        company = company_name.unwrap_or(UNKNOWN_PLACEHOLDER),
        description = description.unwrap_or(UNKNOWN_PLACEHOLDER),
        labels = labels.join(", "),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_prompt_substitutes_placeholders() {
        let prompt = category_prompt(None, None, None);
        assert!(prompt.contains("会社名: 不明"));
        assert!(prompt.contains("金額: 不明円"));
        assert!(prompt.contains("品目: 不明"));
    }

    #[test]
    fn category_prompt_includes_every_label() {
        let prompt = category_prompt(Some("JR東日本"), Some(1000), Some("乗車券"));
        for cat in AccountingCategory::ALL {
            assert!(prompt.contains(cat.label()), "missing {}", cat.label());
        }
        assert!(prompt.contains("会社名: JR東日本"));
        assert!(prompt.contains("金額: 1000円"));
    }

    #[test]
    fn category_prompt_keeps_zero_amount() {
        let prompt = category_prompt(Some("店"), Some(0), None);
        assert!(prompt.contains("金額: 0円"));
    }
}
