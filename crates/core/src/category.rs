use serde::{Deserialize, Serialize};
use std::fmt;

/// The closed set of Japanese accounting categories (勘定科目) a receipt
/// can be filed under. Not user-extensible; anything the classifier
/// produces outside this set maps to [`AccountingCategory::Miscellaneous`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AccountingCategory {
    #[serde(rename = "交通費")]
    Transportation,
    #[serde(rename = "消耗品費")]
    Consumables,
    #[serde(rename = "接待交際費")]
    Entertainment,
    #[serde(rename = "通信費")]
    Communication,
    #[serde(rename = "地代家賃")]
    Rent,
    #[serde(rename = "水道光熱費")]
    Utilities,
    #[serde(rename = "新聞図書費")]
    BooksAndSubscriptions,
    #[serde(rename = "広告宣伝費")]
    Advertising,
    #[serde(rename = "保険料")]
    Insurance,
    #[serde(rename = "修繕費")]
    Repairs,
    #[serde(rename = "租税公課")]
    TaxesAndDues,
    #[serde(rename = "外注費")]
    Outsourcing,
    #[serde(rename = "福利厚生費")]
    EmployeeWelfare,
    #[serde(rename = "事務用品費")]
    OfficeSupplies,
    #[serde(rename = "旅費交通費")]
    Travel,
    #[serde(rename = "会議費")]
    Meetings,
    #[serde(rename = "雑費")]
    Miscellaneous,
}

impl AccountingCategory {
    /// Every category in a stable order, for building prompts and menus.
    pub const ALL: [AccountingCategory; 17] = [
        AccountingCategory::Transportation,
        AccountingCategory::Consumables,
        AccountingCategory::Entertainment,
        AccountingCategory::Communication,
        AccountingCategory::Rent,
        AccountingCategory::Utilities,
        AccountingCategory::BooksAndSubscriptions,
        AccountingCategory::Advertising,
        AccountingCategory::Insurance,
        AccountingCategory::Repairs,
        AccountingCategory::TaxesAndDues,
        AccountingCategory::Outsourcing,
        AccountingCategory::EmployeeWelfare,
        AccountingCategory::OfficeSupplies,
        AccountingCategory::Travel,
        AccountingCategory::Meetings,
        AccountingCategory::Miscellaneous,
    ];

    /// The Japanese label used on the wire, in prompts, and in exports.
    pub fn label(self) -> &'static str {
        match self {
            AccountingCategory::Transportation => "交通費",
            AccountingCategory::Consumables => "消耗品費",
            AccountingCategory::Entertainment => "接待交際費",
            AccountingCategory::Communication => "通信費",
            AccountingCategory::Rent => "地代家賃",
            AccountingCategory::Utilities => "水道光熱費",
            AccountingCategory::BooksAndSubscriptions => "新聞図書費",
            AccountingCategory::Advertising => "広告宣伝費",
            AccountingCategory::Insurance => "保険料",
            AccountingCategory::Repairs => "修繕費",
            AccountingCategory::TaxesAndDues => "租税公課",
            AccountingCategory::Outsourcing => "外注費",
            AccountingCategory::EmployeeWelfare => "福利厚生費",
            AccountingCategory::OfficeSupplies => "事務用品費",
            AccountingCategory::Travel => "旅費交通費",
            AccountingCategory::Meetings => "会議費",
            AccountingCategory::Miscellaneous => "雑費",
        }
    }
}

impl fmt::Display for AccountingCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl std::str::FromStr for AccountingCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AccountingCategory::ALL
            .iter()
            .copied()
            .find(|c| c.label() == s)
            .ok_or_else(|| format!("Unknown accounting category: '{s}'"))
    }
}
