//! The closed set of super-categories a transaction can be sorted into.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Top-level bucket for a transaction. Exactly five values, never extended at runtime.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CategoryLabel {
    #[serde(rename = "Essential_Living")]
    EssentialLiving,
    #[serde(rename = "Lifestyle_Spending")]
    LifestyleSpending,
    #[serde(rename = "Financial_Management")]
    FinancialManagement,
    #[serde(rename = "Income_Receipts")]
    IncomeReceipts,
    #[serde(rename = "Other")]
    Other,
}

impl CategoryLabel {
    /// All labels in canonical (report) order.
    pub const ALL: [CategoryLabel; 5] = [
        CategoryLabel::EssentialLiving,
        CategoryLabel::LifestyleSpending,
        CategoryLabel::FinancialManagement,
        CategoryLabel::IncomeReceipts,
        CategoryLabel::Other,
    ];

    /// Wire name, as written to the label column and expected from the model.
    pub fn as_str(&self) -> &'static str {
        match self {
            CategoryLabel::EssentialLiving => "Essential_Living",
            CategoryLabel::LifestyleSpending => "Lifestyle_Spending",
            CategoryLabel::FinancialManagement => "Financial_Management",
            CategoryLabel::IncomeReceipts => "Income_Receipts",
            CategoryLabel::Other => "Other",
        }
    }

    /// Short human description of what belongs in the bucket.
    pub fn description(&self) -> &'static str {
        match self {
            CategoryLabel::EssentialLiving => {
                "housing, utilities, basic groceries, healthcare, transportation"
            }
            CategoryLabel::LifestyleSpending => {
                "dining out, entertainment, shopping, personal care, hobbies"
            }
            CategoryLabel::FinancialManagement => {
                "transfers, investments, savings, fees, financial services"
            }
            CategoryLabel::IncomeReceipts => "salary, payments received, refunds, rewards",
            CategoryLabel::Other => "anything that doesn't fit above",
        }
    }
}

impl fmt::Display for CategoryLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a string is not one of the five wire names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownLabel(pub String);

impl fmt::Display for UnknownLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown category label '{}'", self.0)
    }
}

impl std::error::Error for UnknownLabel {}

impl FromStr for CategoryLabel {
    type Err = UnknownLabel;

    /// Exact, case-sensitive match on the wire name.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CategoryLabel::ALL
            .into_iter()
            .find(|label| label.as_str() == s)
            .ok_or_else(|| UnknownLabel(s.to_string()))
    }
}
