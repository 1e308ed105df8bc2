//! Transaction records and the fingerprint used to deduplicate classification work.

use serde::{Deserialize, Serialize};

/// The descriptive fields of one transaction, as supplied by the caller.
///
/// Missing values are empty strings; classifiers only ever borrow a record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct TransactionRecord {
    /// Free-text description (e.g. "CARREFOUR MARKET")
    pub description: String,
    /// Merchant category from the statement, possibly empty
    pub merchant_category: String,
    /// Transaction type token ("transfer", "card payment", "topup", ...)
    pub transaction_type: String,
}

impl TransactionRecord {
    pub fn new(
        description: impl Into<String>,
        merchant_category: impl Into<String>,
        transaction_type: impl Into<String>,
    ) -> Self {
        Self {
            description: description.into(),
            merchant_category: merchant_category.into(),
            transaction_type: transaction_type.into(),
        }
    }

    pub fn fingerprint(&self) -> Fingerprint {
        Fingerprint {
            description: self.description.clone(),
            merchant_category: self.merchant_category.clone(),
            transaction_type: self.transaction_type.clone(),
        }
    }
}

/// Composite (description, merchant category, type) key over the raw field values.
///
/// Two records with equal fingerprints always receive the same label.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint {
    pub description: String,
    pub merchant_category: String,
    pub transaction_type: String,
}

impl From<&TransactionRecord> for Fingerprint {
    fn from(record: &TransactionRecord) -> Self {
        record.fingerprint()
    }
}
