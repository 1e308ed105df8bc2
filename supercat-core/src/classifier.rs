//! The single capability every classification strategy implements.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::label::CategoryLabel;
use crate::record::TransactionRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiagnosticKind {
    /// The service answered, but not with one of the five wire names
    InvalidResponse,
    /// Transport error, timeout, bad status or a failure inside the backend
    RequestFailed,
}

/// Why a result was defaulted to `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub detail: String,
}

impl Diagnostic {
    pub fn invalid_response(detail: impl Into<String>) -> Self {
        Self {
            kind: DiagnosticKind::InvalidResponse,
            detail: detail.into(),
        }
    }

    pub fn request_failed(detail: impl Into<String>) -> Self {
        Self {
            kind: DiagnosticKind::RequestFailed,
            detail: detail.into(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            DiagnosticKind::InvalidResponse => write!(f, "invalid response: {}", self.detail),
            DiagnosticKind::RequestFailed => write!(f, "request failed: {}", self.detail),
        }
    }
}

/// Where a label came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Provenance {
    /// A rule tier fired ("default" when none did)
    Rule { tier: String },
    /// The remote model answered with a valid label
    Model,
    /// Seeded from an earlier run's checkpoint
    Checkpoint,
    /// The classifier could not produce a label and fell back to `Other`
    Defaulted(Diagnostic),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub label: CategoryLabel,
    pub provenance: Provenance,
}

impl ClassificationResult {
    pub fn new(label: CategoryLabel, provenance: Provenance) -> Self {
        Self { label, provenance }
    }

    /// `Other` with the given diagnostic attached.
    pub fn defaulted(diagnostic: Diagnostic) -> Self {
        Self {
            label: CategoryLabel::Other,
            provenance: Provenance::Defaulted(diagnostic),
        }
    }

    pub fn diagnostic(&self) -> Option<&Diagnostic> {
        match &self.provenance {
            Provenance::Defaulted(d) => Some(d),
            _ => None,
        }
    }

    pub fn is_defaulted(&self) -> bool {
        self.diagnostic().is_some()
    }
}

/// Assigns a super-category from the three descriptive fields.
///
/// Implementations must be total: every call returns one of the five labels,
/// and failures are reported through `Provenance::Defaulted`, never by panicking.
pub trait Classifier: Send + Sync {
    fn classify(
        &self,
        description: &str,
        merchant_category: &str,
        transaction_type: &str,
    ) -> ClassificationResult;

    /// Short name for logs.
    fn name(&self) -> &str {
        "classifier"
    }

    fn classify_label(
        &self,
        description: &str,
        merchant_category: &str,
        transaction_type: &str,
    ) -> CategoryLabel {
        self.classify(description, merchant_category, transaction_type).label
    }

    fn classify_record(&self, record: &TransactionRecord) -> ClassificationResult {
        self.classify(
            &record.description,
            &record.merchant_category,
            &record.transaction_type,
        )
    }
}

impl<T: Classifier + ?Sized> Classifier for &T {
    fn classify(&self, d: &str, m: &str, t: &str) -> ClassificationResult {
        (**self).classify(d, m, t)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

impl<T: Classifier + ?Sized> Classifier for Box<T> {
    fn classify(&self, d: &str, m: &str, t: &str) -> ClassificationResult {
        (**self).classify(d, m, t)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

impl<T: Classifier + ?Sized> Classifier for Arc<T> {
    fn classify(&self, d: &str, m: &str, t: &str) -> ClassificationResult {
        (**self).classify(d, m, t)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Always(CategoryLabel);

    impl Classifier for Always {
        fn classify(&self, _: &str, _: &str, _: &str) -> ClassificationResult {
            ClassificationResult::new(self.0, Provenance::Model)
        }
    }

    #[test]
    fn test_provided_helpers_forward() {
        let c = Always(CategoryLabel::LifestyleSpending);
        let record = TransactionRecord::new("x", "y", "z");
        assert_eq!(c.classify_label("a", "b", "c"), CategoryLabel::LifestyleSpending);
        assert_eq!(c.classify_record(&record).label, CategoryLabel::LifestyleSpending);
        assert_eq!(c.name(), "classifier");
    }

    #[test]
    fn test_boxed_dyn_classifier() {
        let boxed: Box<dyn Classifier> = Box::new(Always(CategoryLabel::Other));
        let shared: Arc<dyn Classifier> = Arc::new(Always(CategoryLabel::IncomeReceipts));
        assert_eq!(boxed.classify_label("", "", ""), CategoryLabel::Other);
        assert_eq!(shared.classify_label("", "", ""), CategoryLabel::IncomeReceipts);
    }

    #[test]
    fn test_defaulted_result() {
        let r = ClassificationResult::defaulted(Diagnostic::request_failed("timed out"));
        assert_eq!(r.label, CategoryLabel::Other);
        assert!(r.is_defaulted());
        assert_eq!(r.diagnostic().unwrap().to_string(), "request failed: timed out");
    }
}
