//! supercat-core: super-category labels, keyword taxonomy, rule cascade,
//! classifier trait, deduplicating batch classifier and distribution report.

pub mod batch;
pub mod classifier;
pub mod label;
pub mod record;
pub mod report;
pub mod rules;
pub mod taxonomy;

pub use batch::{classify_batch, BatchClassifier, BatchOutcome, FingerprintCache};
pub use classifier::{ClassificationResult, Classifier, Diagnostic, DiagnosticKind, Provenance};
pub use label::{CategoryLabel, UnknownLabel};
pub use record::{Fingerprint, TransactionRecord};
pub use report::{Distribution, DistributionEntry};
pub use rules::{Evaluation, Field, Matcher, RuleEngine, Tier};
pub use taxonomy::Taxonomy;
