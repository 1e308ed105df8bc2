//! Classifier that asks a text-generation service for the label.
//!
//! Every failure degrades to `Other` with a diagnostic; nothing escapes
//! `classify`, so one bad answer never stalls a batch.

use std::panic::{self, AssertUnwindSafe};

use supercat_core::{CategoryLabel, ClassificationResult, Classifier, Diagnostic, Provenance};
use tracing::warn;

use crate::backend::CompletionBackend;
use crate::prompt;

pub struct RemoteClassifier<B> {
    backend: B,
}

impl<B: CompletionBackend> RemoteClassifier<B> {
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

impl<B: CompletionBackend> Classifier for RemoteClassifier<B> {
    fn classify(
        &self,
        description: &str,
        merchant_category: &str,
        transaction_type: &str,
    ) -> ClassificationResult {
        let user = prompt::user_prompt(description, merchant_category, transaction_type);
        let answer = panic::catch_unwind(AssertUnwindSafe(|| {
            self.backend.complete(prompt::SYSTEM, &user)
        }));

        let diagnostic = match answer {
            Ok(Ok(text)) => {
                let text = text.trim();
                match text.parse::<CategoryLabel>() {
                    Ok(label) => return ClassificationResult::new(label, Provenance::Model),
                    Err(_) => Diagnostic::invalid_response(text),
                }
            }
            Ok(Err(e)) => Diagnostic::request_failed(format!("{e:#}")),
            Err(payload) => Diagnostic::request_failed(format!(
                "backend panicked: {}",
                panic_message(payload.as_ref())
            )),
        };

        warn!(
            description,
            merchant_category,
            transaction_type,
            "defaulting to {}: {}",
            CategoryLabel::Other,
            diagnostic
        );
        ClassificationResult::defaulted(diagnostic)
    }

    fn name(&self) -> &str {
        "remote"
    }
}
