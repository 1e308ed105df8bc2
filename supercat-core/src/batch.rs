//! Deduplicating batch classification.
//!
//! Each distinct fingerprint in a batch is classified exactly once and its
//! result is broadcast to every record that shares it. Records with equal
//! fingerprints therefore get the same label by construction.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::thread;

use anyhow::Result;
use tracing::{debug, info, warn};

use crate::classifier::{ClassificationResult, Classifier, Diagnostic, Provenance};
use crate::label::CategoryLabel;
use crate::record::{Fingerprint, TransactionRecord};
use crate::report::Distribution;

/// Fingerprint → result map for one batch run.
#[derive(Debug, Clone, Default)]
pub struct FingerprintCache {
    entries: HashMap<Fingerprint, ClassificationResult>,
}

impl FingerprintCache {
    pub fn get(&self, fingerprint: &Fingerprint) -> Option<&ClassificationResult> {
        self.entries.get(fingerprint)
    }

    pub fn contains(&self, fingerprint: &Fingerprint) -> bool {
        self.entries.contains_key(fingerprint)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Fingerprint, &ClassificationResult)> {
        self.entries.iter()
    }

    /// Entries that were actually resolved (not defaulted), for checkpointing.
    pub fn resolved_labels(&self) -> impl Iterator<Item = (&Fingerprint, CategoryLabel)> {
        self.entries
            .iter()
            .filter(|(_, r)| !r.is_defaulted())
            .map(|(fp, r)| (fp, r.label))
    }

    fn insert(&mut self, fingerprint: Fingerprint, result: ClassificationResult) {
        self.entries.insert(fingerprint, result);
    }
}

/// Labels for a whole batch, in input order.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchOutcome {
    pub labels: Vec<CategoryLabel>,
    /// Parallel to `labels`: why a record was defaulted, if it was
    pub diagnostics: Vec<Option<Diagnostic>>,
    pub unique_fingerprints: usize,
    /// Number of calls made to the underlying classifier in this run
    pub classifier_calls: usize,
}

impl BatchOutcome {
    pub fn defaulted_count(&self) -> usize {
        self.diagnostics.iter().filter(|d| d.is_some()).count()
    }

    pub fn distribution(&self) -> Distribution {
        Distribution::from_labels(&self.labels)
    }
}

/// Runs a [`Classifier`] over a batch, once per distinct fingerprint.
///
/// Only labels seeded through [`with_resolved`](Self::with_resolved) carry
/// over between runs; every `classify` call starts a fresh cache from them.
pub struct BatchClassifier<'c, C: Classifier + ?Sized> {
    classifier: &'c C,
    workers: usize,
    seeds: FingerprintCache,
    cache: FingerprintCache,
}

impl<'c, C: Classifier + ?Sized> BatchClassifier<'c, C> {
    pub fn new(classifier: &'c C) -> Self {
        Self {
            classifier,
            workers: 1,
            seeds: FingerprintCache::default(),
            cache: FingerprintCache::default(),
        }
    }

    /// Classify distinct fingerprints on up to `workers` threads (minimum 1).
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Seed labels resolved by an earlier run; those fingerprints are not re-classified.
    pub fn with_resolved(
        mut self,
        resolved: impl IntoIterator<Item = (Fingerprint, CategoryLabel)>,
    ) -> Self {
        for (fp, label) in resolved {
            self.seeds
                .insert(fp, ClassificationResult::new(label, Provenance::Checkpoint));
        }
        self.cache = self.seeds.clone();
        self
    }

    /// Results of the most recent run (the seeds before the first one).
    pub fn cache(&self) -> &FingerprintCache {
        &self.cache
    }

    pub fn classify(&mut self, records: &[TransactionRecord]) -> BatchOutcome {
        self.classify_with_checkpoint(records, usize::MAX, |_| Ok(()))
    }

    /// Like [`classify`](Self::classify), but resolves pending fingerprints in
    /// chunks of `chunk_size` and hands the cache to `on_chunk` after each one.
    ///
    /// A failing callback is logged; the batch still completes.
    pub fn classify_with_checkpoint<F>(
        &mut self,
        records: &[TransactionRecord],
        chunk_size: usize,
        mut on_chunk: F,
    ) -> BatchOutcome
    where
        F: FnMut(&FingerprintCache) -> Result<()>,
    {
        self.cache = self.seeds.clone();
        let fingerprints: Vec<Fingerprint> = records.iter().map(Fingerprint::from).collect();

        let mut seen = HashSet::new();
        let mut unique = 0usize;
        let mut pending = Vec::new();
        for fp in &fingerprints {
            if seen.insert(fp) {
                unique += 1;
                if !self.cache.contains(fp) {
                    pending.push(fp.clone());
                }
            }
        }

        info!(
            classifier = self.classifier.name(),
            records = records.len(),
            unique,
            pending = pending.len(),
            "classifying batch"
        );

        let chunk_size = chunk_size.max(1);
        let mut calls = 0usize;
        for (n, chunk) in pending.chunks(chunk_size).enumerate() {
            for (fp, result) in self.resolve(chunk) {
                self.cache.insert(fp, result);
            }
            calls += chunk.len();
            debug!(chunk = n, resolved = calls, total = pending.len(), "chunk resolved");
            if let Err(e) = on_chunk(&self.cache) {
                warn!("checkpoint callback failed: {e:#}");
            }
        }

        let mut labels = Vec::with_capacity(records.len());
        let mut diagnostics = Vec::with_capacity(records.len());
        for fp in &fingerprints {
            match self.cache.get(fp) {
                Some(result) => {
                    labels.push(result.label);
                    diagnostics.push(result.diagnostic().cloned());
                }
                // Every fingerprint was either seeded or resolved above.
                None => {
                    labels.push(CategoryLabel::Other);
                    diagnostics.push(Some(Diagnostic::request_failed(
                        "fingerprint was not resolved",
                    )));
                }
            }
        }

        let outcome = BatchOutcome {
            labels,
            diagnostics,
            unique_fingerprints: unique,
            classifier_calls: calls,
        };
        info!(
            calls = outcome.classifier_calls,
            defaulted = outcome.defaulted_count(),
            "batch classified"
        );
        outcome
    }

    fn resolve(&self, chunk: &[Fingerprint]) -> Vec<(Fingerprint, ClassificationResult)> {
        let classify = |fp: &Fingerprint| {
            self.classifier
                .classify(&fp.description, &fp.merchant_category, &fp.transaction_type)
        };

        let workers = self.workers.min(chunk.len());
        if workers <= 1 {
            return chunk.iter().map(|fp| (fp.clone(), classify(fp))).collect();
        }

        // Each index is claimed by exactly one worker through the cursor.
        let cursor = AtomicUsize::new(0);
        let out = Mutex::new(Vec::with_capacity(chunk.len()));
        thread::scope(|s| {
            for _ in 0..workers {
                s.spawn(|| {
                    loop {
                        let i = cursor.fetch_add(1, Ordering::Relaxed);
                        let Some(fp) = chunk.get(i) else { break };
                        let result = classify(fp);
                        out.lock()
                            .unwrap_or_else(|poisoned| poisoned.into_inner())
                            .push((fp.clone(), result));
                    }
                });
            }
        });
        out.into_inner().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Classify a batch with a single worker and no seeded results.
pub fn classify_batch<C: Classifier + ?Sized>(
    classifier: &C,
    records: &[TransactionRecord],
) -> BatchOutcome {
    BatchClassifier::new(classifier).classify(records)
}
