//! Resume file for long remote runs: fingerprints that already have a label.
//!
//! Only results that were actually resolved are stored. Defaulted rows are
//! left out so a resumed run retries them.

use anyhow::{Context, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::debug;

use supercat_core::{CategoryLabel, Fingerprint, FingerprintCache};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointEntry {
    pub fingerprint: Fingerprint,
    pub label: CategoryLabel,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub updated_at: Option<String>,
    pub entries: Vec<CheckpointEntry>,
}

impl Checkpoint {
    /// Load a checkpoint; a missing file is an empty checkpoint.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let s = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
        let cp: Checkpoint =
            serde_json::from_str(&s).with_context(|| format!("parse {}", path.display()))?;
        debug!(entries = cp.entries.len(), path = %path.display(), "loaded checkpoint");
        Ok(cp)
    }

    pub fn from_cache(cache: &FingerprintCache) -> Self {
        let mut entries: Vec<CheckpointEntry> = cache
            .resolved_labels()
            .map(|(fp, label)| CheckpointEntry {
                fingerprint: fp.clone(),
                label,
            })
            .collect();
        // Stable file contents across runs.
        entries.sort_by(|a, b| a.fingerprint.cmp(&b.fingerprint));
        Self {
            updated_at: Some(Utc::now().to_rfc3339()),
            entries,
        }
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self).context("serialize checkpoint")?;
        fs::write(path, json).with_context(|| format!("write {}", path.display()))?;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn into_resolved(self) -> impl Iterator<Item = (Fingerprint, CategoryLabel)> {
        self.entries.into_iter().map(|e| (e.fingerprint, e.label))
    }
}
