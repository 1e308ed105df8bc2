//! Category distribution over a labeled batch.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::label::CategoryLabel;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DistributionEntry {
    pub label: CategoryLabel,
    pub count: usize,
    /// 0.0 - 100.0
    pub percentage: f64,
}

/// Count and share of each of the five labels. Always has five entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Distribution {
    total: usize,
    entries: Vec<DistributionEntry>,
}

impl Distribution {
    pub fn from_labels(labels: &[CategoryLabel]) -> Self {
        let total = labels.len();
        let entries = CategoryLabel::ALL
            .into_iter()
            .map(|label| {
                let count = labels.iter().filter(|l| **l == label).count();
                let percentage = if total == 0 {
                    0.0
                } else {
                    count as f64 / total as f64 * 100.0
                };
                DistributionEntry {
                    label,
                    count,
                    percentage,
                }
            })
            .collect();
        Self { total, entries }
    }

    pub fn total(&self) -> usize {
        self.total
    }

    /// Entries in canonical label order.
    pub fn entries(&self) -> &[DistributionEntry] {
        &self.entries
    }

    pub fn count(&self, label: CategoryLabel) -> usize {
        self.entry(label).map(|e| e.count).unwrap_or(0)
    }

    pub fn percentage(&self, label: CategoryLabel) -> f64 {
        self.entry(label).map(|e| e.percentage).unwrap_or(0.0)
    }

    /// Entries by descending count; ties keep canonical order.
    pub fn ranked(&self) -> Vec<DistributionEntry> {
        let mut out = self.entries.clone();
        out.sort_by(|a, b| b.count.cmp(&a.count));
        out
    }

    fn entry(&self, label: CategoryLabel) -> Option<&DistributionEntry> {
        self.entries.iter().find(|e| e.label == label)
    }
}

impl fmt::Display for Distribution {
    /// One line per label with a non-zero count, largest first.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for e in self.ranked().iter().filter(|e| e.count > 0) {
            writeln!(f, "  {}: {} ({:.1}%)", e.label, e.count, e.percentage)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(income: usize, other: usize) -> Vec<CategoryLabel> {
        let mut v = vec![CategoryLabel::IncomeReceipts; income];
        v.extend(vec![CategoryLabel::Other; other]);
        v
    }

    #[test]
    fn test_thirty_seventy() {
        let d = Distribution::from_labels(&labels(3, 7));
        assert_eq!(d.total(), 10);
        assert_eq!(d.count(CategoryLabel::IncomeReceipts), 3);
        assert_eq!(d.count(CategoryLabel::Other), 7);
        assert!((d.percentage(CategoryLabel::IncomeReceipts) - 30.0).abs() < 1e-9);
        assert!((d.percentage(CategoryLabel::Other) - 70.0).abs() < 1e-9);
        assert_eq!(d.percentage(CategoryLabel::LifestyleSpending), 0.0);
        let counted: usize = d.entries().iter().map(|e| e.count).sum();
        assert_eq!(counted, 10);
    }

    #[test]
    fn test_percentages_sum_to_hundred() {
        let v = vec![
            CategoryLabel::EssentialLiving,
            CategoryLabel::LifestyleSpending,
            CategoryLabel::LifestyleSpending,
        ];
        let d = Distribution::from_labels(&v);
        let sum: f64 = d.entries().iter().map(|e| e.percentage).sum();
        assert!((sum - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_batch_all_zero() {
        let d = Distribution::from_labels(&[]);
        assert_eq!(d.entries().len(), 5);
        assert!(d.entries().iter().all(|e| e.count == 0 && e.percentage == 0.0));
        assert_eq!(d.to_string(), "");
    }

    #[test]
    fn test_display_ranked() {
        let d = Distribution::from_labels(&labels(3, 7));
        assert_eq!(d.to_string(), "  Other: 7 (70.0%)\n  Income_Receipts: 3 (30.0%)\n");
        assert_eq!(d.ranked()[0].label, CategoryLabel::Other);
    }
}
