//! Per-pattern accuracy aggregation.

use serde::{Deserialize, Serialize};

use crate::classify::Category;

/// Total/success counters for one category
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryStats {
    pub total: usize,
    pub success: usize,
}

impl CategoryStats {
    /// Success ratio in percent; 0 when the category is empty
    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.success as f64 / self.total as f64 * 100.0
    }
}

/// Outcome counters for one pattern name under one parameter combination.
///
/// One fixed slot per [`Category`] — no string keys.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternStats {
    counters: [CategoryStats; 4],
}

impl PatternStats {
    pub fn record(&mut self, category: Category, success: bool) {
        let slot = &mut self.counters[category.index()];
        slot.total += 1;
        if success {
            slot.success += 1;
        }
    }

    #[inline]
    pub fn get(&self, category: Category) -> CategoryStats {
        self.counters[category.index()]
    }

    /// Sum of totals across all four categories
    pub fn total(&self) -> usize {
        self.counters.iter().map(|c| c.total).sum()
    }

    /// Sum of successes across all four categories
    pub fn successes(&self) -> usize {
        self.counters.iter().map(|c| c.success).sum()
    }

    /// Average accuracy in percent plus the raw prediction count.
    ///
    /// Below `min_predictions` the accuracy is forced to 0 even when the
    /// raw ratio is high, but the raw total is still returned verbatim so
    /// a consumer can tell "no signal" from "signal below the sample-size
    /// bar". The two currently look identical (0%) to the retention
    /// decision; that conflation is deliberate and documented, not a bug.
    pub fn average_accuracy(&self, min_predictions: usize) -> (f64, usize) {
        let total = self.total();
        if total == 0 || total < min_predictions {
            return (0.0, total);
        }
        (self.successes() as f64 / total as f64 * 100.0, total)
    }
}

// ============================================================
// TESTS
// ============================================================
