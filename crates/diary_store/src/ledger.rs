//! Stopword reconciliation planning.
//!
//! Stores call [`StopwordPlan::between`] inside their transaction, with the
//! rows they just loaded, and then apply the plan. Keeping the planning pure
//! lets both stores share the exact same ledger semantics.

use std::collections::{BTreeMap, BTreeSet};

use entities::{normalize_stopword, ReconcileReport, Stopword, StopwordId};

/// The writes needed to move an app's ledger to a desired word set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StopwordPlan {
    /// Disabled rows whose word was resubmitted. Flipped back in place.
    pub reenable: Vec<StopwordId>,
    /// Enabled rows whose word is no longer wanted.
    pub disable: Vec<StopwordId>,
    /// Words with no row at all.
    pub insert: Vec<String>,
    /// Enabled rows that stay enabled.
    pub unchanged: usize,
}

impl StopwordPlan {
    /// Computes the plan. Desired words are normalised and deduplicated.
    ///
    /// Re-enabling is decided before anything else so a resubmitted word is
    /// never disabled and reinserted. No row is ever scheduled for removal.
    pub fn between(existing: &[Stopword], desired: &[String]) -> Self {
        let desired: BTreeSet<String> = desired
            .iter()
            .filter_map(|w| normalize_stopword(w))
            .collect();

        let mut by_word: BTreeMap<&str, Vec<&Stopword>> = BTreeMap::new();
        for row in existing {
            by_word.entry(row.word.as_str()).or_default().push(row);
        }

        let mut plan = Self::default();

        for word in &desired {
            match by_word.get(word.as_str()) {
                Some(rows) => {
                    if rows.iter().any(|r| r.enabled) {
                        plan.unchanged += 1;
                    } else if let Some(row) = rows.iter().min_by_key(|r| r.id) {
                        plan.reenable.push(row.id);
                    }
                }
                None => plan.insert.push(word.clone()),
            }
        }

        for (word, rows) in &by_word {
            if desired.contains(*word) {
                continue;
            }
            plan.disable
                .extend(rows.iter().filter(|r| r.enabled).map(|r| r.id));
        }

        plan
    }

    /// Returns true if applying the plan writes nothing.
    pub fn is_empty(&self) -> bool {
        self.reenable.is_empty() && self.disable.is_empty() && self.insert.is_empty()
    }

    /// Summarises the plan.
    pub fn report(&self) -> ReconcileReport {
        ReconcileReport {
            inserted: self.insert.len(),
            reenabled: self.reenable.len(),
            disabled: self.disable.len(),
            unchanged: self.unchanged,
        }
    }
}
