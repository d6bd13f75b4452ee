//! Stopword ledger rows.

use serde::{Deserialize, Serialize};

use crate::{AppId, StopwordId};

/// A word excluded from an app's analytics.
///
/// Rows are never deleted. Disabling is the only way to retract a word, so
/// analytics computed against an older exclusion list stay reproducible.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stopword {
    pub id: StopwordId,
    pub app_id: AppId,
    pub word: String,
    pub enabled: bool,
}

/// Normalises a submitted stopword: trimmed and lowercased. Returns `None`
/// for blank input.
pub fn normalize_stopword(word: &str) -> Option<String> {
    let word = word.trim();
    if word.is_empty() {
        None
    } else {
        Some(word.to_lowercase())
    }
}

/// Counts of what a reconciliation changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileReport {
    pub inserted: usize,
    pub reenabled: usize,
    pub disabled: usize,
    pub unchanged: usize,
}

impl ReconcileReport {
    /// Returns true if nothing was written.
    pub fn is_noop(&self) -> bool {
        self.inserted == 0 && self.reenabled == 0 && self.disabled == 0
    }
}
