//! The text analytics engine seam.

use std::collections::HashSet;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::EngineResult;

/// A token and how often it occurred. Serialized as `[word, count]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WordFrequency(pub String, pub usize);

impl WordFrequency {
    pub fn word(&self) -> &str {
        &self.0
    }

    pub fn count(&self) -> usize {
        self.1
    }
}

/// NLP primitives the aggregator is built from.
///
/// Implementations are constructed explicitly and injected; nothing in the
/// aggregator reaches for a global model.
#[async_trait]
pub trait TextAnalyticsEngine: Send + Sync {
    /// Splits text into word tokens, in order, original case kept.
    async fn tokenize(&self, text: &str) -> EngineResult<Vec<String>>;

    /// Returns the `top_k` most frequent tokens, most frequent first. Tokens
    /// whose lowercase form is in `excluded` are never counted.
    async fn frequency(
        &self,
        tokens: &[String],
        excluded: &HashSet<String>,
        top_k: usize,
    ) -> EngineResult<Vec<WordFrequency>>;

    /// The sentence that best represents the text, if it has any.
    async fn best_sentence(&self, text: &str) -> EngineResult<Option<String>>;

    /// The best sentence among those containing `keyword`, if any does.
    async fn best_sentence_containing(
        &self,
        text: &str,
        keyword: &str,
    ) -> EngineResult<Option<String>>;

    /// Sentiment of the text in `[-1, 1]`.
    async fn sentiment(&self, text: &str) -> EngineResult<f64>;

    /// Tokens within `width` positions of each occurrence of `keyword`,
    /// the occurrences themselves excluded.
    async fn context_window(
        &self,
        text: &str,
        keyword: &str,
        width: usize,
    ) -> EngineResult<Vec<String>>;
}
