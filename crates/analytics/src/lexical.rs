//! A lexicon-based engine.
//!
//! Tokenizes with `\w+`, ranks sentences by the frequency of their content
//! words, and scores sentiment against a small polarity lexicon with
//! negation handling.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use regex::Regex;

use crate::{exclusion_set, EngineError, EngineResult, TextAnalyticsEngine, WordFrequency};

const POSITIVE: &[&str] = &[
    "good", "great", "excellent", "amazing", "awesome", "happy", "enjoy", "enjoyed", "enjoying",
    "love", "loved", "like", "liked", "helpful", "useful", "productive", "focused", "confident",
    "clear", "easy", "interesting", "fun", "better", "best", "success", "successful", "proud",
    "calm", "motivated", "progress", "improved", "improving", "understand", "understood",
    "satisfied", "glad", "relaxed", "nice", "effective", "accomplished",
];

const NEGATIVE: &[&str] = &[
    "bad", "terrible", "awful", "hate", "hated", "sad", "angry", "stressed", "stress",
    "stressful", "tired", "exhausted", "confused", "confusing", "hard", "difficult", "boring",
    "bored", "worse", "worst", "fail", "failed", "failing", "anxious", "anxiety", "frustrated",
    "frustrating", "distracted", "overwhelmed", "struggle", "struggled", "struggling", "lost",
    "worried", "unproductive", "procrastinated", "behind", "problem", "difficulty", "annoying",
];

const NEGATORS: &[&str] = &["not", "no", "never", "nothing", "hardly", "cannot", "dont", "didnt"];

/// How far back a negator reaches.
const NEGATION_SCOPE: usize = 3;

/// Normalization constant for the raw polarity sum.
const SENTIMENT_ALPHA: f64 = 15.0;

/// Rounds to two decimals.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Lexicon-based [`TextAnalyticsEngine`].
#[derive(Debug, Clone)]
pub struct LexicalEngine {
    word: Regex,
    sentence: Regex,
    positive: HashSet<&'static str>,
    negative: HashSet<&'static str>,
    negators: HashSet<&'static str>,
    defaults: HashSet<String>,
}

impl LexicalEngine {
    pub fn new() -> EngineResult<Self> {
        let word = Regex::new(r"\w+").map_err(|e| EngineError::Unavailable(e.to_string()))?;
        let sentence =
            Regex::new(r"[^.!?\n]+[.!?]*").map_err(|e| EngineError::Unavailable(e.to_string()))?;

        Ok(Self {
            word,
            sentence,
            positive: POSITIVE.iter().copied().collect(),
            negative: NEGATIVE.iter().copied().collect(),
            negators: NEGATORS.iter().copied().collect(),
            defaults: exclusion_set([]),
        })
    }

    fn words(&self, text: &str) -> Vec<String> {
        self.word
            .find_iter(text)
            .map(|m| m.as_str().to_string())
            .collect()
    }

    fn lower_words(&self, text: &str) -> Vec<String> {
        self.word
            .find_iter(text)
            .map(|m| m.as_str().to_lowercase())
            .collect()
    }

    fn sentences<'t>(&self, text: &'t str) -> Vec<&'t str> {
        self.sentence
            .find_iter(text)
            .map(|m| m.as_str().trim())
            .filter(|s| self.word.is_match(s))
            .collect()
    }

    /// Scores each sentence by the mean normalized frequency of its content
    /// words across the whole text.
    fn ranked<'t>(&self, text: &'t str) -> Vec<(&'t str, f64)> {
        let sentences = self.sentences(text);

        let mut freq: HashMap<String, usize> = HashMap::new();
        for word in self.lower_words(text) {
            if !self.defaults.contains(&word) {
                *freq.entry(word).or_default() += 1;
            }
        }
        let max = freq.values().copied().max().unwrap_or(1) as f64;

        sentences
            .into_iter()
            .map(|sentence| {
                let content: Vec<String> = self
                    .lower_words(sentence)
                    .into_iter()
                    .filter(|w| !self.defaults.contains(w))
                    .collect();
                let score = if content.is_empty() {
                    0.0
                } else {
                    content
                        .iter()
                        .map(|w| freq.get(w).copied().unwrap_or(0) as f64 / max)
                        .sum::<f64>()
                        / content.len() as f64
                };
                (sentence, score)
            })
            .collect()
    }

    /// Highest score wins; the earliest sentence wins ties.
    fn pick<'t>(ranked: impl IntoIterator<Item = (&'t str, f64)>) -> Option<String> {
        let mut best: Option<(&str, f64)> = None;
        for (sentence, score) in ranked {
            if best.is_none_or(|(_, top)| score > top) {
                best = Some((sentence, score));
            }
        }
        best.map(|(s, _)| s.to_string())
    }

    fn polarity(&self, text: &str) -> f64 {
        let words = self.lower_words(text);
        let mut total = 0.0;
        for (i, word) in words.iter().enumerate() {
            let value = if self.positive.contains(word.as_str()) {
                1.0
            } else if self.negative.contains(word.as_str()) {
                -1.0
            } else {
                continue;
            };
            let negated = words[i.saturating_sub(NEGATION_SCOPE)..i]
                .iter()
                .any(|w| self.negators.contains(w.as_str()));
            total += if negated { -value } else { value };
        }
        total / (total * total + SENTIMENT_ALPHA).sqrt()
    }
}

#[async_trait]
impl TextAnalyticsEngine for LexicalEngine {
    async fn tokenize(&self, text: &str) -> EngineResult<Vec<String>> {
        Ok(self.words(text))
    }

    async fn frequency(
        &self,
        tokens: &[String],
        excluded: &HashSet<String>,
        top_k: usize,
    ) -> EngineResult<Vec<WordFrequency>> {
        // (count, first position) per lowercased token
        let mut counts: HashMap<String, (usize, usize)> = HashMap::new();
        for (position, token) in tokens.iter().enumerate() {
            let word = token.to_lowercase();
            if excluded.contains(&word) {
                continue;
            }
            counts.entry(word).or_insert((0, position)).0 += 1;
        }

        let mut ranked: Vec<(String, usize, usize)> = counts
            .into_iter()
            .map(|(word, (count, first))| (word, count, first))
            .collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.2.cmp(&b.2)));

        Ok(ranked
            .into_iter()
            .take(top_k)
            .map(|(word, count, _)| WordFrequency(word, count))
            .collect())
    }

    async fn best_sentence(&self, text: &str) -> EngineResult<Option<String>> {
        Ok(Self::pick(self.ranked(text)))
    }

    async fn best_sentence_containing(
        &self,
        text: &str,
        keyword: &str,
    ) -> EngineResult<Option<String>> {
        let keyword = keyword.to_lowercase();
        let ranked = self.ranked(text).into_iter().filter(|(sentence, _)| {
            self.lower_words(sentence).iter().any(|w| *w == keyword)
        });
        Ok(Self::pick(ranked))
    }

    async fn sentiment(&self, text: &str) -> EngineResult<f64> {
        Ok(round2(self.polarity(text).clamp(-1.0, 1.0)))
    }

    async fn context_window(
        &self,
        text: &str,
        keyword: &str,
        width: usize,
    ) -> EngineResult<Vec<String>> {
        let keyword = keyword.to_lowercase();
        let words = self.words(text);
        let hits: Vec<usize> = words
            .iter()
            .enumerate()
            .filter(|(_, w)| w.to_lowercase() == keyword)
            .map(|(i, _)| i)
            .collect();

        let mut taken = vec![false; words.len()];
        for &hit in &hits {
            let start = hit.saturating_sub(width);
            let end = (hit + width + 1).min(words.len());
            for slot in &mut taken[start..end] {
                *slot = true;
            }
        }
        for &hit in &hits {
            taken[hit] = false;
        }

        Ok(words
            .into_iter()
            .zip(taken)
            .filter_map(|(w, keep)| keep.then_some(w))
            .collect())
    }
}
