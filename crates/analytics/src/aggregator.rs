//! Analytics aggregation over an app's entries.

use std::{collections::HashSet, sync::Arc, time::Duration};

use entities::{Entry, EntryId, UserId};
use futures::{stream, FutureExt, StreamExt};
use serde::Serialize;

use crate::{
    exclusion_set, round2, AnalyticsError, AnalyticsResult, EngineResult, TextAnalyticsEngine,
    WordCloudLimit, WordFrequency,
};

/// Aggregator tuning.
#[derive(Debug, Clone)]
pub struct AggregatorConfig {
    /// Entries analysed at the same time.
    pub concurrency: usize,
    /// Budget for all engine calls of a single entry.
    pub entry_timeout: Duration,
    /// Tokens taken on each side of a keyword for association clouds.
    pub context_width: usize,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            concurrency: 8,
            entry_timeout: Duration::from_secs(10),
            context_width: 5,
        }
    }
}

/// The representative sentence and sentiment of one entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SentenceHighlight {
    pub entry_id: EntryId,
    /// Authoring student.
    pub user: UserId,
    pub sentence: Option<String>,
    pub sentiment: f64,
}

/// Word count against sentiment, one point per entry. The three vectors are
/// index-aligned.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Scatter {
    pub x: Vec<usize>,
    pub y: Vec<f64>,
    pub entry_ids: Vec<EntryId>,
}

/// App-wide analytics view.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    pub wordcloud: Vec<WordFrequency>,
    pub sentences: Vec<SentenceHighlight>,
    pub graph: Scatter,
    /// Entries the engine failed on. They are missing from every other field.
    pub failed_entry_ids: Vec<EntryId>,
}

/// Analytics focused on one keyword.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WordRelations {
    pub word: String,
    pub wordcloud: Vec<WordFrequency>,
    pub sentences: Vec<SentenceHighlight>,
    pub failed_entry_ids: Vec<EntryId>,
}

struct EntryAnalysis {
    entry_id: EntryId,
    student_id: UserId,
    tokens: Vec<String>,
    sentence: Option<String>,
    sentiment: f64,
    context: Vec<String>,
}

impl EntryAnalysis {
    fn highlight(&self) -> SentenceHighlight {
        SentenceHighlight {
            entry_id: self.entry_id,
            user: self.student_id,
            sentence: self.sentence.clone(),
            sentiment: self.sentiment,
        }
    }
}

async fn analyze_entry<E: TextAnalyticsEngine + ?Sized>(
    engine: &E,
    entry: &Entry,
    keyword: Option<&str>,
    context_width: usize,
) -> EngineResult<EntryAnalysis> {
    let text = entry.content.as_str();
    let tokens = engine.tokenize(text).await?;

    let sentence = match keyword {
        Some(keyword) => match engine.best_sentence_containing(text, keyword).await? {
            Some(sentence) => Some(sentence),
            None => engine.best_sentence(text).await?,
        },
        None => engine.best_sentence(text).await?,
    };
    let sentiment = round2(engine.sentiment(text).await?.clamp(-1.0, 1.0));
    let context = match keyword {
        Some(keyword) => engine.context_window(text, keyword, context_width).await?,
        None => Vec::new(),
    };

    Ok(EntryAnalysis {
        entry_id: entry.id,
        student_id: entry.student_id,
        tokens,
        sentence,
        sentiment,
        context,
    })
}

/// Builds analytics views from entries the caller is allowed to see.
pub struct Aggregator<E: TextAnalyticsEngine + ?Sized> {
    engine: Arc<E>,
    config: AggregatorConfig,
}

impl<E: TextAnalyticsEngine + ?Sized> Clone for Aggregator<E> {
    fn clone(&self) -> Self {
        Self {
            engine: self.engine.clone(),
            config: self.config.clone(),
        }
    }
}

impl<E: TextAnalyticsEngine + ?Sized> Aggregator<E> {
    pub fn new(engine: Arc<E>) -> Self {
        Self::with_config(engine, AggregatorConfig::default())
    }

    pub fn with_config(engine: Arc<E>, config: AggregatorConfig) -> Self {
        Self { engine, config }
    }

    /// Word cloud, per-entry sentence highlights and the sentiment scatter.
    pub async fn dashboard(
        &self,
        entries: &[Entry],
        stopwords: &[String],
        limit: WordCloudLimit,
    ) -> AnalyticsResult<Dashboard> {
        let (analyses, failed_entry_ids) = self.analyze_all(entries, None).await?;

        let excluded = exclusion_set(stopwords.iter().map(String::as_str));
        let tokens: Vec<String> = analyses
            .iter()
            .flat_map(|a| a.tokens.iter().cloned())
            .collect();
        let wordcloud = self.cloud(&tokens, &excluded, limit).await?;

        let mut graph = Scatter::default();
        for analysis in &analyses {
            graph.x.push(analysis.tokens.len());
            graph.y.push(analysis.sentiment);
            graph.entry_ids.push(analysis.entry_id);
        }

        Ok(Dashboard {
            wordcloud,
            sentences: analyses.iter().map(EntryAnalysis::highlight).collect(),
            graph,
            failed_entry_ids,
        })
    }

    /// Words appearing near `word`, and per entry the sentence containing
    /// it (or the representative sentence when it does not occur).
    pub async fn word_relations(
        &self,
        entries: &[Entry],
        word: &str,
        stopwords: &[String],
        limit: WordCloudLimit,
    ) -> AnalyticsResult<WordRelations> {
        let word = word.trim().to_lowercase();
        let (analyses, failed_entry_ids) = self.analyze_all(entries, Some(&word)).await?;

        let excluded = exclusion_set(
            stopwords
                .iter()
                .map(String::as_str)
                .chain(std::iter::once(word.as_str())),
        );
        let tokens: Vec<String> = analyses
            .iter()
            .flat_map(|a| a.context.iter().cloned())
            .collect();
        let wordcloud = self.cloud(&tokens, &excluded, limit).await?;

        Ok(WordRelations {
            sentences: analyses.iter().map(EntryAnalysis::highlight).collect(),
            word,
            wordcloud,
            failed_entry_ids,
        })
    }

    /// Runs the per-entry engine calls concurrently and recombines the
    /// results in entry id order. Failed entries are reported by id.
    async fn analyze_all<'a>(
        &self,
        entries: &'a [Entry],
        keyword: Option<&str>,
    ) -> AnalyticsResult<(Vec<EntryAnalysis>, Vec<EntryId>)> {
        let engine = &*self.engine;
        let timeout = self.config.entry_timeout;
        let width = self.config.context_width;

        let mut outcomes: Vec<(EntryId, Result<EntryAnalysis, String>)> = stream::iter(entries)
            .map(move |entry: &'a Entry| async move {
                let outcome =
                    match tokio::time::timeout(timeout, analyze_entry(engine, entry, keyword, width))
                        .await
                    {
                        Ok(Ok(analysis)) => Ok(analysis),
                        Ok(Err(e)) => Err(e.to_string()),
                        Err(_) => Err(format!("timed out after {:?}", timeout)),
                    };
                (entry.id, outcome)
            })
            .buffer_unordered(self.config.concurrency.max(1))
            .collect::<Vec<_>>()
            .boxed()
            .await;
        outcomes.sort_by_key(|(id, _)| *id);

        let mut analyses = Vec::with_capacity(outcomes.len());
        let mut failed = Vec::new();
        let mut last_error = None;
        for (entry_id, outcome) in outcomes {
            match outcome {
                Ok(analysis) => analyses.push(analysis),
                Err(e) => {
                    tracing::warn!(entry_id, error = %e, "Entry analysis failed");
                    failed.push(entry_id);
                    last_error = Some(e);
                }
            }
        }

        if analyses.is_empty() {
            if let Some(e) = last_error {
                return Err(AnalyticsError::UpstreamUnavailable(e));
            }
        }

        Ok((analyses, failed))
    }

    /// Top words with the exclusions applied, whatever the engine returned.
    async fn cloud(
        &self,
        tokens: &[String],
        excluded: &HashSet<String>,
        limit: WordCloudLimit,
    ) -> AnalyticsResult<Vec<WordFrequency>> {
        let top = self
            .engine
            .frequency(tokens, excluded, limit.get())
            .await
            .map_err(|e| AnalyticsError::UpstreamUnavailable(e.to_string()))?;

        Ok(top
            .into_iter()
            .filter(|w| !excluded.contains(&w.word().to_lowercase()))
            .take(limit.get())
            .collect())
    }
}
