use serde::Serialize;

use crate::{AnalyticsError, AnalyticsResult};

/// Number of words shown in a word cloud.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WordCloudLimit(usize);

impl WordCloudLimit {
    pub const DEFAULT: usize = 12;
    pub const MAX: usize = 99;

    pub fn new(limit: usize) -> AnalyticsResult<Self> {
        if (1..=Self::MAX).contains(&limit) {
            Ok(Self(limit))
        } else {
            Err(AnalyticsError::InvalidLimit(limit.to_string()))
        }
    }

    /// Parses a raw query value. Absent means the default; anything other
    /// than a plain number in range is rejected.
    pub fn parse(raw: Option<&str>) -> AnalyticsResult<Self> {
        let Some(raw) = raw else {
            return Ok(Self::default());
        };
        if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
            return Err(AnalyticsError::InvalidLimit(raw.to_string()));
        }
        let limit = raw
            .parse::<usize>()
            .map_err(|_| AnalyticsError::InvalidLimit(raw.to_string()))?;
        Self::new(limit)
    }

    pub fn get(&self) -> usize {
        self.0
    }
}

impl Default for WordCloudLimit {
    fn default() -> Self {
        Self(Self::DEFAULT)
    }
}
