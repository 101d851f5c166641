use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Closed set of sentiment classes, in canonical order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Negative,
    Neutral,
    Positive,
}

impl Sentiment {
    pub const ALL: [Sentiment; 3] = [Sentiment::Negative, Sentiment::Neutral, Sentiment::Positive];

    /// Trims and case-folds a raw label. Returns `None` for anything outside the closed set.
    pub fn normalize(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "negative" => Some(Sentiment::Negative),
            "neutral" => Some(Sentiment::Neutral),
            "positive" => Some(Sentiment::Positive),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Sentiment::Negative => "negative",
            Sentiment::Neutral => "neutral",
            Sentiment::Positive => "positive",
        }
    }

    pub fn index(&self) -> usize {
        *self as usize
    }
}

impl fmt::Display for Sentiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Sentiment {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Sentiment::normalize(s)
            .ok_or_else(|| crate::Error::Dataset(format!("Unknown sentiment label: {:?}", s)))
    }
}

/// A scraped headline, as produced by the scraper.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeadlineRecord {
    pub text: String,
    pub capture_time: DateTime<Utc>,
    pub source_label: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabeledSample {
    pub text: String,
    pub sentiment: Sentiment,
}

impl LabeledSample {
    pub fn new(text: impl Into<String>, sentiment: Sentiment) -> Self {
        Self {
            text: text.into(),
            sentiment,
        }
    }

    /// Builds a sample from a raw, un-normalized label.
    pub fn from_raw(text: impl Into<String>, raw_label: &str) -> Option<Self> {
        Sentiment::normalize(raw_label).map(|sentiment| Self::new(text, sentiment))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRecord {
    #[serde(rename = "headline")]
    pub text: String,
    #[serde(rename = "predicted_sentiment")]
    pub predicted: Sentiment,
}

/// One scoring run's predictions, in input order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionBatch {
    pub created_at: DateTime<Utc>,
    pub records: Vec<PredictionRecord>,
}

impl PredictionBatch {
    pub fn new(created_at: DateTime<Utc>, records: Vec<PredictionRecord>) -> Self {
        Self { created_at, records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn counts(&self) -> LabelCounts {
        LabelCounts::tally(self.records.iter().map(|r| r.predicted))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelCounts {
    pub positive: usize,
    pub neutral: usize,
    pub negative: usize,
    pub total: usize,
}

impl LabelCounts {
    pub fn tally<I>(labels: I) -> Self
    where
        I: IntoIterator<Item = Sentiment>,
    {
        let mut counts = LabelCounts::default();
        for label in labels {
            counts.add(label);
        }
        counts
    }

    pub fn add(&mut self, label: Sentiment) {
        match label {
            Sentiment::Positive => self.positive += 1,
            Sentiment::Neutral => self.neutral += 1,
            Sentiment::Negative => self.negative += 1,
        }
        self.total += 1;
    }

    pub fn get(&self, label: Sentiment) -> usize {
        match label {
            Sentiment::Positive => self.positive,
            Sentiment::Neutral => self.neutral,
            Sentiment::Negative => self.negative,
        }
    }
}

impl fmt::Display for LabelCounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Total: {} | Positive: {} | Neutral: {} | Negative: {}",
            self.total, self.positive, self.neutral, self.negative
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_labels() {
        assert_eq!(Sentiment::normalize("  Positive "), Some(Sentiment::Positive));
        assert_eq!(Sentiment::normalize("NEUTRAL"), Some(Sentiment::Neutral));
        assert_eq!(Sentiment::normalize("negative\n"), Some(Sentiment::Negative));
        assert_eq!(Sentiment::normalize("mixed"), None);
        assert_eq!(Sentiment::normalize(""), None);
    }

    #[test]
    fn test_from_str_rejects_unknown() {
        assert!("bullish".parse::<Sentiment>().is_err());
        assert_eq!("positive".parse::<Sentiment>().unwrap(), Sentiment::Positive);
    }

    #[test]
    fn test_serde_uses_lowercase_names() {
        let json = serde_json::to_string(&Sentiment::Neutral).unwrap();
        assert_eq!(json, "\"neutral\"");
    }

    #[test]
    fn test_counts_sum_to_total() {
        let counts = LabelCounts::tally(vec![
            Sentiment::Positive,
            Sentiment::Positive,
            Sentiment::Negative,
        ]);
        assert_eq!(counts.positive, 2);
        assert_eq!(counts.neutral, 0);
        assert_eq!(counts.negative, 1);
        assert_eq!(counts.positive + counts.neutral + counts.negative, counts.total);
    }

    #[test]
    fn test_empty_batch_counts() {
        let batch = PredictionBatch::new(Utc::now(), vec![]);
        assert!(batch.is_empty());
        assert_eq!(batch.counts(), LabelCounts::default());
    }
}
