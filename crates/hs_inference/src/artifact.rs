use chrono::{DateTime, SecondsFormat, Utc};
use hs_core::{Error, Result, Sentiment};
use std::sync::Arc;

use crate::classifier::FittedClassifier;
use crate::vectorizer::FittedVectorizer;
use crate::SentimentModel;

/// A fitted vectorizer and the classifier trained on its feature space.
///
/// The two halves are only ever constructed, stored and loaded together.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelArtifact {
    vectorizer: FittedVectorizer,
    classifier: FittedClassifier,
    fit_timestamp: DateTime<Utc>,
}

/// Loaded once per process and shared read-only.
pub type SharedArtifact = Arc<ModelArtifact>;

impl ModelArtifact {
    pub fn new(
        vectorizer: FittedVectorizer,
        classifier: FittedClassifier,
        fit_timestamp: DateTime<Utc>,
    ) -> Result<Self> {
        classifier.validate()?;
        if classifier.n_features() != vectorizer.dim() {
            return Err(Error::ArtifactCorrupt(format!(
                "classifier expects {} features but vectorizer produces {}",
                classifier.n_features(),
                vectorizer.dim()
            )));
        }
        Ok(Self {
            vectorizer,
            classifier,
            fit_timestamp,
        })
    }

    pub fn vectorizer(&self) -> &FittedVectorizer {
        &self.vectorizer
    }

    pub fn classifier(&self) -> &FittedClassifier {
        &self.classifier
    }

    pub fn fit_timestamp(&self) -> DateTime<Utc> {
        self.fit_timestamp
    }

    /// Identifier stamped on both stored halves so a mixed pair can be detected.
    pub fn fit_id(&self) -> String {
        fit_id_for(self.fit_timestamp)
    }

    pub fn into_shared(self) -> SharedArtifact {
        Arc::new(self)
    }

    pub fn predict_one(&self, text: &str) -> Result<Sentiment> {
        let features = [self.vectorizer.transform_one(text)];
        let mut labels = self.classifier.predict(&features)?;
        labels
            .pop()
            .ok_or_else(|| Error::Scoring("classifier returned no label".to_string()))
    }
}

pub fn fit_id_for(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

impl SentimentModel for ModelArtifact {
    fn name(&self) -> &str {
        "tfidf-logreg"
    }

    fn predict(&self, texts: &[String]) -> Result<Vec<Sentiment>> {
        let features = self.vectorizer.transform(texts);
        let labels = self.classifier.predict(&features)?;
        if labels.len() != texts.len() {
            return Err(Error::Scoring(format!(
                "{} labels for {} texts",
                labels.len(),
                texts.len()
            )));
        }
        Ok(labels)
    }
}
