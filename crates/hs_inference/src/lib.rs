use hs_core::{Result, Sentiment};
use std::fmt;

pub mod artifact;
pub mod classifier;
pub mod metrics;
pub mod vectorizer;

pub use artifact::{ModelArtifact, SharedArtifact};
pub use classifier::{ClassifierConfig, ClassifierFit, ConvergenceWarning, FittedClassifier, LogisticRegression};
pub use metrics::{evaluate, EvaluationReport};
pub use vectorizer::{FeatureVector, FittedVectorizer, TfIdfVectorizer, VectorizerConfig};

/// Anything that maps headline text to sentiment labels.
pub trait SentimentModel: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;

    /// Exactly one label per input, in input order.
    fn predict(&self, texts: &[String]) -> Result<Vec<Sentiment>>;
}

pub mod prelude {
    pub use super::{ModelArtifact, SentimentModel, SharedArtifact};
    pub use hs_core::{Error, Result, Sentiment};
}
