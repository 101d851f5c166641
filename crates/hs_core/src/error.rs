use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Model artifact not found: {0}")]
    ArtifactNotFound(String),

    #[error("Model artifact corrupt: {0}")]
    ArtifactCorrupt(String),

    #[error("No labeled corpus available (primary: {primary}; fallback: {fallback})")]
    NoCorpusAvailable { primary: String, fallback: String },

    #[error("Corpus error: {0}")]
    Corpus(String),

    #[error("Dataset error: {0}")]
    Dataset(String),

    #[error("Training error: {0}")]
    Training(String),

    #[error("Scoring error: {0}")]
    Scoring(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("External error: {0}")]
    External(#[from] anyhow::Error),
}

impl Error {
    /// Failures a corpus source is expected to produce when it is unreachable
    /// or its payload is unusable. Only these trigger the fallback source.
    pub fn is_corpus_failure(&self) -> bool {
        matches!(
            self,
            Error::Io(_) | Error::Csv(_) | Error::Http(_) | Error::Corpus(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
