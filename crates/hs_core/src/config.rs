use std::path::{Path, PathBuf};

pub const DEFAULT_CORPUS_URL: &str =
    "https://raw.githubusercontent.com/ankurzing/sentiment-analysis-for-financial-news/master/all-data.csv";

/// Well-known locations shared by the training and scoring pipelines.
#[derive(Debug, Clone, PartialEq)]
pub struct PathsConfig {
    pub model_dir: PathBuf,
    pub raw_dir: PathBuf,
    pub processed_dir: PathBuf,
    pub corpus_url: String,
    pub corpus_cache: PathBuf,
}

impl PathsConfig {
    pub fn from_root(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        Self {
            model_dir: root.join("models"),
            raw_dir: root.join("data").join("raw"),
            processed_dir: root.join("data").join("processed"),
            corpus_url: DEFAULT_CORPUS_URL.to_string(),
            corpus_cache: root.join("data").join("all-data.csv"),
        }
    }

    pub fn with_corpus_url(mut self, url: impl Into<String>) -> Self {
        self.corpus_url = url.into();
        self
    }

    pub fn with_corpus_cache(mut self, path: impl Into<PathBuf>) -> Self {
        self.corpus_cache = path.into();
        self
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self::from_root(".")
    }
}
