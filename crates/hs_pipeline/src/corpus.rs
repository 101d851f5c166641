//! Labeled corpus sources and the primary-then-fallback loading policy.

use async_trait::async_trait;
use hs_core::{CorpusSource, Error, LabeledSample, Result};
use hs_storage::write_atomic;
use std::path::PathBuf;
use url::Url;

use crate::logging::Logger;

/// Parses a header-less `sentiment,headline` CSV. Rows with labels outside
/// the closed set are skipped; a corpus without any usable row is an error.
pub fn parse_corpus(bytes: &[u8], origin: &str) -> Result<Vec<LabeledSample>> {
    let text = String::from_utf8_lossy(bytes);
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(text.as_bytes());

    let mut samples = Vec::new();
    let mut skipped = 0usize;
    for record in reader.records() {
        let record = record?;
        let (Some(label), Some(headline)) = (record.get(0), record.get(1)) else {
            skipped += 1;
            continue;
        };
        match LabeledSample::from_raw(headline.trim(), label) {
            Some(sample) if !sample.text.is_empty() => samples.push(sample),
            _ => skipped += 1,
        }
    }

    if skipped > 0 {
        tracing::warn!("Skipped {} unusable rows from {}", skipped, origin);
    }
    if samples.is_empty() {
        return Err(Error::Corpus(format!("{} contains no labeled samples", origin)));
    }
    Ok(samples)
}

/// Bulk corpus downloaded over HTTP. The URL is only parsed on `load`, so a
/// malformed one counts as an unavailable primary source.
#[derive(Debug, Clone)]
pub struct RemoteCsvCorpus {
    url: String,
    client: reqwest::Client,
    cache: Option<PathBuf>,
}

impl RemoteCsvCorpus {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            client: reqwest::Client::new(),
            cache: None,
        }
    }

    /// After a successful download, also refresh the local copy at `path`.
    pub fn with_cache(mut self, path: impl Into<PathBuf>) -> Self {
        self.cache = Some(path.into());
        self
    }
}

#[async_trait]
impl CorpusSource for RemoteCsvCorpus {
    fn name(&self) -> String {
        self.url.clone()
    }

    async fn load(&self) -> Result<Vec<LabeledSample>> {
        let url = Url::parse(&self.url)
            .map_err(|e| Error::Corpus(format!("Invalid corpus URL {}: {}", self.url, e)))?;
        let bytes = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;
        let samples = parse_corpus(&bytes, &self.name())?;

        if let Some(cache) = &self.cache {
            if let Err(e) = write_atomic(cache, &bytes) {
                tracing::warn!("Could not refresh corpus cache {}: {}", cache.display(), e);
            } else {
                tracing::debug!("Refreshed corpus cache {}", cache.display());
            }
        }
        Ok(samples)
    }
}

/// Corpus read from a local CSV file.
#[derive(Debug, Clone)]
pub struct LocalCsvCorpus {
    path: PathBuf,
}

impl LocalCsvCorpus {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl CorpusSource for LocalCsvCorpus {
    fn name(&self) -> String {
        self.path.display().to_string()
    }

    async fn load(&self) -> Result<Vec<LabeledSample>> {
        let bytes = tokio::fs::read(&self.path).await?;
        parse_corpus(&bytes, &self.name())
    }
}

/// Tries `primary`, then `fallback`. Only expected corpus failures (I/O,
/// HTTP, CSV, empty corpus) move on to the next source; anything else
/// propagates unchanged. Returns the samples and the name of the source used.
pub async fn load_with_fallback(
    primary: &dyn CorpusSource,
    fallback: &dyn CorpusSource,
    logger: &Logger,
) -> Result<(Vec<LabeledSample>, String)> {
    let primary_error = match primary.load().await {
        Ok(samples) => {
            logger.info(&format!("✅ Loaded {} labeled samples from {}", samples.len(), primary.name()));
            return Ok((samples, primary.name()));
        }
        Err(e) if e.is_corpus_failure() => {
            logger.warn(&format!(
                "Primary corpus {} unavailable ({}), falling back to {}",
                primary.name(),
                e,
                fallback.name()
            ));
            e.to_string()
        }
        Err(e) => return Err(e),
    };

    match fallback.load().await {
        Ok(samples) => {
            logger.info(&format!("✅ Loaded {} labeled samples from {}", samples.len(), fallback.name()));
            Ok((samples, fallback.name()))
        }
        Err(e) if e.is_corpus_failure() => Err(Error::NoCorpusAvailable {
            primary: primary_error,
            fallback: e.to_string(),
        }),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hs_core::Sentiment;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    const SAMPLE_CSV: &str = "positive,Strong profit growth\n negative ,Market crash fears\nNEUTRAL,\"Stable outlook, says CEO\"\nbullish,Ignored row\n";

    struct FailingSource(fn() -> Error);

    #[async_trait]
    impl CorpusSource for FailingSource {
        fn name(&self) -> String {
            "failing".to_string()
        }

        async fn load(&self) -> Result<Vec<LabeledSample>> {
            Err((self.0)())
        }
    }

    fn io_failure() -> Error {
        Error::Io(std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused"))
    }

    fn unexpected_failure() -> Error {
        Error::Training("bug".to_string())
    }

    /// Serves `body` once over plain HTTP and returns the URL.
    async fn serve_once(body: &'static str) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 4096];
            let _ = socket.read(&mut buf).await;
            let response = format!(
                "HTTP/1.1 200 OK\r\nContent-Type: text/csv\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
        });
        format!("http://{}/all-data.csv", addr)
    }

    #[test]
    fn test_parse_normalizes_and_skips_unknown_labels() {
        let samples = parse_corpus(SAMPLE_CSV.as_bytes(), "test").unwrap();
        assert_eq!(samples.len(), 3);
        assert_eq!(samples[0], LabeledSample::new("Strong profit growth", Sentiment::Positive));
        assert_eq!(samples[1].sentiment, Sentiment::Negative);
        assert_eq!(samples[2].text, "Stable outlook, says CEO");
        assert_eq!(samples[2].sentiment, Sentiment::Neutral);
    }

    #[test]
    fn test_parse_tolerates_invalid_utf8() {
        let mut bytes = b"positive,Caf".to_vec();
        bytes.push(0xe9);
        bytes.extend_from_slice(b" sales rise\n");
        let samples = parse_corpus(&bytes, "latin1").unwrap();
        assert_eq!(samples.len(), 1);
        assert!(samples[0].text.starts_with("Caf"));
    }

    #[test]
    fn test_parse_empty_corpus_is_corpus_error() {
        let result = parse_corpus(b"mixed,nothing usable\n", "empty");
        assert!(matches!(result, Err(Error::Corpus(_))));
    }

    #[tokio::test]
    async fn test_primary_success_skips_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("corpus.csv");
        std::fs::write(&path, SAMPLE_CSV).unwrap();

        let primary = LocalCsvCorpus::new(&path);
        let fallback = FailingSource(unexpected_failure);
        let (samples, used) = load_with_fallback(&primary, &fallback, &Logger::new()).await.unwrap();
        assert_eq!(samples.len(), 3);
        assert_eq!(used, path.display().to_string());
    }

    #[tokio::test]
    async fn test_falls_back_on_expected_failure() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.csv");
        std::fs::write(&path, SAMPLE_CSV).unwrap();

        let primary = FailingSource(io_failure);
        let fallback = LocalCsvCorpus::new(&path);
        let (samples, used) = load_with_fallback(&primary, &fallback, &Logger::new()).await.unwrap();
        assert_eq!(samples.len(), 3);
        assert_eq!(used, fallback.name());
    }

    #[tokio::test]
    async fn test_both_failing_is_no_corpus_available() {
        let dir = tempfile::tempdir().unwrap();
        let primary = FailingSource(io_failure);
        let fallback = LocalCsvCorpus::new(dir.path().join("missing.csv"));
        let result = load_with_fallback(&primary, &fallback, &Logger::new()).await;
        assert!(matches!(result, Err(Error::NoCorpusAvailable { .. })));
    }

    #[tokio::test]
    async fn test_unexpected_primary_error_propagates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.csv");
        std::fs::write(&path, SAMPLE_CSV).unwrap();

        let primary = FailingSource(unexpected_failure);
        let fallback = LocalCsvCorpus::new(&path);
        let result = load_with_fallback(&primary, &fallback, &Logger::new()).await;
        assert!(matches!(result, Err(Error::Training(_))));
    }

    #[tokio::test]
    async fn test_remote_download_refreshes_cache() {
        let url = serve_once(SAMPLE_CSV).await;
        let dir = tempfile::tempdir().unwrap();
        let cache = dir.path().join("data").join("all-data.csv");

        let remote = RemoteCsvCorpus::new(url).with_cache(&cache);
        let samples = remote.load().await.unwrap();
        assert_eq!(samples.len(), 3);
        assert_eq!(std::fs::read_to_string(&cache).unwrap(), SAMPLE_CSV);
    }

    #[tokio::test]
    async fn test_unreachable_remote_is_corpus_failure() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let remote = RemoteCsvCorpus::new(format!("http://{}/all-data.csv", addr));
        let err = remote.load().await.unwrap_err();
        assert!(err.is_corpus_failure());
    }

    #[tokio::test]
    async fn test_invalid_url_falls_back_to_cache() {
        let remote = RemoteCsvCorpus::new("not a url");
        let err = remote.load().await.unwrap_err();
        assert!(matches!(err, Error::Corpus(_)));
        assert!(err.is_corpus_failure());

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.csv");
        std::fs::write(&path, SAMPLE_CSV).unwrap();
        let fallback = LocalCsvCorpus::new(&path);
        let (samples, used) = load_with_fallback(&remote, &fallback, &Logger::new()).await.unwrap();
        assert_eq!(samples.len(), 3);
        assert_eq!(used, fallback.name());
    }
}
