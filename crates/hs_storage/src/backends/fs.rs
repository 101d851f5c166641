use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hs_core::{Error, Result};
use hs_inference::artifact::fit_id_for;
use hs_inference::{FittedClassifier, FittedVectorizer, ModelArtifact};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::{write_atomic, ModelStore, StorageBackend};

pub const VECTORIZER_FILE: &str = "vectorizer.json";
pub const CLASSIFIER_FILE: &str = "classifier.json";
/// Names the published pair directory under `pairs/`.
pub const POINTER_FILE: &str = "CURRENT";
pub const PAIRS_DIR: &str = "pairs";

const STAGING_PREFIX: &str = ".staging-";
/// Published pairs kept on disk, the current one included.
const KEEP_PAIRS: usize = 3;
const LOAD_ATTEMPTS: usize = 3;

/// One half of the pair on disk. Both halves carry the same `fit_id`.
#[derive(Debug, Serialize, Deserialize)]
struct StoredHalf<T> {
    fit_id: String,
    fit_timestamp: DateTime<Utc>,
    state: T,
}

/// Stores the artifact pair as two JSON blobs in their own directory under
/// `pairs/`. A save stages a complete pair and then swaps the `CURRENT`
/// pointer, so a load resolves either the previous pair or the new one.
#[derive(Debug, Clone)]
pub struct FsModelStore {
    dir: PathBuf,
    save_lock: Arc<Mutex<()>>,
}

impl FsModelStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            save_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn pointer_path(&self) -> PathBuf {
        self.dir.join(POINTER_FILE)
    }

    pub fn pairs_dir(&self) -> PathBuf {
        self.dir.join(PAIRS_DIR)
    }

    /// Resolves `CURRENT` to the directory holding the published halves.
    pub async fn current_pair_dir(&self) -> Result<PathBuf> {
        let pointer = self.pointer_path();
        let raw = match tokio::fs::read_to_string(&pointer).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::ArtifactNotFound(pointer.display().to_string()));
            }
            Err(e) => return Err(Error::Io(e)),
        };
        let name = raw.trim();
        if name.is_empty() || name.starts_with('.') || name.contains(|c| c == '/' || c == '\\') {
            return Err(Error::ArtifactCorrupt(format!(
                "{}: invalid pair name {:?}",
                pointer.display(),
                name
            )));
        }
        Ok(self.pairs_dir().join(name))
    }

    async fn read_half<T: DeserializeOwned>(path: &Path) -> Result<StoredHalf<T>> {
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::ArtifactNotFound(path.display().to_string()));
            }
            Err(e) => return Err(Error::Io(e)),
        };
        serde_json::from_slice(&bytes)
            .map_err(|e| Error::ArtifactCorrupt(format!("{}: {}", path.display(), e)))
    }

    async fn read_pair(pair_dir: &Path) -> Result<ModelArtifact> {
        let vectorizer: StoredHalf<FittedVectorizer> =
            Self::read_half(&pair_dir.join(VECTORIZER_FILE)).await?;
        let classifier: StoredHalf<FittedClassifier> =
            Self::read_half(&pair_dir.join(CLASSIFIER_FILE)).await?;

        if vectorizer.fit_id != classifier.fit_id {
            return Err(Error::ArtifactCorrupt(format!(
                "vectorizer from fit {} paired with classifier from fit {}",
                vectorizer.fit_id, classifier.fit_id
            )));
        }
        if fit_id_for(vectorizer.fit_timestamp) != vectorizer.fit_id {
            return Err(Error::ArtifactCorrupt(format!(
                "fit id {} does not match its timestamp",
                vectorizer.fit_id
            )));
        }

        ModelArtifact::new(vectorizer.state, classifier.state, vectorizer.fit_timestamp)
            .map_err(|e| match e {
                Error::ArtifactCorrupt(_) => e,
                other => Error::ArtifactCorrupt(other.to_string()),
            })
    }
}

/// `2024-05-06T07:08:09.123456789Z` becomes `2024-05-06T07-08-09-123456789Z`,
/// which still sorts chronologically.
fn pair_key(published_at: DateTime<Utc>) -> String {
    fit_id_for(published_at)
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect()
}

/// Writes both halves into a staging directory, renames it to its final pair
/// name and only then points `CURRENT` at it. Pair names start with the
/// publish time so they sort in save order.
fn publish_pair(dir: &Path, vectorizer: &[u8], classifier: &[u8]) -> Result<String> {
    let pairs = dir.join(PAIRS_DIR);
    std::fs::create_dir_all(&pairs)?;

    let staging = tempfile::Builder::new()
        .prefix(&format!("{}{}-", STAGING_PREFIX, pair_key(Utc::now())))
        .tempdir_in(&pairs)?;
    write_atomic(&staging.path().join(VECTORIZER_FILE), vectorizer)?;
    write_atomic(&staging.path().join(CLASSIFIER_FILE), classifier)?;

    let name = staging
        .path()
        .file_name()
        .and_then(|name| name.to_str())
        .and_then(|name| name.strip_prefix(STAGING_PREFIX))
        .map(str::to_string)
        .ok_or_else(|| {
            Error::Config(format!("unusable staging directory {}", staging.path().display()))
        })?;
    std::fs::rename(staging.path(), pairs.join(&name))?;
    write_atomic(&dir.join(POINTER_FILE), name.as_bytes())?;
    Ok(name)
}

/// Removes published pairs beyond the latest `KEEP_PAIRS`, never the current one.
fn prune_pairs(dir: &Path, current: &str) -> Result<usize> {
    let mut names = Vec::new();
    for entry in std::fs::read_dir(dir.join(PAIRS_DIR))? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        if let Some(name) = entry.file_name().to_str() {
            if !name.starts_with('.') {
                names.push(name.to_string());
            }
        }
    }
    names.sort();

    let stale = names.len().saturating_sub(KEEP_PAIRS);
    let mut removed = 0;
    for name in names.iter().take(stale).filter(|name| name.as_str() != current) {
        std::fs::remove_dir_all(dir.join(PAIRS_DIR).join(name))?;
        removed += 1;
    }
    Ok(removed)
}

#[async_trait]
impl StorageBackend for FsModelStore {
    fn get_error_message() -> &'static str {
        "Model directory should be readable and writable"
    }

    async fn open(model_dir: &Path) -> Result<Self> {
        tokio::fs::create_dir_all(model_dir).await?;
        Ok(Self::new(model_dir))
    }
}

#[async_trait]
impl ModelStore for FsModelStore {
    fn name(&self) -> &str {
        "fs"
    }

    async fn save(&self, artifact: &ModelArtifact) -> Result<()> {
        let fit_id = artifact.fit_id();
        let vectorizer = serde_json::to_vec(&StoredHalf {
            fit_id: fit_id.clone(),
            fit_timestamp: artifact.fit_timestamp(),
            state: artifact.vectorizer(),
        })?;
        let classifier = serde_json::to_vec(&StoredHalf {
            fit_id: fit_id.clone(),
            fit_timestamp: artifact.fit_timestamp(),
            state: artifact.classifier(),
        })?;

        let _guard = self.save_lock.lock().await;
        let dir = self.dir.clone();
        let published = tokio::task::spawn_blocking(move || -> Result<String> {
            let name = publish_pair(&dir, &vectorizer, &classifier)?;
            match prune_pairs(&dir, &name) {
                Ok(0) => {}
                Ok(removed) => tracing::debug!("Pruned {} old model pairs", removed),
                Err(e) => tracing::warn!("⚠️ Could not prune old model pairs: {}", e),
            }
            Ok(name)
        })
        .await
        .map_err(|e| Error::External(e.into()))??;

        tracing::info!("💾 Model {} saved to {} ({})", fit_id, self.dir.display(), published);
        Ok(())
    }

    async fn load(&self) -> Result<ModelArtifact> {
        let mut pair = self.current_pair_dir().await?;
        for _ in 1..LOAD_ATTEMPTS {
            match Self::read_pair(&pair).await {
                Err(Error::ArtifactNotFound(missing)) => {
                    // A concurrent save may have pruned the pair we resolved
                    let latest = self.current_pair_dir().await?;
                    if latest == pair {
                        return Err(Error::ArtifactNotFound(missing));
                    }
                    tracing::debug!("Model pair moved to {} while loading", latest.display());
                    pair = latest;
                }
                other => return other,
            }
        }
        Self::read_pair(&pair).await
    }
}
