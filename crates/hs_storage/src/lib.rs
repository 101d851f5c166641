use async_trait::async_trait;
use hs_core::{Error, Result};
use hs_inference::{ModelArtifact, SharedArtifact};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

pub mod backends;

pub use backends::*;

/// Persists the vectorizer/classifier pair as one unit.
#[async_trait]
pub trait ModelStore: Send + Sync {
    fn name(&self) -> &str;

    /// Replaces any previously stored artifact wholesale.
    async fn save(&self, artifact: &ModelArtifact) -> Result<()>;

    /// Fails with `ArtifactNotFound` when either half is missing and with
    /// `ArtifactCorrupt` when the halves cannot be decoded or do not pair up.
    async fn load(&self) -> Result<ModelArtifact>;
}

#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Hint shown when `open` fails.
    fn get_error_message() -> &'static str;
    async fn open(model_dir: &Path) -> Result<Self> where Self: Sized;
}

async fn open_backend<T>(model_dir: &Path) -> Result<Arc<dyn ModelStore>>
where
    T: StorageBackend + ModelStore + 'static,
{
    match T::open(model_dir).await {
        Ok(store) => Ok(Arc::new(store)),
        Err(e) => Err(Error::Config(format!(
            "{} ({}): {}",
            T::get_error_message(),
            model_dir.display(),
            e
        ))),
    }
}

pub async fn create_store(kind: &str, model_dir: &Path) -> Result<Arc<dyn ModelStore>> {
    match kind {
        "fs" | "file" => open_backend::<FsModelStore>(model_dir).await,
        "memory" => open_backend::<MemoryModelStore>(model_dir).await,
        other => Err(Error::Config(format!(
            "Unknown model store '{}' (expected fs or memory)",
            other
        ))),
    }
}

/// Loads the artifact once for sharing across the rest of the process.
pub async fn load_shared(store: &dyn ModelStore) -> Result<SharedArtifact> {
    let artifact = store.load().await?;
    tracing::info!(
        "🧠 Loaded model fitted at {} from {} store ({} features, classes: {:?})",
        artifact.fit_id(),
        store.name(),
        artifact.vectorizer().dim(),
        artifact.classifier().classes()
    );
    Ok(artifact.into_shared())
}

/// Writes `bytes` to a temp file next to `path` and renames it into place, so
/// readers see either the old content or the complete new content.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| Error::Io(e.error))?;
    Ok(())
}

pub mod prelude {
    pub use super::{create_store, load_shared, ModelStore};
    pub use super::backends::*;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_atomic_replaces_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("blob.json");
        write_atomic(&path, b"first").unwrap();
        write_atomic(&path, b"second").unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"second");
        let leftovers = std::fs::read_dir(path.parent().unwrap()).unwrap().count();
        assert_eq!(leftovers, 1);
    }

    #[tokio::test]
    async fn test_unknown_store_kind() {
        let dir = tempfile::tempdir().unwrap();
        let result = create_store("sqlite", dir.path()).await;
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[tokio::test]
    async fn test_unusable_model_dir_reports_backend_hint() {
        let dir = tempfile::tempdir().unwrap();
        let blocked = dir.path().join("models");
        std::fs::write(&blocked, b"not a directory").unwrap();

        match create_store("fs", &blocked).await {
            Err(Error::Config(message)) => {
                assert!(message.starts_with(FsModelStore::get_error_message()));
            }
            Err(other) => panic!("expected a config error, got {:?}", other),
            Ok(store) => panic!("opened {} store over a file", store.name()),
        }
        assert!(create_store("memory", &blocked).await.is_ok());
    }
}
