use async_trait::async_trait;
use hs_core::{Error, Result};
use hs_inference::ModelArtifact;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::{ModelStore, StorageBackend};

/// Keeps the artifact pair in process memory. Cloning shares the same slot.
#[derive(Debug, Clone, Default)]
pub struct MemoryModelStore {
    slot: Arc<RwLock<Option<ModelArtifact>>>,
}

impl MemoryModelStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StorageBackend for MemoryModelStore {
    fn get_error_message() -> &'static str {
        "Memory storage should be available"
    }

    async fn open(_model_dir: &Path) -> Result<Self> {
        Ok(Self::new())
    }
}

#[async_trait]
impl ModelStore for MemoryModelStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn save(&self, artifact: &ModelArtifact) -> Result<()> {
        let mut slot = self.slot.write().await;
        *slot = Some(artifact.clone());
        Ok(())
    }

    async fn load(&self) -> Result<ModelArtifact> {
        let slot = self.slot.read().await;
        slot.clone()
            .ok_or_else(|| Error::ArtifactNotFound("no artifact saved in memory store".to_string()))
    }
}
