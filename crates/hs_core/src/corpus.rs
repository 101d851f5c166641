use async_trait::async_trait;
use crate::types::LabeledSample;
use crate::Result;

/// A provider of labeled training data.
#[async_trait]
pub trait CorpusSource: Send + Sync {
    /// Human-readable identifier used in logs and errors
    fn name(&self) -> String;

    /// Load every usable sample. Labels are already normalized.
    async fn load(&self) -> Result<Vec<LabeledSample>>;
}
