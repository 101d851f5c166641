use hs_core::PathsConfig;
use hs_inference::SentimentModel;
use hs_pipeline::{BatchScorer, ScoringConfig};
use std::sync::Arc;

/// Shared by every request; the model inside the scorer is loaded once at startup.
pub struct AppState {
    pub scorer: Arc<BatchScorer>,
    pub paths: PathsConfig,
}

impl AppState {
    pub fn new(model: Arc<dyn SentimentModel>, paths: PathsConfig) -> Self {
        Self {
            scorer: Arc::new(BatchScorer::new(model, ScoringConfig::default())),
            paths,
        }
    }

    pub fn output_prefix(&self) -> &str {
        &self.scorer.config().output_prefix
    }
}
