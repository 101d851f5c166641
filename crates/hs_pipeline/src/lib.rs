pub mod cli;
pub mod corpus;
pub mod datasets;
pub mod logging;
pub mod scoring;
pub mod split;
pub mod training;

pub use cli::{handle_command, HumanDuration, PipelineArgs, PipelineCommands, PipelineContext};
pub use corpus::{load_with_fallback, LocalCsvCorpus, RemoteCsvCorpus};
pub use logging::{init_logging, Logger};
pub use scoring::{
    latest_batch, predict_texts, summarize_latest, BatchScorer, BatchSummary, ScoredBatch,
    ScoringConfig, ScoringState,
};
pub use training::{default_sources, TrainingConfig, TrainingOutcome, TrainingPipeline};

pub mod prelude {
    pub use super::{BatchScorer, ScoringConfig, TrainingConfig, TrainingPipeline};
    pub use hs_core::{Error, PathsConfig, Result};
}
