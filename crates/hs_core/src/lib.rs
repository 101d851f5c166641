pub mod config;
pub mod corpus;
pub mod error;
pub mod types;

pub use config::PathsConfig;
pub use corpus::CorpusSource;
pub use error::{Error, Result};
pub use types::{
    HeadlineRecord, LabelCounts, LabeledSample, PredictionBatch, PredictionRecord, Sentiment,
};
