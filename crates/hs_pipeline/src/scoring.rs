//! Batch scoring: latest input dataset → predictions file + label counts.

use chrono::Utc;
use hs_core::{Error, LabelCounts, PredictionBatch, PredictionRecord, Result};
use hs_inference::SentimentModel;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::datasets::{
    is_scored, latest_output, list_inputs, mark_scored, read_headlines, read_predictions,
    select_latest, write_predictions_atomic, DatasetFile,
};
use crate::logging::Logger;

/// Rows included in a summary's preview.
pub const SUMMARY_SAMPLE_ROWS: usize = 50;

#[derive(Debug, Clone, PartialEq)]
pub struct ScoringConfig {
    /// Column holding the text to classify
    pub text_field: String,
    pub input_extension: String,
    pub output_prefix: String,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            text_field: "headline".to_string(),
            input_extension: "csv".to_string(),
            output_prefix: "predictions_".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoringState {
    Idle,
    Scoring,
}

#[derive(Debug, Clone)]
pub struct ScoredBatch {
    pub batch: PredictionBatch,
    pub input: PathBuf,
    pub output: PathBuf,
    pub counts: LabelCounts,
}

/// Holds one slot in the active-run count until dropped.
struct ActiveRun<'a>(&'a AtomicUsize);

impl<'a> ActiveRun<'a> {
    fn enter(runs: &'a AtomicUsize) -> Self {
        runs.fetch_add(1, Ordering::SeqCst);
        Self(runs)
    }
}

impl Drop for ActiveRun<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Scores datasets with a model loaded once and shared read-only. Runs may
/// overlap; the scorer reports `Scoring` while any of them is in flight.
#[derive(Debug)]
pub struct BatchScorer {
    model: Arc<dyn SentimentModel>,
    config: ScoringConfig,
    logger: Logger,
    active_runs: AtomicUsize,
}

impl BatchScorer {
    pub fn new(model: Arc<dyn SentimentModel>, config: ScoringConfig) -> Self {
        Self {
            model,
            config,
            logger: Logger::new().with_prefix("score"),
            active_runs: AtomicUsize::new(0),
        }
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    pub fn model(&self) -> &Arc<dyn SentimentModel> {
        &self.model
    }

    pub fn state(&self) -> ScoringState {
        if self.active_runs.load(Ordering::SeqCst) > 0 {
            ScoringState::Scoring
        } else {
            ScoringState::Idle
        }
    }

    /// Scores the most recent unscored dataset in `input_dir` and publishes
    /// the batch into `output_dir`. Nothing to score is `Ok(None)`; any
    /// failure aborts before a file is published.
    pub fn run_once(&self, input_dir: &Path, output_dir: &Path) -> Result<Option<ScoredBatch>> {
        let inputs = list_inputs(input_dir, &self.config.input_extension)?;
        let Some(latest) = select_latest(&inputs) else {
            self.logger.warn(&format!("No input datasets in {}", input_dir.display()));
            return Ok(None);
        };
        if is_scored(output_dir, latest) {
            self.logger.warn(&format!("{} was already scored, nothing new", latest.path.display()));
            return Ok(None);
        }

        let _run = ActiveRun::enter(&self.active_runs);
        let scored = self.score(latest, output_dir)?;
        if let Some(scored) = &scored {
            if let Err(e) = mark_scored(output_dir, latest, &scored.output) {
                self.logger.warn(&format!("Could not record {} as scored: {}", latest.path.display(), e));
            }
        }
        Ok(scored)
    }

    fn score(&self, dataset: &DatasetFile, output_dir: &Path) -> Result<Option<ScoredBatch>> {
        let input = dataset.path.as_path();
        let Some(headlines) = read_headlines(dataset, &self.config.text_field)? else {
            self.logger.warn(&format!(
                "{} has no rows or no '{}' column, nothing to score",
                input.display(),
                self.config.text_field
            ));
            return Ok(None);
        };
        self.logger.info(&format!("Scoring {} headlines from {}", headlines.len(), input.display()));

        let texts: Vec<String> = headlines.into_iter().map(|h| h.text).collect();
        let batch = PredictionBatch::new(Utc::now(), predict_texts(self.model.as_ref(), &texts)?);

        let output = write_predictions_atomic(output_dir, &self.config.output_prefix, &batch)?;
        let counts = batch.counts();
        self.logger.info(&format!("✅ Wrote {} ({})", output.display(), counts));

        Ok(Some(ScoredBatch {
            batch,
            input: input.to_path_buf(),
            output,
            counts,
        }))
    }
}

/// Classifies `texts` in order, one record per text.
pub fn predict_texts(model: &dyn SentimentModel, texts: &[String]) -> Result<Vec<PredictionRecord>> {
    let labels = model.predict(texts)?;
    if labels.len() != texts.len() {
        return Err(Error::Scoring(format!(
            "model {} returned {} labels for {} texts",
            model.name(),
            labels.len(),
            texts.len()
        )));
    }
    Ok(texts
        .iter()
        .zip(labels)
        .map(|(text, predicted)| PredictionRecord {
            text: text.clone(),
            predicted,
        })
        .collect())
}

/// Latest published batch and its file, if any.
pub fn latest_batch(output_dir: &Path, prefix: &str) -> Result<Option<(PathBuf, PredictionBatch)>> {
    let Some(path) = latest_output(output_dir, prefix)? else {
        return Ok(None);
    };
    let batch = read_predictions(&path, prefix)?;
    Ok(Some((path, batch)))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchSummary {
    pub file: String,
    pub created_at: chrono::DateTime<Utc>,
    pub counts: LabelCounts,
    pub sample: Vec<PredictionRecord>,
}

/// Counts plus the first rows of the latest batch, for display.
pub fn summarize_latest(output_dir: &Path, prefix: &str) -> Result<Option<BatchSummary>> {
    let Some((path, batch)) = latest_batch(output_dir, prefix)? else {
        return Ok(None);
    };
    let counts = batch.counts();
    let file = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let PredictionBatch { created_at, mut records } = batch;
    records.truncate(SUMMARY_SAMPLE_ROWS);
    Ok(Some(BatchSummary {
        file,
        created_at,
        counts,
        sample: records,
    }))
}
