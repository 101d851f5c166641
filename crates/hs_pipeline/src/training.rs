//! Training pipeline: corpus → vectorizer + classifier → model store.

use chrono::Utc;
use hs_core::{CorpusSource, Error, LabeledSample, PathsConfig, Result, Sentiment};
use hs_inference::{
    evaluate, ClassifierConfig, ConvergenceWarning, EvaluationReport, LogisticRegression,
    ModelArtifact, TfIdfVectorizer, VectorizerConfig,
};
use hs_storage::ModelStore;
use std::sync::Arc;

use crate::corpus::{load_with_fallback, LocalCsvCorpus, RemoteCsvCorpus};
use crate::logging::Logger;
use crate::split::train_test_split;

#[derive(Debug, Clone)]
pub struct TrainingConfig {
    pub test_fraction: f64,
    pub seed: u64,
    /// Persist a model refit on every sample rather than the evaluation model
    pub refit_on_full_corpus: bool,
    /// Rewrite the local corpus copy after a successful remote download
    pub refresh_cache: bool,
    pub vectorizer: VectorizerConfig,
    pub classifier: ClassifierConfig,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            test_fraction: 0.2,
            seed: 42,
            refit_on_full_corpus: true,
            refresh_cache: true,
            vectorizer: VectorizerConfig::default(),
            classifier: ClassifierConfig::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FittedModel {
    pub artifact: ModelArtifact,
    pub report: EvaluationReport,
    pub convergence: Option<ConvergenceWarning>,
}

#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    pub artifact: ModelArtifact,
    pub report: EvaluationReport,
    pub convergence: Option<ConvergenceWarning>,
    pub corpus_source: String,
    pub n_samples: usize,
}

/// Builds the default primary (remote) and fallback (local cache) sources.
pub fn default_sources(paths: &PathsConfig, config: &TrainingConfig) -> (RemoteCsvCorpus, LocalCsvCorpus) {
    let mut remote = RemoteCsvCorpus::new(paths.corpus_url.as_str());
    if config.refresh_cache {
        remote = remote.with_cache(&paths.corpus_cache);
    }
    (remote, LocalCsvCorpus::new(&paths.corpus_cache))
}

fn columns<'a>(samples: &'a [LabeledSample], rows: &[usize]) -> (Vec<&'a str>, Vec<Sentiment>) {
    rows.iter()
        .map(|&i| (samples[i].text.as_str(), samples[i].sentiment))
        .unzip()
}

pub struct TrainingPipeline {
    store: Arc<dyn ModelStore>,
    config: TrainingConfig,
    logger: Logger,
}

impl TrainingPipeline {
    pub fn new(store: Arc<dyn ModelStore>, config: TrainingConfig) -> Self {
        Self {
            store,
            config,
            logger: Logger::new().with_prefix("train"),
        }
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    fn fit_pair(
        &self,
        texts: &[&str],
        labels: &[Sentiment],
    ) -> Result<(hs_inference::FittedVectorizer, hs_inference::ClassifierFit)> {
        let (vectorizer, features) =
            TfIdfVectorizer::new(self.config.vectorizer.clone()).fit_transform(texts)?;
        let fit = LogisticRegression::new(self.config.classifier.clone()).fit(&features, labels)?;
        Ok((vectorizer, fit))
    }

    /// Fits on a seeded 80/20 split for the report, then (by default) refits
    /// on the whole corpus for the artifact that gets persisted.
    pub fn fit(&self, samples: &[LabeledSample]) -> Result<FittedModel> {
        if samples.is_empty() {
            return Err(Error::Training("No labeled samples to train on".to_string()));
        }

        let split = train_test_split(samples.len(), self.config.test_fraction, self.config.seed);
        let (train_texts, train_labels) = columns(samples, &split.train);
        let (test_texts, test_labels) = columns(samples, &split.test);
        self.logger.info(&format!(
            "Split {} samples into {} train / {} test (seed {})",
            samples.len(),
            train_texts.len(),
            test_texts.len(),
            self.config.seed
        ));

        let (vectorizer, fit) = self.fit_pair(&train_texts, &train_labels)?;
        let test_features = vectorizer.transform(&test_texts);
        let predictions = fit.classifier.predict(&test_features)?;
        let report = evaluate(&test_labels, &predictions)?;

        let (vectorizer, fit) = if self.config.refit_on_full_corpus {
            let all: Vec<usize> = (0..samples.len()).collect();
            let (all_texts, all_labels) = columns(samples, &all);
            self.fit_pair(&all_texts, &all_labels)?
        } else {
            (vectorizer, fit)
        };

        let artifact = ModelArtifact::new(vectorizer, fit.classifier, Utc::now())?;
        Ok(FittedModel {
            artifact,
            report,
            convergence: fit.convergence,
        })
    }

    /// Loads the corpus (primary, then fallback), fits, reports and saves.
    /// Nothing is saved unless a corpus was loaded and fitting succeeded.
    pub async fn run(
        &self,
        primary: &dyn CorpusSource,
        fallback: &dyn CorpusSource,
    ) -> Result<TrainingOutcome> {
        let (samples, corpus_source) = load_with_fallback(primary, fallback, &self.logger).await?;

        let fitted = self.fit(&samples)?;
        self.logger.info(&format!("Evaluation on held-out split:\n{}", fitted.report));

        self.store.save(&fitted.artifact).await?;
        self.logger.info(&format!(
            "💾 Model {} committed to {} store ({} features)",
            fitted.artifact.fit_id(),
            self.store.name(),
            fitted.artifact.vectorizer().dim()
        ));

        Ok(TrainingOutcome {
            artifact: fitted.artifact,
            report: fitted.report,
            convergence: fitted.convergence,
            corpus_source,
            n_samples: samples.len(),
        })
    }
}
