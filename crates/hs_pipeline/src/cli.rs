use clap::{Args, Subcommand};
use hs_core::{PathsConfig, Result};
use hs_storage::{load_shared, ModelStore};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use crate::logging::Logger;
use crate::scoring::{predict_texts, summarize_latest, BatchScorer, ScoringConfig};
use crate::training::{default_sources, TrainingConfig, TrainingPipeline};

/// Durations such as `30m`, `1h15m30s` or a bare number of seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HumanDuration(pub Duration);

fn unit_seconds(unit: char) -> Option<u64> {
    match unit {
        's' => Some(1),
        'm' => Some(60),
        'h' => Some(3_600),
        'd' => Some(86_400),
        _ => None,
    }
}

impl FromStr for HumanDuration {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let compact: String = s.chars().filter(|c| !c.is_whitespace()).collect();
        if compact.is_empty() {
            return Err("Duration must include a number".to_string());
        }

        let overflow = || format!("Duration {:?} is too large", s);
        let mut total = 0u64;
        let mut rest = compact.as_str();
        while !rest.is_empty() {
            let digits = rest.find(|c: char| !c.is_ascii_digit()).unwrap_or(rest.len());
            if digits == 0 {
                let found = rest.chars().next().unwrap_or_default();
                return Err(format!("Expected a number before {:?} in {:?}", found, s));
            }
            let amount: u64 = rest[..digits].parse().map_err(|_| overflow())?;
            rest = &rest[digits..];

            // A trailing bare number counts as seconds
            let scale = match rest.chars().next() {
                None => 1,
                Some(unit) => {
                    rest = &rest[unit.len_utf8()..];
                    unit_seconds(unit).ok_or_else(|| format!("Invalid duration unit: {}", unit))?
                }
            };
            total = amount
                .checked_mul(scale)
                .and_then(|seconds| total.checked_add(seconds))
                .ok_or_else(overflow)?;
        }

        if total == 0 {
            return Err("Duration must be greater than zero".to_string());
        }
        Ok(HumanDuration(Duration::from_secs(total)))
    }
}

#[derive(Args, Debug, Clone)]
pub struct PipelineArgs {
    #[command(subcommand)]
    pub command: PipelineCommands,
}

#[derive(Subcommand, Debug, Clone)]
pub enum PipelineCommands {
    /// Fit the vectorizer and classifier on the labeled corpus and store them
    Train {
        /// Primary corpus location (defaults to the public financial news corpus)
        #[arg(long)]
        corpus_url: Option<String>,
        /// Local corpus copy used when the primary source is unavailable
        #[arg(long)]
        corpus_cache: Option<PathBuf>,
        #[arg(long, default_value_t = 42)]
        seed: u64,
        /// Persist the model fit on the training split instead of the full corpus
        #[arg(long)]
        no_refit: bool,
    },
    /// Score the newest raw headline dataset
    Score {
        /// Keep scoring periodically with the given interval (e.g. 30m, 1h, 1h15m30s)
        #[arg(long)]
        interval: Option<HumanDuration>,
    },
    /// Show label counts of the latest predictions file
    Summary,
    /// Classify ad-hoc headlines with the stored model
    Predict {
        #[arg(required = true)]
        texts: Vec<String>,
    },
}

/// What every pipeline command needs: the directory layout and the model store.
#[derive(Clone)]
pub struct PipelineContext {
    pub paths: PathsConfig,
    pub store: Arc<dyn ModelStore>,
    pub scoring: ScoringConfig,
}

impl PipelineContext {
    pub fn new(paths: PathsConfig, store: Arc<dyn ModelStore>) -> Self {
        Self {
            paths,
            store,
            scoring: ScoringConfig::default(),
        }
    }
}

async fn score_cycle(scorer: Arc<BatchScorer>, paths: &PathsConfig) -> Result<()> {
    let raw_dir = paths.raw_dir.clone();
    let processed_dir = paths.processed_dir.clone();
    let scored = tokio::task::spawn_blocking(move || scorer.run_once(&raw_dir, &processed_dir))
        .await
        .map_err(|e| hs_core::Error::External(e.into()))??;

    match scored {
        Some(scored) => println!("📰 {} → {}\n{}", scored.input.display(), scored.output.display(), scored.counts),
        None => println!("💤 Nothing new to score in {}", paths.raw_dir.display()),
    }
    Ok(())
}

pub async fn handle_command(args: PipelineArgs, ctx: &PipelineContext) -> Result<()> {
    let logger = Logger::new().with_prefix("cli");
    match args.command {
        PipelineCommands::Train {
            corpus_url,
            corpus_cache,
            seed,
            no_refit,
        } => {
            let mut paths = ctx.paths.clone();
            if let Some(url) = corpus_url {
                paths = paths.with_corpus_url(url);
            }
            if let Some(cache) = corpus_cache {
                paths = paths.with_corpus_cache(cache);
            }
            let config = TrainingConfig {
                seed,
                refit_on_full_corpus: !no_refit,
                ..Default::default()
            };
            let (primary, fallback) = default_sources(&paths, &config);
            let outcome = TrainingPipeline::new(ctx.store.clone(), config)
                .run(&primary, &fallback)
                .await?;

            println!("{}", outcome.report);
            if let Some(warning) = &outcome.convergence {
                println!("⚠️ ConvergenceWarning: {}", warning);
            }
            println!(
                "💾 Trained on {} samples from {} (fit {})",
                outcome.n_samples,
                outcome.corpus_source,
                outcome.artifact.fit_id()
            );
        }
        PipelineCommands::Score { interval } => {
            let model = load_shared(ctx.store.as_ref()).await?;
            let scorer = Arc::new(BatchScorer::new(model, ctx.scoring.clone()));

            if let Some(interval) = interval {
                logger.info(&format!("Running in periodic mode with {}s interval", interval.0.as_secs()));
                loop {
                    logger.info("Starting scoring cycle");
                    if let Err(e) = score_cycle(scorer.clone(), &ctx.paths).await {
                        logger.error(&format!("Error during scoring: {}", e));
                    }
                    logger.info(&format!("Waiting {}s before next cycle", interval.0.as_secs()));
                    tokio::time::sleep(interval.0).await;
                }
            } else {
                score_cycle(scorer, &ctx.paths).await?;
            }
        }
        PipelineCommands::Summary => {
            match summarize_latest(&ctx.paths.processed_dir, &ctx.scoring.output_prefix)? {
                Some(summary) => {
                    println!("📊 {} ({})", summary.file, summary.created_at.format("%Y-%m-%d %H:%M:%S"));
                    println!("{}", summary.counts);
                    for record in &summary.sample {
                        println!("  {:>8}  {}", record.predicted.as_str(), record.text);
                    }
                }
                None => println!("No predictions yet in {}", ctx.paths.processed_dir.display()),
            }
        }
        PipelineCommands::Predict { texts } => {
            let model = load_shared(ctx.store.as_ref()).await?;
            for record in predict_texts(&*model, &texts)? {
                println!("{:>8}  {}", record.predicted.as_str(), record.text);
            }
        }
    }
    Ok(())
}
