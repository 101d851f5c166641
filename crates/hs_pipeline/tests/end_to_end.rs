use hs_core::{Error, PathsConfig, Sentiment};
use hs_pipeline::prelude::*;
use hs_pipeline::LocalCsvCorpus;
use hs_storage::backends::fs::CLASSIFIER_FILE;
use hs_storage::{load_shared, FsModelStore, ModelStore};
use std::path::Path;
use std::sync::Arc;

const CORPUS: &str = "\
positive,strong profit growth
positive,strong quarterly profit
positive,profit growth beats expectations
positive,strong growth lifts revenue
positive,record profit and strong sales growth
negative,market crash fears
negative,shares plunge after losses
negative,losses deepen amid market crash
negative,investors fear further plunge
negative,crash wipes out savings
neutral,stable outlook
neutral,company holds annual meeting
neutral,board meeting scheduled for monday
neutral,outlook remains stable
neutral,annual report published on monday
";

fn write_corpus(root: &Path) -> PathsConfig {
    let paths = PathsConfig::from_root(root);
    std::fs::create_dir_all(paths.corpus_cache.parent().unwrap()).unwrap();
    std::fs::write(&paths.corpus_cache, CORPUS).unwrap();
    paths
}

async fn train(paths: &PathsConfig, store: Arc<dyn ModelStore>) {
    let primary = LocalCsvCorpus::new(paths.raw_dir.join("missing-corpus.csv"));
    let fallback = LocalCsvCorpus::new(&paths.corpus_cache);
    let outcome = TrainingPipeline::new(store, TrainingConfig::default())
        .run(&primary, &fallback)
        .await
        .unwrap();
    assert_eq!(outcome.n_samples, 15);
    assert_eq!(outcome.corpus_source, fallback_name(paths));
}

fn fallback_name(paths: &PathsConfig) -> String {
    paths.corpus_cache.display().to_string()
}

#[tokio::test]
async fn test_train_then_score_positive_headline() {
    let root = tempfile::tempdir().unwrap();
    let paths = write_corpus(root.path());
    let store: Arc<dyn ModelStore> = Arc::new(FsModelStore::new(&paths.model_dir));
    train(&paths, store.clone()).await;

    std::fs::create_dir_all(&paths.raw_dir).unwrap();
    std::fs::write(
        paths.raw_dir.join("headlines.csv"),
        "headline,timestamp,source\nstrong profit growth reported today,2024-01-02 10:00:00,wire\n",
    )
    .unwrap();

    let model = load_shared(store.as_ref()).await.unwrap();
    let scorer = BatchScorer::new(model, ScoringConfig::default());
    let scored = scorer
        .run_once(&paths.raw_dir, &paths.processed_dir)
        .unwrap()
        .expect("a batch should be scored");

    assert_eq!(scored.batch.len(), 1);
    assert_eq!(scored.batch.records[0].predicted, Sentiment::Positive);
    assert_eq!(scored.counts.positive, 1);
    assert_eq!(scored.counts.total, 1);

    let summary = hs_pipeline::summarize_latest(&paths.processed_dir, "predictions_")
        .unwrap()
        .unwrap();
    assert_eq!(summary.counts, scored.counts);
}

#[tokio::test]
async fn test_predictions_are_deterministic_across_reload() {
    let root = tempfile::tempdir().unwrap();
    let paths = write_corpus(root.path());
    let store: Arc<dyn ModelStore> = Arc::new(FsModelStore::new(&paths.model_dir));
    train(&paths, store.clone()).await;

    let texts: Vec<String> = ["strong profit", "market crash", "annual meeting", "completely unseen words"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    let first_model = load_shared(store.as_ref()).await.unwrap();
    let second_model = load_shared(store.as_ref()).await.unwrap();
    let first = hs_pipeline::predict_texts(&*first_model, &texts).unwrap();
    let second = hs_pipeline::predict_texts(&*second_model, &texts).unwrap();
    assert_eq!(first, second);
    assert_eq!(first[0].predicted, Sentiment::Positive);
    assert_eq!(first[1].predicted, Sentiment::Negative);
}

#[tokio::test]
async fn test_corrupt_classifier_blocks_scoring() {
    let root = tempfile::tempdir().unwrap();
    let paths = write_corpus(root.path());
    let fs_store = FsModelStore::new(&paths.model_dir);
    let store: Arc<dyn ModelStore> = Arc::new(fs_store.clone());
    train(&paths, store.clone()).await;

    let classifier = fs_store.current_pair_dir().await.unwrap().join(CLASSIFIER_FILE);
    std::fs::write(&classifier, b"{\"fit_id\": 3").unwrap();
    assert!(matches!(load_shared(store.as_ref()).await, Err(Error::ArtifactCorrupt(_))));

    std::fs::remove_file(&classifier).unwrap();
    assert!(matches!(load_shared(store.as_ref()).await, Err(Error::ArtifactNotFound(_))));
}

#[tokio::test]
async fn test_no_corpus_leaves_store_empty() {
    let root = tempfile::tempdir().unwrap();
    let paths = PathsConfig::from_root(root.path());
    let store = FsModelStore::new(&paths.model_dir);

    let result = TrainingPipeline::new(Arc::new(store.clone()), TrainingConfig::default())
        .run(
            &LocalCsvCorpus::new(root.path().join("a.csv")),
            &LocalCsvCorpus::new(root.path().join("b.csv")),
        )
        .await;

    assert!(matches!(result, Err(Error::NoCorpusAvailable { .. })));
    assert!(!store.pointer_path().exists());
    assert!(!store.pairs_dir().exists());
}
