use review_rating_tree::features::TfidfConfig;
use review_rating_tree::model::TreeConfig;
use review_rating_tree::{evaluate, rating_prediction, PipelineConfig, PipelineError};
use tempfile::TempDir;

use std::fs;
use std::path::Path;

const POSITIVE: &[&str] = &[
  "Wonderful soft blanket, my baby loves it",
  "Perfect gift, wonderful quality and soft",
  "Lovely stroller, wonderful wheels",
  "Wonderful and perfect, highly recommend",
];

const NEGATIVE: &[&str] = &[
  "Terrible bottle, broke after a week",
  "Terrible smell and it broke quickly",
  "Broke on day one, terrible refund process",
  "Cheap plastic, terrible and broken latch",
];

fn write_dataset(dir: &Path, rows: &[(&str, &str, &str)]) -> std::path::PathBuf {
  let path = dir.join("reviews.csv");
  let mut writer = csv::Writer::from_path(&path).unwrap();
  writer.write_record(["name", "review", "rating"]).unwrap();
  for (name, review, rating) in rows {
    writer.write_record([*name, *review, *rating]).unwrap();
  }
  writer.flush().unwrap();
  path
}

fn mixed_rows() -> Vec<(&'static str, &'static str, &'static str)> {
  let mut rows = Vec::new();
  for i in 0..10 {
    rows.push(("Baby item", POSITIVE[i % POSITIVE.len()], "5"));
    rows.push(("Baby item", NEGATIVE[i % NEGATIVE.len()], "1"));
  }
  rows
}

fn config(dir: &Path, dataset: &Path) -> PipelineConfig {
  PipelineConfig {
    dataset_path: dataset.to_path_buf(),
    cache_dir: dir.join("resources"),
    feature_size: 50,
    train_size: 0.8,
    tfidf: TfidfConfig { min_df: 0.0, max_df: 1.0 },
    tree: TreeConfig { max_depth: 20, min_samples_split: 2, min_samples_leaf: 1 },
    ..PipelineConfig::default()
  }
}

#[test]
fn repeated_runs_print_identical_metrics() {
  let dir = TempDir::new().unwrap();
  let dataset = write_dataset(dir.path(), &mixed_rows());

  let first = evaluate(config(dir.path(), &dataset)).unwrap();
  let cached = fs::read_dir(dir.path().join("resources")).unwrap().count();
  let second = evaluate(config(dir.path(), &dataset)).unwrap();

  assert_eq!(first.to_string(), second.to_string());
  assert_eq!(fs::read_dir(dir.path().join("resources")).unwrap().count(), cached);
  assert_eq!(first.to_string().split('\t').count(), 4);
}

#[test]
fn separable_reviews_score_perfectly() {
  let dir = TempDir::new().unwrap();
  let dataset = write_dataset(dir.path(), &mixed_rows());
  let report = evaluate(config(dir.path(), &dataset)).unwrap();

  assert_eq!(report.accuracy, 1.0);
  assert!((report.f1 - 2.0 * report.precision * report.recall / (report.precision + report.recall)).abs() < 1e-12);
}

#[test]
fn single_rating_dataset_predicts_that_rating() {
  let dir = TempDir::new().unwrap();
  let rows: Vec<_> = (0..10).map(|i| ("Crib", POSITIVE[i % POSITIVE.len()], "5")).collect();
  let dataset = write_dataset(dir.path(), &rows);

  let report = evaluate(config(dir.path(), &dataset)).unwrap();
  assert_eq!(report.accuracy, 1.0);
  assert_eq!(report.precision, 1.0);
  assert_eq!(
    rating_prediction(config(dir.path(), &dataset), "terrible and broken").unwrap(),
    "5"
  );
}

#[test]
fn caching_can_be_disabled() {
  let dir = TempDir::new().unwrap();
  let dataset = write_dataset(dir.path(), &mixed_rows());
  let mut no_cache = config(dir.path(), &dataset);
  no_cache.use_cache = false;

  evaluate(no_cache).unwrap();
  assert!(!dir.path().join("resources").exists());
}

#[test]
fn missing_dataset_is_an_error() {
  let dir = TempDir::new().unwrap();
  let result = evaluate(config(dir.path(), &dir.path().join("absent.csv")));
  assert!(matches!(result, Err(PipelineError::Io(_))));
}
