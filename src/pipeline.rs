use ndarray::Array2;
use tracing::{debug, info, warn};

use crate::cache::{ArtifactCache, CacheKey, Fingerprint};
use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::features::{extract_features, CountVectorizer, FeatureMatrix, TfidfTransformer};
use crate::metrics::EvaluationReport;
use crate::model::{train_rating_model, DecisionTreeClassifier};
use crate::normalizer::{CellPolicy, TextNormalizer};
use crate::preprocessing::{Cell, DataPreprocessor, ReviewDataset, Split};
use crate::vocabulary::Vocabulary;

/// Cache tag of the training path
pub const TRAIN_OP: &str = "";
/// Cache tag of the evaluation path
pub const TEST_OP: &str = "test";

const DATALIST: &str = "review_datalist";
const VOCABULARY: &str = "vocabulary";
const FEATURES: &str = "review_features";
const MODEL: &str = "decision_tree";

/// Normalized reviews of one split plus the key they were cached under
pub struct NormalizedSplit {
  pub reviews: Vec<String>,
  pub key: CacheKey,
}

/// Everything the training path produced, ready to score new reviews
pub struct TrainedPipeline {
  pub vocabulary: Vocabulary,
  pub tfidf: TfidfTransformer,
  pub model: DecisionTreeClassifier,
  pub report: EvaluationReport,
  normalizer: TextNormalizer,
}

impl TrainedPipeline {
  /// Predict the star rating of a single free-text review
  pub fn predict_rating(&self, review: &str) -> Result<String> {
    let normalized: String = self.normalizer.normalize_row(&[Cell::Text(review.to_string())])?;
    let counts: Array2<f64> = CountVectorizer::new(&self.vocabulary)?.transform(&[normalized]);
    let weights: Array2<f64> = self.tfidf.transform(&counts)?;
    let mut predictions: Vec<String> = self.model.predict(&weights)?;
    predictions.pop().ok_or(PipelineError::EmptySplit("prediction"))
  }
}

pub struct ReviewPipeline {
  config: PipelineConfig,
  cache: ArtifactCache,
  normalizer: TextNormalizer,
}

impl ReviewPipeline {
  pub fn new(config: PipelineConfig) -> Self {
    let cache: ArtifactCache = ArtifactCache::new(&config.cache_dir, config.use_cache);
    let normalizer: TextNormalizer = TextNormalizer::new(config.cell_policy);
    Self { config, cache, normalizer }
  }

  /// Reads the dataset and splits it into training and held-out rows
  pub fn load_split(&self) -> Result<Split> {
    let preprocessor: DataPreprocessor = DataPreprocessor::new(&self.config.dataset_path, &self.config.label_column);
    let dataset: ReviewDataset = preprocessor.load_dataset()?;
    preprocessor.train_test_split(&dataset, self.config.train_size, self.config.seed)
  }

  /// Normalize Reviews
  /// Normalized text of every row, cached per operation tag
  pub fn normalize(&self, rows: &[Vec<Cell>], op_type: &str) -> Result<NormalizedSplit> {
    let key: CacheKey = rows
      .iter()
      .fold(Fingerprint::new().text(DATALIST).text(policy_tag(self.normalizer.policy())), |fp, row| {
        row.iter().fold(fp.number(row.len() as u64), |fp, cell| match cell {
          Cell::Text(text) => fp.text("t").text(text),
          Cell::Number(value) => fp.text("n").float(*value),
          Cell::Missing => fp.text("m"),
        })
      })
      .finish();

    let reviews: Vec<String> = self.cache.load_or_compute(op_type, DATALIST, &key, || {
      info!(rows = rows.len(), op_type, "normalizing reviews");
      self.normalizer.normalize_all(rows)
    })?;
    let empty: usize = reviews.iter().filter(|r| r.is_empty()).count();
    if empty > 0 {
      warn!(empty, op_type, "reviews without any usable text");
    }
    Ok(NormalizedSplit { reviews, key })
  }

  /// Build Vocabulary
  /// Built from training reviews only; the evaluation path reuses it
  pub fn build_vocabulary(&self, train: &NormalizedSplit, labels: &[String]) -> Result<(Vocabulary, CacheKey)> {
    let key: CacheKey = Fingerprint::new()
      .text(VOCABULARY)
      .key(&train.key)
      .strings(labels)
      .number(self.config.feature_size as u64)
      .finish();
    let vocabulary: Vocabulary = self.cache.load_or_compute(TRAIN_OP, VOCABULARY, &key, || {
      Vocabulary::build(&train.reviews, labels, self.config.feature_size)
    })?;
    info!(size = vocabulary.len(), requested = self.config.feature_size, "vocabulary ready");
    debug!(terms = ?vocabulary.terms(), "vocabulary terms");
    Ok((vocabulary, key))
  }

  /// Training TF-IDF features, cached
  pub fn training_features(&self, train: &NormalizedSplit, vocabulary: &Vocabulary, vocabulary_key: &CacheKey) -> Result<(FeatureMatrix, CacheKey)> {
    let key: CacheKey = Fingerprint::new()
      .text(FEATURES)
      .key(vocabulary_key)
      .key(&train.key)
      .float(self.config.tfidf.min_df)
      .float(self.config.tfidf.max_df)
      .finish();
    let features: FeatureMatrix = self.cache.load_or_compute(TRAIN_OP, FEATURES, &key, || {
      extract_features(&train.reviews, vocabulary, self.config.tfidf)
    })?;
    Ok((features, key))
  }

  /// Fitted decision tree, cached
  pub fn trained_model(&self, features: &FeatureMatrix, features_key: &CacheKey, labels: &[String]) -> Result<DecisionTreeClassifier> {
    let tree = self.config.tree;
    let key: CacheKey = Fingerprint::new()
      .text(MODEL)
      .key(features_key)
      .strings(labels)
      .number(tree.max_depth as u64)
      .number(tree.min_samples_split as u64)
      .number(tree.min_samples_leaf as u64)
      .finish();
    self.cache.load_or_compute(TRAIN_OP, MODEL, &key, || {
      train_rating_model(&features.weights, labels, tree)
    })
  }

  /// Run the full pipeline: load, split, train, evaluate
  pub fn run(self) -> Result<TrainedPipeline> {
    info!(
      dataset = %self.config.dataset_path.display(),
      cache = self.cache.is_enabled(),
      cache_dir = %self.config.cache_dir.display(),
      "starting pipeline"
    );
    let split: Split = self.load_split()?;
    self.run_split(&split)
  }

  /// Train on `split.train` and evaluate on `split.test`
  pub fn run_split(self, split: &Split) -> Result<TrainedPipeline> {
    if split.train.is_empty() {
      return Err(PipelineError::EmptySplit("training"));
    }
    if split.test.is_empty() {
      return Err(PipelineError::EmptySplit("test"));
    }

    let train: NormalizedSplit = self.normalize(&split.train.rows, TRAIN_OP)?;
    let (vocabulary, vocabulary_key) = self.build_vocabulary(&train, &split.train.labels)?;
    let (train_features, features_key) = self.training_features(&train, &vocabulary, &vocabulary_key)?;
    let model: DecisionTreeClassifier = self.trained_model(&train_features, &features_key, &split.train.labels)?;

    let test: NormalizedSplit = self.normalize(&split.test.rows, TEST_OP)?;
    let test_features: FeatureMatrix = extract_features(&test.reviews, &vocabulary, self.config.tfidf)?;
    let predictions: Vec<String> = model.predict(&test_features.weights)?;
    let report: EvaluationReport = EvaluationReport::from_predictions(&split.test.labels, &predictions);
    info!(
      precision = report.precision,
      recall = report.recall,
      f1 = report.f1,
      accuracy = report.accuracy,
      "evaluation complete"
    );

    Ok(TrainedPipeline {
      vocabulary,
      tfidf: train_features.tfidf,
      model,
      report,
      normalizer: self.normalizer,
    })
  }
}

fn policy_tag(policy: CellPolicy) -> &'static str {
  match policy {
    CellPolicy::LastTextCell => "last_text_cell",
    CellPolicy::AllTextCells => "all_text_cells",
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::features::TfidfConfig;
  use crate::model::TreeConfig;
  use std::path::Path;
  use tempfile::TempDir;

  fn text_rows(items: &[&str]) -> Vec<Vec<Cell>> {
    items.iter().map(|s| vec![Cell::Text("Product".to_string()), Cell::Text(s.to_string())]).collect()
  }

  fn labels(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
  }

  fn config(cache_dir: &Path) -> PipelineConfig {
    PipelineConfig {
      cache_dir: cache_dir.to_path_buf(),
      feature_size: 20,
      tfidf: TfidfConfig { min_df: 0.0, max_df: 1.0 },
      tree: TreeConfig { max_depth: 10, min_samples_split: 2, min_samples_leaf: 1 },
      ..PipelineConfig::default()
    }
  }

  fn split() -> Split {
    let train = ReviewDataset::new(
      text_rows(&[
        "terrible broke immediately", "awful broke leaking", "terrible refund", "broke awful waste",
        "wonderful soft perfect", "perfect lovely soft", "wonderful quality", "lovely perfect gift",
      ]),
      labels(&["1", "1", "1", "1", "5", "5", "5", "5"]),
    )
    .unwrap();
    let test = ReviewDataset::new(
      text_rows(&["broke terrible", "soft wonderful"]),
      labels(&["1", "5"]),
    )
    .unwrap();
    Split { train, test }
  }

  #[test]
  fn it_trains_and_evaluates() {
    let dir = TempDir::new().unwrap();
    let trained = ReviewPipeline::new(config(dir.path())).run_split(&split()).unwrap();

    assert!(trained.vocabulary.len() <= 20);
    assert_eq!(trained.report.accuracy, 1.0);
    assert_eq!(trained.predict_rating("It broke, terrible.").unwrap(), "1");
    assert_eq!(trained.predict_rating("So soft and wonderful!").unwrap(), "5");
  }

  #[test]
  fn it_reuses_cached_artifacts() {
    let dir = TempDir::new().unwrap();
    let first = ReviewPipeline::new(config(dir.path())).run_split(&split()).unwrap();
    let entries = std::fs::read_dir(dir.path()).unwrap().count();
    let second = ReviewPipeline::new(config(dir.path())).run_split(&split()).unwrap();

    assert_eq!(first.report, second.report);
    assert_eq!(first.vocabulary, second.vocabulary);
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), entries);
    // datalist for each tag, vocabulary, features, model
    assert_eq!(entries, 5);
  }

  #[test]
  fn it_rebuilds_when_configuration_changes() {
    let dir = TempDir::new().unwrap();
    ReviewPipeline::new(config(dir.path())).run_split(&split()).unwrap();
    let mut changed = config(dir.path());
    changed.feature_size = 10;
    let trained = ReviewPipeline::new(changed).run_split(&split()).unwrap();

    assert!(trained.vocabulary.len() <= 10);
    // new vocabulary, features and model; datalists are shared
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 8);
  }

  #[test]
  fn it_builds_vocabulary_from_training_rows_only() {
    let dir = TempDir::new().unwrap();
    let trained = ReviewPipeline::new(config(dir.path())).run_split(&split()).unwrap();
    for term in trained.vocabulary.terms() {
      assert_ne!(term, "product");
    }
    let test_only = ReviewDataset::new(text_rows(&["zebra"]), labels(&["3"])).unwrap();
    let with_new_word = Split { train: split().train, test: test_only };
    let trained = ReviewPipeline::new(config(dir.path())).run_split(&with_new_word).unwrap();
    assert!(trained.vocabulary.get("zebra").is_none());
  }

  #[test]
  fn it_refuses_empty_splits() {
    let dir = TempDir::new().unwrap();
    let empty = Split { train: split().train, test: ReviewDataset::default() };
    assert!(matches!(
      ReviewPipeline::new(config(dir.path())).run_split(&empty),
      Err(PipelineError::EmptySplit("test"))
    ));
  }
}
