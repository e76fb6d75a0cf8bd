//! Pipeline configuration

use serde::{Deserialize, Serialize};

use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::features::TfidfConfig;
use crate::model::TreeConfig;
use crate::normalizer::CellPolicy;

/// Pipeline configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
  /// Review CSV with a header row
  pub dataset_path: PathBuf,
  /// Header of the star-rating column
  pub label_column: String,
  /// Directory holding cached artifacts
  pub cache_dir: PathBuf,
  /// Skip the cache entirely when false
  pub use_cache: bool,
  /// Requested vocabulary size
  pub feature_size: usize,
  /// Fraction of rows used for training
  pub train_size: f64,
  /// Shuffle seed for the train/test split
  pub seed: u64,
  pub cell_policy: CellPolicy,
  pub tfidf: TfidfConfig,
  pub tree: TreeConfig,
}

impl Default for PipelineConfig {
  fn default() -> Self {
    Self {
      dataset_path: PathBuf::from("dataset/amazon_dataset/amazon_baby_test.csv"),
      label_column: "rating".to_string(),
      cache_dir: PathBuf::from("resources"),
      use_cache: true,
      feature_size: 1000,
      train_size: 0.9,
      seed: 42,
      cell_policy: CellPolicy::default(),
      tfidf: TfidfConfig::default(),
      tree: TreeConfig::default(),
    }
  }
}

/// Load configuration from a TOML file; missing keys take their defaults
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<PipelineConfig> {
  let content: String = std::fs::read_to_string(path.as_ref())?;
  Ok(toml::from_str(&content)?)
}

/// Save configuration as TOML
pub fn save_config<P: AsRef<Path>>(config: &PipelineConfig, path: P) -> Result<()> {
  let content: String = toml::to_string_pretty(config)?;
  std::fs::write(path, content)?;
  Ok(())
}
