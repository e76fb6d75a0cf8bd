//! Train a decision tree on review text and print held-out scores
//!
//! Usage: cargo run --bin review-rating-tree -- --dataset reviews.csv --feature-size 1000
//!
//! Prints `precision<TAB>recall<TAB>f1<TAB>accuracy` on stdout; progress goes to stderr.

use anyhow::{Context, Result};
use clap::Parser;
use review_rating_tree::config::load_config;
use review_rating_tree::normalizer::CellPolicy;
use review_rating_tree::{evaluate, PipelineConfig};
use tracing_subscriber::EnvFilter;

use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about = "Predict review star ratings with a decision tree")]
struct Args {
  /// TOML config file; flags below override its values
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Review CSV with a header row
  #[arg(short, long)]
  dataset: Option<PathBuf>,

  /// Header of the star-rating column
  #[arg(long)]
  label_column: Option<String>,

  /// Directory for cached artifacts
  #[arg(long)]
  cache_dir: Option<PathBuf>,

  /// Recompute everything without reading or writing the cache
  #[arg(long)]
  no_cache: bool,

  /// Requested vocabulary size
  #[arg(short, long)]
  feature_size: Option<usize>,

  /// Fraction of rows used for training
  #[arg(long)]
  train_size: Option<f64>,

  /// Shuffle seed for the train/test split
  #[arg(long)]
  seed: Option<u64>,

  /// Combine every text cell of a row instead of keeping only the last one
  #[arg(long)]
  all_text_cells: bool,

  /// Debug-level logging
  #[arg(short, long)]
  verbose: bool,
}

impl Args {
  fn into_config(self) -> Result<PipelineConfig> {
    let mut config: PipelineConfig = match &self.config {
      Some(path) => load_config(path).with_context(|| format!("reading config {}", path.display()))?,
      None => PipelineConfig::default(),
    };
    if let Some(dataset) = self.dataset {
      config.dataset_path = dataset;
    }
    if let Some(label_column) = self.label_column {
      config.label_column = label_column;
    }
    if let Some(cache_dir) = self.cache_dir {
      config.cache_dir = cache_dir;
    }
    if self.no_cache {
      config.use_cache = false;
    }
    if let Some(feature_size) = self.feature_size {
      config.feature_size = feature_size;
    }
    if let Some(train_size) = self.train_size {
      config.train_size = train_size;
    }
    if let Some(seed) = self.seed {
      config.seed = seed;
    }
    if self.all_text_cells {
      config.cell_policy = CellPolicy::AllTextCells;
    }
    Ok(config)
  }
}

fn main() -> Result<()> {
  let args = Args::parse();

  let default_level: &str = if args.verbose { "debug" } else { "info" };
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
    .with_writer(std::io::stderr)
    .init();

  let config: PipelineConfig = args.into_config()?;
  let dataset = config.dataset_path.clone();
  let report = evaluate(config).with_context(|| format!("evaluating {}", dataset.display()))?;

  println!("{}", report);
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use tempfile::TempDir;

  fn write_config(dir: &TempDir) -> PathBuf {
    let path: PathBuf = dir.path().join("pipeline.toml");
    std::fs::write(
      &path,
      "label_column = \"stars\"\nfeature_size = 200\nseed = 7\nuse_cache = true\n\n[tree]\nmax_depth = 8\n",
    )
    .unwrap();
    path
  }

  #[test]
  fn flags_override_the_config_file() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir);
    let args = Args::parse_from([
      "review-rating-tree",
      "--config",
      path.to_str().unwrap(),
      "--feature-size",
      "50",
      "--no-cache",
      "--all-text-cells",
    ]);
    let config = args.into_config().unwrap();

    assert_eq!(config.feature_size, 50);
    assert!(!config.use_cache);
    assert_eq!(config.cell_policy, CellPolicy::AllTextCells);
    // unset flags keep the file's values
    assert_eq!(config.label_column, "stars");
    assert_eq!(config.seed, 7);
    assert_eq!(config.tree.max_depth, 8);
  }

  #[test]
  fn file_values_stand_without_flags() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir);
    let args = Args::parse_from(["review-rating-tree", "--config", path.to_str().unwrap()]);
    let config = args.into_config().unwrap();

    assert_eq!(config.feature_size, 200);
    assert!(config.use_cache);
    assert_eq!(config.cell_policy, CellPolicy::LastTextCell);
    assert_eq!(config.train_size, 0.9);
  }

  #[test]
  fn flags_apply_over_defaults_without_a_file() {
    let args = Args::parse_from(["review-rating-tree", "--dataset", "reviews.csv", "--seed", "3"]);
    let config = args.into_config().unwrap();

    assert_eq!(config.dataset_path, PathBuf::from("reviews.csv"));
    assert_eq!(config.seed, 3);
    assert_eq!(config.feature_size, 1000);
  }
}
