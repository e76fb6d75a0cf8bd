use csv::Reader;
use ndarray::Array2;
use ndarray_csv::Array2Reader;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use std::fs::File;
use std::path::{Path, PathBuf};

use crate::error::{PipelineError, Result};

/// Cell
/// One value of a raw review row. Only `Text` cells are normalized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Cell {
  Text(String),
  Number(f64),
  Missing,
}

impl Cell {
  /// Types a raw CSV field: blank is missing, numeric is a number, anything else is text
  pub fn parse(raw: &str) -> Self {
    let trimmed: &str = raw.trim();
    if trimmed.is_empty() {
      return Cell::Missing;
    }
    match trimmed.parse::<f64>() {
      Ok(value) if value.is_finite() => Cell::Number(value),
      _ => Cell::Text(raw.to_string()),
    }
  }

  pub fn as_text(&self) -> Option<&str> {
    match self {
      Cell::Text(text) => Some(text.as_str()),
      _ => None,
    }
  }
}

/// Raw review rows with their parallel star-rating labels
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReviewDataset {
  pub rows: Vec<Vec<Cell>>,
  pub labels: Vec<String>,
}

impl ReviewDataset {
  pub fn new(rows: Vec<Vec<Cell>>, labels: Vec<String>) -> Result<Self> {
    if rows.len() != labels.len() {
      return Err(PipelineError::LengthMismatch { rows: rows.len(), labels: labels.len() });
    }
    Ok(Self { rows, labels })
  }

  pub fn len(&self) -> usize {
    self.rows.len()
  }

  pub fn is_empty(&self) -> bool {
    self.rows.is_empty()
  }

  fn select(&self, indices: &[usize]) -> Self {
    Self {
      rows: indices.iter().map(|&i| self.rows[i].clone()).collect(),
      labels: indices.iter().map(|&i| self.labels[i].clone()).collect(),
    }
  }
}

/// Train and held-out halves of a dataset
#[derive(Debug, Clone)]
pub struct Split {
  pub train: ReviewDataset,
  pub test: ReviewDataset,
}

pub struct DataPreprocessor {
  pub filepath: PathBuf,
  pub label_column: String,
}

impl DataPreprocessor {
  pub fn new(filepath: impl AsRef<Path>, label_column: &str) -> Self {
    Self { filepath: filepath.as_ref().to_path_buf(), label_column: label_column.to_string() }
  }

  /// Load Dataset
  /// Reads the headed CSV; the label column becomes the rating, every other column a cell
  pub fn load_dataset(&self) -> Result<ReviewDataset> {
    let file: File = File::open(&self.filepath)?;
    let mut reader: Reader<File> = Reader::from_reader(file);
    let headers: Vec<String> = reader.headers()?.iter().map(|h| h.trim().to_string()).collect();
    let label_idx: usize = headers
      .iter()
      .position(|h| h == &self.label_column)
      .ok_or_else(|| PipelineError::MissingLabelColumn(self.label_column.clone()))?;

    let data: Array2<String> = reader.deserialize_array2_dynamic()?;
    debug!(rows = data.nrows(), columns = data.ncols(), "read CSV matrix");

    let mut rows: Vec<Vec<Cell>> = Vec::with_capacity(data.nrows());
    let mut labels: Vec<String> = Vec::with_capacity(data.nrows());
    for record in data.rows() {
      let mut cells: Vec<Cell> = Vec::with_capacity(record.len().saturating_sub(1));
      for (col, value) in record.iter().enumerate() {
        if col == label_idx {
          labels.push(value.trim().to_string());
        } else {
          cells.push(Cell::parse(value));
        }
      }
      rows.push(cells);
    }

    info!(path = %self.filepath.display(), reviews = rows.len(), "dataset loaded");
    ReviewDataset::new(rows, labels)
  }

  /// Perform train, test, split on your data
  /// Rows are shuffled with a seeded generator so the split is reproducible
  pub fn train_test_split(&self, dataset: &ReviewDataset, train_size: f64, seed: u64) -> Result<Split> {
    let data_len: usize = dataset.len();
    let mut indices: Vec<usize> = (0..data_len).collect();
    let mut rng: ChaCha8Rng = ChaCha8Rng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let train_len: usize = ((data_len as f64) * train_size.clamp(0.0, 1.0)).floor() as usize;
    let split: Split = Split {
      train: dataset.select(&indices[..train_len]),
      test: dataset.select(&indices[train_len..]),
    };

    if split.train.is_empty() {
      return Err(PipelineError::EmptySplit("training"));
    }
    if split.test.is_empty() {
      return Err(PipelineError::EmptySplit("test"));
    }
    assert_eq!(split.train.len() + split.test.len(), data_len);

    info!(train = split.train.len(), test = split.test.len(), "train/test split");
    Ok(split)
  }
}
