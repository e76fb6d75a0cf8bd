use thiserror::Error;

/// Pipeline Error
/// Every failure the training and evaluation pipeline can surface
#[derive(Error, Debug)]
pub enum PipelineError {
  #[error("I/O error: {0}")]
  Io(#[from] std::io::Error),

  #[error("CSV error: {0}")]
  Csv(#[from] csv::Error),

  #[error("CSV shape error: {0}")]
  CsvShape(#[from] ndarray_csv::ReadError),

  #[error("cache serialization error: {0}")]
  Cache(#[from] bincode::Error),

  #[error("config parse error: {0}")]
  ConfigParse(#[from] toml::de::Error),

  #[error("config serialize error: {0}")]
  ConfigSerialize(#[from] toml::ser::Error),

  #[error("invalid token pattern: {0}")]
  Pattern(#[from] regex::Error),

  #[error("tokenizer error: {0}")]
  Tokenizer(String),

  #[error("label column `{0}` not found in CSV header")]
  MissingLabelColumn(String),

  #[error("{0} split is empty")]
  EmptySplit(&'static str),

  #[error("row count mismatch: {rows} rows but {labels} labels")]
  LengthMismatch { rows: usize, labels: usize },

  #[error("feature dimension mismatch: model expects {expected} columns, got {found}")]
  DimensionMismatch { expected: usize, found: usize },

  #[error("model has not been fitted")]
  NotFitted,
}

pub type Result<T> = std::result::Result<T, PipelineError>;
