//! Star-rating prediction for free-text product reviews.
//!
//! Reviews are read from CSV, normalized (tokenized, stemmed, stopword-filtered),
//! mapped onto a vocabulary of the most frequent words per rating class, weighted
//! with TF-IDF and classified by a CART decision tree. Intermediate artifacts are
//! cached on disk under content-derived keys.

pub mod cache;
pub mod config;
pub mod error;
pub mod features;
pub mod metrics;
pub mod model;
pub mod normalizer;
pub mod pipeline;
pub mod preprocessing;
pub mod stopwords;
pub mod vocabulary;

pub use config::PipelineConfig;
pub use error::{PipelineError, Result};
pub use metrics::EvaluationReport;
pub use pipeline::{ReviewPipeline, TrainedPipeline};

/// Evaluate
/// Trains on the configured dataset and scores the held-out split
pub fn evaluate(config: PipelineConfig) -> Result<EvaluationReport> {
  let trained: TrainedPipeline = ReviewPipeline::new(config).run()?;
  Ok(trained.report)
}

/// Rating Prediction
/// Predicts the star rating of a single review, training first if no cached model exists
pub fn rating_prediction(config: PipelineConfig, review: &str) -> Result<String> {
  let trained: TrainedPipeline = ReviewPipeline::new(config).run()?;
  trained.predict_rating(review)
}
