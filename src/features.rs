use ndarray::{Array1, Array2, Axis};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{PipelineError, Result};
use crate::vocabulary::Vocabulary;

/// Tokens of two or more word characters, apostrophes allowed inside
pub const TOKEN_PATTERN: &str = r"\w[\w']*\w";

/// Count Vectorizer
/// Maps normalized reviews to raw term counts over a fixed vocabulary
pub struct CountVectorizer<'a> {
  vocabulary: &'a Vocabulary,
  token_re: Regex,
}

impl<'a> CountVectorizer<'a> {
  pub fn new(vocabulary: &'a Vocabulary) -> Result<Self> {
    Ok(Self { vocabulary, token_re: Regex::new(TOKEN_PATTERN)? })
  }

  /// Out-of-vocabulary tokens are ignored; an empty review gives an all-zero row
  pub fn transform(&self, reviews: &[String]) -> Array2<f64> {
    let mut counts: Array2<f64> = Array2::zeros((reviews.len(), self.vocabulary.len()));
    for (row, review) in reviews.iter().enumerate() {
      for m in self.token_re.find_iter(review) {
        let token: String = m.as_str().to_lowercase();
        if let Some(col) = self.vocabulary.get(&token) {
          counts[[row, col]] += 1.0;
        }
      }
    }
    counts
  }
}

/// TF-IDF settings; `min_df` and `max_df` are proportions of documents
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TfidfConfig {
  pub min_df: f64,
  pub max_df: f64,
}

impl Default for TfidfConfig {
  fn default() -> Self {
    Self { min_df: 0.4, max_df: 0.9 }
  }
}

/// TF-IDF Transformer
/// Smooth idf, L2-normalized rows. Columns whose document frequency falls outside
/// the configured band get a zero weight; the matrix width never changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TfidfTransformer {
  config: TfidfConfig,
  idf: Option<Array1<f64>>,
}

impl TfidfTransformer {
  pub fn new(config: TfidfConfig) -> Self {
    Self { config, idf: None }
  }

  pub fn idf(&self) -> Option<&Array1<f64>> {
    self.idf.as_ref()
  }

  pub fn fit(&mut self, counts: &Array2<f64>) {
    let n_docs: f64 = counts.nrows() as f64;
    let min_count: f64 = self.config.min_df * n_docs;
    let max_count: f64 = self.config.max_df * n_docs;

    let doc_freq: Array1<f64> = counts.map(|&c| if c > 0.0 { 1.0 } else { 0.0 }).sum_axis(Axis(0));
    let idf: Array1<f64> = doc_freq.mapv(|df| {
      if df < min_count || df > max_count {
        0.0
      } else {
        ((1.0 + n_docs) / (1.0 + df)).ln() + 1.0
      }
    });

    debug!(
      columns = idf.len(),
      kept = idf.iter().filter(|&&w| w > 0.0).count(),
      "fitted idf weights"
    );
    self.idf = Some(idf);
  }

  pub fn transform(&self, counts: &Array2<f64>) -> Result<Array2<f64>> {
    let idf: &Array1<f64> = self.idf.as_ref().ok_or(PipelineError::NotFitted)?;
    if idf.len() != counts.ncols() {
      return Err(PipelineError::DimensionMismatch { expected: idf.len(), found: counts.ncols() });
    }

    let mut weights: Array2<f64> = counts * idf;
    for mut row in weights.rows_mut() {
      let norm: f64 = row.dot(&row).sqrt();
      if norm > 0.0 {
        row /= norm;
      }
    }
    Ok(weights)
  }

  pub fn fit_transform(&mut self, counts: &Array2<f64>) -> Result<Array2<f64>> {
    self.fit(counts);
    self.transform(counts)
  }
}

/// Feature Matrix
/// TF-IDF weighted features together with the transformer that produced them
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureMatrix {
  pub weights: Array2<f64>,
  pub tfidf: TfidfTransformer,
}

/// Extract Features
/// Counts reviews over the vocabulary, then fits and applies TF-IDF on that same matrix
pub fn extract_features(reviews: &[String], vocabulary: &Vocabulary, config: TfidfConfig) -> Result<FeatureMatrix> {
  let counts: Array2<f64> = CountVectorizer::new(vocabulary)?.transform(reviews);
  let mut tfidf: TfidfTransformer = TfidfTransformer::new(config);
  let weights: Array2<f64> = tfidf.fit_transform(&counts)?;
  Ok(FeatureMatrix { weights, tfidf })
}
