use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use std::collections::HashMap;

use crate::error::{PipelineError, Result};

/// Star-rating classes, in the order their top words are merged
pub const RATING_CLASSES: [&str; 5] = ["1", "2", "3", "4", "5"];

/// Vocabulary
/// Word to column-index mapping; indices follow insertion order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Vocabulary {
  terms: Vec<String>,
  index: HashMap<String, usize>,
}

impl Vocabulary {
  /// Build Vocabulary
  /// Merges the top `feature_size / 5` words of each rating class. A word shared by
  /// several classes keeps the position of its first insertion, so the result may be
  /// smaller than `feature_size`.
  pub fn build(reviews: &[String], labels: &[String], feature_size: usize) -> Result<Self> {
    if reviews.len() != labels.len() {
      return Err(PipelineError::LengthMismatch { rows: reviews.len(), labels: labels.len() });
    }
    let per_class: usize = feature_size / RATING_CLASSES.len();
    let mut vocabulary: Vocabulary = Vocabulary::default();

    for rating in RATING_CLASSES {
      let indices: Vec<usize> = labels
        .iter()
        .enumerate()
        .filter(|(_, label)| label.as_str() == rating)
        .map(|(i, _)| i)
        .collect();
      let top: Vec<(String, usize)> = word_frequencies(reviews, &indices, per_class)?;
      debug!(rating, reviews = indices.len(), words = top.len(), "class word frequencies");
      for (word, _) in top {
        vocabulary.insert(word);
      }
    }

    Ok(vocabulary)
  }

  pub fn from_terms<I: IntoIterator<Item = String>>(terms: I) -> Self {
    let mut vocabulary: Vocabulary = Vocabulary::default();
    for term in terms {
      vocabulary.insert(term);
    }
    vocabulary
  }

  fn insert(&mut self, word: String) {
    if !self.index.contains_key(&word) {
      self.index.insert(word.clone(), self.terms.len());
      self.terms.push(word);
    }
  }

  pub fn get(&self, word: &str) -> Option<usize> {
    self.index.get(word).copied()
  }

  pub fn terms(&self) -> &[String] {
    &self.terms
  }

  pub fn len(&self) -> usize {
    self.terms.len()
  }

  pub fn is_empty(&self) -> bool {
    self.terms.is_empty()
  }
}

/// Word Frequencies
/// Counts `\w+` words over the selected reviews and returns the `top_k` most common,
/// most frequent first; equal counts keep first-occurrence order
pub fn word_frequencies(reviews: &[String], indices: &[usize], top_k: usize) -> Result<Vec<(String, usize)>> {
  let word_re: Regex = Regex::new(r"\w+")?;
  let mut order: Vec<String> = Vec::new();
  let mut counts: HashMap<String, usize> = HashMap::new();

  for &i in indices {
    for m in word_re.find_iter(&reviews[i]) {
      let count: &mut usize = counts.entry(m.as_str().to_string()).or_insert_with(|| {
        order.push(m.as_str().to_string());
        0
      });
      *count += 1;
    }
  }

  let mut ranked: Vec<(String, usize)> = order
    .into_iter()
    .map(|word| {
      let count: usize = counts[&word];
      (word, count)
    })
    .collect();
  // stable: ties stay in first-occurrence order
  ranked.sort_by(|a, b| b.1.cmp(&a.1));
  ranked.truncate(top_k);
  Ok(ranked)
}
