//! Classification metrics.

use serde::{Deserialize, Serialize};

use std::collections::BTreeMap;
use std::fmt;

/// Fraction of predictions equal to the true label.
///
/// # Panics
/// Will panic if inputs are of unequal length.
pub fn accuracy_score(y_true: &[String], y_hat: &[String]) -> f64 {
  assert_eq!(y_true.len(), y_hat.len());

  let correct: usize = y_true.iter().zip(y_hat.iter()).filter(|(yt, yh)| yt == yh).count();
  correct as f64 / y_true.len() as f64
}

#[derive(Debug, Default, Clone, Copy)]
struct ClassTally {
  true_positive: usize,
  predicted: usize,
  support: usize,
}

/// Per-label tallies over every label seen in either input, in sorted order
fn tally<'a>(y_true: &'a [String], y_hat: &'a [String]) -> BTreeMap<&'a str, ClassTally> {
  let mut tallies: BTreeMap<&'a str, ClassTally> = BTreeMap::new();
  for (yt, yh) in y_true.iter().zip(y_hat.iter()) {
    tallies.entry(yt.as_str()).or_default().support += 1;
    tallies.entry(yh.as_str()).or_default().predicted += 1;
    if yt == yh {
      tallies.entry(yt.as_str()).or_default().true_positive += 1;
    }
  }
  tallies
}

fn weighted_average<F: Fn(&ClassTally) -> f64>(y_true: &[String], y_hat: &[String], metric: F) -> f64 {
  assert_eq!(y_true.len(), y_hat.len());

  let tallies: BTreeMap<&str, ClassTally> = tally(y_true, y_hat);
  let total_support: usize = tallies.values().map(|t| t.support).sum();
  if total_support == 0 {
    return 0.0;
  }
  let weighted: f64 = tallies.values().map(|t| metric(t) * t.support as f64).sum();
  weighted / total_support as f64
}

/// Precision per label, averaged with weights equal to each label's true support.
/// A label that is never predicted contributes a precision of zero.
///
/// # Panics
/// Will panic if inputs are of unequal length.
pub fn precision_score(y_true: &[String], y_hat: &[String]) -> f64 {
  weighted_average(y_true, y_hat, |t| {
    if t.predicted == 0 {
      0.0
    } else {
      t.true_positive as f64 / t.predicted as f64
    }
  })
}

/// Recall per label, averaged with weights equal to each label's true support.
///
/// # Panics
/// Will panic if inputs are of unequal length.
pub fn recall_score(y_true: &[String], y_hat: &[String]) -> f64 {
  weighted_average(y_true, y_hat, |t| {
    if t.support == 0 {
      0.0
    } else {
      t.true_positive as f64 / t.support as f64
    }
  })
}

/// Harmonic mean of precision and recall.
///
/// Not guarded: when both are zero the result is NaN.
pub fn f1_from(precision: f64, recall: f64) -> f64 {
  2.0 * (precision * recall) / (precision + recall)
}

/// Held-out evaluation scores
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
  pub precision: f64,
  pub recall: f64,
  pub f1: f64,
  pub accuracy: f64,
}

impl EvaluationReport {
  pub fn from_predictions(y_true: &[String], y_hat: &[String]) -> Self {
    let precision: f64 = precision_score(y_true, y_hat);
    let recall: f64 = recall_score(y_true, y_hat);
    Self {
      precision,
      recall,
      f1: f1_from(precision, recall),
      accuracy: accuracy_score(y_true, y_hat),
    }
  }
}

impl fmt::Display for EvaluationReport {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}\t{}\t{}\t{}", self.precision, self.recall, self.f1, self.accuracy)
  }
}
