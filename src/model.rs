use ndarray::{Array2, ArrayView1};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use std::cmp::Ordering;

use crate::error::{PipelineError, Result};

pub const MAX_DEPTH: usize = 100;
pub const MIN_SAMPLES_SPLIT: usize = 100;
pub const MIN_SAMPLES_LEAF: usize = 1;

/// Values closer than this are treated as equal when placing thresholds
const FEATURE_THRESHOLD: f64 = 1e-7;

/// Decision tree hyperparameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TreeConfig {
  /// Maximum depth of tree
  pub max_depth: usize,
  /// Minimum samples required to split
  pub min_samples_split: usize,
  /// Minimum samples in leaf node
  pub min_samples_leaf: usize,
}

impl Default for TreeConfig {
  fn default() -> Self {
    Self {
      max_depth: MAX_DEPTH,
      min_samples_split: MIN_SAMPLES_SPLIT,
      min_samples_leaf: MIN_SAMPLES_LEAF,
    }
  }
}

/// Tree node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TreeNode {
  Leaf {
    /// Per-class sample counts, indexed like `DecisionTreeClassifier::classes`
    class_counts: Vec<usize>,
    prediction: usize,
  },
  Split {
    feature_idx: usize,
    threshold: f64,
    n_samples: usize,
    impurity: f64,
    left: Box<TreeNode>,
    right: Box<TreeNode>,
  },
}

impl TreeNode {
  pub fn depth(&self) -> usize {
    match self {
      TreeNode::Leaf { .. } => 1,
      TreeNode::Split { left, right, .. } => 1 + left.depth().max(right.depth()),
    }
  }

  pub fn n_leaves(&self) -> usize {
    match self {
      TreeNode::Leaf { .. } => 1,
      TreeNode::Split { left, right, .. } => left.n_leaves() + right.n_leaves(),
    }
  }

  /// Training samples that reached this node
  pub fn n_samples(&self) -> usize {
    match self {
      TreeNode::Leaf { class_counts, .. } => class_counts.iter().sum(),
      TreeNode::Split { n_samples, .. } => *n_samples,
    }
  }

  /// Gini impurity of the samples that reached this node
  pub fn impurity(&self) -> f64 {
    match self {
      TreeNode::Leaf { class_counts, .. } => gini(class_counts, class_counts.iter().sum()),
      TreeNode::Split { impurity, .. } => *impurity,
    }
  }

  /// Class counts and predicted class of the leaf this sample falls into
  fn leaf_for(&self, sample: ArrayView1<f64>) -> (&[usize], usize) {
    match self {
      TreeNode::Leaf { class_counts, prediction } => (class_counts.as_slice(), *prediction),
      TreeNode::Split { feature_idx, threshold, left, right, .. } => {
        if sample[*feature_idx] <= *threshold {
          left.leaf_for(sample)
        } else {
          right.leaf_for(sample)
        }
      }
    }
  }
}

struct BestSplit {
  feature_idx: usize,
  threshold: f64,
  left: Vec<usize>,
  right: Vec<usize>,
}

/// CART classification tree with Gini impurity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTreeClassifier {
  config: TreeConfig,
  classes: Vec<String>,
  n_features: usize,
  root: Option<TreeNode>,
}

impl DecisionTreeClassifier {
  pub fn new(config: TreeConfig) -> Self {
    Self { config, classes: Vec::new(), n_features: 0, root: None }
  }

  /// Distinct training labels, sorted
  pub fn classes(&self) -> &[String] {
    &self.classes
  }

  pub fn root(&self) -> Option<&TreeNode> {
    self.root.as_ref()
  }

  pub fn depth(&self) -> usize {
    self.root.as_ref().map(TreeNode::depth).unwrap_or(0)
  }

  pub fn n_leaves(&self) -> usize {
    self.root.as_ref().map(TreeNode::n_leaves).unwrap_or(0)
  }

  /// Train the decision tree
  pub fn fit(&mut self, x: &Array2<f64>, y: &[String]) -> Result<()> {
    if x.nrows() != y.len() {
      return Err(PipelineError::LengthMismatch { rows: x.nrows(), labels: y.len() });
    }
    if y.is_empty() {
      return Err(PipelineError::EmptySplit("training"));
    }

    let mut classes: Vec<String> = y.to_vec();
    classes.sort();
    classes.dedup();
    let targets: Vec<usize> = y
      .iter()
      .map(|label| classes.binary_search(label).unwrap_or_default())
      .collect();

    self.classes = classes;
    self.n_features = x.ncols();

    let indices: Vec<usize> = (0..x.nrows()).collect();
    let root: TreeNode = self.build_tree(x, &targets, indices, 0);
    info!(
      samples = x.nrows(),
      features = x.ncols(),
      classes = self.classes.len(),
      impurity = root.impurity(),
      depth = root.depth(),
      leaves = root.n_leaves(),
      "decision tree fitted"
    );
    self.root = Some(root);
    Ok(())
  }

  /// Build tree recursively
  fn build_tree(&self, x: &Array2<f64>, targets: &[usize], indices: Vec<usize>, depth: usize) -> TreeNode {
    let counts: Vec<usize> = self.class_counts(targets, &indices);
    let impurity: f64 = gini(&counts, indices.len());

    // Check stopping conditions
    if depth >= self.config.max_depth
      || indices.len() < self.config.min_samples_split
      || indices.len() < 2 * self.config.min_samples_leaf
      || impurity <= f64::EPSILON
    {
      return leaf(counts);
    }

    match self.find_best_split(x, targets, &indices, &counts, impurity) {
      Some(split) => {
        let left: TreeNode = self.build_tree(x, targets, split.left, depth + 1);
        let right: TreeNode = self.build_tree(x, targets, split.right, depth + 1);
        TreeNode::Split {
          feature_idx: split.feature_idx,
          threshold: split.threshold,
          n_samples: indices.len(),
          impurity,
          left: Box::new(left),
          right: Box::new(right),
        }
      }
      None => leaf(counts),
    }
  }

  fn class_counts(&self, targets: &[usize], indices: &[usize]) -> Vec<usize> {
    let mut counts: Vec<usize> = vec![0; self.classes.len()];
    for &i in indices {
      counts[targets[i]] += 1;
    }
    counts
  }

  /// Find the best split
  /// Sweeps each feature in sorted order, moving one sample at a time to the left child
  fn find_best_split(
    &self,
    x: &Array2<f64>,
    targets: &[usize],
    indices: &[usize],
    counts: &[usize],
    parent_impurity: f64,
  ) -> Option<BestSplit> {
    let n: usize = indices.len();
    let min_leaf: usize = self.config.min_samples_leaf.max(1);
    let mut best_gain: f64 = 0.0;
    let mut best: Option<(usize, f64)> = None;
    let mut order: Vec<usize> = indices.to_vec();

    for feature_idx in 0..x.ncols() {
      let column: ArrayView1<f64> = x.column(feature_idx);
      order.sort_by(|&a, &b| column[a].partial_cmp(&column[b]).unwrap_or(Ordering::Equal));
      if column[order[n - 1]] <= column[order[0]] + FEATURE_THRESHOLD {
        continue;
      }

      let mut left_counts: Vec<usize> = vec![0; counts.len()];
      let mut right_counts: Vec<usize> = counts.to_vec();

      for pos in 0..n - 1 {
        let target: usize = targets[order[pos]];
        left_counts[target] += 1;
        right_counts[target] -= 1;

        let current: f64 = column[order[pos]];
        let next: f64 = column[order[pos + 1]];
        if next <= current + FEATURE_THRESHOLD {
          continue;
        }

        let n_left: usize = pos + 1;
        let n_right: usize = n - n_left;
        if n_left < min_leaf || n_right < min_leaf {
          continue;
        }

        let weighted: f64 = (n_left as f64 * gini(&left_counts, n_left)
          + n_right as f64 * gini(&right_counts, n_right))
          / n as f64;
        let gain: f64 = parent_impurity - weighted;
        if gain > best_gain {
          best_gain = gain;
          best = Some((feature_idx, current / 2.0 + next / 2.0));
        }
      }
    }

    let (feature_idx, threshold) = best?;
    let (left, right): (Vec<usize>, Vec<usize>) =
      indices.iter().partition(|&&i| x[[i, feature_idx]] <= threshold);
    debug!(feature_idx, threshold, gain = best_gain, left = left.len(), right = right.len(), "split");
    Some(BestSplit { feature_idx, threshold, left, right })
  }

  fn check_input(&self, x: &Array2<f64>) -> Result<&TreeNode> {
    let root: &TreeNode = self.root.as_ref().ok_or(PipelineError::NotFitted)?;
    if x.ncols() != self.n_features {
      return Err(PipelineError::DimensionMismatch { expected: self.n_features, found: x.ncols() });
    }
    Ok(root)
  }

  /// Predict the label of every row
  pub fn predict(&self, x: &Array2<f64>) -> Result<Vec<String>> {
    let root: &TreeNode = self.check_input(x)?;
    let predictions: Vec<String> = x
      .rows()
      .into_iter()
      .map(|sample| self.classes[root.leaf_for(sample).1].clone())
      .collect();
    Ok(predictions)
  }

  /// Predict class probabilities; columns follow `classes()`
  pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
    let root: &TreeNode = self.check_input(x)?;
    let mut proba: Array2<f64> = Array2::zeros((x.nrows(), self.classes.len()));
    for (row, sample) in x.rows().into_iter().enumerate() {
      let (class_counts, _) = root.leaf_for(sample);
      let total: f64 = class_counts.iter().sum::<usize>() as f64;
      for (col, &count) in class_counts.iter().enumerate() {
        proba[[row, col]] = count as f64 / total;
      }
    }
    Ok(proba)
  }
}

/// Majority class; ties go to the first class in sorted order
fn leaf(class_counts: Vec<usize>) -> TreeNode {
  let mut prediction: usize = 0;
  for (class, &count) in class_counts.iter().enumerate() {
    if count > class_counts[prediction] {
      prediction = class;
    }
  }
  TreeNode::Leaf { class_counts, prediction }
}

fn gini(counts: &[usize], n: usize) -> f64 {
  if n == 0 {
    return 0.0;
  }
  let n: f64 = n as f64;
  1.0 - counts.iter().map(|&c| (c as f64 / n).powi(2)).sum::<f64>()
}

/// Train Model
/// Fits a fresh tree on the training features and labels
pub fn train_rating_model(x_train: &Array2<f64>, y_train: &[String], config: TreeConfig) -> Result<DecisionTreeClassifier> {
  let mut model: DecisionTreeClassifier = DecisionTreeClassifier::new(config);
  model.fit(x_train, y_train)?;
  Ok(model)
}
