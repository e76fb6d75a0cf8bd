use rust_stemmers::{Algorithm, Stemmer};
use serde::{Deserialize, Serialize};
use tokenizers::pre_tokenizers::bert::BertPreTokenizer;
use tokenizers::{OffsetReferential, OffsetType, PreTokenizedString, PreTokenizer};

use std::collections::HashSet;

use crate::error::{PipelineError, Result};
use crate::preprocessing::Cell;
use crate::stopwords;

/// Cell Policy
/// How the text cells of one row combine into a normalized review
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CellPolicy {
  /// Each text cell replaces the previous one; the last text cell of the row wins
  #[default]
  LastTextCell,
  /// All text cells accumulate into one string, deduplicated across the whole row
  AllTextCells,
}

/// Text Normalizer
/// Lowercases, tokenizes, stems, drops stopwords and deduplicates review text
pub struct TextNormalizer {
  stemmer: Stemmer,
  stopwords: HashSet<&'static str>,
  policy: CellPolicy,
}

impl TextNormalizer {
  pub fn new(policy: CellPolicy) -> Self {
    Self {
      stemmer: Stemmer::create(Algorithm::English),
      stopwords: stopwords::english_set(),
      policy,
    }
  }

  pub fn policy(&self) -> CellPolicy {
    self.policy
  }

  /// Splits lowercased text on whitespace and punctuation
  fn tokenize(&self, text: &str) -> Result<Vec<String>> {
    let mut pretokenized: PreTokenizedString = PreTokenizedString::from(text.to_lowercase());
    BertPreTokenizer
      .pre_tokenize(&mut pretokenized)
      .map_err(|e| PipelineError::Tokenizer(e.to_string()))?;
    let tokens: Vec<String> = pretokenized
      .get_splits(OffsetReferential::Original, OffsetType::Byte)
      .into_iter()
      .map(|(token, _, _)| token.to_string())
      .collect();
    Ok(tokens)
  }

  /// Normalizes one text cell into its stemmed, stopword-free word list (duplicates kept)
  pub fn cell_words(&self, text: &str) -> Result<Vec<String>> {
    let words: Vec<String> = self
      .tokenize(text)?
      .into_iter()
      .filter(|word| !word.is_empty() && word.chars().all(char::is_alphabetic))
      .map(|word| self.stemmer.stem(&word).into_owned())
      .filter(|word| !self.stopwords.contains(word.as_str()))
      .collect();
    Ok(words)
  }

  /// Normalizes one raw row into a single space-joined string
  pub fn normalize_row(&self, row: &[Cell]) -> Result<String> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut kept: Vec<String> = Vec::new();

    for text in row.iter().filter_map(Cell::as_text) {
      if self.policy == CellPolicy::LastTextCell {
        seen.clear();
        kept.clear();
      }
      for word in self.cell_words(text)? {
        if seen.insert(word.clone()) {
          kept.push(word);
        }
      }
    }

    Ok(kept.join(" "))
  }

  /// Normalizes every row; output is parallel to the input
  pub fn normalize_all(&self, rows: &[Vec<Cell>]) -> Result<Vec<String>> {
    rows.iter().map(|row| self.normalize_row(row)).collect()
  }
}
