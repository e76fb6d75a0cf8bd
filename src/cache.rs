use serde::de::DeserializeOwned;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use crate::error::Result;

/// Cache Key
/// Content fingerprint of everything an artifact was computed from
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
  pub fn as_str(&self) -> &str {
    &self.0
  }
}

/// Incrementally hashes the inputs of an artifact; fields are length-prefixed
/// so adjacent values cannot run together
pub struct Fingerprint {
  hasher: Sha256,
}

impl Default for Fingerprint {
  fn default() -> Self {
    Self::new()
  }
}

impl Fingerprint {
  pub fn new() -> Self {
    Self { hasher: Sha256::new() }
  }

  pub fn text(mut self, value: &str) -> Self {
    self.hasher.update((value.len() as u64).to_le_bytes());
    self.hasher.update(value.as_bytes());
    self
  }

  pub fn number(mut self, value: u64) -> Self {
    self.hasher.update(value.to_le_bytes());
    self
  }

  pub fn float(self, value: f64) -> Self {
    self.number(value.to_bits())
  }

  pub fn key(self, value: &CacheKey) -> Self {
    self.text(value.as_str())
  }

  pub fn strings<S: AsRef<str>>(self, values: &[S]) -> Self {
    values.iter().fold(self.number(values.len() as u64), |fp, v| fp.text(v.as_ref()))
  }

  pub fn finish(self) -> CacheKey {
    let digest = self.hasher.finalize();
    let hex: String = digest.iter().take(8).map(|byte| format!("{:02x}", byte)).collect();
    CacheKey(hex)
  }
}

/// Artifact Cache
/// Bincode files under one directory, one per (tag, name, key)
#[derive(Debug, Clone)]
pub struct ArtifactCache {
  dir: PathBuf,
  enabled: bool,
}

impl ArtifactCache {
  pub fn new(dir: impl AsRef<Path>, enabled: bool) -> Self {
    Self { dir: dir.as_ref().to_path_buf(), enabled }
  }

  pub fn disabled() -> Self {
    Self { dir: PathBuf::new(), enabled: false }
  }

  pub fn is_enabled(&self) -> bool {
    self.enabled
  }

  /// `<dir>/<op_tag><name>-<key>.bin`
  pub fn path_for(&self, op_tag: &str, name: &str, key: &CacheKey) -> PathBuf {
    self.dir.join(format!("{}{}-{}.bin", op_tag, name, key.as_str()))
  }

  /// Load Or Compute
  /// Returns the cached artifact when its file exists, otherwise computes and stores it
  pub fn load_or_compute<T, F>(&self, op_tag: &str, name: &str, key: &CacheKey, compute: F) -> Result<T>
  where
    T: Serialize + DeserializeOwned,
    F: FnOnce() -> Result<T>,
  {
    if !self.enabled {
      return compute();
    }

    let path: PathBuf = self.path_for(op_tag, name, key);
    if path.exists() {
      let value: T = self.read(&path)?;
      info!(artifact = name, tag = op_tag, path = %path.display(), "loaded from cache");
      return Ok(value);
    }

    let value: T = compute()?;
    self.write(&path, &value)?;
    info!(artifact = name, tag = op_tag, path = %path.display(), "created cache entry");
    Ok(value)
  }

  fn read<T: DeserializeOwned>(&self, path: &Path) -> Result<T> {
    let reader: BufReader<File> = BufReader::new(File::open(path)?);
    Ok(bincode::deserialize_from(reader)?)
  }

  /// Writes beside the target then renames, so a crash never leaves a truncated entry
  fn write<T: Serialize>(&self, path: &Path, value: &T) -> Result<()> {
    fs::create_dir_all(&self.dir)?;
    let tmp: PathBuf = path.with_extension("bin.tmp");
    {
      let mut writer: BufWriter<File> = BufWriter::new(File::create(&tmp)?);
      bincode::serialize_into(&mut writer, value)?;
      std::io::Write::flush(&mut writer)?;
    }
    fs::rename(&tmp, path)?;
    debug!(path = %path.display(), "cache entry written");
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::cell::Cell;
  use tempfile::TempDir;

  #[test]
  fn fingerprints_are_stable_and_input_sensitive() {
    let a = Fingerprint::new().text("reviews").number(1000).finish();
    let b = Fingerprint::new().text("reviews").number(1000).finish();
    let c = Fingerprint::new().text("reviews").number(1001).finish();
    assert_eq!(a, b);
    assert_ne!(a, c);
    assert_eq!(a.as_str().len(), 16);
    assert!(a.as_str().chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
  }

  #[test]
  fn fields_do_not_run_together() {
    let a = Fingerprint::new().strings(&["ab", "c"]).finish();
    let b = Fingerprint::new().strings(&["a", "bc"]).finish();
    assert_ne!(a, b);
  }

  #[test]
  fn computes_once_then_loads() {
    let dir = TempDir::new().unwrap();
    let cache = ArtifactCache::new(dir.path().join("resources"), true);
    let key = Fingerprint::new().text("k").finish();
    let calls = Cell::new(0);

    let compute = || {
      calls.set(calls.get() + 1);
      Ok(vec!["love".to_string(), "crib".to_string()])
    };
    let first: Vec<String> = cache.load_or_compute("test", "datalist", &key, compute).unwrap();
    let second: Vec<String> = cache
      .load_or_compute("test", "datalist", &key, || -> Result<Vec<String>> { panic!("should hit cache") })
      .unwrap();

    assert_eq!(first, second);
    assert_eq!(calls.get(), 1);
    assert!(cache.path_for("test", "datalist", &key).exists());
  }

  #[test]
  fn new_key_misses_the_cache() {
    let dir = TempDir::new().unwrap();
    let cache = ArtifactCache::new(dir.path(), true);
    let old = Fingerprint::new().number(1).finish();
    let new = Fingerprint::new().number(2).finish();

    let _: u64 = cache.load_or_compute("", "vocabulary", &old, || Ok(1)).unwrap();
    let value: u64 = cache.load_or_compute("", "vocabulary", &new, || Ok(2)).unwrap();
    assert_eq!(value, 2);
  }

  #[test]
  fn disabled_cache_always_computes() {
    let cache = ArtifactCache::disabled();
    let key = Fingerprint::new().finish();
    let value: u32 = cache.load_or_compute("", "model", &key, || Ok(7)).unwrap();
    assert_eq!(value, 7);
  }
}
