//! Identifiers and cache keys shared by the mesh sources and render layers.

use std::fmt;

/// 64-bit segmented object identifier.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct ObjectId(pub u64);

impl ObjectId {
  /// Opaque cache key of this object's manifest chunk.
  pub fn key(&self) -> String {
    self.0.to_string()
  }
}

impl fmt::Display for ObjectId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.0)
  }
}

impl From<u64> for ObjectId {
  fn from(value: u64) -> Self {
    Self(value)
  }
}

/// Key of a single-resolution fragment: `<objectKey>/<fragmentId>`.
pub fn fragment_key(object_key: &str, fragment_id: &str) -> String {
  format!("{object_key}/{fragment_id}")
}

/// Key of a multiscale fragment: `<objectKey>/<lod>/<chunkIndex>`.
pub fn multiscale_fragment_key(object_key: &str, lod: u32, chunk_index: u32) -> String {
  format!("{object_key}/{lod}/{chunk_index}")
}

/// Object key prefix of a fragment key (everything before the first `/`).
pub fn object_key_of(fragment_key: &str) -> &str {
  fragment_key
    .split_once('/')
    .map_or(fragment_key, |(object, _)| object)
}

#[cfg(test)]
#[path = "types_test.rs"]
mod types_test;
