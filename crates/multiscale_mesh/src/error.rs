//! Crate error type.

use thiserror::Error;

/// Errors raised by mesh sources, codecs, and render layers.
///
/// Per-object draw and readiness loops never propagate these; they log and
/// treat the object as contributing nothing for the frame.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum MeshError {
  #[error("shader compilation failed: {0}")]
  ShaderCompile(String),

  #[error("malformed octree at row {row}: {reason}")]
  MalformedOctree { row: usize, reason: String },

  #[error("invalid fragment payload: {0}")]
  InvalidFragment(String),

  #[error("invalid manifest: {0}")]
  InvalidManifest(String),

  #[error("model transform unavailable: {0}")]
  TransformUnavailable(String),

  #[error("unknown chunk key `{0}`")]
  UnknownChunk(String),
}

pub type Result<T> = std::result::Result<T, MeshError>;
