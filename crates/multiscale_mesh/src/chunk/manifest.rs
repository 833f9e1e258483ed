//! Manifest chunks: per-object metadata with no GPU data of their own.

use crate::chunk::{Chunk, ChunkState, GpuResident};
use crate::error::Result;
use crate::gpu::GpuBackend;
use crate::octree::MultiscaleManifest;

/// Decoded single-resolution manifest.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
#[cfg_attr(
  feature = "serde",
  derive(serde::Serialize, serde::Deserialize),
  serde(rename_all = "camelCase")
)]
pub struct ManifestPayload {
  pub fragment_ids: Vec<String>,
}

/// Ordered fragment ids of one object.
#[derive(Debug)]
pub struct ManifestChunk {
  fragment_ids: Vec<String>,
  state: ChunkState,
}

impl ManifestChunk {
  pub fn new(fragment_ids: Vec<String>) -> Self {
    Self {
      fragment_ids,
      state: ChunkState::SystemMemory,
    }
  }

  #[inline]
  pub fn fragment_ids(&self) -> &[String] {
    &self.fragment_ids
  }
}

impl GpuResident for ManifestChunk {
  fn state(&self) -> ChunkState {
    self.state
  }

  fn copy_to_gpu(&mut self, _gl: &mut dyn GpuBackend) {
    self.state = ChunkState::GpuMemory;
  }

  fn free_gpu_memory(&mut self, _gl: &mut dyn GpuBackend) {
    if self.state == ChunkState::GpuMemory {
      self.state = ChunkState::SystemMemory;
    }
  }

  fn mark_evicted(&mut self) {
    self.state = ChunkState::Evicted;
  }
}

impl Chunk for ManifestChunk {
  type Payload = ManifestPayload;

  fn from_payload(payload: ManifestPayload) -> Result<Self> {
    Ok(Self::new(payload.fragment_ids))
  }
}

/// Octree manifest of one object.
#[derive(Debug)]
pub struct MultiscaleManifestChunk {
  manifest: MultiscaleManifest,
  state: ChunkState,
}

impl MultiscaleManifestChunk {
  pub fn new(manifest: MultiscaleManifest) -> Result<Self> {
    manifest.check_shape()?;
    Ok(Self {
      manifest,
      state: ChunkState::SystemMemory,
    })
  }

  #[inline]
  pub fn manifest(&self) -> &MultiscaleManifest {
    &self.manifest
  }
}

impl GpuResident for MultiscaleManifestChunk {
  fn state(&self) -> ChunkState {
    self.state
  }

  fn copy_to_gpu(&mut self, _gl: &mut dyn GpuBackend) {
    self.state = ChunkState::GpuMemory;
  }

  fn free_gpu_memory(&mut self, _gl: &mut dyn GpuBackend) {
    if self.state == ChunkState::GpuMemory {
      self.state = ChunkState::SystemMemory;
    }
  }

  fn mark_evicted(&mut self) {
    self.state = ChunkState::Evicted;
  }
}

impl Chunk for MultiscaleManifestChunk {
  type Payload = MultiscaleManifest;

  fn from_payload(payload: MultiscaleManifest) -> Result<Self> {
    Self::new(payload)
  }
}
