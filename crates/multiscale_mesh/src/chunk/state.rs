//! Cache-managed chunk residency states.

/// Residency of one chunk.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
pub enum ChunkState {
  /// Not yet delivered by the cache.
  #[default]
  NotLoaded,
  /// Decoded payload held in host memory.
  SystemMemory,
  /// GPU buffers uploaded and valid for drawing.
  GpuMemory,
  /// Reclaimed by the cache; the chunk is about to be dropped.
  Evicted,
}

impl ChunkState {
  /// Decoded data is available on the CPU.
  #[inline]
  pub fn is_resident(&self) -> bool {
    matches!(self, ChunkState::SystemMemory | ChunkState::GpuMemory)
  }
}
