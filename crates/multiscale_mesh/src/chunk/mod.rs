//! Chunk residency: the boundary between the external chunk cache and the
//! render thread.
//!
//! The cache decodes payloads and decides residency on its own threads. It
//! reports every transition as a [`ChunkUpdate`] message; the render thread
//! applies queued updates with [`ChunkSource::poll_updates`] at the start of
//! each frame. Uploads and releases therefore happen in one synchronous step
//! on the render thread, and a chunk is never observed half-uploaded.
//!
//! ```text
//!   NotLoaded ──Loaded──▶ SystemMemory ──MoveToGpu──▶ GpuMemory
//!                              ▲                          │
//!                              └───────MoveToSystem───────┘
//!   any ──Evict──▶ Evicted (GPU buffers released first, entry removed)
//! ```

pub mod fragment;
pub mod manifest;
pub mod state;

use std::collections::HashMap;

use crossbeam_channel::{Receiver, Sender};
use tracing::{debug, warn};

use crate::error::{MeshError, Result};
use crate::gpu::GpuBackend;

pub use fragment::{FragmentBuffers, FragmentChunk, FragmentData, Indices};
pub use manifest::{ManifestChunk, ManifestPayload, MultiscaleManifestChunk};
pub use state::ChunkState;

/// Capability shared by every chunk kind that can be promoted to the GPU.
pub trait GpuResident {
  fn state(&self) -> ChunkState;

  /// Upload GPU data and enter `GpuMemory`. Called only from `SystemMemory`.
  fn copy_to_gpu(&mut self, gl: &mut dyn GpuBackend);

  /// Release all GPU data and return to `SystemMemory`.
  /// Must be a no-op when nothing is uploaded.
  fn free_gpu_memory(&mut self, gl: &mut dyn GpuBackend);

  /// Final transition before the cache drops the chunk.
  fn mark_evicted(&mut self);

  /// Bytes currently held in GPU buffers.
  fn gpu_memory_bytes(&self) -> usize {
    0
  }
}

/// A chunk the cache can construct from a decoded payload.
pub trait Chunk: GpuResident + Sized {
  type Payload: Send + 'static;

  /// Build the chunk from decoded bytes, entering `SystemMemory`.
  fn from_payload(payload: Self::Payload) -> Result<Self>;
}

/// Residency transition reported by the cache.
#[derive(Debug)]
pub enum ChunkUpdate<P> {
  /// Payload decoded: NotLoaded → SystemMemory.
  Loaded { key: String, payload: P },
  /// SystemMemory → GpuMemory.
  MoveToGpu { key: String },
  /// GpuMemory → SystemMemory.
  MoveToSystem { key: String },
  /// Any state → Evicted; the entry is removed.
  Evict { key: String },
}

impl<P> ChunkUpdate<P> {
  pub fn key(&self) -> &str {
    match self {
      ChunkUpdate::Loaded { key, .. }
      | ChunkUpdate::MoveToGpu { key }
      | ChunkUpdate::MoveToSystem { key }
      | ChunkUpdate::Evict { key } => key,
    }
  }
}

/// Key → chunk mapping owned on behalf of the cache.
///
/// The render layers only read it; mutation happens through queued
/// [`ChunkUpdate`]s and interest reference counts.
pub struct ChunkSource<C: Chunk> {
  chunks: HashMap<String, C>,
  interest: HashMap<String, usize>,
  sender: Sender<ChunkUpdate<C::Payload>>,
  receiver: Receiver<ChunkUpdate<C::Payload>>,
}

impl<C: Chunk> Default for ChunkSource<C> {
  fn default() -> Self {
    Self::new()
  }
}

impl<C: Chunk> ChunkSource<C> {
  pub fn new() -> Self {
    let (sender, receiver) = crossbeam_channel::unbounded();
    Self {
      chunks: HashMap::new(),
      interest: HashMap::new(),
      sender,
      receiver,
    }
  }

  /// Handle for cache threads to report transitions.
  pub fn update_sender(&self) -> Sender<ChunkUpdate<C::Payload>> {
    self.sender.clone()
  }

  #[inline]
  pub fn get(&self, key: &str) -> Option<&C> {
    self.chunks.get(key)
  }

  /// Current state of `key`; absent keys are `NotLoaded`.
  pub fn state_of(&self, key: &str) -> ChunkState {
    self
      .chunks
      .get(key)
      .map_or(ChunkState::NotLoaded, GpuResident::state)
  }

  pub fn len(&self) -> usize {
    self.chunks.len()
  }

  pub fn is_empty(&self) -> bool {
    self.chunks.is_empty()
  }

  pub fn keys(&self) -> impl Iterator<Item = &str> {
    self.chunks.keys().map(String::as_str)
  }

  pub fn iter(&self) -> impl Iterator<Item = (&str, &C)> {
    self.chunks.iter().map(|(key, chunk)| (key.as_str(), chunk))
  }

  /// Apply every queued update. Returns the number of updates consumed.
  ///
  /// Rejected updates are logged and skipped; one bad payload never blocks
  /// the rest of the queue.
  pub fn poll_updates(&mut self, gl: &mut dyn GpuBackend) -> usize {
    let mut applied = 0;
    while let Ok(update) = self.receiver.try_recv() {
      applied += 1;
      let key = update.key().to_owned();
      if let Err(error) = self.apply(gl, update) {
        match error {
          MeshError::UnknownChunk(_) => debug!(%key, "update for unknown chunk ignored"),
          error => warn!(%key, %error, "chunk update rejected"),
        }
      }
    }
    applied
  }

  /// Apply one transition synchronously.
  pub fn apply(&mut self, gl: &mut dyn GpuBackend, update: ChunkUpdate<C::Payload>) -> Result<()> {
    match update {
      ChunkUpdate::Loaded { key, payload } => {
        let chunk = C::from_payload(payload)?;
        if let Some(mut previous) = self.chunks.insert(key, chunk) {
          previous.free_gpu_memory(gl);
          previous.mark_evicted();
        }
      }
      ChunkUpdate::MoveToGpu { key } => {
        let chunk = self
          .chunks
          .get_mut(&key)
          .ok_or_else(|| MeshError::UnknownChunk(key.clone()))?;
        match chunk.state() {
          ChunkState::SystemMemory => chunk.copy_to_gpu(gl),
          ChunkState::GpuMemory => {}
          state => debug!(%key, ?state, "cannot move chunk to GPU from this state"),
        }
      }
      ChunkUpdate::MoveToSystem { key } => {
        let chunk = self
          .chunks
          .get_mut(&key)
          .ok_or_else(|| MeshError::UnknownChunk(key.clone()))?;
        if chunk.state() == ChunkState::GpuMemory {
          chunk.free_gpu_memory(gl);
        }
      }
      ChunkUpdate::Evict { key } => {
        let mut chunk = self
          .chunks
          .remove(&key)
          .ok_or_else(|| MeshError::UnknownChunk(key.clone()))?;
        chunk.free_gpu_memory(gl);
        chunk.mark_evicted();
      }
    }
    Ok(())
  }

  /// Register interest in `key`. Returns the new count.
  pub fn retain(&mut self, key: &str) -> usize {
    let count = self.interest.entry(key.to_owned()).or_insert(0);
    *count += 1;
    *count
  }

  /// Drop one unit of interest in `key`. Returns the remaining count.
  pub fn release(&mut self, key: &str) -> usize {
    match self.interest.get_mut(key) {
      Some(count) if *count > 1 => {
        *count -= 1;
        *count
      }
      Some(_) => {
        self.interest.remove(key);
        0
      }
      None => 0,
    }
  }

  pub fn interest(&self, key: &str) -> usize {
    self.interest.get(key).copied().unwrap_or(0)
  }

  /// Loaded keys nobody has expressed interest in.
  pub fn reclaimable_keys(&self) -> Vec<String> {
    let mut keys: Vec<String> = self
      .chunks
      .keys()
      .filter(|key| !self.interest.contains_key(*key))
      .cloned()
      .collect();
    keys.sort();
    keys
  }

  /// Return every chunk to `SystemMemory`, releasing all GPU data.
  pub fn free_all_gpu_memory(&mut self, gl: &mut dyn GpuBackend) {
    for chunk in self.chunks.values_mut() {
      chunk.free_gpu_memory(gl);
    }
  }

  pub fn gpu_memory_bytes(&self) -> usize {
    self.chunks.values().map(GpuResident::gpu_memory_bytes).sum()
  }
}
