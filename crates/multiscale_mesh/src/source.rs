//! Mesh sources: manifest chunks keyed by object, fragment chunks keyed by
//! fragment.
//!
//! A mesh source owns its [`FragmentSource`]. The fragment source only
//! records the id of its owner; key derivation goes through the owning
//! source, never through a shared handle.

use std::sync::atomic::{AtomicU64, Ordering};

use crossbeam_channel::Sender;

use crate::chunk::{
  Chunk, ChunkSource, ChunkUpdate, FragmentChunk, FragmentData, ManifestChunk,
  MultiscaleManifestChunk,
};
use crate::codec::VertexPositionFormat;
use crate::gpu::GpuBackend;
use crate::octree::NodeRef;
use crate::types::{fragment_key, multiscale_fragment_key, object_key_of, ObjectId};

// =============================================================================
// SourceId - unique identifier
// =============================================================================

static SOURCE_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Opaque mesh source identifier, unique within the process.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct SourceId(u64);

impl SourceId {
  pub fn new() -> Self {
    Self(SOURCE_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
  }

  pub fn raw(&self) -> u64 {
    self.0
  }
}

impl Default for SourceId {
  fn default() -> Self {
    Self::new()
  }
}

// =============================================================================
// FragmentSource
// =============================================================================

/// Fragment chunks of one mesh source, keyed by fragment key.
pub struct FragmentSource {
  owner: SourceId,
  chunks: ChunkSource<FragmentChunk>,
}

impl FragmentSource {
  fn new(owner: SourceId) -> Self {
    Self {
      owner,
      chunks: ChunkSource::new(),
    }
  }

  /// Id of the mesh source this fragment source belongs to.
  #[inline]
  pub fn owner(&self) -> SourceId {
    self.owner
  }

  #[inline]
  pub fn chunks(&self) -> &ChunkSource<FragmentChunk> {
    &self.chunks
  }

  #[inline]
  pub fn chunks_mut(&mut self) -> &mut ChunkSource<FragmentChunk> {
    &mut self.chunks
  }

  #[inline]
  pub fn get(&self, key: &str) -> Option<&FragmentChunk> {
    self.chunks.get(key)
  }

  pub fn update_sender(&self) -> Sender<ChunkUpdate<FragmentData>> {
    self.chunks.update_sender()
  }

  /// Bytes held by live fragment buffers.
  pub fn gpu_memory_bytes(&self) -> usize {
    self.chunks.gpu_memory_bytes()
  }
}

// =============================================================================
// Mesh sources
// =============================================================================

/// Manifest chunks plus the fragment source they reference.
///
/// Use through [`MeshSource`] or [`MultiscaleMeshSource`].
pub struct ObjectMeshSource<M: Chunk> {
  id: SourceId,
  vertex_format: VertexPositionFormat,
  fragment_relative_vertices: bool,
  manifests: ChunkSource<M>,
  fragments: FragmentSource,
}

/// Single-resolution meshes: manifests list fragment ids.
pub type MeshSource = ObjectMeshSource<ManifestChunk>;

/// Multiscale meshes: manifests carry an octree.
pub type MultiscaleMeshSource = ObjectMeshSource<MultiscaleManifestChunk>;

impl<M: Chunk> ObjectMeshSource<M> {
  fn with_format(vertex_format: VertexPositionFormat, fragment_relative_vertices: bool) -> Self {
    let id = SourceId::new();
    Self {
      id,
      vertex_format,
      fragment_relative_vertices,
      manifests: ChunkSource::new(),
      fragments: FragmentSource::new(id),
    }
  }

  #[inline]
  pub fn id(&self) -> SourceId {
    self.id
  }

  #[inline]
  pub fn vertex_format(&self) -> VertexPositionFormat {
    self.vertex_format
  }

  /// Fragment positions are local to their chunk and need per-fragment
  /// origin and shape uniforms.
  #[inline]
  pub fn fragment_relative_vertices(&self) -> bool {
    self.fragment_relative_vertices
  }

  #[inline]
  pub fn manifests(&self) -> &ChunkSource<M> {
    &self.manifests
  }

  #[inline]
  pub fn manifests_mut(&mut self) -> &mut ChunkSource<M> {
    &mut self.manifests
  }

  #[inline]
  pub fn fragments(&self) -> &FragmentSource {
    &self.fragments
  }

  #[inline]
  pub fn fragments_mut(&mut self) -> &mut FragmentSource {
    &mut self.fragments
  }

  /// True when `fragments` is this source's own fragment source.
  #[inline]
  pub fn owns(&self, fragments: &FragmentSource) -> bool {
    fragments.owner == self.id
  }

  #[inline]
  pub fn manifest(&self, object: ObjectId) -> Option<&M> {
    self.manifests.get(&object.key())
  }

  /// Apply queued manifest and fragment updates.
  pub fn poll_updates(&mut self, gl: &mut dyn GpuBackend) -> usize {
    self.manifests.poll_updates(gl) + self.fragments.chunks.poll_updates(gl)
  }

  pub fn retain_object(&mut self, object: ObjectId) -> usize {
    self.manifests.retain(&object.key())
  }

  pub fn release_object(&mut self, object: ObjectId) -> usize {
    self.manifests.release(&object.key())
  }

  /// Loaded fragment keys whose object nobody is interested in.
  pub fn reclaimable_fragment_keys(&self) -> Vec<String> {
    let mut keys: Vec<String> = self
      .fragments
      .chunks
      .keys()
      .filter(|key| self.manifests.interest(object_key_of(key)) == 0)
      .map(str::to_owned)
      .collect();
    keys.sort();
    keys
  }

  /// Return every fragment to system memory.
  pub fn free_all_gpu_memory(&mut self, gl: &mut dyn GpuBackend) {
    self.fragments.chunks.free_all_gpu_memory(gl);
  }
}

impl MeshSource {
  pub fn new(vertex_format: VertexPositionFormat) -> Self {
    Self::with_format(vertex_format, false)
  }

  pub fn fragment(&self, object: ObjectId, fragment_id: &str) -> Option<&FragmentChunk> {
    self.fragments.get(&fragment_key(&object.key(), fragment_id))
  }

  /// Keys of every fragment listed by the object's manifest.
  pub fn fragment_keys(&self, object: ObjectId) -> Vec<String> {
    let object_key = object.key();
    self.manifests.get(&object_key).map_or_else(Vec::new, |manifest| {
      manifest
        .fragment_ids()
        .iter()
        .map(|id| fragment_key(&object_key, id))
        .collect()
    })
  }
}

impl MultiscaleMeshSource {
  pub fn new(vertex_format: VertexPositionFormat, fragment_relative_vertices: bool) -> Self {
    Self::with_format(vertex_format, fragment_relative_vertices)
  }

  pub fn fragment(&self, object: ObjectId, node: NodeRef) -> Option<&FragmentChunk> {
    self.fragments.get(&Self::fragment_key(object, node))
  }

  pub fn fragment_key(object: ObjectId, node: NodeRef) -> String {
    multiscale_fragment_key(&object.key(), node.lod, node.row)
  }
}

#[cfg(test)]
#[path = "source_test.rs"]
mod source_test;
