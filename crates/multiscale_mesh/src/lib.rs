//! multiscale_mesh - Multi-resolution segmentation mesh streaming
//!
//! Renders per-object triangle meshes from a chunk cache that moves data
//! between system memory and the GPU. Two kinds of source are supported:
//!
//! - **Single-resolution meshes**: a manifest lists fragment ids; every
//!   resident fragment is drawn in full.
//! - **Multiscale meshes**: a manifest carries a sparse octree of chunks at
//!   several LODs. Each frame, a view-dependent traversal picks the coarsest
//!   level fine enough for the screen and draws sub-chunk ranges so that no
//!   region is covered twice, falling back to coarser data where finer
//!   fragments are not resident yet.
//!
//! The crate is engine independent: all GPU work goes through
//! [`GpuBackend`], and the cache is fed through a channel of
//! [`ChunkUpdate`]s so loaders can run on any thread.
//!
//! # Example
//!
//! ```ignore
//! use multiscale_mesh::*;
//!
//! let mut source = MultiscaleMeshSource::new(VertexPositionFormat::Uint10, true);
//! let updates = source.manifests().update_sender();
//! // ... loader threads send ChunkUpdate::Loaded / MoveToGpu ...
//!
//! let mut layer = MultiscaleMeshLayer::new(source, display, LayerConfig::default());
//! layer.set_visible_segments([ObjectId(42)]);
//!
//! // Per frame:
//! layer.poll_updates(gl);
//! let stats = layer.draw(gl, &mut ctx);
//! ```

pub mod chunk;
pub mod codec;
pub mod config;
pub mod error;
pub mod gpu;
pub mod growable;
pub mod octree;
pub mod render;
pub mod shader;
pub mod source;
pub mod types;

#[cfg(test)]
pub mod test_utils;

pub use chunk::{
  Chunk, ChunkSource, ChunkState, ChunkUpdate, FragmentChunk, FragmentData, GpuResident, Indices,
  ManifestChunk, ManifestPayload, MultiscaleManifestChunk,
};
pub use codec::{VertexPositionFormat, VertexPositions};
pub use config::LayerConfig;
pub use error::{MeshError, Result};
pub use gpu::{GpuBackend, HeadlessBackend, UniformValue};
pub use octree::{
  desired_chunks, select_chunks_to_draw, Aabb, ClipPlanes, DrawRange, MultiscaleManifest, NodeRef,
  SelectionStats, ViewParams,
};
pub use render::{
  AnyMeshLayer, DisplayState, FrameStats, MeshLayer, ModelTransform, MultiscaleMeshLayer,
  RenderContext, RenderScaleHistogram, ScaleCount,
};
pub use shader::{ShaderCache, ShaderKey};
pub use source::{FragmentSource, MeshSource, MultiscaleMeshSource, SourceId};
pub use types::ObjectId;
