//! Multiscale octree: manifest layout, culling, and LOD selection.
//!
//! # LOD Convention
//!
//! LOD 0 = finest detail (smallest chunks), higher LOD = coarser.
//!
//! ```text
//! Chunk Size = chunk_shape * 2^LOD
//! ```
//!
//! # Module Structure
//!
//! - [`manifest`]: `MultiscaleManifest` - flat octree rows plus per-LOD metadata
//! - [`bounds`]: `Aabb` - node boxes clipped to the manifest bounds
//! - [`frustum`]: `ClipPlanes` - frustum planes from a clip-space matrix
//! - [`selection`]: `select_chunks_to_draw` - view-dependent refinement

pub mod bounds;
pub mod frustum;
pub mod manifest;
pub mod selection;

// Re-exports
pub use bounds::Aabb;
pub use frustum::ClipPlanes;
pub use manifest::{MultiscaleManifest, OctreeRow, EMPTY_BIT, ROW_STRIDE};
pub use selection::{
  desired_chunks, select_chunks_to_draw, DrawRange, NodeRef, SelectionStats, ViewParams,
};
