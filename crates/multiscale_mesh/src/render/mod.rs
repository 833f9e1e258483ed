//! Render layers: per-frame drivers for single-resolution and multiscale
//! meshes.
//!
//! A frame looks like:
//!
//! ```text
//! layer.poll_updates(gl)      // apply cache transitions (uploads, releases)
//! layer.draw(gl, &mut ctx)    // select, bind, draw
//! layer.is_ready(&ctx)        // everything wanted is on the GPU
//! ```
//!
//! Errors never escape the per-object loops; an object that cannot be drawn
//! this frame simply contributes nothing and is retried next frame.

pub mod context;
pub mod histogram;
pub mod mesh_layer;
pub mod multiscale_layer;

use glam::Vec3;

use crate::gpu::GpuBackend;
use crate::types::ObjectId;

pub use context::{DisplayState, ModelTransform, RenderContext};
pub use histogram::{RenderScaleHistogram, ScaleCount, INFINITE_BUCKET};
pub use mesh_layer::MeshLayer;
pub use multiscale_layer::MultiscaleMeshLayer;

/// Counters for one `draw` call.
#[derive(Clone, Copy, Default, PartialEq, Eq, Debug)]
pub struct FrameStats {
  /// Visible objects with a manifest.
  pub objects_drawn: u32,
  /// Visible objects whose manifest is not loaded.
  pub manifests_missing: u32,
  /// Wanted fragments found on the GPU.
  pub fragments_present: u32,
  /// Wanted fragments not on the GPU.
  pub fragments_missing: u32,
  pub draw_calls: u32,
  pub draw_time_us: u64,
}

/// Either kind of mesh layer.
pub enum AnyMeshLayer {
  Single(MeshLayer),
  Multiscale(MultiscaleMeshLayer),
}

impl AnyMeshLayer {
  pub fn draw(&mut self, gl: &mut dyn GpuBackend, ctx: &mut RenderContext) -> FrameStats {
    match self {
      AnyMeshLayer::Single(layer) => layer.draw(gl, ctx),
      AnyMeshLayer::Multiscale(layer) => layer.draw(gl, ctx),
    }
  }

  pub fn is_ready(&self, ctx: &RenderContext) -> bool {
    match self {
      AnyMeshLayer::Single(layer) => layer.is_ready(),
      AnyMeshLayer::Multiscale(layer) => layer.is_ready(ctx),
    }
  }

  /// Layer-space position for `object`. Single-resolution meshes snap to the
  /// resident vertex nearest `nearest_to`; multiscale meshes report their
  /// bounds center.
  pub fn object_position(&self, object: ObjectId, nearest_to: Vec3) -> Option<Vec3> {
    match self {
      AnyMeshLayer::Single(layer) => layer.object_position(object, nearest_to),
      AnyMeshLayer::Multiscale(layer) => layer.object_position(object),
    }
  }

  pub fn poll_updates(&mut self, gl: &mut dyn GpuBackend) -> usize {
    match self {
      AnyMeshLayer::Single(layer) => layer.poll_updates(gl),
      AnyMeshLayer::Multiscale(layer) => layer.poll_updates(gl),
    }
  }

  pub fn set_visible_segments<I>(&mut self, objects: I)
  where
    I: IntoIterator<Item = ObjectId>,
  {
    match self {
      AnyMeshLayer::Single(layer) => layer.set_visible_segments(objects),
      AnyMeshLayer::Multiscale(layer) => layer.set_visible_segments(objects),
    }
  }

  pub fn dispose(&mut self, gl: &mut dyn GpuBackend) {
    match self {
      AnyMeshLayer::Single(layer) => layer.dispose(gl),
      AnyMeshLayer::Multiscale(layer) => layer.dispose(gl),
    }
  }

  pub fn display(&self) -> &DisplayState {
    match self {
      AnyMeshLayer::Single(layer) => layer.display(),
      AnyMeshLayer::Multiscale(layer) => layer.display(),
    }
  }

  pub fn display_mut(&mut self) -> &mut DisplayState {
    match self {
      AnyMeshLayer::Single(layer) => layer.display_mut(),
      AnyMeshLayer::Multiscale(layer) => layer.display_mut(),
    }
  }

  pub fn histogram(&self) -> &RenderScaleHistogram {
    match self {
      AnyMeshLayer::Single(layer) => layer.histogram(),
      AnyMeshLayer::Multiscale(layer) => layer.histogram(),
    }
  }
}

impl From<MeshLayer> for AnyMeshLayer {
  fn from(layer: MeshLayer) -> Self {
    AnyMeshLayer::Single(layer)
  }
}

impl From<MultiscaleMeshLayer> for AnyMeshLayer {
  fn from(layer: MultiscaleMeshLayer) -> Self {
    AnyMeshLayer::Multiscale(layer)
  }
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod mod_test;
