//! View-dependent octree LOD selection.
//!
//! Depth-first traversal from the root. A node is refined when it has
//! children and its projected voxel size exceeds the detail budget;
//! otherwise it is drawn whole. A refined node stays "open" while its
//! children are visited: every child that turns out to be resident claims
//! one octant of the nearest open ancestor, and after the children return
//! the ancestor draws only its unclaimed sub-chunks. Missing children are
//! therefore covered by coarser geometry, and no region is drawn twice.
//!
//! Children are visited in row order and nodes are emitted post-order, so
//! the output is a pure function of the manifest, the view, and residency.

use glam::{Mat4, Vec3};
use smallvec::SmallVec;

use super::bounds::Aabb;
use super::frustum::ClipPlanes;
use super::manifest::MultiscaleManifest;
use crate::chunk::fragment::SUB_CHUNK_COUNT;

/// Smallest clip-space w used for the pixel size estimate.
const MIN_CLIP_W: f32 = 1e-6;

/// One octree node, addressed by LOD and octree row.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct NodeRef {
  pub lod: u32,
  pub row: u32,
}

/// A draw of sub-chunks `sub_chunk_begin..sub_chunk_end` of one node.
#[derive(Clone, Copy, PartialEq, Debug)]
pub struct DrawRange {
  pub lod: u32,
  pub row: u32,
  pub sub_chunk_begin: u8,
  pub sub_chunk_end: u8,
  /// Voxel scale over projected pixel size.
  pub render_scale: f32,
}

impl DrawRange {
  #[inline]
  pub fn node(&self) -> NodeRef {
    NodeRef {
      lod: self.lod,
      row: self.row,
    }
  }

  #[inline]
  pub fn is_full(&self) -> bool {
    self.sub_chunk_begin == 0 && self.sub_chunk_end == SUB_CHUNK_COUNT
  }
}

/// Counters for one traversal.
#[derive(Clone, Copy, Default, PartialEq, Eq, Debug)]
pub struct SelectionStats {
  /// Visible non-empty nodes with mesh at their LOD.
  pub considered: u32,
  /// Considered nodes reported resident.
  pub present: u32,
  /// Considered nodes reported absent.
  pub missing: u32,
  /// Draw ranges emitted.
  pub emitted: u32,
}

/// Camera inputs for one traversal, in the manifest's model space.
#[derive(Clone, Copy, Debug)]
pub struct ViewParams {
  pub model_view_projection: Mat4,
  pub planes: ClipPlanes,
  /// Refinement threshold: a node is refined while its projected pixel size
  /// times this factor is smaller than its LOD scale.
  pub detail_cutoff: f32,
  pub viewport_width: f32,
  pub viewport_height: f32,
  pixel_scale: f32,
}

impl ViewParams {
  pub fn new(
    model_view_projection: Mat4,
    detail_cutoff: f32,
    viewport_width: f32,
    viewport_height: f32,
  ) -> Self {
    let row0 = model_view_projection.row(0).truncate().length();
    let row1 = model_view_projection.row(1).truncate().length();
    let pixel_scale = 0.5 * (row0 * viewport_width).max(row1 * viewport_height);
    Self {
      model_view_projection,
      planes: ClipPlanes::from_matrix(&model_view_projection),
      detail_cutoff,
      viewport_width,
      viewport_height,
      pixel_scale,
    }
  }

  /// Model units covered by one pixel at the nearest point of `bounds`.
  pub fn pixel_size(&self, bounds: &Aabb) -> f32 {
    if self.pixel_scale.is_nan() || self.pixel_scale <= 0.0 {
      return f32::INFINITY;
    }
    // Smallest w over the 8 corners, one axis at a time.
    let w = self.model_view_projection.row(3);
    let lo = w.truncate() * bounds.min;
    let hi = w.truncate() * bounds.max;
    let min_w = w.w + lo.min(hi).element_sum();
    min_w.max(MIN_CLIP_W) / self.pixel_scale
  }
}

/// Ancestor whose sub-chunks are still being claimed.
struct OpenNode {
  lod: u32,
  row: u32,
  covered: u8,
  empty: bool,
  render_scale: f32,
}

struct Traversal<'a, H, E> {
  manifest: &'a MultiscaleManifest,
  view: &'a ViewParams,
  has_fragment: H,
  emit: E,
  stack: SmallVec<[OpenNode; 16]>,
  stats: SelectionStats,
}

impl<H, E> Traversal<'_, H, E>
where
  H: FnMut(NodeRef, f32) -> bool,
  E: FnMut(DrawRange),
{
  fn visit(&mut self, row_index: u32, lod: u32) {
    let row = self.manifest.row(row_index as usize);
    let Some(bounds) = self.manifest.node_bounds(lod, row.grid) else {
      return;
    };
    if !self.view.planes.intersects_box(&bounds) {
      return;
    }

    let lod_scale = self.manifest.lod_scale(lod);
    let pixel_size = self.view.pixel_size(&bounds);
    let refine = lod > 0
      && row.has_children()
      && (lod_scale == 0.0 || pixel_size * self.view.detail_cutoff < lod_scale);

    if lod_scale == 0.0 {
      // No mesh at this LOD; descendants attach to the enclosing open node.
      if refine {
        self.visit_children(row_index, lod);
      }
      return;
    }

    let render_scale = lod_scale / pixel_size;
    if !row.empty {
      self.stats.considered += 1;
      let node = NodeRef { lod, row: row_index };
      if !(self.has_fragment)(node, render_scale) {
        self.stats.missing += 1;
        return;
      }
      self.stats.present += 1;
    }

    if let Some(parent) = self.stack.last_mut() {
      parent.covered |= 1 << row.octant_within(parent.lod - lod);
    }
    self.stack.push(OpenNode {
      lod,
      row: row_index,
      covered: 0,
      empty: row.empty,
      render_scale,
    });
    if refine {
      self.visit_children(row_index, lod);
    }
    if let Some(node) = self.stack.pop() {
      self.emit_uncovered(&node);
    }
  }

  fn visit_children(&mut self, row_index: u32, lod: u32) {
    let row = self.manifest.row(row_index as usize);
    // Children must precede the parent; anything else would loop.
    let end = row.child_end.min(row_index);
    for child in row.child_begin..end {
      self.visit(child, lod - 1);
    }
  }

  fn emit_uncovered(&mut self, node: &OpenNode) {
    if node.empty {
      return;
    }
    let mut begin = 0u8;
    while begin < SUB_CHUNK_COUNT {
      if node.covered & (1 << begin) != 0 {
        begin += 1;
        continue;
      }
      let mut end = begin + 1;
      while end < SUB_CHUNK_COUNT && node.covered & (1 << end) == 0 {
        end += 1;
      }
      (self.emit)(DrawRange {
        lod: node.lod,
        row: node.row,
        sub_chunk_begin: begin,
        sub_chunk_end: end,
        render_scale: node.render_scale,
      });
      self.stats.emitted += 1;
      begin = end;
    }
  }
}

/// Select the sub-chunk ranges to draw for one object.
///
/// `has_fragment` is asked once per visible, non-empty node with mesh at its
/// LOD, together with the node's render scale. `emit` receives the ranges to
/// draw in a deterministic order.
#[cfg_attr(
  feature = "profiling",
  tracing::instrument(skip_all, name = "octree::select_chunks_to_draw")
)]
pub fn select_chunks_to_draw<H, E>(
  manifest: &MultiscaleManifest,
  view: &ViewParams,
  has_fragment: H,
  emit: E,
) -> SelectionStats
where
  H: FnMut(NodeRef, f32) -> bool,
  E: FnMut(DrawRange),
{
  let (Some(root), Some(root_lod)) = (manifest.root_row(), manifest.root_lod()) else {
    return SelectionStats::default();
  };
  let mut traversal = Traversal {
    manifest,
    view,
    has_fragment,
    emit,
    stack: SmallVec::new(),
    stats: SelectionStats::default(),
  };
  traversal.visit(root as u32, root_lod);
  traversal.stats
}

/// Visit every node the view would draw if everything were resident.
///
/// Used to tell the cache which fragments to fetch, with their render scale
/// as priority.
pub fn desired_chunks<V>(manifest: &MultiscaleManifest, view: &ViewParams, mut visit: V)
where
  V: FnMut(NodeRef, f32),
{
  select_chunks_to_draw(
    manifest,
    view,
    |node, render_scale| {
      visit(node, render_scale);
      true
    },
    |_| {},
  );
}

/// Model-space origin of the fragment-local coordinates of `node`.
#[inline]
pub fn fragment_origin(manifest: &MultiscaleManifest, node: NodeRef) -> Vec3 {
  let row = manifest.row(node.row as usize);
  manifest.fragment_origin(node.lod, row.grid)
}

#[cfg(test)]
#[path = "selection_test.rs"]
mod selection_test;
