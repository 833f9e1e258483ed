//! MultiscaleManifest - per-object octree and LOD metadata.
//!
//! The octree is a flat array of rows, five `u32` per row:
//!
//! ```text
//! [x, y, z, child_begin, child_end | EMPTY_BIT]
//! ```
//!
//! `x, y, z` are grid coordinates at the row's own LOD. Children occupy rows
//! `child_begin..child_end` and always precede their parent, so the root is
//! the last row. The root sits at the coarsest LOD, `lod_scales.len() - 1`;
//! each step down the tree is one LOD finer. `EMPTY_BIT` marks rows with no
//! mesh at their LOD.

use glam::{UVec3, Vec3};

use super::bounds::Aabb;
use crate::error::{MeshError, Result};

/// `u32` values per octree row.
pub const ROW_STRIDE: usize = 5;

/// Flag in `child_end` marking a node without mesh data.
pub const EMPTY_BIT: u32 = 1 << 31;

/// One decoded octree row.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct OctreeRow {
  /// Grid position at the row's LOD.
  pub grid: UVec3,
  pub child_begin: u32,
  pub child_end: u32,
  /// No mesh at this LOD.
  pub empty: bool,
}

impl OctreeRow {
  #[inline]
  pub fn has_children(&self) -> bool {
    self.child_begin < self.child_end
  }

  /// Octant (`x | y<<1 | z<<2`) this row occupies inside an ancestor
  /// `levels_up` LODs coarser.
  #[inline]
  pub fn octant_within(&self, levels_up: u32) -> u8 {
    let shift = levels_up.saturating_sub(1);
    let bit = |v: u32| ((v >> shift) & 1) as u8;
    bit(self.grid.x) | (bit(self.grid.y) << 1) | (bit(self.grid.z) << 2)
  }
}

/// Per-object multiscale metadata.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(
  feature = "serde",
  derive(serde::Serialize, serde::Deserialize),
  serde(rename_all = "camelCase")
)]
pub struct MultiscaleManifest {
  pub octree: Vec<u32>,
  /// Size of one LOD-0 chunk in model units.
  pub chunk_shape: Vec3,
  pub chunk_grid_spatial_origin: Vec3,
  /// Voxel scale per LOD. Zero means no mesh exists at that LOD.
  pub lod_scales: Vec<f32>,
  /// Vertex offset per LOD, three values each.
  pub vertex_offsets: Vec<f32>,
  pub clip_lower_bound: Vec3,
  pub clip_upper_bound: Vec3,
}

impl MultiscaleManifest {
  #[inline]
  pub fn row_count(&self) -> usize {
    self.octree.len() / ROW_STRIDE
  }

  pub fn row(&self, index: usize) -> OctreeRow {
    let base = index * ROW_STRIDE;
    let raw = &self.octree[base..base + ROW_STRIDE];
    OctreeRow {
      grid: UVec3::new(raw[0], raw[1], raw[2]),
      child_begin: raw[3],
      child_end: raw[4] & !EMPTY_BIT,
      empty: raw[4] & EMPTY_BIT != 0,
    }
  }

  /// Index of the root row (the last row).
  #[inline]
  pub fn root_row(&self) -> Option<usize> {
    self.row_count().checked_sub(1)
  }

  /// LOD of the root row.
  #[inline]
  pub fn root_lod(&self) -> Option<u32> {
    (self.lod_scales.len() as u32).checked_sub(1)
  }

  #[inline]
  pub fn lod_scale(&self, lod: u32) -> f32 {
    self.lod_scales.get(lod as usize).copied().unwrap_or(0.0)
  }

  pub fn vertex_offset(&self, lod: u32) -> Vec3 {
    let base = lod as usize * 3;
    match self.vertex_offsets.get(base..base + 3) {
      Some(v) => Vec3::new(v[0], v[1], v[2]),
      None => Vec3::ZERO,
    }
  }

  /// Size of one chunk at `lod`.
  #[inline]
  pub fn chunk_size(&self, lod: u32) -> Vec3 {
    self.chunk_shape * (lod as f32).exp2()
  }

  /// Lower corner of the chunk at `grid`, `lod`.
  #[inline]
  pub fn chunk_origin(&self, lod: u32, grid: UVec3) -> Vec3 {
    self.chunk_grid_spatial_origin + grid.as_vec3() * self.chunk_size(lod)
  }

  /// Translation applied to fragment-local vertex positions.
  #[inline]
  pub fn fragment_origin(&self, lod: u32, grid: UVec3) -> Vec3 {
    self.chunk_origin(lod, grid) + self.vertex_offset(lod)
  }

  pub fn clip_bounds(&self) -> Aabb {
    Aabb::new(self.clip_lower_bound, self.clip_upper_bound)
  }

  /// Chunk box clipped to the manifest bounds. `None` when degenerate.
  pub fn node_bounds(&self, lod: u32, grid: UVec3) -> Option<Aabb> {
    let chunk = Aabb::from_origin_size(self.chunk_origin(lod, grid), self.chunk_size(lod));
    chunk.intersection(&self.clip_bounds())
  }

  /// Cheap structural checks run when a manifest payload is accepted.
  pub fn check_shape(&self) -> Result<()> {
    if self.octree.len() % ROW_STRIDE != 0 {
      return Err(MeshError::InvalidManifest(format!(
        "octree length {} is not a multiple of {ROW_STRIDE}",
        self.octree.len()
      )));
    }
    if self.vertex_offsets.len() != self.lod_scales.len() * 3 {
      return Err(MeshError::InvalidManifest(format!(
        "expected {} vertex offset values for {} LODs, got {}",
        self.lod_scales.len() * 3,
        self.lod_scales.len(),
        self.vertex_offsets.len()
      )));
    }
    if self.row_count() > 0 && self.lod_scales.is_empty() {
      return Err(MeshError::InvalidManifest("octree without LOD scales".into()));
    }
    Ok(())
  }

  /// Full structural validation of the octree.
  ///
  /// Checks child ranges, parent containment of each child, and that the
  /// tree is no deeper than the LOD scale list.
  pub fn validate(&self) -> Result<()> {
    self.check_shape()?;
    let rows = self.row_count();
    for index in 0..rows {
      let row = self.row(index);
      if !row.has_children() {
        continue;
      }
      if row.child_end as usize > index {
        return Err(MeshError::MalformedOctree {
          row: index,
          reason: format!(
            "children {}..{} do not precede their parent",
            row.child_begin, row.child_end
          ),
        });
      }
      for child_index in row.child_begin..row.child_end {
        let child = self.row(child_index as usize);
        if child.grid >> 1u32 != row.grid {
          return Err(MeshError::MalformedOctree {
            row: child_index as usize,
            reason: format!("grid {} is not inside parent {}", child.grid, row.grid),
          });
        }
      }
    }

    let (Some(root), Some(root_lod)) = (self.root_row(), self.root_lod()) else {
      return Ok(());
    };
    let mut stack = vec![(root, root_lod)];
    while let Some((index, lod)) = stack.pop() {
      let row = self.row(index);
      if !row.has_children() {
        continue;
      }
      if lod == 0 {
        return Err(MeshError::MalformedOctree {
          row: index,
          reason: "octree is deeper than the LOD scale list".into(),
        });
      }
      stack.extend((row.child_begin..row.child_end).map(|child| (child as usize, lod - 1)));
    }
    Ok(())
  }
}

#[cfg(test)]
#[path = "manifest_test.rs"]
mod manifest_test;
