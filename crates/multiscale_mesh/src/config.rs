//! LayerConfig - tuning shared by the mesh render layers.

/// Tuning for one mesh render layer.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LayerConfig {
  /// Screen-space error budget: a node is refined while its projected
  /// pixel size times this factor stays below its LOD scale. Larger values
  /// draw coarser meshes.
  pub detail_cutoff: f32,

  /// Upper bound on vertices examined per fragment by nearest-point
  /// queries.
  pub max_nearest_point_samples: usize,

  /// Run full octree validation when a manifest is first drawn.
  pub validate_octrees: bool,
}

impl LayerConfig {
  pub const DEFAULT: Self = Self {
    detail_cutoff: 1.0,
    max_nearest_point_samples: 100_000,
    validate_octrees: false,
  };

  pub fn with_detail_cutoff(mut self, detail_cutoff: f32) -> Self {
    self.detail_cutoff = detail_cutoff;
    self
  }

  pub fn with_max_nearest_point_samples(mut self, samples: usize) -> Self {
    self.max_nearest_point_samples = samples.max(1);
    self
  }

  pub fn with_validate_octrees(mut self, validate: bool) -> Self {
    self.validate_octrees = validate;
    self
  }
}

impl Default for LayerConfig {
  fn default() -> Self {
    Self::DEFAULT
  }
}
