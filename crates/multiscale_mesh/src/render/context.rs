//! Per-frame render inputs and per-layer display state.

use std::collections::HashMap;

use glam::{Mat3, Mat4, Vec3, Vec4};

use crate::error::{MeshError, Result};
use crate::types::ObjectId;

/// Smallest |determinant| treated as invertible.
const MIN_DETERMINANT: f32 = 1e-12;

/// Per-frame inputs shared by every layer.
#[derive(Clone, Debug)]
pub struct RenderContext {
  /// Layer space to clip space.
  pub view_projection: Mat4,
  pub viewport_width: f32,
  pub viewport_height: f32,
  /// Color output enabled for this pass.
  pub emit_color: bool,
  /// Pick ids are written for this pass.
  pub emit_pick_id: bool,
  /// A previous pass this frame already wrote pick ids.
  pub already_emitted_pick_id: bool,
  /// Direction towards the light, in layer space (the space normals are
  /// shaded in).
  pub light_direction: Vec3,
  pub ambient_lighting: f32,
  pub directional_lighting: f32,
  picks: Vec<ObjectId>,
}

impl RenderContext {
  pub fn new(view_projection: Mat4, viewport_width: f32, viewport_height: f32) -> Self {
    Self {
      view_projection,
      viewport_width,
      viewport_height,
      emit_color: true,
      emit_pick_id: false,
      already_emitted_pick_id: false,
      light_direction: Vec3::new(0.0, 0.0, 1.0),
      ambient_lighting: 0.2,
      directional_lighting: 0.8,
      picks: Vec::new(),
    }
  }

  /// Pick-only pass whose ids were already written: nothing to do.
  #[inline]
  pub fn is_redundant_pick_pass(&self) -> bool {
    !self.emit_color && self.already_emitted_pick_id
  }

  /// `xyz` = light direction scaled by the directional factor, `w` = ambient.
  pub fn light_uniform(&self) -> Vec4 {
    (self.light_direction.normalize_or_zero() * self.directional_lighting)
      .extend(self.ambient_lighting)
  }

  /// Hand out the next pick id for `object`. Ids start at 1; 0 means
  /// "nothing".
  pub fn register_pick_id(&mut self, object: ObjectId) -> u32 {
    self.picks.push(object);
    self.picks.len() as u32
  }

  /// Object registered under `pick_id` this frame.
  pub fn picked_object(&self, pick_id: u32) -> Option<ObjectId> {
    let index = (pick_id as usize).checked_sub(1)?;
    self.picks.get(index).copied()
  }

  /// Forget this frame's pick ids.
  pub fn begin_frame(&mut self) {
    self.picks.clear();
    self.already_emitted_pick_id = false;
  }
}

/// Model space to layer space mapping of a mesh source.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ModelTransform {
  pub model_to_layer: Mat4,
  /// Per-axis scale from model units to canonical voxels.
  pub canonical_voxel_factors: Vec3,
  /// Physical size of one voxel per axis.
  pub physical_scales: Vec3,
}

impl ModelTransform {
  pub fn new(model_to_layer: Mat4) -> Self {
    Self {
      model_to_layer,
      canonical_voxel_factors: Vec3::ONE,
      physical_scales: Vec3::ONE,
    }
  }

  pub fn with_canonical_voxel_factors(mut self, factors: Vec3) -> Self {
    self.canonical_voxel_factors = factors;
    self
  }

  pub fn with_physical_scales(mut self, scales: Vec3) -> Self {
    self.physical_scales = scales;
    self
  }

  #[inline]
  fn linear(&self) -> Mat3 {
    Mat3::from_mat4(self.model_to_layer)
  }

  pub fn model_view_projection(&self, view_projection: &Mat4) -> Mat4 {
    *view_projection * self.model_to_layer
  }

  /// Inverse-transpose of the linear part with the canonical voxel factors
  /// applied to its output.
  pub fn normal_matrix(&self) -> Result<Mat3> {
    let scaled = Mat3::from_diagonal(self.canonical_voxel_factors) * self.linear();
    let det = scaled.determinant();
    if !det.is_finite() || det.abs() < MIN_DETERMINANT {
      return Err(MeshError::TransformUnavailable(
        "model transform has a singular linear part".into(),
      ));
    }
    Ok(scaled.inverse().transpose())
  }

  /// Cube root of the volume scale of the linear part, in physical units.
  pub fn scale_multiplier(&self) -> f32 {
    (Mat3::from_diagonal(self.physical_scales) * self.linear())
      .determinant()
      .abs()
      .cbrt()
  }

  /// Layer space to model space.
  pub fn layer_to_model(&self) -> Result<Mat4> {
    let det = self.model_to_layer.determinant();
    if !det.is_finite() || det.abs() < MIN_DETERMINANT {
      return Err(MeshError::TransformUnavailable(
        "model transform is not invertible".into(),
      ));
    }
    Ok(self.model_to_layer.inverse())
  }
}

/// What a layer shows and how.
#[derive(Clone, Debug)]
pub struct DisplayState {
  visible: Vec<ObjectId>,
  pub object_alpha: f32,
  /// Silhouette exponent; zero disables silhouette rendering.
  pub silhouette_rendering: f32,
  /// Current model transform, or why it cannot be used right now.
  pub transform: Result<ModelTransform>,
  pub default_color: Vec4,
  colors: HashMap<ObjectId, Vec4>,
}

impl DisplayState {
  pub fn new(transform: ModelTransform) -> Self {
    Self {
      visible: Vec::new(),
      object_alpha: 1.0,
      silhouette_rendering: 0.0,
      transform: Ok(transform),
      default_color: Vec4::ONE,
      colors: HashMap::new(),
    }
  }

  /// Visible objects in ascending id order.
  #[inline]
  pub fn visible_segments(&self) -> &[ObjectId] {
    &self.visible
  }

  /// Replace the visible set. Returns `(added, removed)`.
  pub fn replace_visible<I>(&mut self, objects: I) -> (Vec<ObjectId>, Vec<ObjectId>)
  where
    I: IntoIterator<Item = ObjectId>,
  {
    let mut next: Vec<ObjectId> = objects.into_iter().collect();
    next.sort_unstable();
    next.dedup();
    let added = next
      .iter()
      .filter(|id| self.visible.binary_search(id).is_err())
      .copied()
      .collect();
    let removed = self
      .visible
      .iter()
      .filter(|id| next.binary_search(id).is_err())
      .copied()
      .collect();
    self.visible = next;
    (added, removed)
  }

  /// Remove every object. Returns the objects that were visible.
  pub fn clear_visible(&mut self) -> Vec<ObjectId> {
    std::mem::take(&mut self.visible)
  }

  pub fn set_color(&mut self, object: ObjectId, color: Vec4) {
    self.colors.insert(object, color);
  }

  /// Object color with the layer opacity applied.
  pub fn object_color(&self, object: ObjectId) -> Vec4 {
    let color = self.colors.get(&object).copied().unwrap_or(self.default_color);
    color.truncate().extend(color.w * self.object_alpha)
  }

  /// Model transform and its normal matrix, when both can be used this
  /// frame. Drawing and readiness share this gate.
  pub fn usable_transform(&self) -> Result<(ModelTransform, Mat3)> {
    let transform = self.transform.clone()?;
    let normal_matrix = transform.normal_matrix()?;
    Ok((transform, normal_matrix))
  }

  #[inline]
  pub fn silhouette_enabled(&self) -> bool {
    self.silhouette_rendering > 0.0
  }
}
