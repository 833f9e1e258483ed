//! Single-resolution mesh layer: each object is a flat list of fragments.

use glam::Vec3;
use tracing::{debug, trace, warn};
use web_time::Instant;

use super::context::{DisplayState, RenderContext};
use super::histogram::RenderScaleHistogram;
use super::FrameStats;
use crate::chunk::fragment::SUB_CHUNK_COUNT;
use crate::chunk::{ChunkState, FragmentChunk, GpuResident};
use crate::config::LayerConfig;
use crate::gpu::{GpuBackend, UniformValue};
use crate::shader::{names, ShaderCache, ShaderKey};
use crate::source::MeshSource;
use crate::types::ObjectId;

/// Draws single-resolution meshes from a [`MeshSource`].
pub struct MeshLayer {
  source: MeshSource,
  display: DisplayState,
  config: LayerConfig,
  shaders: ShaderCache,
  histogram: RenderScaleHistogram,
}

impl MeshLayer {
  pub fn new(source: MeshSource, display: DisplayState, config: LayerConfig) -> Self {
    Self {
      source,
      display,
      config,
      shaders: ShaderCache::new(),
      histogram: RenderScaleHistogram::new(),
    }
  }

  #[inline]
  pub fn source(&self) -> &MeshSource {
    &self.source
  }

  #[inline]
  pub fn source_mut(&mut self) -> &mut MeshSource {
    &mut self.source
  }

  #[inline]
  pub fn display(&self) -> &DisplayState {
    &self.display
  }

  #[inline]
  pub fn display_mut(&mut self) -> &mut DisplayState {
    &mut self.display
  }

  #[inline]
  pub fn config(&self) -> &LayerConfig {
    &self.config
  }

  #[inline]
  pub fn histogram(&self) -> &RenderScaleHistogram {
    &self.histogram
  }

  #[inline]
  pub fn shader_count(&self) -> usize {
    self.shaders.len()
  }

  /// Replace the visible objects, moving cache interest along.
  pub fn set_visible_segments<I>(&mut self, objects: I)
  where
    I: IntoIterator<Item = ObjectId>,
  {
    let (added, removed) = self.display.replace_visible(objects);
    for object in added {
      self.source.retain_object(object);
    }
    for object in removed {
      self.source.release_object(object);
    }
  }

  /// Apply queued cache transitions. Call once at the start of a frame.
  pub fn poll_updates(&mut self, gl: &mut dyn GpuBackend) -> usize {
    self.source.poll_updates(gl)
  }

  fn gpu_fragment(&self, object: ObjectId, fragment_id: &str) -> Option<&FragmentChunk> {
    self
      .source
      .fragment(object, fragment_id)
      .filter(|chunk| chunk.state() == ChunkState::GpuMemory)
  }

  #[cfg_attr(feature = "profiling", tracing::instrument(skip_all, name = "mesh_layer::draw"))]
  pub fn draw(&mut self, gl: &mut dyn GpuBackend, ctx: &mut RenderContext) -> FrameStats {
    let start = Instant::now();
    self.histogram.begin_frame();
    let mut stats = self.draw_objects(gl, ctx);
    stats.draw_time_us = start.elapsed().as_micros() as u64;
    trace!(?stats, "mesh layer frame");
    stats
  }

  fn draw_objects(&mut self, gl: &mut dyn GpuBackend, ctx: &mut RenderContext) -> FrameStats {
    let mut stats = FrameStats::default();
    if ctx.is_redundant_pick_pass() || self.display.object_alpha <= 0.0 {
      return stats;
    }
    let (transform, normal_matrix) = match self.display.usable_transform() {
      Ok(usable) => usable,
      Err(error) => {
        debug!(%error, "mesh layer skipped");
        return stats;
      }
    };

    let format = self.source.vertex_format();
    let key = ShaderKey {
      fragment_relative_vertices: false,
      vertex_format: format,
      silhouette: self.display.silhouette_enabled(),
    };
    let program = match self.shaders.get_or_compile(gl, key) {
      Ok(program) => program,
      Err(error) => {
        warn!(%error, "mesh shader unavailable");
        return stats;
      }
    };

    gl.use_program(program);
    gl.set_uniform(names::U_LIGHT_DIRECTION, UniformValue::Vec4(ctx.light_uniform()));
    if key.silhouette {
      gl.set_uniform(
        names::U_SILHOUETTE_POWER,
        UniformValue::Float(self.display.silhouette_rendering),
      );
    }
    gl.set_uniform(
      names::U_MODEL_VIEW_PROJECTION,
      UniformValue::Mat4(transform.model_view_projection(&ctx.view_projection)),
    );
    gl.set_uniform(names::U_NORMAL_MATRIX, UniformValue::Mat3(normal_matrix));

    for &object in self.display.visible_segments() {
      let Some(manifest) = self.source.manifest(object) else {
        stats.manifests_missing += 1;
        continue;
      };
      gl.set_uniform(names::U_COLOR, UniformValue::Vec4(self.display.object_color(object)));
      if ctx.emit_pick_id {
        gl.set_uniform(names::U_PICK_ID, UniformValue::Uint(ctx.register_pick_id(object)));
      }

      let mut present = 0;
      let mut missing = 0;
      for fragment_id in manifest.fragment_ids() {
        match self.gpu_fragment(object, fragment_id) {
          Some(chunk) => {
            present += 1;
            if chunk.draw(gl, format, 0, SUB_CHUNK_COUNT) {
              stats.draw_calls += 1;
            }
          }
          None => missing += 1,
        }
      }

      stats.objects_drawn += 1;
      stats.fragments_present += present;
      stats.fragments_missing += missing;
      self.histogram.add(f32::INFINITY, f32::INFINITY, present, missing);
      self.histogram.add_object_totals(present, present + missing);
    }
    stats
  }

  /// Every visible object has its manifest and every fragment on the GPU.
  pub fn is_ready(&self) -> bool {
    if self.display.usable_transform().is_err() {
      return false;
    }
    self.display.visible_segments().iter().all(|&object| {
      self.source.manifest(object).is_some_and(|manifest| {
        manifest
          .fragment_ids()
          .iter()
          .all(|id| self.gpu_fragment(object, id).is_some())
      })
    })
  }

  /// Resident vertex of `object` nearest to `nearest_to`, in layer space.
  ///
  /// Each fragment is sub-sampled on its own so that at most
  /// `max_nearest_point_samples` of its vertices are examined.
  pub fn object_position(&self, object: ObjectId, nearest_to: Vec3) -> Option<Vec3> {
    let transform = self.display.transform.as_ref().ok()?;
    let query = transform.layer_to_model().ok()?.transform_point3(nearest_to);
    let manifest = self.source.manifest(object)?;
    let format = self.source.vertex_format();
    let max_samples = self.config.max_nearest_point_samples.max(1);

    let mut best: Option<(f32, Vec3)> = None;
    for fragment_id in manifest.fragment_ids() {
      let Some(chunk) = self.source.fragment(object, fragment_id) else {
        continue;
      };
      if !chunk.state().is_resident() {
        continue;
      }
      let data = chunk.data();
      let vertex_count = data.vertex_count();
      if vertex_count == 0 || !data.vertex_positions.matches_format(format) {
        continue;
      }
      let stride = vertex_count.div_ceil(max_samples);
      for index in (0..vertex_count).step_by(stride) {
        let position = data.vertex_positions.position(index, format);
        let distance = position.distance_squared(query);
        if best.map_or(true, |(d, _)| distance < d) {
          best = Some((distance, position));
        }
      }
    }
    best.map(|(_, position)| transform.model_to_layer.transform_point3(position))
  }

  /// Release all interest and GPU memory held for this layer.
  pub fn dispose(&mut self, gl: &mut dyn GpuBackend) {
    for object in self.display.clear_visible() {
      self.source.release_object(object);
    }
    self.source.free_all_gpu_memory(gl);
  }
}

#[cfg(test)]
#[path = "mesh_layer_test.rs"]
mod mesh_layer_test;
