//! Multiscale mesh layer: per-object octrees drawn at view-dependent LOD.

use std::collections::HashSet;

use glam::Vec3;
use tracing::{debug, trace, warn};
use web_time::Instant;

use super::context::{DisplayState, ModelTransform, RenderContext};
use super::histogram::RenderScaleHistogram;
use super::FrameStats;
use crate::chunk::{ChunkState, GpuResident};
use crate::config::LayerConfig;
use crate::gpu::{GpuBackend, UniformValue};
use crate::octree::selection::fragment_origin;
use crate::octree::{desired_chunks, select_chunks_to_draw, MultiscaleManifest, NodeRef, ViewParams};
use crate::shader::{names, ShaderCache, ShaderKey};
use crate::source::{FragmentSource, MultiscaleMeshSource};
use crate::types::ObjectId;

/// Draws multiscale meshes from a [`MultiscaleMeshSource`].
pub struct MultiscaleMeshLayer {
  source: MultiscaleMeshSource,
  display: DisplayState,
  config: LayerConfig,
  shaders: ShaderCache,
  histogram: RenderScaleHistogram,
  /// Objects whose octree has already been validated.
  validated: HashSet<ObjectId>,
}

/// True when the fragment of `object` at `node` is on the GPU.
fn is_gpu_resident(fragments: &FragmentSource, object: ObjectId, node: NodeRef) -> bool {
  fragments
    .get(&MultiscaleMeshSource::fragment_key(object, node))
    .is_some_and(|chunk| chunk.state() == ChunkState::GpuMemory)
}

impl MultiscaleMeshLayer {
  pub fn new(source: MultiscaleMeshSource, display: DisplayState, config: LayerConfig) -> Self {
    Self {
      source,
      display,
      config,
      shaders: ShaderCache::new(),
      histogram: RenderScaleHistogram::new(),
      validated: HashSet::new(),
    }
  }

  #[inline]
  pub fn source(&self) -> &MultiscaleMeshSource {
    &self.source
  }

  #[inline]
  pub fn source_mut(&mut self) -> &mut MultiscaleMeshSource {
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
      self.validated.remove(&object);
    }
  }

  /// Apply queued cache transitions. Call once at the start of a frame.
  pub fn poll_updates(&mut self, gl: &mut dyn GpuBackend) -> usize {
    self.source.poll_updates(gl)
  }

  fn view_params(&self, transform: &ModelTransform, ctx: &RenderContext) -> ViewParams {
    ViewParams::new(
      transform.model_view_projection(&ctx.view_projection),
      self.config.detail_cutoff,
      ctx.viewport_width,
      ctx.viewport_height,
    )
  }

  /// Validate each object's octree once, when enabled.
  fn check_octree(&mut self, object: ObjectId) {
    if !self.config.validate_octrees || self.validated.contains(&object) {
      return;
    }
    let Some(chunk) = self.source.manifest(object) else {
      return;
    };
    if let Err(error) = chunk.manifest().validate() {
      warn!(%object, %error, "malformed octree");
    }
    self.validated.insert(object);
  }

  #[cfg_attr(
    feature = "profiling",
    tracing::instrument(skip_all, name = "multiscale_layer::draw")
  )]
  pub fn draw(&mut self, gl: &mut dyn GpuBackend, ctx: &mut RenderContext) -> FrameStats {
    let start = Instant::now();
    self.histogram.begin_frame();
    let mut stats = self.draw_objects(gl, ctx);
    stats.draw_time_us = start.elapsed().as_micros() as u64;
    trace!(?stats, "multiscale layer frame");
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
        debug!(%error, "multiscale layer skipped");
        return stats;
      }
    };

    let format = self.source.vertex_format();
    let relative = self.source.fragment_relative_vertices();
    let key = ShaderKey {
      fragment_relative_vertices: relative,
      vertex_format: format,
      silhouette: self.display.silhouette_enabled(),
    };
    let program = match self.shaders.get_or_compile(gl, key) {
      Ok(program) => program,
      Err(error) => {
        warn!(%error, "multiscale mesh shader unavailable");
        return stats;
      }
    };

    let scale_multiplier = transform.scale_multiplier();
    let view = self.view_params(&transform, ctx);

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
      UniformValue::Mat4(view.model_view_projection),
    );
    gl.set_uniform(names::U_NORMAL_MATRIX, UniformValue::Mat3(normal_matrix));

    let visible = self.display.visible_segments().to_vec();
    for object in visible {
      self.check_octree(object);
      let Some(chunk) = self.source.manifest(object) else {
        stats.manifests_missing += 1;
        continue;
      };
      let manifest = chunk.manifest();
      gl.set_uniform(names::U_COLOR, UniformValue::Vec4(self.display.object_color(object)));
      if ctx.emit_pick_id {
        gl.set_uniform(names::U_PICK_ID, UniformValue::Uint(ctx.register_pick_id(object)));
      }

      let fragments = self.source.fragments();
      let histogram = &mut self.histogram;
      let mut draw_calls = 0;
      let selection = select_chunks_to_draw(
        manifest,
        &view,
        |node, render_scale| {
          let present = is_gpu_resident(fragments, object, node);
          histogram.add(
            manifest.lod_scale(node.lod) * scale_multiplier,
            render_scale,
            present as u32,
            !present as u32,
          );
          present
        },
        |range| {
          let node = range.node();
          let Some(fragment) = fragments.get(&MultiscaleMeshSource::fragment_key(object, node))
          else {
            return;
          };
          if relative {
            set_fragment_uniforms(gl, manifest, node);
          }
          if fragment.draw(gl, format, range.sub_chunk_begin, range.sub_chunk_end) {
            draw_calls += 1;
          }
        },
      );

      stats.objects_drawn += 1;
      stats.fragments_present += selection.present;
      stats.fragments_missing += selection.missing;
      stats.draw_calls += draw_calls;
      histogram.add_object_totals(selection.present, selection.present + selection.missing);
    }
    stats
  }

  /// Every node the draw traversal would select is on the GPU, for every
  /// visible object.
  pub fn is_ready(&self, ctx: &RenderContext) -> bool {
    let Ok((transform, _)) = self.display.usable_transform() else {
      return false;
    };
    let view = self.view_params(&transform, ctx);
    let fragments = self.source.fragments();
    self.display.visible_segments().iter().all(|&object| {
      let Some(chunk) = self.source.manifest(object) else {
        return false;
      };
      let selection = select_chunks_to_draw(
        chunk.manifest(),
        &view,
        |node, _| is_gpu_resident(fragments, object, node),
        |_| {},
      );
      selection.missing == 0
    })
  }

  /// Fragment keys the current view wants, with their render scale.
  ///
  /// Every node the view would draw when fully resident is listed, coarse
  /// nodes before their children.
  pub fn desired_fragment_keys(&self, ctx: &RenderContext) -> Vec<(String, f32)> {
    let Ok(transform) = &self.display.transform else {
      return Vec::new();
    };
    let view = self.view_params(transform, ctx);
    let mut keys = Vec::new();
    for &object in self.display.visible_segments() {
      let Some(chunk) = self.source.manifest(object) else {
        continue;
      };
      desired_chunks(chunk.manifest(), &view, |node, render_scale| {
        keys.push((MultiscaleMeshSource::fragment_key(object, node), render_scale));
      });
    }
    keys
  }

  /// Center of the object's clip bounds, in layer space.
  pub fn object_position(&self, object: ObjectId) -> Option<Vec3> {
    let transform = self.display.transform.as_ref().ok()?;
    let chunk = self.source.manifest(object)?;
    let center = chunk.manifest().clip_bounds().center();
    Some(transform.model_to_layer.transform_point3(center))
  }

  /// Release all interest and GPU memory held for this layer.
  pub fn dispose(&mut self, gl: &mut dyn GpuBackend) {
    for object in self.display.clear_visible() {
      self.source.release_object(object);
    }
    self.validated.clear();
    self.source.free_all_gpu_memory(gl);
  }
}

/// Place fragment-local positions of `node` in model space.
fn set_fragment_uniforms(gl: &mut dyn GpuBackend, manifest: &MultiscaleManifest, node: NodeRef) {
  gl.set_uniform(
    names::U_FRAGMENT_ORIGIN,
    UniformValue::Vec3(fragment_origin(manifest, node)),
  );
  gl.set_uniform(
    names::U_FRAGMENT_SHAPE,
    UniformValue::Vec3(manifest.chunk_size(node.lod)),
  );
}

#[cfg(test)]
#[path = "multiscale_layer_test.rs"]
mod multiscale_layer_test;
