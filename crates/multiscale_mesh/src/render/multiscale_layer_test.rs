use glam::{Mat4, Vec3};

use super::*;
use crate::chunk::ChunkUpdate;
use crate::codec::VertexPositionFormat;
use crate::error::MeshError;
use crate::render::histogram::{scale_bucket, ScaleCount};
use crate::test_utils::{
  context_from, identity_display, load, octant_fragment, two_level_manifest, RecordingBackend,
};

const OBJECT: ObjectId = ObjectId(1);
const CENTER: Vec3 = Vec3::ONE;
const ROOT: u32 = 8;

fn lod_of(row: u32) -> u32 {
  if row == ROOT {
    1
  } else {
    0
  }
}

fn key(row: u32) -> String {
  format!("1/{}/{}", lod_of(row), row)
}

/// Object 1 with the two-level octree; every fragment is loaded and rows
/// for which `on_gpu` holds are uploaded.
fn layer_with(
  gl: &mut RecordingBackend,
  relative: bool,
  config: LayerConfig,
  on_gpu: impl Fn(u32) -> bool,
) -> MultiscaleMeshLayer {
  let mut source = MultiscaleMeshSource::new(VertexPositionFormat::Float32, relative);
  load(source.manifests_mut(), gl, "1", two_level_manifest(), false);
  for row in 0..=ROOT {
    load(
      source.fragments_mut().chunks_mut(),
      gl,
      &key(row),
      octant_fragment(),
      on_gpu(row),
    );
  }
  let mut layer = MultiscaleMeshLayer::new(source, identity_display(), config);
  layer.set_visible_segments([OBJECT]);
  layer
}

fn resident_layer(gl: &mut RecordingBackend) -> MultiscaleMeshLayer {
  layer_with(gl, false, LayerConfig::default(), |_| true)
}

fn near() -> RenderContext {
  context_from(CENTER, 10.0)
}

fn far() -> RenderContext {
  context_from(CENTER, 5000.0)
}

// =========================================================================
// Drawing
// =========================================================================

#[test]
fn test_far_view_draws_root() {
  let mut gl = RecordingBackend::new();
  let mut layer = resident_layer(&mut gl);
  let mut ctx = far();

  assert!(layer.is_ready(&ctx));
  let stats = layer.draw(&mut gl, &mut ctx);

  assert_eq!(gl.draws(), vec![(0, 24)]);
  assert_eq!(stats.fragments_present, 1);
  assert_eq!(stats.draw_calls, 1);
}

#[test]
fn test_near_view_draws_children() {
  let mut gl = RecordingBackend::new();
  let mut layer = resident_layer(&mut gl);
  let mut ctx = near();

  assert!(layer.is_ready(&ctx));
  let stats = layer.draw(&mut gl, &mut ctx);

  assert_eq!(gl.draws(), vec![(0, 24); 8]);
  assert_eq!(stats.fragments_present, 9);
  assert_eq!(stats.fragments_missing, 0);
  assert_eq!(stats.draw_calls, 8);
}

/// A child not yet on the GPU: not ready, and the root fills its octant.
#[test]
fn test_missing_child_is_filled_by_root_sub_chunk() {
  let mut gl = RecordingBackend::new();
  let mut layer = layer_with(&mut gl, false, LayerConfig::default(), |row| row != 3);
  let mut ctx = near();

  assert!(!layer.is_ready(&ctx));
  let stats = layer.draw(&mut gl, &mut ctx);

  let mut expected = vec![(0, 24); 7];
  expected.push((9, 3));
  assert_eq!(gl.draws(), expected);
  assert_eq!(stats.fragments_missing, 1);

  let sender = layer.source().fragments().update_sender();
  sender.send(ChunkUpdate::MoveToGpu { key: key(3) }).unwrap();
  layer.poll_updates(&mut gl);
  gl.clear_calls();

  assert!(layer.is_ready(&ctx));
  let stats = layer.draw(&mut gl, &mut ctx);
  assert_eq!(gl.draws(), vec![(0, 24); 8]);
  assert_eq!(stats.draw_calls, 8);
}

/// After the root leaves the GPU, nothing reads its released buffers.
#[test]
fn test_released_root_is_not_drawn() {
  let mut gl = RecordingBackend::new();
  let mut layer = resident_layer(&mut gl);
  let mut ctx = far();
  layer.draw(&mut gl, &mut ctx);

  let sender = layer.source().fragments().update_sender();
  sender.send(ChunkUpdate::MoveToSystem { key: key(ROOT) }).unwrap();
  layer.poll_updates(&mut gl);
  gl.clear_calls();

  let stats = layer.draw(&mut gl, &mut ctx);
  assert_eq!(gl.draw_count(), 0);
  assert_eq!(stats.fragments_missing, 1);
  assert!(!layer.is_ready(&ctx));
}

#[test]
fn test_missing_manifest_is_counted() {
  let mut gl = RecordingBackend::new();
  let mut layer = resident_layer(&mut gl);
  layer.set_visible_segments([OBJECT, ObjectId(2)]);
  let mut ctx = far();

  assert!(!layer.is_ready(&ctx));
  let stats = layer.draw(&mut gl, &mut ctx);
  assert_eq!(stats.manifests_missing, 1);
  assert_eq!(stats.objects_drawn, 1);
}

#[test]
fn test_transform_error_short_circuits() {
  let mut gl = RecordingBackend::new();
  let mut layer = resident_layer(&mut gl);
  layer.display_mut().transform = Err(MeshError::TransformUnavailable("no mapping".into()));
  let mut ctx = near();
  gl.clear_calls();

  let stats = layer.draw(&mut gl, &mut ctx);
  assert!(gl.calls.is_empty());
  assert_eq!(stats.objects_drawn, 0);
  assert!(!layer.is_ready(&ctx));
  assert!(layer.desired_fragment_keys(&ctx).is_empty());
  assert_eq!(layer.object_position(OBJECT), None);
}

/// Readiness and drawing agree when the transform cannot shade normals.
#[test]
fn test_singular_transform_is_not_ready() {
  let mut gl = RecordingBackend::new();
  let mut layer = resident_layer(&mut gl);
  let mut ctx = far();
  assert!(layer.is_ready(&ctx));

  layer.display_mut().transform = Ok(ModelTransform::new(Mat4::from_scale(Vec3::new(
    1.0, 0.0, 1.0,
  ))));
  gl.clear_calls();

  assert!(!layer.is_ready(&ctx));
  let stats = layer.draw(&mut gl, &mut ctx);
  assert_eq!(stats.draw_calls, 0);
  assert_eq!(gl.draw_count(), 0);
}

/// Octree validation failures are logged; drawing goes on.
#[test]
fn test_malformed_octree_does_not_stop_drawing() {
  let mut gl = RecordingBackend::new();
  let mut source = MultiscaleMeshSource::new(VertexPositionFormat::Float32, false);
  let mut manifest = two_level_manifest();
  manifest.octree[5] = 2;
  load(source.manifests_mut(), &mut gl, "1", manifest, false);
  load(
    source.fragments_mut().chunks_mut(),
    &mut gl,
    &key(ROOT),
    octant_fragment(),
    true,
  );
  let config = LayerConfig::default().with_validate_octrees(true);
  let mut layer = MultiscaleMeshLayer::new(source, identity_display(), config);
  layer.set_visible_segments([OBJECT]);

  let stats = layer.draw(&mut gl, &mut far());
  assert_eq!(stats.draw_calls, 1);
  let stats = layer.draw(&mut gl, &mut far());
  assert_eq!(stats.draw_calls, 1);
}

// =========================================================================
// Fragment-relative vertices
// =========================================================================

#[test]
fn test_relative_vertices_set_fragment_uniforms() {
  let mut gl = RecordingBackend::new();
  let mut layer = layer_with(&mut gl, true, LayerConfig::default(), |_| true);

  layer.draw(&mut gl, &mut near());
  let origins = gl.uniform_values(names::U_FRAGMENT_ORIGIN);
  let shapes = gl.uniform_values(names::U_FRAGMENT_SHAPE);
  assert_eq!(origins.len(), 8);
  assert_eq!(origins[0], UniformValue::Vec3(Vec3::ZERO));
  assert_eq!(origins[5], UniformValue::Vec3(Vec3::new(1.0, 0.0, 1.0)));
  assert!(shapes.iter().all(|s| *s == UniformValue::Vec3(Vec3::ONE)));

  gl.clear_calls();
  layer.draw(&mut gl, &mut far());
  assert_eq!(
    gl.uniform_values(names::U_FRAGMENT_SHAPE),
    vec![UniformValue::Vec3(Vec3::splat(2.0))]
  );
}

#[test]
fn test_absolute_vertices_skip_fragment_uniforms() {
  let mut gl = RecordingBackend::new();
  let mut layer = resident_layer(&mut gl);
  layer.draw(&mut gl, &mut near());
  assert!(gl.uniform_values(names::U_FRAGMENT_ORIGIN).is_empty());
}

#[test]
fn test_shader_compiled_once_across_views() {
  let mut gl = RecordingBackend::new();
  let mut relative = layer_with(&mut gl, true, LayerConfig::default(), |_| true);
  relative.draw(&mut gl, &mut near());
  relative.draw(&mut gl, &mut far());
  assert_eq!(relative.shader_count(), 1);
  assert_eq!(gl.compile_count(), 1);
}

// =========================================================================
// Histogram
// =========================================================================

#[test]
fn test_histogram_samples_every_considered_node() {
  let mut gl = RecordingBackend::new();
  let mut layer = layer_with(&mut gl, false, LayerConfig::default(), |row| row != 0);
  layer.draw(&mut gl, &mut near());

  let histogram = layer.histogram();
  let mut fine = ScaleCount::default();
  let mut coarse = ScaleCount::default();
  for ((spatial, _), count) in histogram.iter() {
    match spatial {
      32 => {
        fine.present += count.present;
        fine.missing += count.missing;
      }
      33 => {
        coarse.present += count.present;
        coarse.missing += count.missing;
      }
      other => panic!("unexpected spatial bucket {other}"),
    }
  }
  assert_eq!(fine, ScaleCount { present: 7, missing: 1 });
  assert_eq!(coarse, ScaleCount { present: 1, missing: 0 });
  assert_eq!(histogram.progress(), 8.0 / 9.0);
}

/// Spatial scales are reported in physical units.
#[test]
fn test_histogram_applies_scale_multiplier() {
  let mut gl = RecordingBackend::new();
  let mut layer = resident_layer(&mut gl);
  let transform = ModelTransform::new(Mat4::IDENTITY).with_physical_scales(Vec3::splat(8.0));
  layer.display_mut().transform = Ok(transform);

  layer.draw(&mut gl, &mut far());
  let buckets: Vec<u8> = layer.histogram().iter().map(|((s, _), _)| s).collect();
  assert_eq!(buckets, vec![scale_bucket(2.0 * transform.scale_multiplier())]);
}

// =========================================================================
// Queries
// =========================================================================

#[test]
fn test_desired_fragment_keys_follow_view() {
  let mut gl = RecordingBackend::new();
  let layer = layer_with(&mut gl, false, LayerConfig::default(), |_| false);

  let near_keys = layer.desired_fragment_keys(&near());
  assert_eq!(near_keys.len(), 9);
  assert_eq!(near_keys[0].0, "1/1/8");
  assert!(near_keys.iter().all(|(_, scale)| *scale > 0.0));

  let far_keys: Vec<String> = layer
    .desired_fragment_keys(&far())
    .into_iter()
    .map(|(k, _)| k)
    .collect();
  assert_eq!(far_keys, vec!["1/1/8"]);
}

#[test]
fn test_object_position_is_transformed_bounds_center() {
  let mut gl = RecordingBackend::new();
  let mut layer = resident_layer(&mut gl);
  layer.display_mut().transform = Ok(ModelTransform::new(Mat4::from_translation(Vec3::new(
    10.0, 0.0, 0.0,
  ))));

  assert_eq!(layer.object_position(OBJECT), Some(Vec3::new(11.0, 1.0, 1.0)));
  assert_eq!(layer.object_position(ObjectId(5)), None);
}

#[test]
fn test_dispose_releases_everything() {
  let mut gl = RecordingBackend::new();
  let mut layer = resident_layer(&mut gl);
  assert_eq!(gl.live_buffer_count(), 27);

  layer.dispose(&mut gl);

  assert_eq!(gl.live_buffer_count(), 0);
  assert_eq!(layer.source().manifests().interest("1"), 0);
  assert_eq!(layer.source().reclaimable_fragment_keys().len(), 9);
}
