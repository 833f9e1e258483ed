use glam::Vec3;

use super::*;
use crate::chunk::ManifestPayload;
use crate::codec::VertexPositionFormat;
use crate::config::LayerConfig;
use crate::source::{MeshSource, MultiscaleMeshSource};
use crate::test_utils::{
  context_from, cube_fragment, identity_display, load, octant_fragment, two_level_manifest,
  RecordingBackend,
};

const OBJECT: ObjectId = ObjectId(1);

fn single_layer(gl: &mut RecordingBackend) -> AnyMeshLayer {
  let mut source = MeshSource::new(VertexPositionFormat::Float32);
  load(
    source.manifests_mut(),
    gl,
    "1",
    ManifestPayload {
      fragment_ids: vec!["a".into()],
    },
    false,
  );
  load(source.fragments_mut().chunks_mut(), gl, "1/a", cube_fragment(), true);
  MeshLayer::new(source, identity_display(), LayerConfig::default()).into()
}

fn multiscale_layer(gl: &mut RecordingBackend) -> AnyMeshLayer {
  let mut source = MultiscaleMeshSource::new(VertexPositionFormat::Float32, false);
  load(source.manifests_mut(), gl, "1", two_level_manifest(), false);
  load(source.fragments_mut().chunks_mut(), gl, "1/1/8", octant_fragment(), true);
  MultiscaleMeshLayer::new(source, identity_display(), LayerConfig::default()).into()
}

// =========================================================================
// Dispatch
// =========================================================================

#[test]
fn test_single_layer_dispatch() {
  let mut gl = RecordingBackend::new();
  let mut layer = single_layer(&mut gl);
  let mut ctx = context_from(Vec3::ZERO, 10.0);
  layer.set_visible_segments([OBJECT]);

  assert_eq!(layer.poll_updates(&mut gl), 0);
  assert!(layer.is_ready(&ctx));
  let stats = layer.draw(&mut gl, &mut ctx);
  assert_eq!(stats.draw_calls, 1);
  assert_eq!(layer.histogram().totals().present, 1);
  assert_eq!(
    layer.object_position(OBJECT, Vec3::splat(5.0)),
    Some(Vec3::ONE)
  );

  layer.dispose(&mut gl);
  assert!(layer.display().visible_segments().is_empty());
  assert_eq!(gl.live_buffer_count(), 0);
}

#[test]
fn test_multiscale_layer_dispatch() {
  let mut gl = RecordingBackend::new();
  let mut layer = multiscale_layer(&mut gl);
  let mut ctx = context_from(Vec3::ONE, 5000.0);
  layer.set_visible_segments([OBJECT]);

  assert!(layer.is_ready(&ctx));
  let stats = layer.draw(&mut gl, &mut ctx);
  assert_eq!(stats.draw_calls, 1);
  assert_eq!(layer.histogram().totals().present, 1);
  // Multiscale layers ignore the hint and report the bounds center.
  assert_eq!(
    layer.object_position(OBJECT, Vec3::splat(-100.0)),
    Some(Vec3::ONE)
  );

  layer.dispose(&mut gl);
  assert!(layer.display().visible_segments().is_empty());
  assert_eq!(gl.live_buffer_count(), 0);
}

/// Display changes made through the wrapper reach the inner layer.
#[test]
fn test_display_mut_reaches_inner_layer() {
  let mut gl = RecordingBackend::new();
  let mut layer = multiscale_layer(&mut gl);
  layer.set_visible_segments([OBJECT]);
  layer.display_mut().object_alpha = 0.0;

  let stats = layer.draw(&mut gl, &mut context_from(Vec3::ONE, 5000.0));
  assert_eq!(stats.objects_drawn, 0);
  assert_eq!(gl.draw_count(), 0);
}
