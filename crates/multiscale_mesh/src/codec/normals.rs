//! Octahedron normal encoding.
//!
//! Unit normals are projected onto the octahedron `|x| + |y| + |z| = 1`, the
//! lower hemisphere is folded over the diagonals, and the resulting square is
//! stored as two signed 8-bit components.

use glam::{Vec2, Vec3};

use crate::gpu::{AttributeLayout, ComponentType};
use crate::growable::GrowableArray;

/// Two normalized signed bytes per vertex.
pub const NORMAL_ATTRIBUTE_LAYOUT: AttributeLayout = AttributeLayout {
  components: 2,
  component_type: ComponentType::Int8,
  normalized: true,
  integer: false,
};

/// WGSL decode routine. Input is already snorm-normalized by the attribute
/// fetch, i.e. `max(byte / 127, -1)`.
pub const NORMAL_DECODE_WGSL: &str = r#"
fn decode_normal_octahedron(e: vec2<f32>) -> vec3<f32> {
  var v = vec3<f32>(e.x, e.y, 1.0 - abs(e.x) - abs(e.y));
  if (v.z < 0.0) {
    v = vec3<f32>((1.0 - abs(v.y)) * sign(v.x), (1.0 - abs(v.x)) * sign(v.y), v.z);
  }
  return normalize(v);
}
"#;

/// Shader `sign`: zero maps to zero.
#[inline]
fn shader_sign(x: f32) -> f32 {
  if x > 0.0 {
    1.0
  } else if x < 0.0 {
    -1.0
  } else {
    0.0
  }
}

#[inline]
fn sign_not_zero(x: f32) -> f32 {
  if x >= 0.0 {
    1.0
  } else {
    -1.0
  }
}

/// Snorm8 fetch: bytes >= 128 are negative, and -128 clamps to -1.
#[inline]
pub fn snorm8_to_float(byte: u8) -> f32 {
  ((byte as i8) as f32 / 127.0).max(-1.0)
}

#[inline]
pub fn float_to_snorm8(value: f32) -> u8 {
  (value.clamp(-1.0, 1.0) * 127.0).round() as i8 as u8
}

/// Decode an octahedron-encoded normal with components in [-1, 1].
///
/// Mirrors [`NORMAL_DECODE_WGSL`] operation for operation.
pub fn decode_normal_octahedron(e: Vec2) -> Vec3 {
  let mut v = Vec3::new(e.x, e.y, 1.0 - e.x.abs() - e.y.abs());
  if v.z < 0.0 {
    let x = (1.0 - v.y.abs()) * shader_sign(v.x);
    let y = (1.0 - v.x.abs()) * shader_sign(v.y);
    v.x = x;
    v.y = y;
  }
  v.normalize()
}

/// Decode the two stored bytes of one vertex normal.
#[inline]
pub fn decode_normal_octahedron_snorm8(b0: u8, b1: u8) -> Vec3 {
  decode_normal_octahedron(Vec2::new(snorm8_to_float(b0), snorm8_to_float(b1)))
}

/// Encode a normal into two snorm8 bytes.
///
/// A zero vector encodes as +Z.
pub fn encode_normal_octahedron(normal: Vec3) -> [u8; 2] {
  let l1 = normal.x.abs() + normal.y.abs() + normal.z.abs();
  if !(l1 > 0.0) || !l1.is_finite() {
    return [0, 0];
  }
  let mut p = Vec2::new(normal.x / l1, normal.y / l1);
  if normal.z < 0.0 {
    p = Vec2::new(
      (1.0 - p.y.abs()) * sign_not_zero(p.x),
      (1.0 - p.x.abs()) * sign_not_zero(p.y),
    );
  }
  [float_to_snorm8(p.x), float_to_snorm8(p.y)]
}

/// Encode a normal array into the 2-bytes-per-vertex wire layout.
pub fn encode_normals_octahedron(normals: &[Vec3]) -> Vec<u8> {
  let mut out = GrowableArray::with_capacity(normals.len() * 2);
  for normal in normals {
    out.extend_from_slice(&encode_normal_octahedron(*normal));
  }
  out.into_vec()
}

#[cfg(test)]
#[path = "normals_test.rs"]
mod normals_test;
