//! Vertex position encodings.
//!
//! - `Float32`: three f32 components.
//! - `Uint16`: three u16 components, optionally normalized to [0, 1].
//! - `Uint10`: one u32 holding three 10-bit fields (x in bits 0-9, y in
//!   10-19, z in 20-29), each divided by 1023.

use glam::Vec3;

use crate::gpu::{AttributeLayout, ComponentType};
use crate::growable::GrowableArray;

/// Largest value of a 10-bit field.
pub const UINT10_MAX: u32 = 1023;

/// Vertex position encoding, fixed per mesh source.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum VertexPositionFormat {
  Float32,
  Uint16 { normalized: bool },
  Uint10,
}

impl VertexPositionFormat {
  /// How the backend should fetch the position attribute.
  pub fn attribute_layout(&self) -> AttributeLayout {
    match self {
      VertexPositionFormat::Float32 => AttributeLayout {
        components: 3,
        component_type: ComponentType::Float32,
        normalized: false,
        integer: false,
      },
      VertexPositionFormat::Uint16 { normalized } => AttributeLayout {
        components: 3,
        component_type: ComponentType::Uint16,
        normalized: *normalized,
        integer: false,
      },
      VertexPositionFormat::Uint10 => AttributeLayout {
        components: 1,
        component_type: ComponentType::Uint32,
        normalized: false,
        integer: true,
      },
    }
  }

  #[inline]
  pub fn bytes_per_vertex(&self) -> usize {
    match self {
      VertexPositionFormat::Float32 => 12,
      VertexPositionFormat::Uint16 { .. } => 6,
      VertexPositionFormat::Uint10 => 4,
    }
  }

  /// WGSL type of the raw position attribute.
  pub fn wgsl_attribute_type(&self) -> &'static str {
    match self {
      VertexPositionFormat::Uint10 => "u32",
      _ => "vec3<f32>",
    }
  }

  /// WGSL `get_vertex_position(raw)` routine for this encoding.
  pub fn vertex_position_wgsl(&self) -> &'static str {
    match self {
      VertexPositionFormat::Uint10 => {
        r#"
fn get_vertex_position(raw: u32) -> vec3<f32> {
  return vec3<f32>(
    f32(raw & 1023u),
    f32((raw >> 10u) & 1023u),
    f32((raw >> 20u) & 1023u)) / 1023.0;
}
"#
      }
      // Float and normalized integer components arrive as floats already.
      _ => {
        r#"
fn get_vertex_position(raw: vec3<f32>) -> vec3<f32> {
  return raw;
}
"#
      }
    }
  }
}

/// Encoded vertex positions of one fragment.
#[derive(Clone, Debug, PartialEq)]
pub enum VertexPositions {
  Float32(Vec<f32>),
  Uint16(Vec<u16>),
  Uint10(Vec<u32>),
}

impl VertexPositions {
  pub fn vertex_count(&self) -> usize {
    match self {
      VertexPositions::Float32(values) => values.len() / 3,
      VertexPositions::Uint16(values) => values.len() / 3,
      VertexPositions::Uint10(values) => values.len(),
    }
  }

  /// True when the array layout is usable with `format`.
  pub fn matches_format(&self, format: VertexPositionFormat) -> bool {
    matches!(
      (self, format),
      (VertexPositions::Float32(_), VertexPositionFormat::Float32)
        | (VertexPositions::Uint16(_), VertexPositionFormat::Uint16 { .. })
        | (VertexPositions::Uint10(_), VertexPositionFormat::Uint10)
    )
  }

  /// True when the component count is a whole number of vertices.
  pub fn is_well_formed(&self) -> bool {
    match self {
      VertexPositions::Float32(values) => values.len() % 3 == 0,
      VertexPositions::Uint16(values) => values.len() % 3 == 0,
      VertexPositions::Uint10(_) => true,
    }
  }

  /// Raw bytes for upload.
  pub fn as_bytes(&self) -> &[u8] {
    match self {
      VertexPositions::Float32(values) => bytemuck::cast_slice(values),
      VertexPositions::Uint16(values) => bytemuck::cast_slice(values),
      VertexPositions::Uint10(values) => bytemuck::cast_slice(values),
    }
  }

  /// CPU reference decode of vertex `index`, matching the shader routine.
  ///
  /// `format` only contributes the `Uint16` normalization flag.
  pub fn position(&self, index: usize, format: VertexPositionFormat) -> Vec3 {
    match self {
      VertexPositions::Float32(values) => Vec3::from_slice(&values[index * 3..index * 3 + 3]),
      VertexPositions::Uint16(values) => {
        let raw = Vec3::new(
          values[index * 3] as f32,
          values[index * 3 + 1] as f32,
          values[index * 3 + 2] as f32,
        );
        match format {
          VertexPositionFormat::Uint16 { normalized: true } => raw / u16::MAX as f32,
          _ => raw,
        }
      }
      VertexPositions::Uint10(values) => {
        let [x, y, z] = unpack_uint10(values[index]);
        Vec3::new(x as f32, y as f32, z as f32) / UINT10_MAX as f32
      }
    }
  }
}

/// Pack three 10-bit fields into one word.
#[inline]
pub fn pack_uint10(fields: [u32; 3]) -> u32 {
  (fields[0] & UINT10_MAX) | ((fields[1] & UINT10_MAX) << 10) | ((fields[2] & UINT10_MAX) << 20)
}

#[inline]
pub fn unpack_uint10(word: u32) -> [u32; 3] {
  [word & UINT10_MAX, (word >> 10) & UINT10_MAX, (word >> 20) & UINT10_MAX]
}

/// Quantize positions in [0, 1]^3 into packed 10-10-10 words.
pub fn pack_vertex_positions_uint10(positions: &[Vec3]) -> Vec<u32> {
  let mut out = GrowableArray::with_capacity(positions.len());
  for p in positions {
    let q = (p.clamp(Vec3::ZERO, Vec3::ONE) * UINT10_MAX as f32).round();
    out.push(pack_uint10([q.x as u32, q.y as u32, q.z as u32]));
  }
  out.into_vec()
}

#[cfg(test)]
#[path = "vertex_test.rs"]
mod vertex_test;
