//! Vertex position and normal encodings.
//!
//! Each encoding has three faces that must agree:
//! - a WGSL decode routine the mesh shaders call,
//! - an attribute layout telling the backend how to read the buffer,
//! - a CPU reference decoder used for geometry queries and diagnostics.

pub mod normals;
pub mod vertex;

pub use normals::{
  decode_normal_octahedron, decode_normal_octahedron_snorm8, encode_normal_octahedron,
  encode_normals_octahedron, NORMAL_ATTRIBUTE_LAYOUT,
};
pub use vertex::{pack_vertex_positions_uint10, VertexPositionFormat, VertexPositions};
