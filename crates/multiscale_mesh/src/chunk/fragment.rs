//! Mesh fragment payloads and their GPU residency.

use std::ops::Range;

use crate::chunk::{Chunk, ChunkState, GpuResident};
use crate::codec::normals::NORMAL_ATTRIBUTE_LAYOUT;
use crate::codec::vertex::{VertexPositionFormat, VertexPositions};
use crate::error::{MeshError, Result};
use crate::gpu::{BufferHandle, BufferTarget, BufferUsage, GpuBackend, IndexFormat, PrimitiveMode};
use crate::shader::names;

/// Number of octant sub-chunks in a multiscale fragment.
pub const SUB_CHUNK_COUNT: u8 = 8;

/// Index array of one fragment.
#[derive(Clone, Debug, PartialEq)]
pub enum Indices {
  Uint16(Vec<u16>),
  Uint32(Vec<u32>),
}

impl Indices {
  #[inline]
  pub fn len(&self) -> usize {
    match self {
      Indices::Uint16(values) => values.len(),
      Indices::Uint32(values) => values.len(),
    }
  }

  #[inline]
  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  pub fn format(&self) -> IndexFormat {
    match self {
      Indices::Uint16(_) => IndexFormat::Uint16,
      Indices::Uint32(_) => IndexFormat::Uint32,
    }
  }

  pub fn as_bytes(&self) -> &[u8] {
    match self {
      Indices::Uint16(values) => bytemuck::cast_slice(values),
      Indices::Uint32(values) => bytemuck::cast_slice(values),
    }
  }

  /// Largest index value, if any.
  pub fn max_index(&self) -> Option<u32> {
    match self {
      Indices::Uint16(values) => values.iter().copied().max().map(u32::from),
      Indices::Uint32(values) => values.iter().copied().max(),
    }
  }
}

/// Decoded geometry of one fragment.
#[derive(Clone, Debug, PartialEq)]
pub struct FragmentData {
  pub vertex_positions: VertexPositions,
  /// Octahedron-encoded normals, two snorm8 bytes per vertex.
  pub vertex_normals: Vec<u8>,
  pub indices: Indices,
  /// Indices form one triangle strip rather than a triangle list.
  pub strips: bool,
  /// Index offsets bounding the 8 octant sub-chunks (9 entries).
  /// `None` for single-resolution fragments.
  pub sub_chunk_offsets: Option<Vec<u32>>,
}

impl FragmentData {
  #[inline]
  pub fn vertex_count(&self) -> usize {
    self.vertex_positions.vertex_count()
  }

  #[inline]
  pub fn index_count(&self) -> usize {
    self.indices.len()
  }

  /// Degenerate geometry that draws nothing.
  #[inline]
  pub fn is_empty(&self) -> bool {
    self.vertex_count() == 0 || self.index_count() == 0
  }

  pub fn primitive_mode(&self) -> PrimitiveMode {
    if self.strips {
      PrimitiveMode::TriangleStrip
    } else {
      PrimitiveMode::Triangles
    }
  }

  /// Check array lengths and index bounds.
  pub fn validate(&self) -> Result<()> {
    if !self.vertex_positions.is_well_formed() {
      return Err(MeshError::InvalidFragment(
        "vertex position components are not a multiple of 3".into(),
      ));
    }
    let vertex_count = self.vertex_count();
    if self.vertex_normals.len() != vertex_count * 2 {
      return Err(MeshError::InvalidFragment(format!(
        "expected {} normal bytes for {} vertices, got {}",
        vertex_count * 2,
        vertex_count,
        self.vertex_normals.len()
      )));
    }
    if let Some(max) = self.indices.max_index() {
      if max as usize >= vertex_count {
        return Err(MeshError::InvalidFragment(format!(
          "index {max} out of range for {vertex_count} vertices"
        )));
      }
    }
    if let Some(offsets) = &self.sub_chunk_offsets {
      if offsets.len() != SUB_CHUNK_COUNT as usize + 1 {
        return Err(MeshError::InvalidFragment(format!(
          "expected {} sub-chunk offsets, got {}",
          SUB_CHUNK_COUNT + 1,
          offsets.len()
        )));
      }
      if offsets.windows(2).any(|pair| pair[0] > pair[1]) {
        return Err(MeshError::InvalidFragment("sub-chunk offsets decrease".into()));
      }
      if offsets[SUB_CHUNK_COUNT as usize] as usize > self.index_count() {
        return Err(MeshError::InvalidFragment(
          "sub-chunk offsets exceed index count".into(),
        ));
      }
    }
    Ok(())
  }

  /// Index range covering sub-chunks `begin..end`.
  ///
  /// Fragments without sub-chunk offsets act as a single sub-chunk: any
  /// non-empty request draws every index.
  pub fn index_range(&self, begin: u8, end: u8) -> Range<u32> {
    if begin >= end {
      return 0..0;
    }
    match &self.sub_chunk_offsets {
      Some(offsets) => {
        let last = offsets.len().saturating_sub(1);
        let b = (begin as usize).min(last);
        let e = (end as usize).min(last);
        offsets[b]..offsets[e]
      }
      None => 0..self.index_count() as u32,
    }
  }
}

/// The three GPU buffers of a resident fragment.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct FragmentBuffers {
  pub vertex: BufferHandle,
  pub index: BufferHandle,
  pub normal: BufferHandle,
  bytes: usize,
}

impl FragmentBuffers {
  fn upload(gl: &mut dyn GpuBackend, data: &FragmentData) -> Self {
    let positions = data.vertex_positions.as_bytes();
    let indices = data.indices.as_bytes();
    let vertex = gl.create_buffer(BufferTarget::VertexArray, BufferUsage::Static, positions);
    let index = gl.create_buffer(BufferTarget::ElementArray, BufferUsage::Static, indices);
    let normal = gl.create_buffer(
      BufferTarget::VertexArray,
      BufferUsage::Static,
      &data.vertex_normals,
    );
    Self {
      vertex,
      index,
      normal,
      bytes: positions.len() + indices.len() + data.vertex_normals.len(),
    }
  }

  fn release(self, gl: &mut dyn GpuBackend) {
    gl.delete_buffer(self.vertex);
    gl.delete_buffer(self.index);
    gl.delete_buffer(self.normal);
  }

  #[inline]
  pub fn byte_size(&self) -> usize {
    self.bytes
  }
}

/// A fragment chunk: payload plus optional GPU buffers.
///
/// Buffers are exposed only while the chunk is in `GpuMemory`.
#[derive(Debug)]
pub struct FragmentChunk {
  data: FragmentData,
  state: ChunkState,
  buffers: Option<FragmentBuffers>,
}

impl FragmentChunk {
  pub fn new(data: FragmentData) -> Result<Self> {
    data.validate()?;
    Ok(Self {
      data,
      state: ChunkState::SystemMemory,
      buffers: None,
    })
  }

  #[inline]
  pub fn data(&self) -> &FragmentData {
    &self.data
  }

  pub fn gpu_buffers(&self) -> Option<&FragmentBuffers> {
    match self.state {
      ChunkState::GpuMemory => self.buffers.as_ref(),
      _ => None,
    }
  }

  /// Bind this fragment's buffers and draw sub-chunks `begin..end`.
  ///
  /// Returns false when nothing was drawn: the chunk is not on the GPU, the
  /// payload does not match `format`, or the range is empty.
  pub fn draw(
    &self,
    gl: &mut dyn GpuBackend,
    format: VertexPositionFormat,
    begin: u8,
    end: u8,
  ) -> bool {
    let Some(buffers) = self.gpu_buffers() else {
      return false;
    };
    if !self.data.vertex_positions.matches_format(format) {
      return false;
    }
    let range = self.data.index_range(begin, end);
    if range.is_empty() || self.data.vertex_count() == 0 {
      return false;
    }
    gl.bind_attribute(names::ATTR_VERTEX_POSITION, buffers.vertex, format.attribute_layout());
    gl.bind_attribute(names::ATTR_VERTEX_NORMAL, buffers.normal, NORMAL_ATTRIBUTE_LAYOUT);
    gl.bind_index_buffer(buffers.index);
    gl.draw_elements(
      self.data.primitive_mode(),
      self.data.indices.format(),
      range.start,
      range.end - range.start,
    );
    true
  }
}

impl GpuResident for FragmentChunk {
  #[inline]
  fn state(&self) -> ChunkState {
    self.state
  }

  fn copy_to_gpu(&mut self, gl: &mut dyn GpuBackend) {
    if self.buffers.is_none() {
      self.buffers = Some(FragmentBuffers::upload(gl, &self.data));
    }
    self.state = ChunkState::GpuMemory;
  }

  fn free_gpu_memory(&mut self, gl: &mut dyn GpuBackend) {
    if let Some(buffers) = self.buffers.take() {
      buffers.release(gl);
    }
    if self.state == ChunkState::GpuMemory {
      self.state = ChunkState::SystemMemory;
    }
  }

  fn mark_evicted(&mut self) {
    self.state = ChunkState::Evicted;
  }

  fn gpu_memory_bytes(&self) -> usize {
    self.buffers.as_ref().map_or(0, FragmentBuffers::byte_size)
  }
}

impl Chunk for FragmentChunk {
  type Payload = FragmentData;

  fn from_payload(payload: FragmentData) -> Result<Self> {
    Self::new(payload)
  }
}

#[cfg(test)]
#[path = "fragment_test.rs"]
mod fragment_test;
