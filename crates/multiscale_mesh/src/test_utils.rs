//! Test utilities: a recording GPU backend and fixture builders.

use std::collections::HashSet;

use glam::{Mat4, UVec3, Vec3};

use crate::chunk::{Chunk, ChunkSource, ChunkUpdate, FragmentData, Indices};
use crate::codec::{encode_normals_octahedron, VertexPositions};
use crate::error::{MeshError, Result};
use crate::gpu::{
  AttributeLayout, BufferHandle, BufferTarget, BufferUsage, GpuBackend, IndexFormat,
  PrimitiveMode, ProgramHandle, UniformValue,
};
use crate::octree::{MultiscaleManifest, ViewParams, EMPTY_BIT};
use crate::render::{DisplayState, ModelTransform, RenderContext};
use crate::shader::ShaderSource;

// =============================================================================
// Recording backend
// =============================================================================

/// One recorded backend call.
#[derive(Clone, Debug, PartialEq)]
pub enum GpuCall {
  CreateBuffer {
    buffer: BufferHandle,
    target: BufferTarget,
    bytes: usize,
  },
  DeleteBuffer(BufferHandle),
  CompileProgram(ProgramHandle),
  UseProgram(ProgramHandle),
  SetUniform(String, UniformValue),
  BindAttribute(String, BufferHandle, AttributeLayout),
  BindIndexBuffer(BufferHandle),
  Draw {
    mode: PrimitiveMode,
    format: IndexFormat,
    first: u32,
    count: u32,
  },
}

/// Backend that records every call.
///
/// Panics when a deleted buffer is bound, or when a buffer is deleted twice.
#[derive(Default)]
pub struct RecordingBackend {
  next_handle: u32,
  live: HashSet<BufferHandle>,
  deleted: HashSet<BufferHandle>,
  pub calls: Vec<GpuCall>,
  /// Make every compile fail.
  pub fail_compile: bool,
}

impl RecordingBackend {
  pub fn new() -> Self {
    Self::default()
  }

  fn next(&mut self) -> u32 {
    self.next_handle += 1;
    self.next_handle
  }

  fn assert_live(&self, buffer: BufferHandle) {
    assert!(
      !self.deleted.contains(&buffer),
      "buffer {buffer:?} used after release"
    );
    assert!(self.live.contains(&buffer), "unknown buffer {buffer:?}");
  }

  pub fn live_buffer_count(&self) -> usize {
    self.live.len()
  }

  pub fn created_buffers(&self) -> Vec<BufferHandle> {
    self
      .calls
      .iter()
      .filter_map(|call| match call {
        GpuCall::CreateBuffer { buffer, .. } => Some(*buffer),
        _ => None,
      })
      .collect()
  }

  pub fn deleted_buffers(&self) -> Vec<BufferHandle> {
    self
      .calls
      .iter()
      .filter_map(|call| match call {
        GpuCall::DeleteBuffer(buffer) => Some(*buffer),
        _ => None,
      })
      .collect()
  }

  /// `(first, count)` of every draw, in order.
  pub fn draws(&self) -> Vec<(u32, u32)> {
    self
      .calls
      .iter()
      .filter_map(|call| match call {
        GpuCall::Draw { first, count, .. } => Some((*first, *count)),
        _ => None,
      })
      .collect()
  }

  pub fn draw_count(&self) -> usize {
    self.draws().len()
  }

  pub fn compile_count(&self) -> usize {
    self
      .calls
      .iter()
      .filter(|call| matches!(call, GpuCall::CompileProgram(_)))
      .count()
  }

  /// Every value set for uniform `name`, in order.
  pub fn uniform_values(&self, name: &str) -> Vec<UniformValue> {
    self
      .calls
      .iter()
      .filter_map(|call| match call {
        GpuCall::SetUniform(uniform, value) if uniform == name => Some(*value),
        _ => None,
      })
      .collect()
  }

  pub fn clear_calls(&mut self) {
    self.calls.clear();
  }
}

impl GpuBackend for RecordingBackend {
  fn create_buffer(&mut self, target: BufferTarget, _usage: BufferUsage, data: &[u8]) -> BufferHandle {
    let buffer = BufferHandle(self.next());
    self.live.insert(buffer);
    self.calls.push(GpuCall::CreateBuffer {
      buffer,
      target,
      bytes: data.len(),
    });
    buffer
  }

  fn delete_buffer(&mut self, buffer: BufferHandle) {
    assert!(self.live.remove(&buffer), "buffer {buffer:?} released twice");
    self.deleted.insert(buffer);
    self.calls.push(GpuCall::DeleteBuffer(buffer));
  }

  fn compile_program(&mut self, _source: &ShaderSource) -> Result<ProgramHandle> {
    if self.fail_compile {
      return Err(MeshError::ShaderCompile("rejected by test backend".into()));
    }
    let program = ProgramHandle(self.next());
    self.calls.push(GpuCall::CompileProgram(program));
    Ok(program)
  }

  fn use_program(&mut self, program: ProgramHandle) {
    self.calls.push(GpuCall::UseProgram(program));
  }

  fn set_uniform(&mut self, name: &str, value: UniformValue) {
    self.calls.push(GpuCall::SetUniform(name.to_owned(), value));
  }

  fn bind_attribute(&mut self, name: &str, buffer: BufferHandle, layout: AttributeLayout) {
    self.assert_live(buffer);
    self
      .calls
      .push(GpuCall::BindAttribute(name.to_owned(), buffer, layout));
  }

  fn bind_index_buffer(&mut self, buffer: BufferHandle) {
    self.assert_live(buffer);
    self.calls.push(GpuCall::BindIndexBuffer(buffer));
  }

  fn draw_elements(&mut self, mode: PrimitiveMode, format: IndexFormat, first: u32, count: u32) {
    self.calls.push(GpuCall::Draw {
      mode,
      format,
      first,
      count,
    });
  }
}

// =============================================================================
// Fragment fixtures
// =============================================================================

/// Corners of the unit cube, in octant order.
pub fn unit_cube_corners() -> Vec<Vec3> {
  (0..8u32)
    .map(|i| Vec3::new((i & 1) as f32, ((i >> 1) & 1) as f32, ((i >> 2) & 1) as f32))
    .collect()
}

/// Unit cube: 8 float vertices, 12 triangles, no sub-chunks.
pub fn cube_fragment() -> FragmentData {
  cube_fragment_at(Vec3::ZERO, 1.0)
}

/// Cube with its lower corner at `origin` and edge `size`.
pub fn cube_fragment_at(origin: Vec3, size: f32) -> FragmentData {
  let corners = unit_cube_corners();
  let positions: Vec<f32> = corners
    .iter()
    .flat_map(|c| (origin + *c * size).to_array())
    .collect();
  let normals: Vec<Vec3> = corners
    .iter()
    .map(|c| (*c - Vec3::splat(0.5)).normalize())
    .collect();
  #[rustfmt::skip]
  let indices: Vec<u16> = vec![
    0, 2, 1, 1, 2, 3, // -z
    4, 5, 6, 5, 7, 6, // +z
    0, 1, 4, 1, 5, 4, // -y
    2, 6, 3, 3, 6, 7, // +y
    0, 4, 2, 2, 4, 6, // -x
    1, 3, 5, 3, 7, 5, // +x
  ];
  FragmentData {
    vertex_positions: VertexPositions::Float32(positions),
    vertex_normals: encode_normals_octahedron(&normals),
    indices: Indices::Uint16(indices),
    strips: false,
    sub_chunk_offsets: None,
  }
}

/// Multiscale fragment with one triangle per sub-chunk (offsets 0, 3, .., 24).
pub fn octant_fragment() -> FragmentData {
  FragmentData {
    vertex_positions: VertexPositions::Float32(vec![
      0.0, 0.0, 0.0, //
      1.0, 0.0, 0.0, //
      0.0, 1.0, 0.0,
    ]),
    vertex_normals: encode_normals_octahedron(&[Vec3::Z; 3]),
    indices: Indices::Uint32((0..8).flat_map(|_| [0u32, 1, 2]).collect()),
    strips: false,
    sub_chunk_offsets: Some((0..=8).map(|i| i * 3).collect()),
  }
}

/// Fragment with no geometry.
pub fn empty_fragment() -> FragmentData {
  FragmentData {
    vertex_positions: VertexPositions::Float32(Vec::new()),
    vertex_normals: Vec::new(),
    indices: Indices::Uint16(Vec::new()),
    strips: false,
    sub_chunk_offsets: None,
  }
}

// =============================================================================
// Manifest fixtures
// =============================================================================

/// Complete octree with `levels` LODs over a unit chunk grid.
///
/// Rows are laid out finest LOD first; each parent's 8 children are
/// contiguous and in octant order. LOD scales are `2^lod`.
pub fn full_octree_manifest(levels: u32) -> MultiscaleManifest {
  assert!(levels > 0);
  let root_lod = levels - 1;
  // levels_grid[lod] lists the grid positions at that LOD in row order.
  let mut levels_grid: Vec<Vec<UVec3>> = vec![Vec::new(); levels as usize];
  levels_grid[root_lod as usize].push(UVec3::ZERO);
  for lod in (1..=root_lod).rev() {
    let parents = levels_grid[lod as usize].clone();
    let children = &mut levels_grid[lod as usize - 1];
    for parent in parents {
      for octant in 0..8u32 {
        children.push(parent * 2 + UVec3::new(octant & 1, (octant >> 1) & 1, (octant >> 2) & 1));
      }
    }
  }

  let mut offsets = Vec::with_capacity(levels as usize);
  let mut total = 0u32;
  for grid in &levels_grid {
    offsets.push(total);
    total += grid.len() as u32;
  }

  let mut octree = Vec::with_capacity(total as usize * 5);
  for (lod, grid) in levels_grid.iter().enumerate() {
    for (i, g) in grid.iter().enumerate() {
      let (begin, end) = if lod == 0 {
        (0, 0)
      } else {
        let begin = offsets[lod - 1] + i as u32 * 8;
        (begin, begin + 8)
      };
      octree.extend_from_slice(&[g.x, g.y, g.z, begin, end]);
    }
  }

  let extent = (root_lod as f32).exp2();
  MultiscaleManifest {
    octree,
    chunk_shape: Vec3::ONE,
    chunk_grid_spatial_origin: Vec3::ZERO,
    lod_scales: (0..levels).map(|lod| (lod as f32).exp2()).collect(),
    vertex_offsets: vec![0.0; levels as usize * 3],
    clip_lower_bound: Vec3::ZERO,
    clip_upper_bound: Vec3::splat(extent),
  }
}

/// Root at LOD 1 with 8 LOD-0 children in rows 0..8.
pub fn two_level_manifest() -> MultiscaleManifest {
  full_octree_manifest(2)
}

/// Mark row `row` of `manifest` as having no mesh.
pub fn mark_empty(manifest: &mut MultiscaleManifest, row: usize) {
  manifest.octree[row * 5 + 4] |= EMPTY_BIT;
}

// =============================================================================
// Cameras
// =============================================================================

pub const VIEWPORT: f32 = 800.0;

/// Perspective camera on +Z looking at `target` from `distance`.
pub fn camera_matrix(target: Vec3, distance: f32) -> Mat4 {
  let view = Mat4::look_at_rh(target + Vec3::new(0.0, 0.0, distance), target, Vec3::Y);
  let projection = Mat4::perspective_rh(60f32.to_radians(), 1.0, 0.1, 100_000.0);
  projection * view
}

/// View params for [`camera_matrix`] with detail cutoff 1.
pub fn view_from(target: Vec3, distance: f32) -> ViewParams {
  ViewParams::new(camera_matrix(target, distance), 1.0, VIEWPORT, VIEWPORT)
}

/// Render context for [`camera_matrix`].
pub fn context_from(target: Vec3, distance: f32) -> RenderContext {
  RenderContext::new(camera_matrix(target, distance), VIEWPORT, VIEWPORT)
}

// =============================================================================
// Layer fixtures
// =============================================================================

/// Display state with an identity model transform.
pub fn identity_display() -> DisplayState {
  DisplayState::new(ModelTransform::new(Mat4::IDENTITY))
}

/// Deliver `payload` under `key`, optionally promoting it to the GPU.
pub fn load<C: Chunk>(
  source: &mut ChunkSource<C>,
  gl: &mut dyn GpuBackend,
  key: &str,
  payload: C::Payload,
  on_gpu: bool,
) {
  source
    .apply(
      gl,
      ChunkUpdate::Loaded {
        key: key.into(),
        payload,
      },
    )
    .expect("valid payload");
  if on_gpu {
    source
      .apply(gl, ChunkUpdate::MoveToGpu { key: key.into() })
      .expect("loaded chunk");
  }
}
