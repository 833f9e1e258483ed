//! GpuBackend - graphics-context interface for engine bridges.
//!
//! The mesh core never talks to a graphics API directly. Buffer creation,
//! shader programs, uniforms, and draw calls all go through this trait so the
//! same selection and residency logic can drive wgpu, WebGL, or a test
//! recorder.

use glam::{Mat3, Mat4, Vec3, Vec4};

use crate::error::Result;
use crate::shader::ShaderSource;

/// Opaque GPU buffer handle.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct BufferHandle(pub u32);

/// Opaque compiled shader program handle.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct ProgramHandle(pub u32);

/// Binding target class of a buffer.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum BufferTarget {
  /// Per-vertex attribute data.
  VertexArray,
  /// Index data.
  ElementArray,
}

/// Upload usage class.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum BufferUsage {
  /// Written once, drawn many times.
  Static,
}

/// Component type of a vertex attribute.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum ComponentType {
  Float32,
  Uint16,
  Uint32,
  Int8,
}

/// How a vertex attribute is read from its buffer.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct AttributeLayout {
  /// Components per vertex.
  pub components: u8,
  pub component_type: ComponentType,
  /// Integer components are mapped to [0, 1] (unsigned) or [-1, 1] (signed).
  pub normalized: bool,
  /// Components are read as raw integers (no float conversion).
  pub integer: bool,
}

/// Index element width.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum IndexFormat {
  Uint16,
  Uint32,
}

impl IndexFormat {
  /// Bytes per index.
  #[inline]
  pub fn byte_size(&self) -> u32 {
    match self {
      IndexFormat::Uint16 => 2,
      IndexFormat::Uint32 => 4,
    }
  }
}

/// Primitive assembly mode.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum PrimitiveMode {
  Triangles,
  TriangleStrip,
}

/// Uniform value passed by name.
#[derive(Clone, Copy, PartialEq, Debug)]
pub enum UniformValue {
  Float(f32),
  Uint(u32),
  Vec3(Vec3),
  Vec4(Vec4),
  Mat3(Mat3),
  Mat4(Mat4),
}

/// Graphics-context interface.
///
/// Implementations run on the rendering thread only.
pub trait GpuBackend {
  /// Allocate a buffer and upload `data` into it.
  fn create_buffer(&mut self, target: BufferTarget, usage: BufferUsage, data: &[u8])
    -> BufferHandle;

  /// Release a buffer. The handle must not be used afterwards.
  fn delete_buffer(&mut self, buffer: BufferHandle);

  /// Compile and link a shader program.
  fn compile_program(&mut self, source: &ShaderSource) -> Result<ProgramHandle>;

  /// Make `program` current for subsequent uniform and draw calls.
  fn use_program(&mut self, program: ProgramHandle);

  fn set_uniform(&mut self, name: &str, value: UniformValue);

  fn bind_attribute(&mut self, name: &str, buffer: BufferHandle, layout: AttributeLayout);

  fn bind_index_buffer(&mut self, buffer: BufferHandle);

  /// Draw `count` indices starting at index `first` of the bound index buffer.
  fn draw_elements(&mut self, mode: PrimitiveMode, format: IndexFormat, first: u32, count: u32);
}

/// Backend that hands out handles and discards everything else.
///
/// Useful for headless runs and benchmarks.
#[derive(Default)]
pub struct HeadlessBackend {
  next_handle: u32,
  /// Draw calls issued so far.
  pub draw_calls: usize,
}

impl HeadlessBackend {
  pub fn new() -> Self {
    Self::default()
  }

  fn next(&mut self) -> u32 {
    self.next_handle += 1;
    self.next_handle
  }
}

impl GpuBackend for HeadlessBackend {
  fn create_buffer(
    &mut self,
    _target: BufferTarget,
    _usage: BufferUsage,
    _data: &[u8],
  ) -> BufferHandle {
    BufferHandle(self.next())
  }

  fn delete_buffer(&mut self, _buffer: BufferHandle) {}

  fn compile_program(&mut self, _source: &ShaderSource) -> Result<ProgramHandle> {
    Ok(ProgramHandle(self.next()))
  }

  fn use_program(&mut self, _program: ProgramHandle) {}

  fn set_uniform(&mut self, _name: &str, _value: UniformValue) {}

  fn bind_attribute(&mut self, _name: &str, _buffer: BufferHandle, _layout: AttributeLayout) {}

  fn bind_index_buffer(&mut self, _buffer: BufferHandle) {}

  fn draw_elements(&mut self, _mode: PrimitiveMode, _format: IndexFormat, _first: u32, _count: u32) {
    self.draw_calls += 1;
  }
}
