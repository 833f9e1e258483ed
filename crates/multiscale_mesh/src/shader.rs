//! Mesh shader assembly and program memoization.
//!
//! Programs are keyed by [`ShaderKey`]; a layer only triggers a compile when
//! its configuration changes to a combination it has not drawn with before.

use std::collections::HashMap;

use tracing::debug;

use crate::codec::normals::NORMAL_DECODE_WGSL;
use crate::codec::VertexPositionFormat;
use crate::error::Result;
use crate::gpu::{GpuBackend, ProgramHandle};

/// Attribute and uniform names shared by the shader text and the layers.
pub mod names {
  pub const ATTR_VERTEX_POSITION: &str = "vertex_position";
  pub const ATTR_VERTEX_NORMAL: &str = "vertex_normal";

  pub const U_MODEL_VIEW_PROJECTION: &str = "u_model_view_projection";
  pub const U_NORMAL_MATRIX: &str = "u_normal_matrix";
  pub const U_LIGHT_DIRECTION: &str = "u_light_direction";
  pub const U_COLOR: &str = "u_color";
  pub const U_PICK_ID: &str = "u_pick_id";
  pub const U_SILHOUETTE_POWER: &str = "u_silhouette_power";
  pub const U_FRAGMENT_ORIGIN: &str = "u_fragment_origin";
  pub const U_FRAGMENT_SHAPE: &str = "u_fragment_shape";
}

/// Configuration a mesh program is specialized on.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct ShaderKey {
  /// Positions are fragment-local in [0, 1] and scaled by per-fragment
  /// origin/shape uniforms.
  pub fragment_relative_vertices: bool,
  pub vertex_format: VertexPositionFormat,
  pub silhouette: bool,
}

/// Complete program source plus its declared interface.
#[derive(Clone, Debug, PartialEq)]
pub struct ShaderSource {
  pub vertex: String,
  pub fragment: String,
  /// `(name, wgsl type)` in location order.
  pub attributes: Vec<(String, String)>,
  /// `(name, wgsl type)` in struct order.
  pub uniforms: Vec<(String, String)>,
}

/// Incremental WGSL program builder.
#[derive(Default)]
pub struct ShaderBuilder {
  attributes: Vec<(String, String)>,
  uniforms: Vec<(String, String)>,
  varyings: Vec<(String, String)>,
  outputs: Vec<(String, String)>,
  vertex_code: String,
  vertex_main: String,
  fragment_main: String,
}

impl ShaderBuilder {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn add_attribute(&mut self, name: &str, wgsl_type: &str) -> &mut Self {
    self.attributes.push((name.to_owned(), wgsl_type.to_owned()));
    self
  }

  pub fn add_uniform(&mut self, name: &str, wgsl_type: &str) -> &mut Self {
    self.uniforms.push((name.to_owned(), wgsl_type.to_owned()));
    self
  }

  pub fn add_varying(&mut self, name: &str, wgsl_type: &str) -> &mut Self {
    self.varyings.push((name.to_owned(), wgsl_type.to_owned()));
    self
  }

  /// Fragment stage output, bound to the next color attachment location.
  pub fn add_output(&mut self, name: &str, wgsl_type: &str) -> &mut Self {
    self.outputs.push((name.to_owned(), wgsl_type.to_owned()));
    self
  }

  /// Helper functions available to the vertex stage.
  pub fn add_vertex_code(&mut self, code: &str) -> &mut Self {
    self.vertex_code.push_str(code);
    self
  }

  /// Body of the vertex entry point. Attributes are fields of `input`,
  /// uniforms fields of `u`, and varyings fields of `out`.
  pub fn set_vertex_main(&mut self, body: &str) -> &mut Self {
    self.vertex_main = body.to_owned();
    self
  }

  /// Body of the fragment entry point. Varyings are fields of `input`.
  /// With outputs declared, the body fills and returns `out`; otherwise it
  /// returns a single `vec4<f32>` color.
  pub fn set_fragment_main(&mut self, body: &str) -> &mut Self {
    self.fragment_main = body.to_owned();
    self
  }

  fn uniform_block(&self) -> String {
    let mut block = String::from("struct Uniforms {\n");
    for (name, ty) in &self.uniforms {
      block.push_str(&format!("  {name}: {ty},\n"));
    }
    block.push_str("};\n@group(0) @binding(0) var<uniform> u: Uniforms;\n");
    block
  }

  fn varying_struct(&self) -> String {
    let mut block = String::from("struct Varyings {\n  @builtin(position) clip_position: vec4<f32>,\n");
    for (location, (name, ty)) in self.varyings.iter().enumerate() {
      // Integer varyings cannot be interpolated.
      let flat = if ty == "u32" || ty == "i32" { " @interpolate(flat)" } else { "" };
      block.push_str(&format!("  @location({location}){flat} {name}: {ty},\n"));
    }
    block.push_str("};\n");
    block
  }

  fn output_struct(&self) -> String {
    let mut block = String::from("struct FragmentOutput {\n");
    for (location, (name, ty)) in self.outputs.iter().enumerate() {
      block.push_str(&format!("  @location({location}) {name}: {ty},\n"));
    }
    block.push_str("};\n");
    block
  }

  pub fn build(&self) -> ShaderSource {
    let uniforms = self.uniform_block();
    let varyings = self.varying_struct();

    let mut vertex = String::new();
    vertex.push_str(&uniforms);
    vertex.push_str(&varyings);
    vertex.push_str("struct VertexInput {\n");
    for (location, (name, ty)) in self.attributes.iter().enumerate() {
      vertex.push_str(&format!("  @location({location}) {name}: {ty},\n"));
    }
    vertex.push_str("};\n");
    vertex.push_str(&self.vertex_code);
    vertex.push_str("\n@vertex\nfn vs_main(input: VertexInput) -> Varyings {\n  var out: Varyings;\n");
    vertex.push_str(&self.vertex_main);
    vertex.push_str("\n  return out;\n}\n");

    let mut fragment = String::new();
    fragment.push_str(&uniforms);
    fragment.push_str(&varyings);
    if self.outputs.is_empty() {
      fragment.push_str("\n@fragment\nfn fs_main(input: Varyings) -> @location(0) vec4<f32> {\n");
    } else {
      fragment.push_str(&self.output_struct());
      fragment.push_str(
        "\n@fragment\nfn fs_main(input: Varyings) -> FragmentOutput {\n  var out: FragmentOutput;\n",
      );
    }
    fragment.push_str(&self.fragment_main);
    fragment.push_str("\n}\n");

    ShaderSource {
      vertex,
      fragment,
      attributes: self.attributes.clone(),
      uniforms: self.uniforms.clone(),
    }
  }
}

/// Assemble the mesh program for `key`.
pub fn build_mesh_shader(key: &ShaderKey) -> ShaderSource {
  use names::*;

  let mut builder = ShaderBuilder::new();
  builder
    .add_attribute(ATTR_VERTEX_POSITION, key.vertex_format.wgsl_attribute_type())
    .add_attribute(ATTR_VERTEX_NORMAL, "vec2<f32>")
    .add_uniform(U_MODEL_VIEW_PROJECTION, "mat4x4<f32>")
    .add_uniform(U_NORMAL_MATRIX, "mat3x3<f32>")
    .add_uniform(U_LIGHT_DIRECTION, "vec4<f32>")
    .add_uniform(U_COLOR, "vec4<f32>")
    .add_uniform(U_PICK_ID, "u32")
    .add_varying("color", "vec4<f32>")
    .add_varying("pick_id", "u32")
    .add_output("color", "vec4<f32>")
    .add_output("pick_id", "u32")
    .add_vertex_code(key.vertex_format.vertex_position_wgsl())
    .add_vertex_code(NORMAL_DECODE_WGSL);

  if key.silhouette {
    builder.add_uniform(U_SILHOUETTE_POWER, "f32");
  }
  if key.fragment_relative_vertices {
    builder
      .add_uniform(U_FRAGMENT_ORIGIN, "vec3<f32>")
      .add_uniform(U_FRAGMENT_SHAPE, "vec3<f32>");
  }

  let mut main = String::new();
  main.push_str(&format!(
    "  var position = get_vertex_position(input.{ATTR_VERTEX_POSITION});\n"
  ));
  if key.fragment_relative_vertices {
    main.push_str(&format!(
      "  position = u.{U_FRAGMENT_ORIGIN} + position * u.{U_FRAGMENT_SHAPE};\n"
    ));
  }
  main.push_str(&format!(
    "  out.clip_position = u.{U_MODEL_VIEW_PROJECTION} * vec4<f32>(position, 1.0);\n\
     \x20 let normal = normalize(u.{U_NORMAL_MATRIX} * decode_normal_octahedron(input.{ATTR_VERTEX_NORMAL}));\n\
     \x20 let lighting = abs(dot(normal, u.{U_LIGHT_DIRECTION}.xyz)) + u.{U_LIGHT_DIRECTION}.w;\n\
     \x20 var alpha = u.{U_COLOR}.a;\n"
  ));
  if key.silhouette {
    main.push_str(&format!(
      "  alpha = alpha * pow(1.0 - abs(normal.z), u.{U_SILHOUETTE_POWER});\n"
    ));
  }
  main.push_str(&format!(
    "  out.color = vec4<f32>(lighting * u.{U_COLOR}.rgb, alpha);\n  out.pick_id = u.{U_PICK_ID};"
  ));
  builder.set_vertex_main(&main);
  builder.set_fragment_main("  out.color = input.color;\n  out.pick_id = input.pick_id;\n  return out;");

  builder.build()
}

/// Memoized programs per configuration.
#[derive(Default)]
pub struct ShaderCache {
  programs: HashMap<ShaderKey, ProgramHandle>,
}

impl ShaderCache {
  pub fn new() -> Self {
    Self::default()
  }

  /// Fetch the program for `key`, compiling it on first use.
  pub fn get_or_compile(&mut self, gl: &mut dyn GpuBackend, key: ShaderKey) -> Result<ProgramHandle> {
    if let Some(program) = self.programs.get(&key) {
      return Ok(*program);
    }
    debug!(?key, "compiling mesh shader");
    let program = gl.compile_program(&build_mesh_shader(&key))?;
    self.programs.insert(key, program);
    Ok(program)
  }

  /// Number of distinct programs compiled.
  pub fn len(&self) -> usize {
    self.programs.len()
  }

  pub fn is_empty(&self) -> bool {
    self.programs.is_empty()
  }
}
