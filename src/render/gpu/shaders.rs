//! WGSL for both GPU tiers. Quads have no vertex buffer; corners come from the vertex index.

/// Explicit tier: resolution uniform in group 0, per-slot storage rect, texture and sampler in
/// group 1.
pub(crate) const EXPLICIT_WGSL: &str = r#"
struct Globals {
  resolution: vec2<f32>,
  _pad: vec2<f32>,
};

struct Quad {
  rect: vec4<f32>,
};

@group(0) @binding(0) var<uniform> globals: Globals;
@group(1) @binding(0) var<storage, read> quad: Quad;
@group(1) @binding(1) var t_src: texture_2d<f32>;
@group(1) @binding(2) var s_src: sampler;

struct VsOut {
  @builtin(position) pos: vec4<f32>,
  @location(0) uv: vec2<f32>,
};

@vertex
fn vs(@builtin(vertex_index) vi: u32) -> VsOut {
  var corners = array<vec2<f32>, 6>(
    vec2<f32>(0.0, 0.0),
    vec2<f32>(1.0, 0.0),
    vec2<f32>(0.0, 1.0),
    vec2<f32>(0.0, 1.0),
    vec2<f32>(1.0, 0.0),
    vec2<f32>(1.0, 1.0),
  );
  let uv = corners[vi % 6u];
  let px = quad.rect.xy + uv * quad.rect.zw;
  let ndc = vec2<f32>(
    px.x / globals.resolution.x * 2.0 - 1.0,
    1.0 - px.y / globals.resolution.y * 2.0,
  );
  var o: VsOut;
  o.pos = vec4<f32>(ndc, 0.0, 1.0);
  o.uv = uv;
  return o;
}

@fragment
fn fs(in: VsOut) -> @location(0) vec4<f32> {
  return textureSample(t_src, s_src, in.uv);
}
"#;

/// Immediate tier: one uniform block rewritten before every draw.
pub(crate) const IMMEDIATE_WGSL: &str = r#"
struct Params {
  resolution: vec2<f32>,
  _pad: vec2<f32>,
  rect: vec4<f32>,
};

@group(0) @binding(0) var<uniform> params: Params;
@group(0) @binding(1) var t_src: texture_2d<f32>;
@group(0) @binding(2) var s_src: sampler;

struct VsOut {
  @builtin(position) pos: vec4<f32>,
  @location(0) uv: vec2<f32>,
};

@vertex
fn vs(@builtin(vertex_index) vi: u32) -> VsOut {
  var corners = array<vec2<f32>, 6>(
    vec2<f32>(0.0, 0.0),
    vec2<f32>(1.0, 0.0),
    vec2<f32>(0.0, 1.0),
    vec2<f32>(0.0, 1.0),
    vec2<f32>(1.0, 0.0),
    vec2<f32>(1.0, 1.0),
  );
  let uv = corners[vi % 6u];
  let px = params.rect.xy + uv * params.rect.zw;
  let ndc = vec2<f32>(
    px.x / params.resolution.x * 2.0 - 1.0,
    1.0 - px.y / params.resolution.y * 2.0,
  );
  var o: VsOut;
  o.pos = vec4<f32>(ndc, 0.0, 1.0);
  o.uv = uv;
  return o;
}

@fragment
fn fs(in: VsOut) -> @location(0) vec4<f32> {
  return textureSample(t_src, s_src, in.uv);
}
"#;

/// Uniform block shared by both tiers' resolution fields.
#[repr(C)]
#[derive(Clone, Copy, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub(crate) struct Globals {
    pub resolution: [f32; 2],
    pub _pad: [f32; 2],
}

impl Globals {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            resolution: [width as f32, height as f32],
            _pad: [0.0; 2],
        }
    }
}

/// Per-draw block of the immediate tier.
#[repr(C)]
#[derive(Clone, Copy, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub(crate) struct ImmediateParams {
    pub globals: Globals,
    pub rect: [f32; 4],
}
