// src/rendering_lib/shader.rs

pub const WGSL_SHADER_SOURCE: &str = r#"
struct ScreenDimensions {
    width: f32,
    height: f32,
    _padding1: f32,
    _padding2: f32,
}

@group(0) @binding(0)
var<uniform> screen: ScreenDimensions;

struct VertexInput {
    @location(0) position: vec2<f32>, // These are screen-space coordinates
    @location(1) depth: f32,
    @location(2) color: vec4<f32>,
}

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) color: vec4<f32>,
}

@vertex
fn vs_main(model: VertexInput) -> VertexOutput {
    var out: VertexOutput;
    out.color = model.color;

    // Screen space has its origin top-left with +Y down; NDC has +Y up.
    let normalized_x = (model.position.x / (screen.width / 2.0)) - 1.0;
    let normalized_y = 1.0 - (model.position.y / (screen.height / 2.0));

    out.clip_position = vec4<f32>(normalized_x, normalized_y, model.depth, 1.0);
    return out;
}

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    return in.color;
}
"#;

pub const WGSL_SURFACE_SHADER_SOURCE: &str = r#"
struct ScreenDimensions {
    width: f32,
    height: f32,
    _padding1: f32,
    _padding2: f32,
}

@group(0) @binding(0)
var<uniform> screen: ScreenDimensions;

@group(1) @binding(0)
var portal_texture: texture_2d<f32>;
@group(1) @binding(1)
var portal_sampler: sampler;

struct VertexInput {
    @location(0) position: vec2<f32>,
    @location(1) depth: f32,
    @location(2) uv: vec2<f32>,
}

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) uv: vec2<f32>,
}

@vertex
fn vs_main(model: VertexInput) -> VertexOutput {
    var out: VertexOutput;
    out.uv = model.uv;
    let normalized_x = (model.position.x / (screen.width / 2.0)) - 1.0;
    let normalized_y = 1.0 - (model.position.y / (screen.height / 2.0));
    out.clip_position = vec4<f32>(normalized_x, normalized_y, model.depth, 1.0);
    return out;
}

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    return textureSample(portal_texture, portal_sampler, in.uv);
}
"#;
