/// WGSL shader for textured, tinted sprite quads with an optional alpha test.
pub const SPRITE_SHADER: &str = r#"
struct Uniforms {
    view_proj: mat4x4<f32>,
    alpha_ref: f32,
    alpha_test: u32,
    _pad0: u32,
    _pad1: u32,
};

@group(0) @binding(0)
var<uniform> uniforms: Uniforms;

@group(1) @binding(0)
var sprite_texture: texture_2d<f32>;
@group(1) @binding(1)
var sprite_sampler: sampler;

struct VertexInput {
    @location(0) corner: vec2<f32>,
};

struct InstanceInput {
    @location(1) rect: vec4<f32>,
    @location(2) color: vec4<f32>,
};

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) uv: vec2<f32>,
    @location(1) color: vec4<f32>,
};

@vertex
fn vs_sprite(vertex: VertexInput, instance: InstanceInput) -> VertexOutput {
    let world = instance.rect.xy + vertex.corner * instance.rect.zw;
    var out: VertexOutput;
    out.clip_position = uniforms.view_proj * vec4<f32>(world, 0.0, 1.0);
    out.uv = vertex.corner;
    out.color = instance.color;
    return out;
}

@fragment
fn fs_sprite(in: VertexOutput) -> @location(0) vec4<f32> {
    let color = textureSample(sprite_texture, sprite_sampler, in.uv) * in.color;
    // Keep only fragments whose alpha is strictly greater than the reference.
    if uniforms.alpha_test != 0u && color.a <= uniforms.alpha_ref {
        discard;
    }
    return color;
}
"#;
