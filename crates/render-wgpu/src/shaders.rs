/// Instanced voxel cubes. Each instance carries a center, an edge length,
/// and a color; a zero edge length collapses the cube so released slots
/// rasterize nothing.
pub const VOXEL_SHADER: &str = r#"
struct Uniforms {
    view_proj: mat4x4<f32>,
    eye: vec4<f32>,
    // x: fade start, y: fade end
    fog: vec4<f32>,
};

@group(0) @binding(0)
var<uniform> uniforms: Uniforms;

// Matches the clear color so distant voxels fade into the background.
const FOG_COLOR = vec3<f32>(0.08, 0.09, 0.12);

struct VertexInput {
    @location(0) position: vec3<f32>,
    @location(1) normal: vec3<f32>,
};

struct InstanceInput {
    @location(2) center_scale: vec4<f32>,
    @location(3) color: vec4<f32>,
};

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) normal: vec3<f32>,
    @location(1) color: vec4<f32>,
    @location(2) world_pos: vec3<f32>,
};

@vertex
fn vs_voxel(vertex: VertexInput, instance: InstanceInput) -> VertexOutput {
    let world_pos = vertex.position * instance.center_scale.w + instance.center_scale.xyz;

    var out: VertexOutput;
    out.clip_position = uniforms.view_proj * vec4<f32>(world_pos, 1.0);
    out.normal = vertex.normal;
    out.color = instance.color;
    out.world_pos = world_pos;
    return out;
}

@fragment
fn fs_voxel(in: VertexOutput) -> @location(0) vec4<f32> {
    let light_dir = normalize(vec3<f32>(0.4, 1.0, 0.3));
    let diffuse = max(dot(in.normal, light_dir), 0.0);
    let lit = in.color.rgb * (0.35 + diffuse * 0.65);

    let dist = distance(in.world_pos, uniforms.eye.xyz);
    let fade = clamp((dist - uniforms.fog.x) / max(uniforms.fog.y - uniforms.fog.x, 1.0), 0.0, 1.0);
    return vec4<f32>(mix(lit, FOG_COLOR, fade), in.color.a);
}
"#;

/// Line grid on the ground plane.
pub const GRID_SHADER: &str = r#"
struct Uniforms {
    view_proj: mat4x4<f32>,
    eye: vec4<f32>,
    fog: vec4<f32>,
};

@group(0) @binding(0)
var<uniform> uniforms: Uniforms;

struct GridVertex {
    @location(0) position: vec3<f32>,
    @location(1) color: vec4<f32>,
};

struct GridOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) color: vec4<f32>,
};

@vertex
fn vs_grid(vertex: GridVertex) -> GridOutput {
    var out: GridOutput;
    out.clip_position = uniforms.view_proj * vec4<f32>(vertex.position, 1.0);
    out.color = vertex.color;
    return out;
}

@fragment
fn fs_grid(in: GridOutput) -> @location(0) vec4<f32> {
    return in.color;
}
"#;
