// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! The built-in WGSL shader preset sources.
//!
//! These are the backend's equivalents of the per-API preset program blobs:
//! a textured pipeline and a flat-color pipeline, both consuming one `color`
//! pixel constant and one `model_view_proj` vertex constant.
//!
//! Binding conventions shared with the backend's pipeline layout:
//! - group 0, binding 0: vertex-stage constants (dynamic offset)
//! - group 0, binding 1: pixel-stage constants (dynamic offset)
//! - group 1, bindings 0/1: texture layer 0 view and sampler
//! - group 1, bindings 2/3: texture layer 1 view and sampler

/// Vertex stage of the `"texture"` preset.
pub const TEXTURE_VS: &str = r#"
struct VsConstants {
    model_view_proj: mat4x4<f32>,
}

@group(0) @binding(0) var<uniform> vs_constants: VsConstants;

struct VsIn {
    @location(0) position: vec3<f32>,
    @location(1) color: vec4<f32>,
    @location(3) tex_coord: vec2<f32>,
}

struct VsOut {
    @builtin(position) position: vec4<f32>,
    @location(0) color: vec4<f32>,
    @location(1) tex_coord: vec2<f32>,
}

@vertex
fn vs_main(in: VsIn) -> VsOut {
    var out: VsOut;
    out.position = vs_constants.model_view_proj * vec4<f32>(in.position, 1.0);
    out.color = in.color;
    out.tex_coord = in.tex_coord;
    return out;
}
"#;

/// Pixel stage of the `"texture"` preset.
pub const TEXTURE_PS: &str = r#"
struct PsConstants {
    color: vec4<f32>,
}

@group(0) @binding(1) var<uniform> ps_constants: PsConstants;
@group(1) @binding(0) var layer0_texture: texture_2d<f32>;
@group(1) @binding(1) var layer0_sampler: sampler;

struct PsIn {
    @location(0) color: vec4<f32>,
    @location(1) tex_coord: vec2<f32>,
}

@fragment
fn ps_main(in: PsIn) -> @location(0) vec4<f32> {
    let sampled = textureSample(layer0_texture, layer0_sampler, in.tex_coord);
    return sampled * in.color * ps_constants.color;
}
"#;

/// Vertex stage of the `"color"` preset.
pub const COLOR_VS: &str = r#"
struct VsConstants {
    model_view_proj: mat4x4<f32>,
}

@group(0) @binding(0) var<uniform> vs_constants: VsConstants;

struct VsIn {
    @location(0) position: vec3<f32>,
    @location(1) color: vec4<f32>,
}

struct VsOut {
    @builtin(position) position: vec4<f32>,
    @location(0) color: vec4<f32>,
}

@vertex
fn vs_main(in: VsIn) -> VsOut {
    var out: VsOut;
    out.position = vs_constants.model_view_proj * vec4<f32>(in.position, 1.0);
    out.color = in.color;
    return out;
}
"#;

/// Pixel stage of the `"color"` preset.
pub const COLOR_PS: &str = r#"
struct PsConstants {
    color: vec4<f32>,
}

@group(0) @binding(1) var<uniform> ps_constants: PsConstants;

struct PsIn {
    @location(0) color: vec4<f32>,
}

@fragment
fn ps_main(in: PsIn) -> @location(0) vec4<f32> {
    return in.color * ps_constants.color;
}
"#;
