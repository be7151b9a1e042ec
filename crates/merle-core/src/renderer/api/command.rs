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

//! The immutable per-frame draw command.

use crate::math::Region2D;
use crate::renderer::api::enums::DrawMode;
use crate::renderer::arena::{
    BlendStateHandle, MeshBufferHandle, ShaderHandle, TextureHandle,
};

/// One immutable request to render a mesh with a given shader, blend state,
/// texture, and target configuration.
///
/// Commands are queued by scene rendering in layer order and consumed exactly
/// once per frame, in submission order. They reference resources by handle;
/// the referenced resources are guaranteed alive because destruction is
/// deferred through the retire queue until no in-flight frame can observe
/// them.
#[derive(Debug, Clone)]
pub struct DrawCommand {
    /// The blend state to bind. A stale handle skips the command.
    pub blend_state: BlendStateHandle,
    /// Texture layers to bind; layers beyond this list are unbound.
    pub textures: Vec<TextureHandle>,
    /// The shader program to bind. A stale handle skips the command.
    pub shader: ShaderHandle,
    /// Pixel-stage constant values, one `f32` vector per declared constant,
    /// interpreted by the declared constant type.
    pub pixel_shader_constants: Vec<Vec<f32>>,
    /// Vertex-stage constant values, one `f32` vector per declared constant.
    pub vertex_shader_constants: Vec<Vec<f32>>,
    /// The render-target texture, or `None` for the primary frame buffer.
    pub render_target: Option<TextureHandle>,
    /// The viewport rectangle.
    pub viewport: Region2D,
    /// The scissor rectangle; `None` disables the scissor test.
    pub scissor_test: Option<Region2D>,
    /// Whether the depth test is enabled for this draw.
    pub depth_test: bool,
    /// Whether depth writes are enabled for this draw.
    pub depth_write: bool,
    /// The mesh buffer supplying geometry. A stale handle skips the command.
    pub mesh_buffer: MeshBufferHandle,
    /// The primitive topology to draw.
    pub draw_mode: DrawMode,
    /// The first index to draw.
    pub start_index: u32,
    /// The number of indices to draw.
    pub index_count: u32,
    /// Whether to rasterize in wireframe.
    pub wireframe: bool,
}

impl DrawCommand {
    /// Creates a command with the minimal required bindings; remaining
    /// fields start at their usual defaults (primary target, full depth
    /// state off, solid fill).
    pub fn new(
        blend_state: BlendStateHandle,
        shader: ShaderHandle,
        mesh_buffer: MeshBufferHandle,
        draw_mode: DrawMode,
        index_count: u32,
        viewport: Region2D,
    ) -> Self {
        Self {
            blend_state,
            textures: Vec::new(),
            shader,
            pixel_shader_constants: Vec::new(),
            vertex_shader_constants: Vec::new(),
            render_target: None,
            viewport,
            scissor_test: None,
            depth_test: false,
            depth_write: false,
            mesh_buffer,
            draw_mode,
            start_index: 0,
            index_count,
            wireframe: false,
        }
    }
}
