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

//! The capability interface every graphics backend implements.
//!
//! The renderer owns the portable half of the pipeline (staging, commits,
//! command ordering, the state cache, clear-once tracking) and drives a
//! [`GraphicsBackend`] for everything native: creating GPU objects from
//! committed resource snapshots and executing the bind/draw/present calls of
//! a frame. The backend is selected at build/configuration time per target
//! platform and the renderer is monomorphized over it.

use crate::math::{Extent2D, LinearRgba, Region2D};
use crate::renderer::api::{
    BlendStateData, BufferData, ConstantLocation, DrawMode, FillMode, MeshBufferData, ShaderData,
    ShaderStage, TextureData,
};
use crate::renderer::arena::Handle;
use crate::renderer::error::{RenderError, ResourceError};

/// Static capabilities of a graphics device, captured by resources at
/// creation time (the mip-generation policy depends on them).
#[derive(Debug, Clone, Copy)]
pub struct DeviceCapabilities {
    /// Whether the device samples non-power-of-two textures with full
    /// addressing support.
    pub npot_textures: bool,
    /// The number of texture layers a draw command can bind.
    pub texture_layers: u32,
    /// Whether multisampled render targets are supported.
    pub multisampling: bool,
}

impl Default for DeviceCapabilities {
    fn default() -> Self {
        Self {
            npot_textures: true,
            texture_layers: 2,
            multisampling: true,
        }
    }
}

/// The frame buffer a draw command renders into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameBufferTarget {
    /// The primary swap-chain frame buffer.
    Primary,
    /// The frame buffer of a render-target texture.
    Texture(Handle),
}

/// The program sources of one built-in shader preset.
#[derive(Debug, Clone)]
pub struct PresetSource {
    /// The pixel program byte stream.
    pub pixel: Vec<u8>,
    /// The vertex program byte stream.
    pub vertex: Vec<u8>,
}

/// The backend-supplied sources for the built-in shader presets.
///
/// Each backend ships its own program blobs in its native shading language,
/// exactly like the original per-API shader preambles.
#[derive(Debug, Clone)]
pub struct ShaderPresets {
    /// Sources for the textured preset (`"texture"`).
    pub texture: PresetSource,
    /// Sources for the flat-color preset (`"color"`).
    pub color: PresetSource,
}

/// The contract between the portable renderer and a native graphics API.
///
/// Resource-sync calls translate a committed snapshot into native objects
/// and may fail; the renderer leaves the resource dirty and retries next
/// frame. Frame operations are issued in draw-command order, already
/// filtered through the renderer's state cache, so a backend never sees a
/// redundant bind.
pub trait GraphicsBackend: Send {
    /// Returns the device's static capabilities.
    fn capabilities(&self) -> DeviceCapabilities;

    /// Returns the backend's built-in shader preset sources.
    fn shader_presets(&self) -> ShaderPresets;

    // --- Resource synchronization ---

    /// Creates or recreates the native texture objects for `handle` from a
    /// committed snapshot.
    fn sync_texture(&mut self, handle: Handle, data: &TextureData) -> Result<(), ResourceError>;

    /// Compiles and links the native program for `handle`, deriving the
    /// constant-location tables and allocating the constant buffers.
    fn sync_shader(&mut self, handle: Handle, data: &ShaderData) -> Result<(), ResourceError>;

    /// Creates or recreates the native blend-state object for `handle`.
    fn sync_blend_state(
        &mut self,
        handle: Handle,
        data: &BlendStateData,
    ) -> Result<(), ResourceError>;

    /// Creates or updates the native buffer for `handle`.
    fn sync_buffer(&mut self, handle: Handle, data: &BufferData) -> Result<(), ResourceError>;

    /// Records the native pairing of index and vertex buffers for `handle`.
    fn sync_mesh_buffer(
        &mut self,
        handle: Handle,
        data: &MeshBufferData,
    ) -> Result<(), ResourceError>;

    /// Releases every native object owned on behalf of `handle`.
    fn free_resource(&mut self, handle: Handle);

    /// Returns `true` when `handle` has live native objects; draw commands
    /// referencing resources that are not ready are skipped.
    fn is_ready(&self, handle: Handle) -> bool;

    // --- Frame lifecycle ---

    /// Resizes the primary frame buffer.
    fn resize_frame_buffer(&mut self, size: Extent2D) -> Result<(), RenderError>;

    /// Acquires the swap-chain image and opens the frame.
    fn begin_frame(&mut self) -> Result<(), RenderError>;

    /// Binds the given frame buffer as the draw target.
    fn bind_frame_buffer(&mut self, target: FrameBufferTarget) -> Result<(), RenderError>;

    /// Clears the bound frame buffer's color and/or depth planes.
    fn clear(&mut self, color: Option<LinearRgba>, depth: Option<f32>)
        -> Result<(), RenderError>;

    /// Sets the viewport rectangle.
    fn set_viewport(&mut self, region: Region2D) -> Result<(), RenderError>;

    /// Enables the scissor test over `region`, or disables it for `None`.
    fn set_scissor_region(&mut self, region: Option<Region2D>) -> Result<(), RenderError>;

    /// Applies the depth-test and depth-write toggles.
    fn set_depth_state(&mut self, test: bool, write: bool) -> Result<(), RenderError>;

    /// Applies the polygon fill mode.
    fn set_fill_mode(&mut self, mode: FillMode) -> Result<(), RenderError>;

    /// Binds a blend state previously synced for `handle`.
    fn bind_blend_state(&mut self, handle: Handle) -> Result<(), RenderError>;

    /// Binds a texture to `layer`, or unbinds the layer for `None`.
    fn bind_texture(&mut self, layer: u32, handle: Option<Handle>) -> Result<(), RenderError>;

    /// Binds the program previously synced for `handle`.
    fn bind_program(&mut self, handle: Handle) -> Result<(), RenderError>;

    /// Pushes one shader constant of the bound program at its precomputed
    /// location.
    fn set_constant(
        &mut self,
        stage: ShaderStage,
        location: ConstantLocation,
        values: &[f32],
    ) -> Result<(), RenderError>;

    /// Binds the index and vertex buffers of a mesh previously synced for
    /// `handle`.
    fn bind_mesh_buffer(&mut self, handle: Handle) -> Result<(), RenderError>;

    /// Issues the indexed draw.
    fn draw_indexed(
        &mut self,
        mode: DrawMode,
        index_count: u32,
        start_index: u32,
    ) -> Result<(), RenderError>;

    /// Presents the finished frame.
    fn present(&mut self) -> Result<(), RenderError>;

    /// Reads back the primary frame buffer as tightly packed RGBA8 rows with
    /// a bottom-left origin.
    fn read_frame_buffer(&mut self) -> Result<(Extent2D, Vec<u8>), RenderError>;
}
