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

//! A recording no-op graphics backend.
//!
//! `HeadlessBackend` implements the full [`GraphicsBackend`] contract
//! without touching any native API: every call is appended to an
//! inspectable operation log. It serves platforms without a GPU, CI runs,
//! and the pipeline tests that assert ordering properties (draw order,
//! clear-once, state-cache elision) against the log.

use std::collections::{HashMap, HashSet};

use crate::math::{Extent2D, LinearRgba, Region2D};
use crate::renderer::api::{
    BlendStateData, BufferData, ConstantLocation, DrawMode, FillMode, MeshBufferData, ShaderData,
    ShaderStage, TextureData,
};
use crate::renderer::arena::Handle;
use crate::renderer::backend::{
    DeviceCapabilities, FrameBufferTarget, GraphicsBackend, PresetSource, ShaderPresets,
};
use crate::renderer::error::{RenderError, ResourceError};

/// One recorded backend call.
#[derive(Debug, Clone, PartialEq)]
pub enum BackendOp {
    /// A texture was synchronized.
    SyncTexture(Handle),
    /// A shader was compiled/linked.
    SyncShader(Handle),
    /// A blend state was recreated.
    SyncBlendState(Handle),
    /// A buffer was uploaded.
    SyncBuffer(Handle),
    /// A mesh buffer pairing was recorded.
    SyncMeshBuffer(Handle),
    /// A resource's native objects were released.
    FreeResource(Handle),
    /// The primary frame buffer was resized.
    ResizeFrameBuffer(Extent2D),
    /// A frame was opened.
    BeginFrame,
    /// A frame buffer was bound as the draw target.
    BindFrameBuffer(FrameBufferTarget),
    /// The bound frame buffer was cleared.
    Clear {
        /// The color plane clear value, if cleared.
        color: Option<LinearRgba>,
        /// The depth plane clear value, if cleared.
        depth: Option<f32>,
    },
    /// The viewport was set.
    SetViewport(Region2D),
    /// The scissor state was set.
    SetScissor(Option<Region2D>),
    /// The depth toggles were applied.
    SetDepthState {
        /// Whether the depth test was enabled.
        test: bool,
        /// Whether depth writes were enabled.
        write: bool,
    },
    /// The fill mode was applied.
    SetFillMode(FillMode),
    /// A blend state was bound.
    BindBlendState(Handle),
    /// A texture layer was bound or unbound.
    BindTexture {
        /// The layer index.
        layer: u32,
        /// The bound texture, or `None` for an unbind.
        handle: Option<Handle>,
    },
    /// A program was bound.
    BindProgram(Handle),
    /// A shader constant was pushed.
    SetConstant {
        /// The stage the constant belongs to.
        stage: ShaderStage,
        /// The precomputed byte offset of the constant.
        offset: usize,
        /// The number of `f32` components pushed.
        components: usize,
    },
    /// A mesh buffer's index and vertex buffers were bound.
    BindMeshBuffer(Handle),
    /// An indexed draw was issued.
    DrawIndexed {
        /// The primitive topology.
        mode: DrawMode,
        /// The number of indices drawn.
        index_count: u32,
        /// The first index drawn.
        start_index: u32,
    },
    /// The frame was presented.
    Present,
    /// The primary frame buffer was read back.
    ReadFrameBuffer,
}

/// A no-op backend that records every call.
#[derive(Debug)]
pub struct HeadlessBackend {
    caps: DeviceCapabilities,
    ops: Vec<BackendOp>,
    synced: HashSet<Handle>,
    failing: HashSet<Handle>,
    sync_counts: HashMap<Handle, u32>,
    frame_size: Extent2D,
    frame_buffer: Vec<u8>,
}

impl Default for HeadlessBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl HeadlessBackend {
    /// Creates a headless backend with default capabilities.
    pub fn new() -> Self {
        Self::with_capabilities(DeviceCapabilities::default())
    }

    /// Creates a headless backend with explicit capabilities, letting tests
    /// model devices without non-power-of-two texture support.
    pub fn with_capabilities(caps: DeviceCapabilities) -> Self {
        log::debug!("HeadlessBackend created (no native API will be touched).");
        Self {
            caps,
            ops: Vec::new(),
            synced: HashSet::new(),
            failing: HashSet::new(),
            sync_counts: HashMap::new(),
            frame_size: Extent2D::default(),
            frame_buffer: Vec::new(),
        }
    }

    /// Returns the recorded operations.
    pub fn ops(&self) -> &[BackendOp] {
        &self.ops
    }

    /// Takes the recorded operations, leaving the log empty.
    pub fn take_ops(&mut self) -> Vec<BackendOp> {
        std::mem::take(&mut self.ops)
    }

    /// Returns how many times `handle` was synchronized.
    pub fn sync_count(&self, handle: Handle) -> u32 {
        self.sync_counts.get(&handle).copied().unwrap_or(0)
    }

    /// Makes every future sync of `handle` fail, modeling a native
    /// object-creation failure.
    pub fn fail_syncs_for(&mut self, handle: Handle) {
        self.failing.insert(handle);
        self.synced.remove(&handle);
    }

    /// Lets syncs of `handle` succeed again.
    pub fn heal_syncs_for(&mut self, handle: Handle) {
        self.failing.remove(&handle);
    }

    /// Mutable access to the simulated primary frame buffer, so tests can
    /// paint recognizable patterns before a read-back.
    pub fn frame_buffer_mut(&mut self) -> &mut Vec<u8> {
        &mut self.frame_buffer
    }

    fn record_sync(&mut self, handle: Handle, op: BackendOp) -> Result<(), ResourceError> {
        if self.failing.contains(&handle) {
            return Err(ResourceError::BackendError(format!(
                "injected sync failure for {handle:?}"
            )));
        }
        self.ops.push(op);
        self.synced.insert(handle);
        *self.sync_counts.entry(handle).or_insert(0) += 1;
        Ok(())
    }
}

impl GraphicsBackend for HeadlessBackend {
    fn capabilities(&self) -> DeviceCapabilities {
        self.caps
    }

    fn shader_presets(&self) -> ShaderPresets {
        ShaderPresets {
            texture: PresetSource {
                pixel: b"headless texture ps".to_vec(),
                vertex: b"headless texture vs".to_vec(),
            },
            color: PresetSource {
                pixel: b"headless color ps".to_vec(),
                vertex: b"headless color vs".to_vec(),
            },
        }
    }

    fn sync_texture(&mut self, handle: Handle, _data: &TextureData) -> Result<(), ResourceError> {
        self.record_sync(handle, BackendOp::SyncTexture(handle))
    }

    fn sync_shader(&mut self, handle: Handle, _data: &ShaderData) -> Result<(), ResourceError> {
        self.record_sync(handle, BackendOp::SyncShader(handle))
    }

    fn sync_blend_state(
        &mut self,
        handle: Handle,
        _data: &BlendStateData,
    ) -> Result<(), ResourceError> {
        self.record_sync(handle, BackendOp::SyncBlendState(handle))
    }

    fn sync_buffer(&mut self, handle: Handle, _data: &BufferData) -> Result<(), ResourceError> {
        self.record_sync(handle, BackendOp::SyncBuffer(handle))
    }

    fn sync_mesh_buffer(
        &mut self,
        handle: Handle,
        _data: &MeshBufferData,
    ) -> Result<(), ResourceError> {
        self.record_sync(handle, BackendOp::SyncMeshBuffer(handle))
    }

    fn free_resource(&mut self, handle: Handle) {
        self.synced.remove(&handle);
        self.ops.push(BackendOp::FreeResource(handle));
    }

    fn is_ready(&self, handle: Handle) -> bool {
        self.synced.contains(&handle)
    }

    fn resize_frame_buffer(&mut self, size: Extent2D) -> Result<(), RenderError> {
        self.frame_size = size;
        self.frame_buffer = vec![0; size.area() as usize * 4];
        self.ops.push(BackendOp::ResizeFrameBuffer(size));
        Ok(())
    }

    fn begin_frame(&mut self) -> Result<(), RenderError> {
        self.ops.push(BackendOp::BeginFrame);
        Ok(())
    }

    fn bind_frame_buffer(&mut self, target: FrameBufferTarget) -> Result<(), RenderError> {
        self.ops.push(BackendOp::BindFrameBuffer(target));
        Ok(())
    }

    fn clear(
        &mut self,
        color: Option<LinearRgba>,
        depth: Option<f32>,
    ) -> Result<(), RenderError> {
        if let Some(color) = color {
            let rgba = color.to_rgba8();
            for pixel in self.frame_buffer.chunks_exact_mut(4) {
                pixel.copy_from_slice(&rgba);
            }
        }
        self.ops.push(BackendOp::Clear { color, depth });
        Ok(())
    }

    fn set_viewport(&mut self, region: Region2D) -> Result<(), RenderError> {
        self.ops.push(BackendOp::SetViewport(region));
        Ok(())
    }

    fn set_scissor_region(&mut self, region: Option<Region2D>) -> Result<(), RenderError> {
        self.ops.push(BackendOp::SetScissor(region));
        Ok(())
    }

    fn set_depth_state(&mut self, test: bool, write: bool) -> Result<(), RenderError> {
        self.ops.push(BackendOp::SetDepthState { test, write });
        Ok(())
    }

    fn set_fill_mode(&mut self, mode: FillMode) -> Result<(), RenderError> {
        self.ops.push(BackendOp::SetFillMode(mode));
        Ok(())
    }

    fn bind_blend_state(&mut self, handle: Handle) -> Result<(), RenderError> {
        self.ops.push(BackendOp::BindBlendState(handle));
        Ok(())
    }

    fn bind_texture(&mut self, layer: u32, handle: Option<Handle>) -> Result<(), RenderError> {
        self.ops.push(BackendOp::BindTexture { layer, handle });
        Ok(())
    }

    fn bind_program(&mut self, handle: Handle) -> Result<(), RenderError> {
        self.ops.push(BackendOp::BindProgram(handle));
        Ok(())
    }

    fn set_constant(
        &mut self,
        stage: ShaderStage,
        location: ConstantLocation,
        values: &[f32],
    ) -> Result<(), RenderError> {
        self.ops.push(BackendOp::SetConstant {
            stage,
            offset: location.offset,
            components: values.len(),
        });
        Ok(())
    }

    fn bind_mesh_buffer(&mut self, handle: Handle) -> Result<(), RenderError> {
        self.ops.push(BackendOp::BindMeshBuffer(handle));
        Ok(())
    }

    fn draw_indexed(
        &mut self,
        mode: DrawMode,
        index_count: u32,
        start_index: u32,
    ) -> Result<(), RenderError> {
        self.ops.push(BackendOp::DrawIndexed {
            mode,
            index_count,
            start_index,
        });
        Ok(())
    }

    fn present(&mut self) -> Result<(), RenderError> {
        self.ops.push(BackendOp::Present);
        Ok(())
    }

    fn read_frame_buffer(&mut self) -> Result<(Extent2D, Vec<u8>), RenderError> {
        if self.frame_size.is_empty() {
            return Err(RenderError::ReadBackFailed(
                "frame buffer has zero size".to_string(),
            ));
        }
        self.ops.push(BackendOp::ReadFrameBuffer);
        Ok((self.frame_size, self.frame_buffer.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn any_handle() -> Handle {
        crate::renderer::arena::Arena::new().insert(())
    }

    #[test]
    fn records_operations_in_order() {
        let mut backend = HeadlessBackend::new();
        backend.begin_frame().unwrap();
        backend
            .bind_frame_buffer(FrameBufferTarget::Primary)
            .unwrap();
        backend.present().unwrap();

        assert_eq!(
            backend.ops(),
            &[
                BackendOp::BeginFrame,
                BackendOp::BindFrameBuffer(FrameBufferTarget::Primary),
                BackendOp::Present,
            ]
        );
    }

    #[test]
    fn sync_tracks_readiness_and_counts() {
        let mut backend = HeadlessBackend::new();
        let handle = any_handle();
        assert!(!backend.is_ready(handle));

        backend
            .sync_texture(handle, &TextureData::default())
            .unwrap();
        assert!(backend.is_ready(handle));
        assert_eq!(backend.sync_count(handle), 1);

        backend.free_resource(handle);
        assert!(!backend.is_ready(handle));
    }

    #[test]
    fn injected_failures_surface_as_backend_errors() {
        let mut backend = HeadlessBackend::new();
        let handle = any_handle();
        backend.fail_syncs_for(handle);

        let result = backend.sync_texture(handle, &TextureData::default());
        assert!(matches!(result, Err(ResourceError::BackendError(_))));
        assert!(!backend.is_ready(handle));

        backend.heal_syncs_for(handle);
        assert!(backend.sync_texture(handle, &TextureData::default()).is_ok());
    }

    #[test]
    fn clear_fills_the_simulated_frame_buffer() {
        let mut backend = HeadlessBackend::new();
        backend
            .resize_frame_buffer(Extent2D::new(2, 2))
            .unwrap();
        backend
            .clear(Some(LinearRgba::WHITE), None)
            .unwrap();

        let (size, pixels) = backend.read_frame_buffer().unwrap();
        assert_eq!(size, Extent2D::new(2, 2));
        assert!(pixels.chunks_exact(4).all(|p| p == [255, 255, 255, 255]));
    }
}
