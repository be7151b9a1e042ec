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

//! The renderer: resource registry, draw-command queue, and the per-frame
//! upload/draw pipeline.
//!
//! The renderer owns the portable half of every frame. Logic-thread code
//! creates resources through the factories, mutates them through their
//! staged setters, and queues draw commands; the render thread calls
//! [`Renderer::process`] (commit staged state, sync dirty resources with the
//! backend, drain retired resources) followed by [`Renderer::draw`] (consume
//! the command queue in submission order through the state cache). Uploads
//! for a frame therefore always precede any draw that references them.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::math::{Extent2D, LinearRgba, Region2D};
use crate::renderer::api::{
    constant_layout, BlendFactor, BlendOperation, BlendStateResource, BufferResource,
    ConstantInfo, ConstantLocation, DirtyFlags, DrawCommand, FillMode, MeshBufferResource,
    Resource, ShaderResource, ShaderStage, Staged, TextureResource, UniformType,
    VertexAttributes,
};
use crate::renderer::arena::{
    Arena, BlendStateHandle, BufferHandle, Handle, MeshBufferHandle, ShaderHandle, TextureHandle,
};
use crate::renderer::backend::{DeviceCapabilities, FrameBufferTarget, GraphicsBackend};
use crate::renderer::cache::StateCache;
use crate::renderer::error::RenderError;

/// Name of the textured shader preset.
pub const SHADER_TEXTURE: &str = "texture";
/// Name of the flat-color shader preset.
pub const SHADER_COLOR: &str = "color";
/// Name of the no-blend preset.
pub const BLEND_NO_BLEND: &str = "no_blend";
/// Name of the additive blend preset.
pub const BLEND_ADD: &str = "add";
/// Name of the multiplicative blend preset.
pub const BLEND_MULTIPLY: &str = "multiply";
/// Name of the premultiplied-alpha blend preset.
pub const BLEND_ALPHA: &str = "alpha";
/// Name of the built-in 1x1 opaque white texture.
pub const TEXTURE_WHITE_PIXEL: &str = "white_pixel";

/// Construction-time settings for a renderer.
#[derive(Debug, Clone, Copy)]
pub struct RendererSettings {
    /// The initial back-buffer size.
    pub size: Extent2D,
    /// Samples per pixel for the primary frame buffer.
    pub sample_count: u32,
    /// Whether the primary frame buffer carries a depth buffer.
    pub depth: bool,
    /// The clear color of the primary frame buffer.
    pub clear_color: LinearRgba,
    /// Whether the color plane is cleared at the start of a frame.
    pub clear_color_buffer: bool,
    /// Whether the depth plane is cleared at the start of a frame.
    pub clear_depth_buffer: bool,
}

impl Default for RendererSettings {
    fn default() -> Self {
        Self {
            size: Extent2D::new(800, 600),
            sample_count: 1,
            depth: false,
            clear_color: LinearRgba::BLACK,
            clear_color_buffer: true,
            clear_depth_buffer: false,
        }
    }
}

/// The staged per-frame settings of the primary frame buffer.
#[derive(Debug, Clone, Copy)]
struct FrameSettings {
    size: Extent2D,
    clear_color: LinearRgba,
    clear_color_buffer: bool,
    clear_depth_buffer: bool,
}

/// A typed entry in the string-keyed named-resource registry.
#[derive(Debug, Clone, Copy)]
pub enum NamedResource {
    /// A named texture.
    Texture(TextureHandle),
    /// A named shader.
    Shader(ShaderHandle),
    /// A named blend state.
    BlendState(BlendStateHandle),
}

/// The portable renderer, monomorphized over its graphics backend.
pub struct Renderer<B: GraphicsBackend> {
    backend: B,
    caps: DeviceCapabilities,
    resources: Mutex<Arena<Resource>>,
    queue: Mutex<Vec<DrawCommand>>,
    names: Mutex<HashMap<String, NamedResource>>,
    frame: Staged<FrameSettings>,
    cache: StateCache,
    /// The frame currently being produced; advances when `draw` completes.
    current_frame: AtomicU64,
    frame_buffer_size: Extent2D,
    sample_count: u32,
    depth: bool,
    clear_color: LinearRgba,
    clear_color_buffer: bool,
    clear_depth_buffer: bool,
    primary_cleared_frame: u64,
    target_cleared_frames: HashMap<Handle, u64>,
}

/// Whether a command survives resolution and what it resolved to.
struct ResolvedCommand {
    blend_state: Handle,
    textures: Vec<Option<Handle>>,
    shader: Handle,
    pixel_locations: Vec<ConstantLocation>,
    vertex_locations: Vec<ConstantLocation>,
    target: FrameBufferTarget,
    target_clear: (Option<LinearRgba>, Option<f32>, Option<Handle>),
    mesh_buffer: Handle,
}

impl<B: GraphicsBackend> Renderer<B> {
    /// Creates a renderer over `backend` and registers the default
    /// resources: the `"texture"`/`"color"` shader presets, the four
    /// canonical blend presets, and the 1x1 white-pixel texture.
    pub fn new(backend: B, settings: RendererSettings) -> Result<Self, RenderError> {
        let mut backend = backend;
        let caps = backend.capabilities();
        backend.resize_frame_buffer(settings.size)?;

        let mut sample_count = settings.sample_count.max(1);
        if sample_count > 1 && !caps.multisampling {
            log::warn!("Multisampling is not supported by this device; using 1 sample.");
            sample_count = 1;
        }

        let renderer = Self {
            cache: StateCache::new(caps.texture_layers),
            caps,
            resources: Mutex::new(Arena::new()),
            queue: Mutex::new(Vec::new()),
            names: Mutex::new(HashMap::new()),
            frame: Staged::new(FrameSettings {
                size: settings.size,
                clear_color: settings.clear_color,
                clear_color_buffer: settings.clear_color_buffer,
                clear_depth_buffer: settings.clear_depth_buffer,
            }),
            current_frame: AtomicU64::new(1),
            frame_buffer_size: settings.size,
            sample_count,
            depth: settings.depth,
            clear_color: settings.clear_color,
            clear_color_buffer: settings.clear_color_buffer,
            clear_depth_buffer: settings.clear_depth_buffer,
            primary_cleared_frame: 0,
            target_cleared_frames: HashMap::new(),
            backend,
        };

        renderer.register_default_resources()?;

        log::info!(
            "Renderer created: {}x{} back buffer, {} texture layers, NPOT {}",
            settings.size.width,
            settings.size.height,
            caps.texture_layers,
            if caps.npot_textures {
                "supported"
            } else {
                "unsupported"
            },
        );

        Ok(renderer)
    }

    fn register_default_resources(&self) -> Result<(), RenderError> {
        let presets = self.backend.shader_presets();

        let texture_shader = self.create_shader();
        self.shader(texture_shader)
            .expect("factory handle is live")
            .init_from_bytes(
                &presets.texture.pixel,
                &presets.texture.vertex,
                VertexAttributes::POSITION | VertexAttributes::COLOR | VertexAttributes::TEXCOORD0,
                vec![ConstantInfo::new("color", UniformType::Vec4)],
                vec![ConstantInfo::new("model_view_proj", UniformType::Mat4)],
            )?;
        self.register_name(SHADER_TEXTURE, NamedResource::Shader(texture_shader));

        let color_shader = self.create_shader();
        self.shader(color_shader)
            .expect("factory handle is live")
            .init_from_bytes(
                &presets.color.pixel,
                &presets.color.vertex,
                VertexAttributes::POSITION | VertexAttributes::COLOR,
                vec![ConstantInfo::new("color", UniformType::Vec4)],
                vec![ConstantInfo::new("model_view_proj", UniformType::Mat4)],
            )?;
        self.register_name(SHADER_COLOR, NamedResource::Shader(color_shader));

        // (name, enabled, color src/dst, alpha src/dst)
        let blends = [
            (
                BLEND_NO_BLEND,
                false,
                BlendFactor::One,
                BlendFactor::Zero,
                BlendFactor::One,
                BlendFactor::Zero,
            ),
            (
                BLEND_ADD,
                true,
                BlendFactor::One,
                BlendFactor::One,
                BlendFactor::One,
                BlendFactor::One,
            ),
            (
                BLEND_MULTIPLY,
                true,
                BlendFactor::DestColor,
                BlendFactor::Zero,
                BlendFactor::One,
                BlendFactor::One,
            ),
            (
                BLEND_ALPHA,
                true,
                BlendFactor::SrcAlpha,
                BlendFactor::InvSrcAlpha,
                BlendFactor::One,
                BlendFactor::One,
            ),
        ];
        for (name, enabled, color_src, color_dst, alpha_src, alpha_dst) in blends {
            let handle = self.create_blend_state();
            self.blend_state(handle)
                .expect("factory handle is live")
                .init(
                    enabled,
                    color_src,
                    color_dst,
                    BlendOperation::Add,
                    alpha_src,
                    alpha_dst,
                    BlendOperation::Add,
                )?;
            self.register_name(name, NamedResource::BlendState(handle));
        }

        let white_pixel = self.create_texture();
        self.texture(white_pixel)
            .expect("factory handle is live")
            .init_from_bytes(&[255, 255, 255, 255], Extent2D::new(1, 1), false, false)?;
        self.register_name(TEXTURE_WHITE_PIXEL, NamedResource::Texture(white_pixel));

        Ok(())
    }

    /// Returns the device capabilities the renderer was created with.
    pub fn capabilities(&self) -> DeviceCapabilities {
        self.caps
    }

    /// Returns the backend for inspection.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Returns the backend mutably. Intended for backends with debug
    /// surfaces, like the headless backend's operation log.
    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// The index of the frame currently being produced.
    pub fn current_frame(&self) -> u64 {
        self.current_frame.load(Ordering::Relaxed)
    }

    // --- Factories ---

    /// Creates a blank texture registered with the renderer.
    pub fn create_texture(&self) -> TextureHandle {
        let resource = Arc::new(TextureResource::new(self.caps));
        TextureHandle(self.insert(Resource::Texture(resource)))
    }

    /// Creates a blank shader registered with the renderer.
    pub fn create_shader(&self) -> ShaderHandle {
        ShaderHandle(self.insert(Resource::Shader(Arc::new(ShaderResource::new()))))
    }

    /// Creates a blank blend state registered with the renderer.
    pub fn create_blend_state(&self) -> BlendStateHandle {
        BlendStateHandle(self.insert(Resource::BlendState(Arc::new(BlendStateResource::new()))))
    }

    /// Creates a blank buffer registered with the renderer.
    pub fn create_buffer(&self) -> BufferHandle {
        BufferHandle(self.insert(Resource::Buffer(Arc::new(BufferResource::new()))))
    }

    /// Creates a blank mesh buffer registered with the renderer.
    pub fn create_mesh_buffer(&self) -> MeshBufferHandle {
        MeshBufferHandle(self.insert(Resource::MeshBuffer(Arc::new(MeshBufferResource::new()))))
    }

    fn insert(&self, resource: Resource) -> Handle {
        self.resources.lock().unwrap().insert(resource)
    }

    // --- Typed accessors ---

    /// Resolves a texture handle, cloning out the shared resource so setters
    /// run without holding the registry lock.
    pub fn texture(&self, handle: TextureHandle) -> Option<Arc<TextureResource>> {
        self.resources
            .lock()
            .unwrap()
            .get(handle.raw())
            .and_then(Resource::as_texture)
            .cloned()
    }

    /// Resolves a shader handle.
    pub fn shader(&self, handle: ShaderHandle) -> Option<Arc<ShaderResource>> {
        self.resources
            .lock()
            .unwrap()
            .get(handle.raw())
            .and_then(Resource::as_shader)
            .cloned()
    }

    /// Resolves a blend-state handle.
    pub fn blend_state(&self, handle: BlendStateHandle) -> Option<Arc<BlendStateResource>> {
        self.resources
            .lock()
            .unwrap()
            .get(handle.raw())
            .and_then(Resource::as_blend_state)
            .cloned()
    }

    /// Resolves a buffer handle.
    pub fn buffer(&self, handle: BufferHandle) -> Option<Arc<BufferResource>> {
        self.resources
            .lock()
            .unwrap()
            .get(handle.raw())
            .and_then(Resource::as_buffer)
            .cloned()
    }

    /// Resolves a mesh-buffer handle.
    pub fn mesh_buffer(&self, handle: MeshBufferHandle) -> Option<Arc<MeshBufferResource>> {
        self.resources
            .lock()
            .unwrap()
            .get(handle.raw())
            .and_then(Resource::as_mesh_buffer)
            .cloned()
    }

    // --- Deferred destruction ---

    /// Retires a texture; see [`Renderer::retire`].
    pub fn destroy_texture(&self, handle: TextureHandle) -> bool {
        self.retire(handle.raw())
    }

    /// Retires a shader; see [`Renderer::retire`].
    pub fn destroy_shader(&self, handle: ShaderHandle) -> bool {
        self.retire(handle.raw())
    }

    /// Retires a blend state; see [`Renderer::retire`].
    pub fn destroy_blend_state(&self, handle: BlendStateHandle) -> bool {
        self.retire(handle.raw())
    }

    /// Retires a buffer; see [`Renderer::retire`].
    pub fn destroy_buffer(&self, handle: BufferHandle) -> bool {
        self.retire(handle.raw())
    }

    /// Retires a mesh buffer; see [`Renderer::retire`].
    pub fn destroy_mesh_buffer(&self, handle: MeshBufferHandle) -> bool {
        self.retire(handle.raw())
    }

    /// Removes a resource from the active set. The handle becomes stale
    /// immediately; the resource itself is parked in the retire queue and
    /// freed on the backend only once the current frame has completed, so an
    /// in-flight frame never observes the destruction.
    pub fn retire(&self, handle: Handle) -> bool {
        let frame = self.current_frame();
        self.resources.lock().unwrap().retire(handle, frame)
    }

    // --- Named resources ---

    /// Registers `resource` under `name` in the shared named registry,
    /// replacing any previous entry.
    pub fn register_name(&self, name: &str, resource: NamedResource) {
        self.names
            .lock()
            .unwrap()
            .insert(name.to_string(), resource);
    }

    /// Looks up a named resource.
    pub fn lookup(&self, name: &str) -> Option<NamedResource> {
        self.names.lock().unwrap().get(name).copied()
    }

    /// Looks up a named texture.
    pub fn named_texture(&self, name: &str) -> Option<TextureHandle> {
        match self.lookup(name)? {
            NamedResource::Texture(handle) => Some(handle),
            _ => None,
        }
    }

    /// Looks up a named shader.
    pub fn named_shader(&self, name: &str) -> Option<ShaderHandle> {
        match self.lookup(name)? {
            NamedResource::Shader(handle) => Some(handle),
            _ => None,
        }
    }

    /// Looks up a named blend state.
    pub fn named_blend_state(&self, name: &str) -> Option<BlendStateHandle> {
        match self.lookup(name)? {
            NamedResource::BlendState(handle) => Some(handle),
            _ => None,
        }
    }

    // --- Frame settings (staged, logic thread) ---

    /// Stages a back-buffer resize, applied by the next [`Renderer::process`].
    pub fn set_size(&self, size: Extent2D) {
        let _ = self
            .frame
            .stage::<_, std::convert::Infallible>(DirtyFlags::PARAMETERS, |pending| {
                pending.size = size;
                Ok(())
            });
    }

    /// Stages the primary clear color.
    pub fn set_clear_color(&self, color: LinearRgba) {
        let _ = self
            .frame
            .stage::<_, std::convert::Infallible>(DirtyFlags::PARAMETERS, |pending| {
                pending.clear_color = color;
                Ok(())
            });
    }

    /// Stages whether the color plane is cleared at the start of a frame.
    pub fn set_clear_color_buffer(&self, clear: bool) {
        let _ = self
            .frame
            .stage::<_, std::convert::Infallible>(DirtyFlags::PARAMETERS, |pending| {
                pending.clear_color_buffer = clear;
                Ok(())
            });
    }

    /// Stages whether the depth plane is cleared at the start of a frame.
    pub fn set_clear_depth_buffer(&self, clear: bool) {
        let _ = self
            .frame
            .stage::<_, std::convert::Infallible>(DirtyFlags::PARAMETERS, |pending| {
                pending.clear_depth_buffer = clear;
                Ok(())
            });
    }

    /// The committed back-buffer size.
    pub fn size(&self) -> Extent2D {
        self.frame_buffer_size
    }

    /// The effective samples per pixel of the primary frame buffer (the
    /// requested count, clamped to what the device supports).
    pub fn sample_count(&self) -> u32 {
        self.sample_count
    }

    /// Whether the primary frame buffer carries a depth buffer.
    pub fn depth_buffer(&self) -> bool {
        self.depth
    }

    // --- Command queue (logic thread) ---

    /// Appends a draw command to the current frame's queue. Commands are
    /// consumed in submission order; ordering across layers is the caller's
    /// responsibility.
    pub fn queue_command(&self, command: DrawCommand) {
        self.queue.lock().unwrap().push(command);
    }

    // --- Per-frame pipeline (render thread) ---

    /// Runs the pre-draw step: commits staged frame settings, commits every
    /// resource and synchronizes dirty ones with the backend, and drains the
    /// retire queue past the last completed frame. Idempotent when nothing
    /// changed.
    pub fn process(&mut self) -> Result<(), RenderError> {
        if let Some((settings, _)) = self.frame.commit() {
            self.clear_color = settings.clear_color;
            self.clear_color_buffer = settings.clear_color_buffer;
            self.clear_depth_buffer = settings.clear_depth_buffer;

            if settings.size != self.frame_buffer_size {
                self.backend.resize_frame_buffer(settings.size)?;
                self.frame_buffer_size = settings.size;
                // The resize recreated backend objects behind the cache.
                self.cache.invalidate();
            }
            self.frame.mark_synced();
        }

        let entries: Vec<(Handle, Resource)> = {
            let resources = self.resources.lock().unwrap();
            resources
                .iter()
                .map(|(handle, resource)| (handle, resource.clone()))
                .collect()
        };

        for (handle, resource) in entries {
            let result = match &resource {
                Resource::Texture(texture) => texture.commit().map(|(data, _)| {
                    self.backend
                        .sync_texture(handle, &data)
                        .map(|()| texture.mark_synced())
                }),
                Resource::Shader(shader) => shader.commit().map(|(data, _)| {
                    self.backend
                        .sync_shader(handle, &data)
                        .map(|()| shader.mark_synced())
                }),
                Resource::BlendState(blend_state) => blend_state.commit().map(|(data, _)| {
                    self.backend
                        .sync_blend_state(handle, &data)
                        .map(|()| blend_state.mark_synced())
                }),
                Resource::Buffer(buffer) => buffer.commit().map(|(data, _)| {
                    self.backend
                        .sync_buffer(handle, &data)
                        .map(|()| buffer.mark_synced())
                }),
                Resource::MeshBuffer(mesh_buffer) => mesh_buffer.commit().map(|(data, _)| {
                    self.backend
                        .sync_mesh_buffer(handle, &data)
                        .map(|()| mesh_buffer.mark_synced())
                }),
            };

            // A failed sync leaves the resource dirty; commands referencing
            // it are skipped this frame and the sync retries next frame.
            if let Some(Err(err)) = result {
                log::error!("Backend sync failed for {handle:?}: {err}");
            }
        }

        let completed_frame = self.current_frame().saturating_sub(1);
        let mut freed = Vec::new();
        self.resources
            .lock()
            .unwrap()
            .drain_retired(completed_frame, |handle, _| freed.push(handle));
        for handle in freed {
            self.backend.free_resource(handle);
            self.target_cleared_frames.remove(&handle);
        }

        Ok(())
    }

    /// Consumes the draw queue in submission order and issues the frame's
    /// backend calls through the state cache. An empty queue still performs
    /// the pending clear and presents. Backend failures abort the frame.
    pub fn draw(&mut self) -> Result<(), RenderError> {
        let commands = std::mem::take(&mut *self.queue.lock().unwrap());
        let frame = self.current_frame();

        self.backend.begin_frame()?;

        if commands.is_empty() {
            self.primary_cleared_frame = frame;
            if self.clear_color_buffer || self.clear_depth_buffer {
                if self.cache.apply_frame_buffer(FrameBufferTarget::Primary) {
                    self.backend.bind_frame_buffer(FrameBufferTarget::Primary)?;
                }
                let viewport = Region2D::of_extent(self.frame_buffer_size);
                if self.cache.apply_viewport(viewport) {
                    self.backend.set_viewport(viewport)?;
                }
                self.backend.clear(
                    self.clear_color_buffer.then_some(self.clear_color),
                    self.clear_depth_buffer.then_some(1.0),
                )?;
            }
        } else {
            for command in &commands {
                self.draw_command(command, frame)?;
            }
        }

        self.backend.present()?;
        self.current_frame.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Resolves every handle a command references before any state is
    /// touched, so an invalid command is skipped without modifying the
    /// state cache or the clear-once trackers.
    fn resolve_command(
        &self,
        command: &DrawCommand,
        frame: u64,
    ) -> Result<Option<ResolvedCommand>, RenderError> {
        if self.blend_state(command.blend_state).is_none()
            || !self.backend.is_ready(command.blend_state.raw())
        {
            log::debug!("Skipping draw command with invalid blend state.");
            return Ok(None);
        }

        let mut textures = Vec::with_capacity(self.caps.texture_layers as usize);
        for layer in 0..self.caps.texture_layers {
            match command.textures.get(layer as usize) {
                Some(handle) => {
                    if self.texture(*handle).is_none() || !self.backend.is_ready(handle.raw()) {
                        log::debug!("Skipping draw command with invalid texture.");
                        return Ok(None);
                    }
                    textures.push(Some(handle.raw()));
                }
                None => textures.push(None),
            }
        }

        let Some(shader) = self.shader(command.shader) else {
            log::debug!("Skipping draw command with invalid shader.");
            return Ok(None);
        };
        if !self.backend.is_ready(command.shader.raw()) {
            log::debug!("Skipping draw command whose shader has no native program.");
            return Ok(None);
        }

        let (pixel_locations, vertex_locations) = shader.read_committed(|data| {
            (
                constant_layout(&data.pixel_shader_constants).0,
                constant_layout(&data.vertex_shader_constants).0,
            )
        });
        if command.pixel_shader_constants.len() > pixel_locations.len() {
            return Err(RenderError::TooManyConstants {
                supplied: command.pixel_shader_constants.len(),
                declared: pixel_locations.len(),
            });
        }
        if command.vertex_shader_constants.len() > vertex_locations.len() {
            return Err(RenderError::TooManyConstants {
                supplied: command.vertex_shader_constants.len(),
                declared: vertex_locations.len(),
            });
        }

        let (target, target_clear) = match command.render_target {
            Some(handle) => {
                let Some(texture) = self.texture(handle) else {
                    log::debug!("Skipping draw command with invalid render target.");
                    return Ok(None);
                };
                if !self.backend.is_ready(handle.raw()) {
                    return Ok(None);
                }
                let previous = self.target_cleared_frames.get(&handle.raw()).copied();
                let clear = if previous != Some(frame) {
                    let (color, depth, clear_color) = texture.read_committed(|data| {
                        (
                            data.clear_color_buffer,
                            data.clear_depth_buffer,
                            data.clear_color,
                        )
                    });
                    (
                        color.then_some(clear_color),
                        depth.then_some(1.0),
                        Some(handle.raw()),
                    )
                } else {
                    (None, None, None)
                };
                (FrameBufferTarget::Texture(handle.raw()), clear)
            }
            None => {
                let clear = if self.primary_cleared_frame != frame {
                    (
                        self.clear_color_buffer.then_some(self.clear_color),
                        self.clear_depth_buffer.then_some(1.0),
                        None,
                    )
                } else {
                    (None, None, None)
                };
                (FrameBufferTarget::Primary, clear)
            }
        };

        let Some(mesh) = self.mesh_buffer(command.mesh_buffer) else {
            log::debug!("Skipping draw command with invalid mesh buffer.");
            return Ok(None);
        };
        if !self.backend.is_ready(command.mesh_buffer.raw()) {
            return Ok(None);
        }
        let (index_buffer, vertex_buffer) =
            mesh.read_committed(|data| (data.index_buffer, data.vertex_buffer));
        let (Some(index_buffer), Some(vertex_buffer)) = (index_buffer, vertex_buffer) else {
            log::debug!("Skipping draw command whose mesh has unbound buffers.");
            return Ok(None);
        };
        for buffer in [index_buffer, vertex_buffer] {
            if self.buffer(buffer).is_none() || !self.backend.is_ready(buffer.raw()) {
                log::debug!("Skipping draw command with an invalid mesh buffer source.");
                return Ok(None);
            }
        }

        Ok(Some(ResolvedCommand {
            blend_state: command.blend_state.raw(),
            textures,
            shader: command.shader.raw(),
            pixel_locations,
            vertex_locations,
            target,
            target_clear,
            mesh_buffer: command.mesh_buffer.raw(),
        }))
    }

    fn draw_command(&mut self, command: &DrawCommand, frame: u64) -> Result<(), RenderError> {
        let Some(resolved) = self.resolve_command(command, frame)? else {
            return Ok(());
        };

        let fill_mode = if command.wireframe {
            FillMode::Wireframe
        } else {
            FillMode::Solid
        };
        if self.cache.apply_fill_mode(fill_mode) {
            self.backend.set_fill_mode(fill_mode)?;
        }

        if self.cache.apply_blend_state(resolved.blend_state) {
            self.backend.bind_blend_state(resolved.blend_state)?;
        }

        for (layer, handle) in resolved.textures.iter().enumerate() {
            if self.cache.apply_texture(layer as u32, *handle) {
                self.backend.bind_texture(layer as u32, *handle)?;
            }
        }

        if self.cache.apply_program(resolved.shader) {
            self.backend.bind_program(resolved.shader)?;
        }

        for (index, values) in command.pixel_shader_constants.iter().enumerate() {
            self.backend
                .set_constant(ShaderStage::Pixel, resolved.pixel_locations[index], values)?;
        }
        for (index, values) in command.vertex_shader_constants.iter().enumerate() {
            self.backend.set_constant(
                ShaderStage::Vertex,
                resolved.vertex_locations[index],
                values,
            )?;
        }

        if self.cache.apply_frame_buffer(resolved.target) {
            self.backend.bind_frame_buffer(resolved.target)?;
        }
        if self.cache.apply_viewport(command.viewport) {
            self.backend.set_viewport(command.viewport)?;
        }

        let (clear_color, clear_depth, cleared_target) = resolved.target_clear;
        if clear_color.is_some() || clear_depth.is_some() {
            self.backend.clear(clear_color, clear_depth)?;
        }
        // Record the clear only now that the backend accepted it.
        match resolved.target {
            FrameBufferTarget::Primary => self.primary_cleared_frame = frame,
            FrameBufferTarget::Texture(_) => {
                if let Some(target) = cleared_target {
                    self.target_cleared_frames.insert(target, frame);
                }
            }
        }

        if self
            .cache
            .apply_depth_state(command.depth_test, command.depth_write)
        {
            self.backend
                .set_depth_state(command.depth_test, command.depth_write)?;
        }

        if self.cache.apply_scissor(command.scissor_test) {
            self.backend.set_scissor_region(command.scissor_test)?;
        }

        if self.cache.apply_mesh_buffer(resolved.mesh_buffer) {
            self.backend.bind_mesh_buffer(resolved.mesh_buffer)?;
        }

        self.backend
            .draw_indexed(command.draw_mode, command.index_count, command.start_index)
    }

    /// Reads back the primary frame buffer, flips it from the GPU's
    /// bottom-left origin to a top-left image origin, and writes an 8-bit
    /// RGBA PNG to `path`. Failures are reported, never retried.
    pub fn generate_screenshot(&mut self, path: &Path) -> Result<(), RenderError> {
        let (size, mut pixels) = self.backend.read_frame_buffer()?;
        flip_vertically(size, &mut pixels);

        let file = std::fs::File::create(path)
            .map_err(|err| RenderError::EncodingFailed(err.to_string()))?;
        let mut encoder = png::Encoder::new(std::io::BufWriter::new(file), size.width, size.height);
        encoder.set_color(png::ColorType::Rgba);
        encoder.set_depth(png::BitDepth::Eight);
        let mut writer = encoder
            .write_header()
            .map_err(|err| RenderError::EncodingFailed(err.to_string()))?;
        writer
            .write_image_data(&pixels)
            .map_err(|err| RenderError::EncodingFailed(err.to_string()))?;

        log::info!("Screenshot saved to {}", path.display());
        Ok(())
    }
}

impl<B: GraphicsBackend> std::fmt::Debug for Renderer<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Renderer")
            .field("caps", &self.caps)
            .field("frame_buffer_size", &self.frame_buffer_size)
            .field("current_frame", &self.current_frame())
            .field("resources", &self.resources.lock().unwrap().len())
            .finish()
    }
}

/// Flips tightly packed RGBA8 rows so the first row becomes the last.
fn flip_vertically(size: Extent2D, pixels: &mut [u8]) {
    let row_bytes = size.width as usize * 4;
    let height = size.height as usize;
    if row_bytes == 0 {
        return;
    }
    for row in 0..height / 2 {
        let top = row * row_bytes;
        let bottom = (height - row - 1) * row_bytes;
        for column in 0..row_bytes {
            pixels.swap(top + column, bottom + column);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flip_vertically_reverses_row_order() {
        // 2x3 image: rows 0, 1, 2 where every byte in a row is the row index.
        let size = Extent2D::new(2, 3);
        let mut pixels: Vec<u8> = (0..3u8)
            .flat_map(|row| std::iter::repeat(row).take(8))
            .collect();
        flip_vertically(size, &mut pixels);

        assert!(pixels[..8].iter().all(|&b| b == 2));
        assert!(pixels[8..16].iter().all(|&b| b == 1));
        assert!(pixels[16..].iter().all(|&b| b == 0));
    }

    #[test]
    fn flip_vertically_of_single_row_is_identity() {
        let size = Extent2D::new(2, 1);
        let mut pixels = vec![1, 2, 3, 4, 5, 6, 7, 8];
        flip_vertically(size, &mut pixels);
        assert_eq!(pixels, vec![1, 2, 3, 4, 5, 6, 7, 8]);
    }
}
