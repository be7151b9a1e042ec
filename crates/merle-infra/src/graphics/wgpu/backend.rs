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

//! The WGPU implementation of the `GraphicsBackend` capability trait.
//!
//! The portable renderer speaks an immediate-mode contract (bind, clear,
//! draw); WGPU wants whole pipeline state objects and recorded passes. The
//! adaptation happens here: bind calls accumulate into a current draw state,
//! and each indexed draw materializes a render pass plus a pipeline resolved
//! from a cache keyed by the state that WGPU bakes into pipelines (shader,
//! blend, topology, depth toggles, fill mode, target format).
//!
//! The frame is rendered into an offscreen color target and copied to the
//! swapchain image at present time, which keeps the primary frame buffer
//! readable for screenshots.

use std::collections::HashMap;
use std::num::NonZeroU64;

use merle_core::math::{Extent2D, LinearRgba, Region2D};
use merle_core::renderer::{
    constant_layout, BlendStateData, BufferData, BufferUsage, ConstantLocation, DeviceCapabilities,
    DrawMode, FillMode, FrameBufferTarget, GraphicsBackend, Handle, IndexFormat, MeshBufferData,
    PresetSource, RenderError, ResourceError, ShaderData, ShaderError, ShaderPresets, ShaderStage,
    TextureData, VertexAttributes,
};
use raw_window_handle::{RawDisplayHandle, RawWindowHandle};
use wgpu::util::DeviceExt;

use super::context::WgpuContext;
use super::conversions::{vertex_attribute_layout, IntoWgpu};
use super::shaders;

/// Texture layers a draw command can bind.
const TEXTURE_LAYERS: u32 = 2;
/// Size of the per-frame uniform arena the constant pushes are packed into.
const UNIFORM_ARENA_SIZE: u64 = 1 << 20;
/// Depth buffer format for the primary target and render targets.
const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;
/// Format of render-target and sampled textures.
const TEXTURE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;

/// Construction-time configuration of the WGPU backend.
#[derive(Debug, Clone, Copy)]
pub struct WgpuBackendConfig {
    /// The initial back-buffer size.
    pub size: Extent2D,
    /// Whether the primary frame buffer carries a depth buffer.
    pub depth: bool,
    /// Requested samples per pixel (only 1 is currently honored).
    pub sample_count: u32,
}

#[derive(Debug)]
struct TextureEntry {
    // Kept so the native texture outlives every view handed to passes.
    #[allow(dead_code)]
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    sampler: wgpu::Sampler,
    depth_view: Option<wgpu::TextureView>,
    size: Extent2D,
    render_target: bool,
}

#[derive(Debug)]
struct ShaderEntry {
    vertex_module: wgpu::ShaderModule,
    pixel_module: wgpu::ShaderModule,
    vertex_attributes: VertexAttributes,
    vs_locations: Vec<ConstantLocation>,
    ps_locations: Vec<ConstantLocation>,
    vs_size: u64,
    ps_size: u64,
    constants_bind_group: wgpu::BindGroup,
}

#[derive(Debug)]
struct BufferEntry {
    buffer: wgpu::Buffer,
}

#[derive(Debug)]
struct MeshEntry {
    index_buffer: Handle,
    vertex_buffer: Handle,
    index_format: IndexFormat,
    vertex_attributes: VertexAttributes,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct PipelineKey {
    shader: Handle,
    blend: Handle,
    mode: DrawMode,
    index_format: IndexFormat,
    fill: FillMode,
    depth_test: bool,
    depth_write: bool,
    has_depth: bool,
    format: wgpu::TextureFormat,
}

struct FrameState {
    encoder: wgpu::CommandEncoder,
    surface_texture: wgpu::SurfaceTexture,
}

/// The draw state accumulated between bind calls and consumed per draw.
struct DrawState {
    target: FrameBufferTarget,
    viewport: Option<Region2D>,
    scissor: Option<Region2D>,
    depth_test: bool,
    depth_write: bool,
    fill: FillMode,
    blend: Option<Handle>,
    textures: Vec<Option<Handle>>,
    program: Option<Handle>,
    mesh: Option<Handle>,
    pending_clear: Option<(Option<LinearRgba>, Option<f32>)>,
    vs_constants: Vec<u8>,
    ps_constants: Vec<u8>,
}

impl Default for DrawState {
    fn default() -> Self {
        Self {
            target: FrameBufferTarget::Primary,
            viewport: None,
            scissor: None,
            depth_test: false,
            depth_write: false,
            fill: FillMode::Solid,
            blend: None,
            textures: vec![None; TEXTURE_LAYERS as usize],
            program: None,
            mesh: None,
            pending_clear: None,
            vs_constants: Vec::new(),
            ps_constants: Vec::new(),
        }
    }
}

struct OffscreenTarget {
    color: wgpu::Texture,
    color_view: wgpu::TextureView,
    depth_view: Option<wgpu::TextureView>,
    size: Extent2D,
    format: wgpu::TextureFormat,
}

/// The WGPU graphics backend.
pub struct WgpuBackend {
    context: WgpuContext,
    depth_enabled: bool,
    uniform_alignment: u64,
    uniform_arena: wgpu::Buffer,
    arena_cursor: u64,
    constants_layout: wgpu::BindGroupLayout,
    textures_layout: wgpu::BindGroupLayout,
    pipeline_layout: wgpu::PipelineLayout,
    dummy_view: wgpu::TextureView,
    dummy_sampler: wgpu::Sampler,
    offscreen: OffscreenTarget,
    textures: HashMap<Handle, TextureEntry>,
    shaders: HashMap<Handle, ShaderEntry>,
    blend_states: HashMap<Handle, Option<wgpu::BlendState>>,
    buffers: HashMap<Handle, BufferEntry>,
    meshes: HashMap<Handle, MeshEntry>,
    pipelines: HashMap<PipelineKey, wgpu::RenderPipeline>,
    texture_bind_groups: HashMap<Vec<Option<Handle>>, wgpu::BindGroup>,
    polygon_line_supported: bool,
    frame: Option<FrameState>,
    state: DrawState,
}

impl WgpuBackend {
    /// Creates the backend over a window given by its raw handles.
    ///
    /// # Safety
    ///
    /// The window behind the handles must outlive the backend.
    pub unsafe fn new(
        raw_display_handle: RawDisplayHandle,
        raw_window_handle: RawWindowHandle,
        config: WgpuBackendConfig,
    ) -> Result<Self, RenderError> {
        if config.sample_count > 1 {
            log::warn!(
                "Multisampling ({}x) is not implemented by the WGPU backend; using 1 sample.",
                config.sample_count
            );
        }

        let context = pollster::block_on(unsafe {
            WgpuContext::new(raw_display_handle, raw_window_handle, config.size)
        })
        .map_err(|e| RenderError::InitializationFailed(e.to_string()))?;

        let device = &context.device;
        let polygon_line_supported = device
            .features()
            .contains(wgpu::Features::POLYGON_MODE_LINE);
        let uniform_alignment = device
            .limits()
            .min_uniform_buffer_offset_alignment as u64;

        let uniform_arena = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Merle Uniform Arena"),
            size: UNIFORM_ARENA_SIZE,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let constants_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Merle Constants Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: true,
                        min_binding_size: None,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: true,
                        min_binding_size: None,
                    },
                    count: None,
                },
            ],
        });

        let mut texture_entries = Vec::new();
        for layer in 0..TEXTURE_LAYERS {
            texture_entries.push(wgpu::BindGroupLayoutEntry {
                binding: layer * 2,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    sample_type: wgpu::TextureSampleType::Float { filterable: true },
                    view_dimension: wgpu::TextureViewDimension::D2,
                    multisampled: false,
                },
                count: None,
            });
            texture_entries.push(wgpu::BindGroupLayoutEntry {
                binding: layer * 2 + 1,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                count: None,
            });
        }
        let textures_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Merle Textures Layout"),
            entries: &texture_entries,
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Merle Pipeline Layout"),
            bind_group_layouts: &[&constants_layout, &textures_layout],
            push_constant_ranges: &[],
        });

        // Fallback for unbound texture layers.
        let dummy_texture = device.create_texture_with_data(
            &context.queue,
            &wgpu::TextureDescriptor {
                label: Some("Merle Dummy Texture"),
                size: wgpu::Extent3d {
                    width: 1,
                    height: 1,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: TEXTURE_FORMAT,
                usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
                view_formats: &[],
            },
            wgpu::util::TextureDataOrder::LayerMajor,
            &[255, 255, 255, 255],
        );
        let dummy_view = dummy_texture.create_view(&wgpu::TextureViewDescriptor::default());
        let dummy_sampler = device.create_sampler(&wgpu::SamplerDescriptor::default());

        let offscreen = create_offscreen(
            device,
            config.size,
            context.surface_config.format,
            config.depth,
        );

        log::info!(
            "WgpuBackend initialized: {}x{}, depth {}, wireframe {}",
            config.size.width,
            config.size.height,
            config.depth,
            if polygon_line_supported {
                "supported"
            } else {
                "unsupported"
            },
        );

        Ok(Self {
            depth_enabled: config.depth,
            uniform_alignment,
            uniform_arena,
            arena_cursor: 0,
            constants_layout,
            textures_layout,
            pipeline_layout,
            dummy_view,
            dummy_sampler,
            offscreen,
            textures: HashMap::new(),
            shaders: HashMap::new(),
            blend_states: HashMap::new(),
            buffers: HashMap::new(),
            meshes: HashMap::new(),
            pipelines: HashMap::new(),
            texture_bind_groups: HashMap::new(),
            polygon_line_supported,
            frame: None,
            state: DrawState::default(),
            context,
        })
    }

    fn compile_module(
        &self,
        label: &str,
        source: &[u8],
    ) -> Result<wgpu::ShaderModule, ResourceError> {
        let source = std::str::from_utf8(source).map_err(|_| {
            ResourceError::Shader(ShaderError::CompilationError {
                label: label.to_string(),
                details: "shader source is not valid UTF-8 WGSL".to_string(),
            })
        })?;

        let device = &self.context.device;
        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(label),
            source: wgpu::ShaderSource::Wgsl(source.into()),
        });
        if let Some(error) = pollster::block_on(device.pop_error_scope()) {
            return Err(ResourceError::Shader(ShaderError::CompilationError {
                label: label.to_string(),
                details: error.to_string(),
            }));
        }
        Ok(module)
    }

    fn drop_pipelines_for(&mut self, handle: Handle) {
        self.pipelines
            .retain(|key, _| key.shader != handle && key.blend != handle);
        self.texture_bind_groups
            .retain(|textures, _| !textures.contains(&Some(handle)));
    }

    fn ensure_pipeline(&mut self, key: PipelineKey) -> Result<(), RenderError> {
        if self.pipelines.contains_key(&key) {
            return Ok(());
        }

        let shader = self
            .shaders
            .get(&key.shader)
            .ok_or(RenderError::Internal("pipeline shader is gone".to_string()))?;
        let blend = self
            .blend_states
            .get(&key.blend)
            .copied()
            .ok_or(RenderError::Internal("pipeline blend state is gone".to_string()))?;

        let attributes = vertex_attribute_layout(shader.vertex_attributes);
        let vertex_layout = wgpu::VertexBufferLayout {
            array_stride: shader.vertex_attributes.stride() as u64,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &attributes,
        };

        let topology: wgpu::PrimitiveTopology = key.mode.into_wgpu();
        let strip_index_format = matches!(
            key.mode,
            DrawMode::LineStrip | DrawMode::TriangleStrip
        )
        .then(|| key.index_format.into_wgpu());

        let polygon_mode = match key.fill {
            FillMode::Solid => wgpu::PolygonMode::Fill,
            FillMode::Wireframe if self.polygon_line_supported => wgpu::PolygonMode::Line,
            FillMode::Wireframe => {
                log::warn!("Wireframe fill requested without POLYGON_MODE_LINE; drawing solid.");
                wgpu::PolygonMode::Fill
            }
        };

        let depth_stencil = key.has_depth.then(|| wgpu::DepthStencilState {
            format: DEPTH_FORMAT,
            depth_write_enabled: key.depth_write,
            depth_compare: if key.depth_test {
                wgpu::CompareFunction::LessEqual
            } else {
                wgpu::CompareFunction::Always
            },
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        });

        let pipeline = self
            .context
            .device
            .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some("Merle Pipeline"),
                layout: Some(&self.pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &shader.vertex_module,
                    entry_point: Some("vs_main"),
                    compilation_options: Default::default(),
                    buffers: &[vertex_layout],
                },
                primitive: wgpu::PrimitiveState {
                    topology,
                    strip_index_format,
                    front_face: wgpu::FrontFace::Ccw,
                    cull_mode: None,
                    unclipped_depth: false,
                    polygon_mode,
                    conservative: false,
                },
                depth_stencil,
                multisample: wgpu::MultisampleState::default(),
                fragment: Some(wgpu::FragmentState {
                    module: &shader.pixel_module,
                    entry_point: Some("ps_main"),
                    compilation_options: Default::default(),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: key.format,
                        blend,
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                }),
                multiview: None,
                cache: None,
            });

        self.pipelines.insert(key, pipeline);
        Ok(())
    }

    fn ensure_texture_bind_group(&mut self) {
        if self.texture_bind_groups.contains_key(&self.state.textures) {
            return;
        }

        let mut entries = Vec::new();
        for (layer, bound) in self.state.textures.iter().enumerate() {
            let (view, sampler) = (*bound)
                .and_then(|handle| self.textures.get(&handle))
                .map(|entry| (&entry.view, &entry.sampler))
                .unwrap_or((&self.dummy_view, &self.dummy_sampler));
            entries.push(wgpu::BindGroupEntry {
                binding: layer as u32 * 2,
                resource: wgpu::BindingResource::TextureView(view),
            });
            entries.push(wgpu::BindGroupEntry {
                binding: layer as u32 * 2 + 1,
                resource: wgpu::BindingResource::Sampler(sampler),
            });
        }

        let bind_group = self
            .context
            .device
            .create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("Merle Textures Bind Group"),
                layout: &self.textures_layout,
                entries: &entries,
            });
        self.texture_bind_groups
            .insert(self.state.textures.clone(), bind_group);
    }

    /// Reserves an aligned uniform-arena range and writes `bytes` into it.
    fn push_uniforms(&mut self, bytes: &[u8]) -> Result<u64, RenderError> {
        let offset = align_to(self.arena_cursor, self.uniform_alignment);
        let size = bytes.len().max(1) as u64;
        if offset + size > UNIFORM_ARENA_SIZE {
            return Err(RenderError::Internal(
                "per-frame uniform arena exhausted".to_string(),
            ));
        }
        if !bytes.is_empty() {
            self.context
                .queue
                .write_buffer(&self.uniform_arena, offset, bytes);
        }
        self.arena_cursor = offset + size;
        Ok(offset)
    }

    /// Resolves the current target's color/depth views, size, and format.
    fn target_views(
        &self,
    ) -> Result<(&wgpu::TextureView, Option<&wgpu::TextureView>, Extent2D, wgpu::TextureFormat), RenderError>
    {
        match self.state.target {
            FrameBufferTarget::Primary => Ok((
                &self.offscreen.color_view,
                self.offscreen.depth_view.as_ref(),
                self.offscreen.size,
                self.offscreen.format,
            )),
            FrameBufferTarget::Texture(handle) => {
                let entry = self.textures.get(&handle).ok_or_else(|| {
                    RenderError::FrameBufferIncomplete("render target is gone".to_string())
                })?;
                if !entry.render_target {
                    return Err(RenderError::FrameBufferIncomplete(
                        "texture was not created as a render target".to_string(),
                    ));
                }
                Ok((
                    &entry.view,
                    entry.depth_view.as_ref(),
                    entry.size,
                    TEXTURE_FORMAT,
                ))
            }
        }
    }

    /// Flushes a pending clear as a standalone pass (used when a frame ends
    /// with a clear that no draw consumed).
    fn flush_pending_clear(&mut self, encoder: &mut wgpu::CommandEncoder) -> Result<(), RenderError> {
        let Some((color, depth)) = self.state.pending_clear.take() else {
            return Ok(());
        };
        let (color_view, depth_view, _, _) = self.target_views()?;

        let pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Merle Clear Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: color_view,
                depth_slice: None,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: match color {
                        Some(value) => wgpu::LoadOp::Clear(value.into_wgpu()),
                        None => wgpu::LoadOp::Load,
                    },
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: depth_view.map(|view| {
                wgpu::RenderPassDepthStencilAttachment {
                    view,
                    depth_ops: Some(wgpu::Operations {
                        load: match depth {
                            Some(value) => wgpu::LoadOp::Clear(value),
                            None => wgpu::LoadOp::Load,
                        },
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        drop(pass);
        Ok(())
    }
}

impl GraphicsBackend for WgpuBackend {
    fn capabilities(&self) -> DeviceCapabilities {
        DeviceCapabilities {
            npot_textures: true,
            texture_layers: TEXTURE_LAYERS,
            multisampling: false,
        }
    }

    fn shader_presets(&self) -> ShaderPresets {
        ShaderPresets {
            texture: PresetSource {
                pixel: shaders::TEXTURE_PS.as_bytes().to_vec(),
                vertex: shaders::TEXTURE_VS.as_bytes().to_vec(),
            },
            color: PresetSource {
                pixel: shaders::COLOR_PS.as_bytes().to_vec(),
                vertex: shaders::COLOR_VS.as_bytes().to_vec(),
            },
        }
    }

    fn sync_texture(&mut self, handle: Handle, data: &TextureData) -> Result<(), ResourceError> {
        if data.size.is_empty() {
            return Err(ResourceError::InvalidSize { size: data.size });
        }

        let device = &self.context.device;
        let mip_level_count = data.levels.len().max(1) as u32;
        let mut usage = wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST;
        if data.render_target {
            usage |= wgpu::TextureUsages::RENDER_ATTACHMENT;
        }

        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Merle Texture"),
            size: data.size.into_wgpu(),
            mip_level_count,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: TEXTURE_FORMAT,
            usage,
            view_formats: &[],
        });

        for (level, level_data) in data.levels.iter().enumerate() {
            if level_data.pixels.is_empty() {
                continue;
            }
            self.context.queue.write_texture(
                wgpu::TexelCopyTextureInfo {
                    texture: &texture,
                    mip_level: level as u32,
                    origin: wgpu::Origin3d::ZERO,
                    aspect: wgpu::TextureAspect::All,
                },
                &level_data.pixels,
                wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(level_data.pitch),
                    rows_per_image: None,
                },
                level_data.size.into_wgpu(),
            );
        }

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Merle Sampler"),
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: if mip_level_count > 1 {
                wgpu::FilterMode::Linear
            } else {
                wgpu::FilterMode::Nearest
            },
            ..Default::default()
        });

        let depth_view = (data.render_target && data.depth).then(|| {
            device
                .create_texture(&wgpu::TextureDescriptor {
                    label: Some("Merle Render Target Depth"),
                    size: data.size.into_wgpu(),
                    mip_level_count: 1,
                    sample_count: 1,
                    dimension: wgpu::TextureDimension::D2,
                    format: DEPTH_FORMAT,
                    usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
                    view_formats: &[],
                })
                .create_view(&wgpu::TextureViewDescriptor::default())
        });

        self.textures.insert(
            handle,
            TextureEntry {
                texture,
                view,
                sampler,
                depth_view,
                size: data.size,
                render_target: data.render_target,
            },
        );
        // Any cached binding of the previous native texture is stale.
        self.texture_bind_groups
            .retain(|textures, _| !textures.contains(&Some(handle)));
        Ok(())
    }

    fn sync_shader(&mut self, handle: Handle, data: &ShaderData) -> Result<(), ResourceError> {
        let vertex_module = self.compile_module("merle vertex shader", &data.vertex_shader)?;
        let pixel_module = self.compile_module("merle pixel shader", &data.pixel_shader)?;

        let (vs_locations, vs_total) = constant_layout(&data.vertex_shader_constants);
        let (ps_locations, ps_total) = constant_layout(&data.pixel_shader_constants);
        let vs_size = (vs_total as u64).max(16);
        let ps_size = (ps_total as u64).max(16);

        let constants_bind_group =
            self.context
                .device
                .create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some("Merle Constants Bind Group"),
                    layout: &self.constants_layout,
                    entries: &[
                        wgpu::BindGroupEntry {
                            binding: 0,
                            resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                                buffer: &self.uniform_arena,
                                offset: 0,
                                size: NonZeroU64::new(vs_size),
                            }),
                        },
                        wgpu::BindGroupEntry {
                            binding: 1,
                            resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                                buffer: &self.uniform_arena,
                                offset: 0,
                                size: NonZeroU64::new(ps_size),
                            }),
                        },
                    ],
                });

        self.shaders.insert(
            handle,
            ShaderEntry {
                vertex_module,
                pixel_module,
                vertex_attributes: data.vertex_attributes,
                vs_locations,
                ps_locations,
                vs_size,
                ps_size,
                constants_bind_group,
            },
        );
        self.drop_pipelines_for(handle);
        Ok(())
    }

    fn sync_blend_state(
        &mut self,
        handle: Handle,
        data: &BlendStateData,
    ) -> Result<(), ResourceError> {
        let state = data.enabled.then(|| wgpu::BlendState {
            color: wgpu::BlendComponent {
                src_factor: data.color_src.into_wgpu(),
                dst_factor: data.color_dst.into_wgpu(),
                operation: data.color_op.into_wgpu(),
            },
            alpha: wgpu::BlendComponent {
                src_factor: data.alpha_src.into_wgpu(),
                dst_factor: data.alpha_dst.into_wgpu(),
                operation: data.alpha_op.into_wgpu(),
            },
        });

        self.blend_states.insert(handle, state);
        self.drop_pipelines_for(handle);
        Ok(())
    }

    fn sync_buffer(&mut self, handle: Handle, data: &BufferData) -> Result<(), ResourceError> {
        let usage = match data.usage {
            BufferUsage::Vertex => wgpu::BufferUsages::VERTEX,
            BufferUsage::Index => wgpu::BufferUsages::INDEX,
        } | wgpu::BufferUsages::COPY_DST;

        let buffer = if data.data.is_empty() {
            self.context.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("Merle Buffer"),
                size: 4,
                usage,
                mapped_at_creation: false,
            })
        } else {
            self.context
                .device
                .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("Merle Buffer"),
                    contents: &data.data,
                    usage,
                })
        };

        self.buffers.insert(handle, BufferEntry { buffer });
        Ok(())
    }

    fn sync_mesh_buffer(
        &mut self,
        handle: Handle,
        data: &MeshBufferData,
    ) -> Result<(), ResourceError> {
        let (Some(index_buffer), Some(vertex_buffer)) = (data.index_buffer, data.vertex_buffer)
        else {
            return Err(ResourceError::InvalidData);
        };
        self.meshes.insert(
            handle,
            MeshEntry {
                index_buffer: index_buffer.raw(),
                vertex_buffer: vertex_buffer.raw(),
                index_format: data.index_format,
                vertex_attributes: data.vertex_attributes,
            },
        );
        Ok(())
    }

    fn free_resource(&mut self, handle: Handle) {
        self.textures.remove(&handle);
        self.shaders.remove(&handle);
        self.blend_states.remove(&handle);
        self.buffers.remove(&handle);
        self.meshes.remove(&handle);
        self.drop_pipelines_for(handle);
    }

    fn is_ready(&self, handle: Handle) -> bool {
        self.textures.contains_key(&handle)
            || self.shaders.contains_key(&handle)
            || self.blend_states.contains_key(&handle)
            || self.buffers.contains_key(&handle)
            || self.meshes.contains_key(&handle)
    }

    fn resize_frame_buffer(&mut self, size: Extent2D) -> Result<(), RenderError> {
        self.context.resize(size.width, size.height);
        self.offscreen = create_offscreen(
            &self.context.device,
            size,
            self.context.surface_config.format,
            self.depth_enabled,
        );
        Ok(())
    }

    fn begin_frame(&mut self) -> Result<(), RenderError> {
        if self.frame.is_some() {
            return Err(RenderError::Internal(
                "begin_frame called with a frame in flight".to_string(),
            ));
        }

        let surface_texture = loop {
            match self.context.get_current_texture() {
                Ok(texture) => break texture,
                Err(error @ wgpu::SurfaceError::Lost)
                | Err(error @ wgpu::SurfaceError::Outdated) => {
                    let size = self.context.size();
                    log::warn!("Swapchain surface lost or outdated ({error:?}); reconfiguring.");
                    self.context.resize(size.width, size.height);
                }
                Err(error) => {
                    return Err(RenderError::SurfaceAcquisitionFailed(format!("{error:?}")));
                }
            }
        };

        let encoder =
            self.context
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("Merle Frame Encoder"),
                });

        self.frame = Some(FrameState {
            encoder,
            surface_texture,
        });
        self.arena_cursor = 0;
        Ok(())
    }

    fn bind_frame_buffer(&mut self, target: FrameBufferTarget) -> Result<(), RenderError> {
        self.state.target = target;
        Ok(())
    }

    fn clear(
        &mut self,
        color: Option<LinearRgba>,
        depth: Option<f32>,
    ) -> Result<(), RenderError> {
        self.state.pending_clear = Some((color, depth));
        Ok(())
    }

    fn set_viewport(&mut self, region: Region2D) -> Result<(), RenderError> {
        self.state.viewport = Some(region);
        Ok(())
    }

    fn set_scissor_region(&mut self, region: Option<Region2D>) -> Result<(), RenderError> {
        self.state.scissor = region;
        Ok(())
    }

    fn set_depth_state(&mut self, test: bool, write: bool) -> Result<(), RenderError> {
        self.state.depth_test = test;
        self.state.depth_write = write;
        Ok(())
    }

    fn set_fill_mode(&mut self, mode: FillMode) -> Result<(), RenderError> {
        self.state.fill = mode;
        Ok(())
    }

    fn bind_blend_state(&mut self, handle: Handle) -> Result<(), RenderError> {
        self.state.blend = Some(handle);
        Ok(())
    }

    fn bind_texture(&mut self, layer: u32, handle: Option<Handle>) -> Result<(), RenderError> {
        let layer = layer as usize;
        if layer >= self.state.textures.len() {
            return Err(RenderError::Internal(format!(
                "texture layer {layer} out of range"
            )));
        }
        self.state.textures[layer] = handle;
        Ok(())
    }

    fn bind_program(&mut self, handle: Handle) -> Result<(), RenderError> {
        let entry = self
            .shaders
            .get(&handle)
            .ok_or(RenderError::Internal("bound program is gone".to_string()))?;
        self.state.vs_constants = vec![0; entry.vs_size as usize];
        self.state.ps_constants = vec![0; entry.ps_size as usize];
        self.state.program = Some(handle);
        Ok(())
    }

    fn set_constant(
        &mut self,
        stage: ShaderStage,
        location: ConstantLocation,
        values: &[f32],
    ) -> Result<(), RenderError> {
        let staging = match stage {
            ShaderStage::Vertex => &mut self.state.vs_constants,
            ShaderStage::Pixel => &mut self.state.ps_constants,
        };

        let declared = location.ty.byte_size();
        let bytes: &[u8] = bytemuck::cast_slice(values);
        let count = bytes.len().min(declared);
        if staging.len() < location.offset + declared {
            staging.resize(location.offset + declared, 0);
        }
        staging[location.offset..location.offset + count].copy_from_slice(&bytes[..count]);
        Ok(())
    }

    fn bind_mesh_buffer(&mut self, handle: Handle) -> Result<(), RenderError> {
        self.state.mesh = Some(handle);
        Ok(())
    }

    fn draw_indexed(
        &mut self,
        mode: DrawMode,
        index_count: u32,
        start_index: u32,
    ) -> Result<(), RenderError> {
        let program = self
            .state
            .program
            .ok_or(RenderError::Internal("draw without a bound program".to_string()))?;
        let blend = self
            .state
            .blend
            .ok_or(RenderError::Internal("draw without a bound blend state".to_string()))?;
        let mesh_handle = self
            .state
            .mesh
            .ok_or(RenderError::Internal("draw without a bound mesh".to_string()))?;

        let mesh = self
            .meshes
            .get(&mesh_handle)
            .ok_or(RenderError::Internal("bound mesh is gone".to_string()))?;
        let index_format = mesh.index_format;
        let mesh_attributes = mesh.vertex_attributes;
        let (index_handle, vertex_handle) = (mesh.index_buffer, mesh.vertex_buffer);

        let shader_attributes = self
            .shaders
            .get(&program)
            .ok_or(RenderError::Internal("bound program is gone".to_string()))?
            .vertex_attributes;
        if mesh_attributes != shader_attributes {
            return Err(RenderError::Internal(format!(
                "mesh vertex layout {mesh_attributes:?} does not match shader layout {shader_attributes:?}"
            )));
        }

        let (_, depth_view, _, format) = self.target_views()?;
        let has_depth = depth_view.is_some();

        let key = PipelineKey {
            shader: program,
            blend,
            mode,
            index_format,
            fill: self.state.fill,
            depth_test: self.state.depth_test,
            depth_write: self.state.depth_write,
            has_depth,
            format,
        };
        self.ensure_pipeline(key.clone())?;
        self.ensure_texture_bind_group();

        let vs_bytes = std::mem::take(&mut self.state.vs_constants);
        let ps_bytes = std::mem::take(&mut self.state.ps_constants);
        let vs_offset = self.push_uniforms(&vs_bytes)?;
        let ps_offset = self.push_uniforms(&ps_bytes)?;
        self.state.vs_constants = vs_bytes;
        self.state.ps_constants = ps_bytes;

        // Take the frame out of `self` so the pass can borrow resource maps
        // freely; it is put back once the pass is recorded.
        let mut frame = self.frame.take().ok_or(RenderError::NotInitialized)?;
        let pending_clear = self.state.pending_clear.take();
        let result = (|| -> Result<(), RenderError> {
            let (color_view, depth_view, target_size, _) = self.target_views()?;
            let shader = self.shaders.get(&program).expect("checked above");
            let pipeline = self.pipelines.get(&key).expect("ensured above");
            let textures_bind_group = self
                .texture_bind_groups
                .get(&self.state.textures)
                .expect("ensured above");
            let index_buffer = &self
                .buffers
                .get(&index_handle)
                .ok_or(RenderError::Internal("mesh index buffer is gone".to_string()))?
                .buffer;
            let vertex_buffer = &self
                .buffers
                .get(&vertex_handle)
                .ok_or(RenderError::Internal("mesh vertex buffer is gone".to_string()))?
                .buffer;

            let (color_load, depth_load) = match pending_clear {
                Some((color, depth)) => (
                    color
                        .map(|value| wgpu::LoadOp::Clear(value.into_wgpu()))
                        .unwrap_or(wgpu::LoadOp::Load),
                    depth
                        .map(wgpu::LoadOp::Clear)
                        .unwrap_or(wgpu::LoadOp::Load),
                ),
                None => (wgpu::LoadOp::Load, wgpu::LoadOp::Load),
            };

            let mut pass = frame.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Merle Draw Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: color_view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: color_load,
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: depth_view.map(|view| {
                    wgpu::RenderPassDepthStencilAttachment {
                        view,
                        depth_ops: Some(wgpu::Operations {
                            load: depth_load,
                            store: wgpu::StoreOp::Store,
                        }),
                        stencil_ops: None,
                    }
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            pass.set_pipeline(pipeline);
            pass.set_bind_group(
                0,
                &shader.constants_bind_group,
                &[vs_offset as u32, ps_offset as u32],
            );
            pass.set_bind_group(1, textures_bind_group, &[]);

            // The engine's viewport origin is bottom-left; WGPU's is
            // top-left.
            if let Some(viewport) = self.state.viewport {
                let height = viewport.extent.height.min(target_size.height);
                let flipped_y = target_size
                    .height
                    .saturating_sub(viewport.origin.y + height);
                pass.set_viewport(
                    viewport.origin.x as f32,
                    flipped_y as f32,
                    viewport.extent.width.min(target_size.width) as f32,
                    height as f32,
                    0.0,
                    1.0,
                );
            }
            if let Some(scissor) = self.state.scissor {
                let height = scissor.extent.height.min(target_size.height);
                let flipped_y = target_size
                    .height
                    .saturating_sub(scissor.origin.y + height);
                pass.set_scissor_rect(
                    scissor.origin.x.min(target_size.width),
                    flipped_y,
                    scissor.extent.width.min(target_size.width),
                    height,
                );
            }

            pass.set_vertex_buffer(0, vertex_buffer.slice(..));
            pass.set_index_buffer(index_buffer.slice(..), index_format.into_wgpu());
            pass.draw_indexed(start_index..start_index + index_count, 0, 0..1);
            Ok(())
        })();

        self.frame = Some(frame);
        result
    }

    fn present(&mut self) -> Result<(), RenderError> {
        let mut frame = self.frame.take().ok_or(RenderError::NotInitialized)?;

        if self.state.pending_clear.is_some() {
            let flush_result = self.flush_pending_clear(&mut frame.encoder);
            if let Err(error) = flush_result {
                return Err(error);
            }
        }

        // Blit the offscreen frame into the swapchain image.
        let surface_size = self.context.size();
        if surface_size == self.offscreen.size {
            frame.encoder.copy_texture_to_texture(
                wgpu::TexelCopyTextureInfo {
                    texture: &self.offscreen.color,
                    mip_level: 0,
                    origin: wgpu::Origin3d::ZERO,
                    aspect: wgpu::TextureAspect::All,
                },
                wgpu::TexelCopyTextureInfo {
                    texture: &frame.surface_texture.texture,
                    mip_level: 0,
                    origin: wgpu::Origin3d::ZERO,
                    aspect: wgpu::TextureAspect::All,
                },
                self.offscreen.size.into_wgpu(),
            );
        } else {
            log::warn!("Skipping presentation blit: surface and frame buffer sizes differ.");
        }

        self.context.queue.submit(Some(frame.encoder.finish()));
        frame.surface_texture.present();
        Ok(())
    }

    fn read_frame_buffer(&mut self) -> Result<(Extent2D, Vec<u8>), RenderError> {
        let size = self.offscreen.size;
        if size.is_empty() {
            return Err(RenderError::ReadBackFailed(
                "frame buffer has zero size".to_string(),
            ));
        }

        let bytes_per_row = size.width * 4;
        let padded_bytes_per_row = align_to(bytes_per_row as u64, 256) as u32;
        let staging = self.context.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Merle Read-Back Buffer"),
            size: padded_bytes_per_row as u64 * size.height as u64,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let mut encoder =
            self.context
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("Merle Read-Back Encoder"),
                });
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: &self.offscreen.color,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &staging,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_bytes_per_row),
                    rows_per_image: None,
                },
            },
            size.into_wgpu(),
        );
        self.context.queue.submit(Some(encoder.finish()));

        let slice = staging.slice(..);
        let (sender, receiver) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = sender.send(result);
        });
        self.context
            .device
            .poll(wgpu::PollType::Wait)
            .map_err(|error| RenderError::ReadBackFailed(format!("{error:?}")))?;
        receiver
            .recv()
            .map_err(|_| RenderError::ReadBackFailed("map callback dropped".to_string()))?
            .map_err(|error| RenderError::ReadBackFailed(format!("{error:?}")))?;

        let mapped = slice.get_mapped_range();
        let bgra = matches!(
            self.offscreen.format,
            wgpu::TextureFormat::Bgra8Unorm | wgpu::TextureFormat::Bgra8UnormSrgb
        );

        // Strip the row padding and convert to bottom-left-origin RGBA rows.
        let mut pixels = Vec::with_capacity(bytes_per_row as usize * size.height as usize);
        for row in (0..size.height as usize).rev() {
            let start = row * padded_bytes_per_row as usize;
            let row_data = &mapped[start..start + bytes_per_row as usize];
            if bgra {
                for texel in row_data.chunks_exact(4) {
                    pixels.extend_from_slice(&[texel[2], texel[1], texel[0], texel[3]]);
                }
            } else {
                pixels.extend_from_slice(row_data);
            }
        }
        drop(mapped);
        staging.unmap();

        Ok((size, pixels))
    }
}

fn create_offscreen(
    device: &wgpu::Device,
    size: Extent2D,
    format: wgpu::TextureFormat,
    depth: bool,
) -> OffscreenTarget {
    let size = Extent2D::new(size.width.max(1), size.height.max(1));
    let color = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Merle Primary Color"),
        size: size.into_wgpu(),
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
        view_formats: &[],
    });
    let color_view = color.create_view(&wgpu::TextureViewDescriptor::default());

    let depth_view = depth.then(|| {
        device
            .create_texture(&wgpu::TextureDescriptor {
                label: Some("Merle Primary Depth"),
                size: size.into_wgpu(),
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: DEPTH_FORMAT,
                usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
                view_formats: &[],
            })
            .create_view(&wgpu::TextureViewDescriptor::default())
    });

    OffscreenTarget {
        color,
        color_view,
        depth_view,
        size,
        format,
    }
}

const fn align_to(value: u64, alignment: u64) -> u64 {
    (value + alignment - 1) / alignment * alignment
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn align_to_rounds_up_to_multiples() {
        assert_eq!(align_to(0, 256), 0);
        assert_eq!(align_to(1, 256), 256);
        assert_eq!(align_to(256, 256), 256);
        assert_eq!(align_to(257, 256), 512);
    }
}
