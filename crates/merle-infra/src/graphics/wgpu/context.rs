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

//! Holds the core WGPU state objects required for rendering.

use anyhow::{anyhow, Result};
use merle_core::math::Extent2D;
use raw_window_handle::{RawDisplayHandle, RawWindowHandle};
use wgpu::SurfaceTargetUnsafe;

/// Holds the connection to the graphics API for a specific surface: the
/// adapter, logical device, command queue, and swapchain configuration.
#[derive(Debug)]
pub struct WgpuContext {
    /// The window surface (swapchain).
    pub surface: wgpu::Surface<'static>,
    /// The physical adapter the device was created on.
    pub adapter: wgpu::Adapter,
    /// The logical device.
    pub device: wgpu::Device,
    /// The command queue.
    pub queue: wgpu::Queue,
    /// The surface's swapchain configuration.
    pub surface_config: wgpu::SurfaceConfiguration,
}

impl WgpuContext {
    /// Asynchronously initializes the context for a window given by its raw
    /// display/window handles.
    ///
    /// # Safety
    ///
    /// The handles must outlive the returned context; the caller guarantees
    /// the window stays alive for the duration of rendering.
    pub async unsafe fn new(
        raw_display_handle: RawDisplayHandle,
        raw_window_handle: RawWindowHandle,
        size: Extent2D,
    ) -> Result<Self> {
        log::info!("Initializing WGPU context...");
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());

        let surface_target = SurfaceTargetUnsafe::RawHandle {
            raw_display_handle,
            raw_window_handle,
        };
        let surface = unsafe { instance.create_surface_unsafe(surface_target)? };
        log::debug!("WGPU surface created for the window.");

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                force_fallback_adapter: false,
                compatible_surface: Some(&surface),
            })
            .await
            .map_err(|e| anyhow!("Failed to find a compatible adapter: {e}"))?;

        let adapter_info = adapter.get_info();
        log::info!(
            "Using graphics adapter: \"{}\" (Backend: {:?})",
            adapter_info.name,
            adapter_info.backend
        );

        // Wireframe rasterization is optional hardware support.
        let optional_features = wgpu::Features::POLYGON_MODE_LINE;
        let features_to_enable = adapter.features() & optional_features;

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("Merle Logical Device"),
                required_features: features_to_enable,
                required_limits: wgpu::Limits::default(),
                memory_hints: wgpu::MemoryHints::default(),
                trace: wgpu::Trace::default(),
            })
            .await
            .map_err(|e| anyhow!("Failed to create logical device: {e}"))?;
        log::info!("Logical device and command queue created.");

        device.on_uncaptured_error(Box::new(|e| {
            log::error!("WGPU Uncaptured Error: {e:?}");
        }));

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .unwrap_or(surface_caps.formats[0]);

        let surface_config = wgpu::SurfaceConfiguration {
            // The frame is rendered into an offscreen target and copied to
            // the surface, so the surface needs COPY_DST as well.
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_DST,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: surface_caps
                .present_modes
                .iter()
                .copied()
                .find(|m| *m == wgpu::PresentMode::Mailbox)
                .unwrap_or(wgpu::PresentMode::Fifo),
            alpha_mode: surface_caps.alpha_modes[0],
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &surface_config);

        Ok(Self {
            surface,
            adapter,
            device,
            queue,
            surface_config,
        })
    }

    /// Reconfigures the underlying surface (swapchain) when the window is
    /// resized.
    pub fn resize(&mut self, new_width: u32, new_height: u32) {
        if new_width > 0 && new_height > 0 {
            log::info!("WgpuContext: resizing surface to {new_width}x{new_height}");
            self.surface_config.width = new_width;
            self.surface_config.height = new_height;
            self.surface.configure(&self.device, &self.surface_config);
        } else {
            log::warn!(
                "WgpuContext: ignoring resize request to zero dimensions: {new_width}x{new_height}"
            );
        }
    }

    /// Returns the current surface texture for rendering.
    pub fn get_current_texture(&self) -> Result<wgpu::SurfaceTexture, wgpu::SurfaceError> {
        self.surface.get_current_texture()
    }

    /// The current size of the swapchain surface.
    pub fn size(&self) -> Extent2D {
        Extent2D::new(self.surface_config.width, self.surface_config.height)
    }
}
