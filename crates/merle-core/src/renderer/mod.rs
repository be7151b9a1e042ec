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

//! The backend-agnostic rendering core.
//!
//! This module defines the "common language" of the renderer: the staged
//! resource model ([`api`]), the generational resource [`arena`], the GPU
//! binding-state [`cache`], the [`GraphicsBackend`] capability trait that
//! concrete backends implement, and the [`Renderer`] that drives resource
//! uploads and the per-frame draw-command pipeline.
//!
//! The module defines the 'what' of rendering, while the 'how' is handled by
//! a backend implementation: the recording [`HeadlessBackend`] shipped here
//! for tests and GPU-less platforms, or the WGPU backend in the
//! `merle-infra` crate.

pub mod api;
pub mod arena;
pub mod backend;
pub mod cache;
pub mod error;
pub mod headless;
#[allow(clippy::module_inception)]
pub mod renderer;

// Re-export the most important traits and types for easier use.
pub use self::api::*;
pub use self::arena::{
    Arena, BlendStateHandle, BufferHandle, Handle, MeshBufferHandle, ShaderHandle, TextureHandle,
};
pub use self::backend::{
    DeviceCapabilities, FrameBufferTarget, GraphicsBackend, PresetSource, ShaderPresets,
};
pub use self::cache::StateCache;
pub use self::error::{RenderError, ResourceError, ShaderError};
pub use self::headless::{BackendOp, HeadlessBackend};
pub use self::renderer::{
    NamedResource, Renderer, RendererSettings, BLEND_ADD, BLEND_ALPHA, BLEND_MULTIPLY,
    BLEND_NO_BLEND, SHADER_COLOR, SHADER_TEXTURE, TEXTURE_WHITE_PIXEL,
};
