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

//! The staged resource model and the draw-command data structures.
//!
//! Organized into several logical sub-modules:
//!
//! - **[`staging`]**: The generic double-buffered pending/committed container.
//! - **[`texture`]**, **[`shader`]**, **[`blend`]**, **[`buffer`]**,
//!   **[`mesh`]**: The closed set of resource variants.
//! - **[`command`]**: The immutable per-frame draw command.
//! - **[`enums`]**: Shared rendering enumerations and attribute flags.

pub mod blend;
pub mod buffer;
pub mod command;
pub mod enums;
pub mod mesh;
pub mod shader;
pub mod staging;
pub mod texture;

pub use self::blend::{BlendStateData, BlendStateResource};
pub use self::buffer::{BufferData, BufferResource, BufferUsage};
pub use self::command::DrawCommand;
pub use self::enums::{
    BlendFactor, BlendOperation, DrawMode, FillMode, IndexFormat, ShaderStage, UniformType,
    VertexAttributes,
};
pub use self::mesh::{MeshBufferData, MeshBufferResource};
pub use self::shader::{
    constant_layout, ConstantInfo, ConstantLocation, ShaderData, ShaderResource,
};
pub use self::staging::{DirtyFlags, Staged};
pub use self::texture::{TextureData, TextureLevel, TextureOptions, TextureResource};

use std::sync::Arc;

/// The closed set of resource variants owned by the renderer's registry.
///
/// Each variant wraps an [`Arc`] so application code can hold a resource and
/// stage mutations from the logic thread without going back through the
/// registry lock; the registry keeps its own clone alive until the resource
/// is retired and the retire queue drains past the last frame that could
/// reference it.
#[derive(Debug, Clone)]
pub enum Resource {
    /// A 2D texture or render target.
    Texture(Arc<TextureResource>),
    /// A vertex/pixel shader program with its constant declarations.
    Shader(Arc<ShaderResource>),
    /// A fixed-function blend configuration.
    BlendState(Arc<BlendStateResource>),
    /// An index or vertex byte buffer.
    Buffer(Arc<BufferResource>),
    /// The pairing of an index buffer and a vertex buffer.
    MeshBuffer(Arc<MeshBufferResource>),
}

impl Resource {
    /// Returns the texture variant, if this is one.
    pub fn as_texture(&self) -> Option<&Arc<TextureResource>> {
        match self {
            Resource::Texture(texture) => Some(texture),
            _ => None,
        }
    }

    /// Returns the shader variant, if this is one.
    pub fn as_shader(&self) -> Option<&Arc<ShaderResource>> {
        match self {
            Resource::Shader(shader) => Some(shader),
            _ => None,
        }
    }

    /// Returns the blend-state variant, if this is one.
    pub fn as_blend_state(&self) -> Option<&Arc<BlendStateResource>> {
        match self {
            Resource::BlendState(blend_state) => Some(blend_state),
            _ => None,
        }
    }

    /// Returns the buffer variant, if this is one.
    pub fn as_buffer(&self) -> Option<&Arc<BufferResource>> {
        match self {
            Resource::Buffer(buffer) => Some(buffer),
            _ => None,
        }
    }

    /// Returns the mesh-buffer variant, if this is one.
    pub fn as_mesh_buffer(&self) -> Option<&Arc<MeshBufferResource>> {
        match self {
            Resource::MeshBuffer(mesh_buffer) => Some(mesh_buffer),
            _ => None,
        }
    }
}
