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

//! The staged shader resource: program sources, vertex attributes, and
//! ordered constant declarations.

use crate::renderer::api::enums::{UniformType, VertexAttributes};
use crate::renderer::api::staging::{DirtyFlags, Staged};
use crate::renderer::error::ResourceError;

/// One declared shader constant (uniform).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstantInfo {
    /// The name of the constant as declared in the shader source.
    pub name: String,
    /// The type of the constant.
    pub ty: UniformType,
}

impl ConstantInfo {
    /// Creates a constant declaration.
    pub fn new(name: impl Into<String>, ty: UniformType) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

/// The resolved byte location of a declared constant inside the stage's
/// constant buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConstantLocation {
    /// Byte offset from the start of the constant buffer.
    pub offset: usize,
    /// The declared type at that offset.
    pub ty: UniformType,
}

/// Derives the byte-offset table for a stage's declared constants by
/// accumulating sizes in declaration order, along with the total buffer size
/// the backend must allocate.
pub fn constant_layout(constants: &[ConstantInfo]) -> (Vec<ConstantLocation>, usize) {
    let mut locations = Vec::with_capacity(constants.len());
    let mut offset = 0usize;
    for info in constants {
        locations.push(ConstantLocation {
            offset,
            ty: info.ty,
        });
        offset += info.ty.byte_size();
    }
    (locations, offset)
}

/// The committed/pending snapshot of a shader.
#[derive(Debug, Clone, Default)]
pub struct ShaderData {
    /// The pixel (fragment) program byte stream.
    pub pixel_shader: Vec<u8>,
    /// The vertex program byte stream.
    pub vertex_shader: Vec<u8>,
    /// The attributes the vertex stage consumes.
    pub vertex_attributes: VertexAttributes,
    /// Ordered constant declarations for the pixel stage.
    pub pixel_shader_constants: Vec<ConstantInfo>,
    /// Ordered constant declarations for the vertex stage.
    pub vertex_shader_constants: Vec<ConstantInfo>,
}

/// A shader resource.
///
/// The base resource only stages and commits data; compiling and linking the
/// native program (and allocating constant buffers from
/// [`constant_layout`]) is the backend sync step, whose failure leaves the
/// committed dirty mask set for a retry and never leaves partial native
/// objects bound.
#[derive(Debug, Default)]
pub struct ShaderResource {
    state: Staged<ShaderData>,
}

impl ShaderResource {
    /// Creates a blank shader resource.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stages the full shader description from program byte streams.
    pub fn init_from_bytes(
        &self,
        pixel_shader: &[u8],
        vertex_shader: &[u8],
        vertex_attributes: VertexAttributes,
        pixel_shader_constants: Vec<ConstantInfo>,
        vertex_shader_constants: Vec<ConstantInfo>,
    ) -> Result<(), ResourceError> {
        self.state.stage(DirtyFlags::ALL, |pending| {
            if pixel_shader.is_empty() || vertex_shader.is_empty() {
                return Err(ResourceError::InvalidData);
            }
            pending.pixel_shader = pixel_shader.to_vec();
            pending.vertex_shader = vertex_shader.to_vec();
            pending.vertex_attributes = vertex_attributes;
            pending.pixel_shader_constants = pixel_shader_constants;
            pending.vertex_shader_constants = vertex_shader_constants;
            Ok(())
        })
    }

    /// Commits staged state; see [`Staged::commit`].
    pub fn commit(&self) -> Option<(ShaderData, DirtyFlags)> {
        self.state.commit()
    }

    /// Clears the committed dirty mask after a successful backend sync.
    pub fn mark_synced(&self) {
        self.state.mark_synced()
    }

    /// Returns `true` while committed state awaits a backend sync.
    pub fn awaiting_sync(&self) -> bool {
        self.state.awaiting_sync()
    }

    /// Reads the committed snapshot.
    pub fn read_committed<R>(&self, read: impl FnOnce(&ShaderData) -> R) -> R {
        self.state.read_committed(read)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_layout_accumulates_in_declaration_order() {
        let constants = vec![
            ConstantInfo::new("color", UniformType::Vec4),
            ConstantInfo::new("intensity", UniformType::Float),
            ConstantInfo::new("model_view_proj", UniformType::Mat4),
        ];
        let (locations, total) = constant_layout(&constants);

        assert_eq!(locations[0].offset, 0);
        assert_eq!(locations[1].offset, 16);
        assert_eq!(locations[2].offset, 20);
        assert_eq!(total, 16 + 4 + 64);
    }

    #[test]
    fn constant_layout_of_empty_declarations() {
        let (locations, total) = constant_layout(&[]);
        assert!(locations.is_empty());
        assert_eq!(total, 0);
    }

    #[test]
    fn init_stages_all_fields() {
        let shader = ShaderResource::new();
        shader
            .init_from_bytes(
                b"ps",
                b"vs",
                VertexAttributes::POSITION | VertexAttributes::TEXCOORD0,
                vec![ConstantInfo::new("color", UniformType::Vec4)],
                vec![ConstantInfo::new("model_view_proj", UniformType::Mat4)],
            )
            .unwrap();

        let (data, dirty) = shader.commit().unwrap();
        assert_eq!(data.pixel_shader, b"ps");
        assert_eq!(data.vertex_shader, b"vs");
        assert_eq!(data.vertex_shader_constants.len(), 1);
        assert!(dirty.contains(DirtyFlags::DATA));

        shader.mark_synced();
        assert!(shader.commit().is_none());
    }

    #[test]
    fn init_rejects_empty_programs() {
        let shader = ShaderResource::new();
        let result = shader.init_from_bytes(
            b"",
            b"vs",
            VertexAttributes::POSITION,
            Vec::new(),
            Vec::new(),
        );
        assert!(matches!(result, Err(ResourceError::InvalidData)));
        assert!(shader.commit().is_none());
    }
}
