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

//! The staged mesh-buffer resource: the pairing of an index buffer and a
//! vertex buffer with their interpretation.

use crate::renderer::api::enums::{IndexFormat, VertexAttributes};
use crate::renderer::api::staging::{DirtyFlags, Staged};
use crate::renderer::arena::BufferHandle;
use crate::renderer::error::ResourceError;

/// The committed/pending snapshot of a mesh buffer.
#[derive(Debug, Clone)]
pub struct MeshBufferData {
    /// The buffer holding index data.
    pub index_buffer: Option<BufferHandle>,
    /// The buffer holding vertex data.
    pub vertex_buffer: Option<BufferHandle>,
    /// The width of one index.
    pub index_format: IndexFormat,
    /// The attributes present in each vertex.
    pub vertex_attributes: VertexAttributes,
}

impl Default for MeshBufferData {
    fn default() -> Self {
        Self {
            index_buffer: None,
            vertex_buffer: None,
            index_format: IndexFormat::Uint16,
            vertex_attributes: VertexAttributes::EMPTY,
        }
    }
}

/// A mesh-buffer resource.
#[derive(Debug, Default)]
pub struct MeshBufferResource {
    state: Staged<MeshBufferData>,
}

impl MeshBufferResource {
    /// Creates a blank mesh-buffer resource.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stages the buffer pairing and its interpretation.
    pub fn init(
        &self,
        index_buffer: BufferHandle,
        index_format: IndexFormat,
        vertex_buffer: BufferHandle,
        vertex_attributes: VertexAttributes,
    ) -> Result<(), ResourceError> {
        self.state.stage(DirtyFlags::ALL, |pending| {
            if vertex_attributes.is_empty() {
                return Err(ResourceError::InvalidData);
            }
            pending.index_buffer = Some(index_buffer);
            pending.vertex_buffer = Some(vertex_buffer);
            pending.index_format = index_format;
            pending.vertex_attributes = vertex_attributes;
            Ok(())
        })
    }

    /// Stages a new index format.
    pub fn set_index_format(&self, index_format: IndexFormat) -> Result<(), ResourceError> {
        self.state.stage(DirtyFlags::PARAMETERS, |pending| {
            pending.index_format = index_format;
            Ok(())
        })
    }

    /// Commits staged state; see [`Staged::commit`].
    pub fn commit(&self) -> Option<(MeshBufferData, DirtyFlags)> {
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
    pub fn read_committed<R>(&self, read: impl FnOnce(&MeshBufferData) -> R) -> R {
        self.state.read_committed(read)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_rejects_empty_vertex_layout() {
        let mesh = MeshBufferResource::new();
        let dangling = BufferHandle(crate::renderer::arena::Arena::<u8>::new().insert(0));
        let result = mesh.init(
            dangling,
            IndexFormat::Uint16,
            dangling,
            VertexAttributes::EMPTY,
        );
        assert!(matches!(result, Err(ResourceError::InvalidData)));
    }

    #[test]
    fn index_format_change_is_staged() {
        let mesh = MeshBufferResource::new();
        mesh.set_index_format(IndexFormat::Uint32).unwrap();

        let (data, dirty) = mesh.commit().unwrap();
        assert_eq!(data.index_format, IndexFormat::Uint32);
        assert!(dirty.contains(DirtyFlags::PARAMETERS));
    }
}
