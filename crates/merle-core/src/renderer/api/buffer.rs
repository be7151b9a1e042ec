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

//! The staged byte-buffer resource backing index and vertex data.

use crate::renderer::api::staging::{DirtyFlags, Staged};
use crate::renderer::error::ResourceError;

/// What a buffer is bound as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BufferUsage {
    /// The buffer holds vertex data.
    #[default]
    Vertex,
    /// The buffer holds index data.
    Index,
}

/// The committed/pending snapshot of a buffer.
#[derive(Debug, Clone, Default)]
pub struct BufferData {
    /// What the buffer is bound as.
    pub usage: BufferUsage,
    /// Whether the buffer may be mutated after creation.
    pub dynamic: bool,
    /// The raw byte payload.
    pub data: Vec<u8>,
}

/// A buffer resource.
#[derive(Debug, Default)]
pub struct BufferResource {
    state: Staged<BufferData>,
}

impl BufferResource {
    /// Creates a blank buffer resource.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stages an empty buffer of the given usage.
    pub fn init(&self, usage: BufferUsage, dynamic: bool) -> Result<(), ResourceError> {
        self.state.stage(DirtyFlags::ALL, |pending| {
            pending.usage = usage;
            pending.dynamic = dynamic;
            pending.data.clear();
            Ok(())
        })
    }

    /// Stages a buffer initialized from a byte payload.
    pub fn init_from_bytes(
        &self,
        data: &[u8],
        usage: BufferUsage,
        dynamic: bool,
    ) -> Result<(), ResourceError> {
        self.state.stage(DirtyFlags::ALL, |pending| {
            pending.usage = usage;
            pending.dynamic = dynamic;
            pending.data = data.to_vec();
            Ok(())
        })
    }

    /// Stages a new payload for a dynamic buffer.
    ///
    /// Fails without mutating state for non-dynamic buffers or an empty
    /// payload.
    pub fn set_data(&self, data: &[u8]) -> Result<(), ResourceError> {
        self.state.stage(DirtyFlags::DATA, |pending| {
            if !pending.dynamic {
                return Err(ResourceError::NotDynamic);
            }
            if data.is_empty() {
                return Err(ResourceError::InvalidData);
            }
            pending.data = data.to_vec();
            Ok(())
        })
    }

    /// Commits staged state; see [`Staged::commit`].
    pub fn commit(&self) -> Option<(BufferData, DirtyFlags)> {
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
    pub fn read_committed<R>(&self, read: impl FnOnce(&BufferData) -> R) -> R {
        self.state.read_committed(read)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_data_requires_dynamic() {
        let buffer = BufferResource::new();
        buffer
            .init_from_bytes(&[1, 2, 3], BufferUsage::Vertex, false)
            .unwrap();

        assert!(matches!(
            buffer.set_data(&[4, 5, 6]),
            Err(ResourceError::NotDynamic)
        ));
    }

    #[test]
    fn set_data_rejects_empty_payload() {
        let buffer = BufferResource::new();
        buffer
            .init_from_bytes(&[1, 2, 3], BufferUsage::Index, true)
            .unwrap();

        assert!(matches!(
            buffer.set_data(&[]),
            Err(ResourceError::InvalidData)
        ));
    }

    #[test]
    fn staging_is_last_write_wins() {
        let buffer = BufferResource::new();
        buffer
            .init_from_bytes(&[1], BufferUsage::Vertex, true)
            .unwrap();
        buffer.set_data(&[2]).unwrap();
        buffer.set_data(&[3]).unwrap();

        let (data, _) = buffer.commit().unwrap();
        assert_eq!(data.data, vec![3]);
    }
}
