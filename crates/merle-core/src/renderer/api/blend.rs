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

//! The staged blend-state resource.

use crate::renderer::api::enums::{BlendFactor, BlendOperation};
use crate::renderer::api::staging::{DirtyFlags, Staged};
use crate::renderer::error::ResourceError;

/// The committed/pending snapshot of a blend state: a pure configuration
/// value. Any change forces full recreation of the native object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlendStateData {
    /// Whether blending is enabled at all.
    pub enabled: bool,
    /// The source factor for the color channels.
    pub color_src: BlendFactor,
    /// The destination factor for the color channels.
    pub color_dst: BlendFactor,
    /// The operation combining the color factors.
    pub color_op: BlendOperation,
    /// The source factor for the alpha channel.
    pub alpha_src: BlendFactor,
    /// The destination factor for the alpha channel.
    pub alpha_dst: BlendFactor,
    /// The operation combining the alpha factors.
    pub alpha_op: BlendOperation,
}

impl Default for BlendStateData {
    /// Blending disabled, replace semantics (`ONE`/`ZERO`, `ADD`).
    fn default() -> Self {
        Self {
            enabled: false,
            color_src: BlendFactor::One,
            color_dst: BlendFactor::Zero,
            color_op: BlendOperation::Add,
            alpha_src: BlendFactor::One,
            alpha_dst: BlendFactor::Zero,
            alpha_op: BlendOperation::Add,
        }
    }
}

/// A blend-state resource.
#[derive(Debug, Default)]
pub struct BlendStateResource {
    state: Staged<BlendStateData>,
}

impl BlendStateResource {
    /// Creates a blank blend-state resource (blending disabled).
    pub fn new() -> Self {
        Self::default()
    }

    /// Stages the full blend configuration.
    #[allow(clippy::too_many_arguments)]
    pub fn init(
        &self,
        enabled: bool,
        color_src: BlendFactor,
        color_dst: BlendFactor,
        color_op: BlendOperation,
        alpha_src: BlendFactor,
        alpha_dst: BlendFactor,
        alpha_op: BlendOperation,
    ) -> Result<(), ResourceError> {
        self.state.stage(DirtyFlags::PARAMETERS, |pending| {
            *pending = BlendStateData {
                enabled,
                color_src,
                color_dst,
                color_op,
                alpha_src,
                alpha_dst,
                alpha_op,
            };
            Ok(())
        })
    }

    /// Commits staged state; see [`Staged::commit`].
    pub fn commit(&self) -> Option<(BlendStateData, DirtyFlags)> {
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
    pub fn read_committed<R>(&self, read: impl FnOnce(&BlendStateData) -> R) -> R {
        self.state.read_committed(read)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_stages_full_configuration() {
        let blend = BlendStateResource::new();
        blend
            .init(
                true,
                BlendFactor::SrcAlpha,
                BlendFactor::InvSrcAlpha,
                BlendOperation::Add,
                BlendFactor::One,
                BlendFactor::One,
                BlendOperation::Add,
            )
            .unwrap();

        let (data, _) = blend.commit().unwrap();
        assert!(data.enabled);
        assert_eq!(data.color_src, BlendFactor::SrcAlpha);
        assert_eq!(data.color_dst, BlendFactor::InvSrcAlpha);

        blend.mark_synced();
        assert!(blend.commit().is_none());
    }

    #[test]
    fn reinit_forces_full_recreation() {
        let blend = BlendStateResource::new();
        blend
            .init(
                false,
                BlendFactor::One,
                BlendFactor::Zero,
                BlendOperation::Add,
                BlendFactor::One,
                BlendFactor::Zero,
                BlendOperation::Add,
            )
            .unwrap();
        blend.commit();
        blend.mark_synced();

        blend
            .init(
                true,
                BlendFactor::One,
                BlendFactor::One,
                BlendOperation::Add,
                BlendFactor::One,
                BlendFactor::One,
                BlendOperation::Add,
            )
            .unwrap();
        let (data, dirty) = blend.commit().unwrap();
        assert!(data.enabled);
        assert!(!dirty.is_empty());
    }
}
