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

//! The renderer-side mirror of the backend's binding state.
//!
//! Every state-changing backend call goes through one of these `apply_*`
//! checks: when the cached value already matches, the backend call is
//! skipped; when it differs, the cache records the new value and the caller
//! issues the call. The cache must therefore always equal the actual
//! backend-visible state.

use crate::math::Region2D;
use crate::renderer::api::FillMode;
use crate::renderer::arena::Handle;
use crate::renderer::backend::FrameBufferTarget;

/// Tracks the currently bound GPU objects and fixed-function parameters.
///
/// Every field starts unknown so the first application of any state always
/// reaches the backend.
#[derive(Debug, Default)]
pub struct StateCache {
    fill_mode: Option<FillMode>,
    blend_state: Option<Handle>,
    textures: Vec<Option<Handle>>,
    program: Option<Handle>,
    frame_buffer: Option<FrameBufferTarget>,
    viewport: Option<Region2D>,
    scissor: Option<Option<Region2D>>,
    depth_state: Option<(bool, bool)>,
    mesh_buffer: Option<Handle>,
}

impl StateCache {
    /// Creates a cache with room for `texture_layers` texture bindings.
    pub fn new(texture_layers: u32) -> Self {
        Self {
            textures: vec![None; texture_layers as usize],
            ..Default::default()
        }
    }

    /// Returns `true` when the fill mode must be applied to the backend.
    pub fn apply_fill_mode(&mut self, mode: FillMode) -> bool {
        self.update(|cache| &mut cache.fill_mode, mode)
    }

    /// Returns `true` when the blend state must be bound on the backend.
    pub fn apply_blend_state(&mut self, handle: Handle) -> bool {
        self.update(|cache| &mut cache.blend_state, handle)
    }

    /// Returns `true` when `layer` must be rebound (or unbound) on the
    /// backend.
    pub fn apply_texture(&mut self, layer: u32, handle: Option<Handle>) -> bool {
        let layer = layer as usize;
        if layer >= self.textures.len() {
            self.textures.resize(layer + 1, None);
        }
        if self.textures[layer] == handle {
            return false;
        }
        self.textures[layer] = handle;
        true
    }

    /// Returns `true` when the program must be bound on the backend.
    pub fn apply_program(&mut self, handle: Handle) -> bool {
        self.update(|cache| &mut cache.program, handle)
    }

    /// Returns `true` when the frame buffer must be bound on the backend.
    pub fn apply_frame_buffer(&mut self, target: FrameBufferTarget) -> bool {
        self.update(|cache| &mut cache.frame_buffer, target)
    }

    /// Returns `true` when the viewport must be applied to the backend.
    pub fn apply_viewport(&mut self, region: Region2D) -> bool {
        self.update(|cache| &mut cache.viewport, region)
    }

    /// Returns `true` when the scissor state must be applied to the backend.
    pub fn apply_scissor(&mut self, region: Option<Region2D>) -> bool {
        self.update(|cache| &mut cache.scissor, region)
    }

    /// Returns `true` when the depth toggles must be applied to the backend.
    pub fn apply_depth_state(&mut self, test: bool, write: bool) -> bool {
        self.update(|cache| &mut cache.depth_state, (test, write))
    }

    /// Returns `true` when the mesh's buffers must be bound on the backend.
    pub fn apply_mesh_buffer(&mut self, handle: Handle) -> bool {
        self.update(|cache| &mut cache.mesh_buffer, handle)
    }

    /// Drops every cached binding so the next frame re-applies all state.
    ///
    /// Used after backend-level events that invalidate bindings behind the
    /// renderer's back (frame-buffer recreation on resize).
    pub fn invalidate(&mut self) {
        let layers = self.textures.len();
        *self = Self {
            textures: vec![None; layers],
            ..Default::default()
        };
    }

    fn update<T: PartialEq + Copy>(
        &mut self,
        field: impl FnOnce(&mut Self) -> &mut Option<T>,
        value: T,
    ) -> bool {
        let slot = field(self);
        if *slot == Some(value) {
            return false;
        }
        *slot = Some(value);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::arena::Arena;

    fn handles() -> (Handle, Handle) {
        let mut arena = Arena::new();
        (arena.insert(0u8), arena.insert(1u8))
    }

    #[test]
    fn first_application_always_issues() {
        let mut cache = StateCache::new(2);
        let (a, _) = handles();
        assert!(cache.apply_program(a));
        assert!(cache.apply_depth_state(false, false));
        assert!(cache.apply_texture(0, Some(a)));
        // A fresh backend has nothing bound, so unbinding an untouched
        // layer is already satisfied.
        assert!(!cache.apply_texture(1, None));
    }

    #[test]
    fn repeated_application_is_elided() {
        let mut cache = StateCache::new(2);
        let (a, b) = handles();

        assert!(cache.apply_program(a));
        assert!(!cache.apply_program(a));
        assert!(cache.apply_program(b));
        assert!(!cache.apply_program(b));

        assert!(cache.apply_texture(0, Some(a)));
        assert!(!cache.apply_texture(0, Some(a)));
        assert!(cache.apply_texture(1, Some(a)), "layers are independent");
        assert!(cache.apply_texture(0, None));
        assert!(!cache.apply_texture(0, None));
    }

    #[test]
    fn depth_state_compares_both_toggles() {
        let mut cache = StateCache::new(2);
        assert!(cache.apply_depth_state(true, true));
        assert!(!cache.apply_depth_state(true, true));
        assert!(cache.apply_depth_state(true, false));
    }

    #[test]
    fn invalidate_forgets_all_bindings() {
        let mut cache = StateCache::new(2);
        let (a, _) = handles();
        cache.apply_program(a);
        cache.apply_frame_buffer(FrameBufferTarget::Primary);

        cache.invalidate();
        assert!(cache.apply_program(a));
        assert!(cache.apply_frame_buffer(FrameBufferTarget::Primary));
    }
}
