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

//! The WGPU implementation of the engine's `GraphicsBackend` contract.
//!
//! One code path reaches Direct3D, Metal, OpenGL/ES and Vulkan through
//! WGPU's hardware abstraction, replacing the per-API backends a native
//! engine would carry.

mod backend;
mod context;
mod conversions;
mod shaders;

pub use backend::{WgpuBackend, WgpuBackendConfig};
pub use context::WgpuContext;
