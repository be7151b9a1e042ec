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

//! # Merle Core
//!
//! Backend-agnostic engine core: math primitives, the double-buffered
//! resource staging model, and the frame-draw pipeline that every graphics
//! backend implements through the [`renderer::GraphicsBackend`] trait.
//!
//! Application logic mutates resources through their public setters (staged
//! under a per-resource lock), while the render thread commits the staged
//! state once per frame and consumes an ordered draw-command queue. Concrete
//! backends live in the `merle-infra` crate.

#![warn(missing_docs)]

pub mod audio;
pub mod engine;
pub mod math;
pub mod renderer;
pub mod utils;

pub use engine::{Engine, EngineSettings};
