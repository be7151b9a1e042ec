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

//! Defines the hierarchy of error types for the rendering subsystem.

use crate::math::Extent2D;
use std::fmt;

/// An error related to the compilation or linking of a shader program.
#[derive(Debug)]
pub enum ShaderError {
    /// The shader source failed to compile into a backend-specific module.
    CompilationError {
        /// A descriptive label for the shader, if available.
        label: String,
        /// Detailed error messages from the shader compiler.
        details: String,
    },
    /// The compiled shader stages failed to link into a program.
    LinkError {
        /// A descriptive label for the program, if available.
        label: String,
        /// Detailed error messages from the linker.
        details: String,
    },
    /// The backend failed to allocate the constant buffer for the program.
    ConstantBufferAllocationFailed {
        /// The requested buffer size in bytes.
        size: usize,
    },
}

impl fmt::Display for ShaderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShaderError::CompilationError { label, details } => {
                write!(f, "Shader compilation failed for '{label}': {details}")
            }
            ShaderError::LinkError { label, details } => {
                write!(f, "Shader program link failed for '{label}': {details}")
            }
            ShaderError::ConstantBufferAllocationFailed { size } => {
                write!(f, "Failed to allocate a {size}-byte shader constant buffer")
            }
        }
    }
}

impl std::error::Error for ShaderError {}

/// An error related to the configuration or backend synchronization of a
/// renderer resource (textures, shaders, blend states, buffers).
#[derive(Debug)]
pub enum ResourceError {
    /// A shader-specific error occurred.
    Shader(ShaderError),
    /// A mutation was attempted on a resource that was not created dynamic.
    NotDynamic,
    /// The requested size has a zero dimension.
    InvalidSize {
        /// The rejected size.
        size: Extent2D,
    },
    /// The provided byte payload was empty or does not match the size.
    InvalidData,
    /// The handle used to reference a resource is stale or of the wrong kind.
    InvalidHandle,
    /// An error originating from the specific graphics backend implementation.
    BackendError(String),
}

impl fmt::Display for ResourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceError::Shader(err) => write!(f, "Shader resource error: {err}"),
            ResourceError::NotDynamic => {
                write!(f, "Resource was not created dynamic and cannot be mutated.")
            }
            ResourceError::InvalidSize { size } => {
                write!(f, "Invalid resource size {}x{}.", size.width, size.height)
            }
            ResourceError::InvalidData => {
                write!(f, "Resource data is empty or does not match its size.")
            }
            ResourceError::InvalidHandle => write!(f, "Invalid or stale resource handle."),
            ResourceError::BackendError(msg) => {
                write!(f, "Backend-specific resource error: {msg}")
            }
        }
    }
}

impl std::error::Error for ResourceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ResourceError::Shader(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ShaderError> for ResourceError {
    fn from(err: ShaderError) -> Self {
        ResourceError::Shader(err)
    }
}

/// A frame-fatal error from the renderer or the graphics backend.
///
/// Draw-time invalidity of a single command (missing blend state, shader, or
/// mesh buffer) is a soft condition handled by skipping the command; the
/// variants here abort the whole frame.
#[derive(Debug)]
pub enum RenderError {
    /// An operation was attempted before the backend was initialized.
    NotInitialized,
    /// A failure occurred during the initialization of the graphics backend.
    InitializationFailed(String),
    /// Failed to acquire the next frame from the swapchain/surface.
    SurfaceAcquisitionFailed(String),
    /// The target frame buffer is incomplete or unusable.
    FrameBufferIncomplete(String),
    /// A draw command supplied more shader constants than the shader declares.
    TooManyConstants {
        /// The number of constants the command supplied.
        supplied: usize,
        /// The number of constants the shader declares for that stage.
        declared: usize,
    },
    /// Reading pixels back from the frame buffer failed.
    ReadBackFailed(String),
    /// Encoding or writing the screenshot image failed.
    EncodingFailed(String),
    /// An error occurred while managing a GPU resource.
    ResourceError(ResourceError),
    /// An unexpected or internal error occurred.
    Internal(String),
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderError::NotInitialized => {
                write!(f, "The rendering backend is not initialized.")
            }
            RenderError::InitializationFailed(msg) => {
                write!(f, "Failed to initialize graphics backend: {msg}")
            }
            RenderError::SurfaceAcquisitionFailed(msg) => {
                write!(f, "Failed to acquire surface for rendering: {msg}")
            }
            RenderError::FrameBufferIncomplete(msg) => {
                write!(f, "Frame buffer is incomplete: {msg}")
            }
            RenderError::TooManyConstants { supplied, declared } => {
                write!(
                    f,
                    "Draw command supplied {supplied} shader constants but only {declared} are declared."
                )
            }
            RenderError::ReadBackFailed(msg) => {
                write!(f, "Failed to read pixels from the frame buffer: {msg}")
            }
            RenderError::EncodingFailed(msg) => {
                write!(f, "Failed to encode screenshot image: {msg}")
            }
            RenderError::ResourceError(err) => {
                write!(f, "Graphics resource operation failed: {err}")
            }
            RenderError::Internal(msg) => {
                write!(f, "An internal or unexpected error occurred: {msg}")
            }
        }
    }
}

impl std::error::Error for RenderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RenderError::ResourceError(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ResourceError> for RenderError {
    fn from(err: ResourceError) -> Self {
        RenderError::ResourceError(err)
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error;

    use super::*;

    #[test]
    fn shader_error_display() {
        let err = ShaderError::CompilationError {
            label: "texture".to_string(),
            details: "syntax error at line 5".to_string(),
        };
        assert_eq!(
            format!("{err}"),
            "Shader compilation failed for 'texture': syntax error at line 5"
        );
    }

    #[test]
    fn resource_error_display_wrapping_shader_error() {
        let shader_err = ShaderError::LinkError {
            label: "color".to_string(),
            details: "missing entry point".to_string(),
        };
        let res_err: ResourceError = shader_err.into();
        assert_eq!(
            format!("{res_err}"),
            "Shader resource error: Shader program link failed for 'color': missing entry point"
        );
        assert!(res_err.source().is_some());
    }

    #[test]
    fn render_error_display_wrapping_resource_error() {
        let res_err: ResourceError = ResourceError::NotDynamic;
        let render_err: RenderError = res_err.into();
        assert_eq!(
            format!("{render_err}"),
            "Graphics resource operation failed: Resource was not created dynamic and cannot be mutated."
        );
        assert!(render_err.source().is_some());
    }

    #[test]
    fn too_many_constants_display() {
        let err = RenderError::TooManyConstants {
            supplied: 3,
            declared: 1,
        };
        assert_eq!(
            format!("{err}"),
            "Draw command supplied 3 shader constants but only 1 are declared."
        );
    }
}
