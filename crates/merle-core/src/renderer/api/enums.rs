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

//! Shared rendering enumerations and the vertex-attribute flags.

use crate::merle_bitflags;

/// A factor in a blend equation, determining how much a source or destination
/// color contributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlendFactor {
    /// The factor is `0.0`.
    Zero,
    /// The factor is `1.0`.
    One,
    /// The factor is the source color.
    SrcColor,
    /// The factor is `1.0 - src` per color component.
    InvSrcColor,
    /// The factor is the source alpha component (`src.a`).
    SrcAlpha,
    /// The factor is `1.0 - src.a`.
    InvSrcAlpha,
    /// The factor is the destination color.
    DestColor,
    /// The factor is `1.0 - dst` per color component.
    InvDestColor,
    /// The factor is the destination alpha component (`dst.a`).
    DestAlpha,
    /// The factor is `1.0 - dst.a`.
    InvDestAlpha,
    /// The factor is `min(src.a, 1.0 - dst.a)` for color, `1.0` for alpha.
    SrcAlphaSaturate,
    /// The factor is the constant blend color set on the pipeline.
    BlendFactor,
    /// The factor is one minus the constant blend color.
    InvBlendFactor,
}

/// The operation used to combine source and destination colors in a blend
/// equation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlendOperation {
    /// The result is `source + destination`.
    Add,
    /// The result is `source - destination`.
    Subtract,
    /// The result is `destination - source`.
    ReverseSubtract,
    /// The result is `min(source, destination)`.
    Min,
    /// The result is `max(source, destination)`.
    Max,
}

/// The primitive topology used by a draw command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DrawMode {
    /// Each index is an independent point.
    PointList,
    /// Each pair of indices forms an independent line.
    LineList,
    /// Consecutive indices form a connected line strip.
    LineStrip,
    /// Each triple of indices forms an independent triangle.
    TriangleList,
    /// Consecutive indices form a connected triangle strip.
    TriangleStrip,
}

/// The rasterization mode for polygons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FillMode {
    /// Polygons are filled.
    #[default]
    Solid,
    /// Only polygon edges are drawn.
    Wireframe,
}

/// Specifies the data type of indices in an index buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexFormat {
    /// Indices are 16-bit unsigned integers.
    Uint16,
    /// Indices are 32-bit unsigned integers.
    Uint32,
}

impl IndexFormat {
    /// Returns the size of one index in bytes.
    #[inline]
    pub const fn bytes_per_index(&self) -> u32 {
        match self {
            IndexFormat::Uint16 => 2,
            IndexFormat::Uint32 => 4,
        }
    }
}

/// The programmable stage in the graphics pipeline a shader object is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    /// The vertex shader stage.
    Vertex,
    /// The pixel (fragment) shader stage.
    Pixel,
}

/// The type of a declared shader constant (uniform).
///
/// The declared type determines how the backend pushes the constant,
/// regardless of the length of the value the caller supplies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UniformType {
    /// A single `f32` scalar.
    Float,
    /// A 2-component `f32` vector.
    Vec2,
    /// A 3-component `f32` vector.
    Vec3,
    /// A 4-component `f32` vector.
    Vec4,
    /// A 3x3 `f32` matrix.
    Mat3,
    /// A 4x4 `f32` matrix.
    Mat4,
}

impl UniformType {
    /// Returns the number of `f32` components in a constant of this type.
    #[inline]
    pub const fn component_count(&self) -> usize {
        match self {
            UniformType::Float => 1,
            UniformType::Vec2 => 2,
            UniformType::Vec3 => 3,
            UniformType::Vec4 => 4,
            UniformType::Mat3 => 9,
            UniformType::Mat4 => 16,
        }
    }

    /// Returns the size of a constant of this type in bytes.
    #[inline]
    pub const fn byte_size(&self) -> usize {
        self.component_count() * std::mem::size_of::<f32>()
    }
}

merle_bitflags! {
    /// The set of attributes present in a vertex, in buffer order.
    ///
    /// The packed layout follows the fixed attribute order below; the byte
    /// stride of a vertex is the sum of the sizes of the attributes present.
    pub struct VertexAttributes: u32 {
        /// A 3-component `f32` position.
        const POSITION = 1 << 0;
        /// A 4-component `u8` normalized color.
        const COLOR = 1 << 1;
        /// A 3-component `f32` normal.
        const NORMAL = 1 << 2;
        /// A 2-component `f32` texture coordinate (first set).
        const TEXCOORD0 = 1 << 3;
        /// A 2-component `f32` texture coordinate (second set).
        const TEXCOORD1 = 1 << 4;
    }
}

impl VertexAttributes {
    /// The attribute order used to pack a vertex, paired with each
    /// attribute's size in bytes.
    const LAYOUT: [(VertexAttributes, u32); 5] = [
        (VertexAttributes::POSITION, 12),
        (VertexAttributes::COLOR, 4),
        (VertexAttributes::NORMAL, 12),
        (VertexAttributes::TEXCOORD0, 8),
        (VertexAttributes::TEXCOORD1, 8),
    ];

    /// Returns the byte stride of a vertex carrying these attributes.
    pub fn stride(&self) -> u32 {
        Self::LAYOUT
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, size)| size)
            .sum()
    }

    /// Returns the byte offset of `attribute` within a vertex carrying these
    /// attributes, or `None` when the attribute is not present.
    pub fn offset_of(&self, attribute: VertexAttributes) -> Option<u32> {
        if !self.contains(attribute) {
            return None;
        }
        let mut offset = 0;
        for (flag, size) in Self::LAYOUT {
            if flag == attribute {
                return Some(offset);
            }
            if self.contains(flag) {
                offset += size;
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_format_sizes() {
        assert_eq!(IndexFormat::Uint16.bytes_per_index(), 2);
        assert_eq!(IndexFormat::Uint32.bytes_per_index(), 4);
    }

    #[test]
    fn uniform_type_sizes() {
        assert_eq!(UniformType::Float.byte_size(), 4);
        assert_eq!(UniformType::Vec4.byte_size(), 16);
        assert_eq!(UniformType::Mat3.component_count(), 9);
        assert_eq!(UniformType::Mat4.byte_size(), 64);
    }

    #[test]
    fn vertex_stride_sums_present_attributes() {
        let pct = VertexAttributes::POSITION
            | VertexAttributes::COLOR
            | VertexAttributes::TEXCOORD0;
        assert_eq!(pct.stride(), 12 + 4 + 8);

        let pc = VertexAttributes::POSITION | VertexAttributes::COLOR;
        assert_eq!(pc.stride(), 16);
        assert_eq!(VertexAttributes::EMPTY.stride(), 0);
    }

    #[test]
    fn vertex_offsets_follow_declaration_order() {
        let attrs = VertexAttributes::POSITION
            | VertexAttributes::COLOR
            | VertexAttributes::TEXCOORD0;
        assert_eq!(attrs.offset_of(VertexAttributes::POSITION), Some(0));
        assert_eq!(attrs.offset_of(VertexAttributes::COLOR), Some(12));
        // NORMAL is absent, so TEXCOORD0 follows COLOR directly.
        assert_eq!(attrs.offset_of(VertexAttributes::TEXCOORD0), Some(16));
        assert_eq!(attrs.offset_of(VertexAttributes::NORMAL), None);
    }
}
