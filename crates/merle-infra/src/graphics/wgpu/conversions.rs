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

//! Conversions from the engine's rendering types to WGPU types.

use merle_core::math::{Extent2D, LinearRgba};
use merle_core::renderer::{
    BlendFactor, BlendOperation, DrawMode, IndexFormat, VertexAttributes,
};

/// A local extension trait to convert our engine's types into WGPU-compatible
/// types. This avoids Rust's orphan rules while keeping an idiomatic
/// `.into_wgpu()` syntax.
pub trait IntoWgpu<T> {
    /// Consumes self and converts it into a WGPU-compatible type.
    fn into_wgpu(self) -> T;
}

impl IntoWgpu<wgpu::BlendFactor> for BlendFactor {
    fn into_wgpu(self) -> wgpu::BlendFactor {
        match self {
            BlendFactor::Zero => wgpu::BlendFactor::Zero,
            BlendFactor::One => wgpu::BlendFactor::One,
            BlendFactor::SrcColor => wgpu::BlendFactor::Src,
            BlendFactor::InvSrcColor => wgpu::BlendFactor::OneMinusSrc,
            BlendFactor::SrcAlpha => wgpu::BlendFactor::SrcAlpha,
            BlendFactor::InvSrcAlpha => wgpu::BlendFactor::OneMinusSrcAlpha,
            BlendFactor::DestColor => wgpu::BlendFactor::Dst,
            BlendFactor::InvDestColor => wgpu::BlendFactor::OneMinusDst,
            BlendFactor::DestAlpha => wgpu::BlendFactor::DstAlpha,
            BlendFactor::InvDestAlpha => wgpu::BlendFactor::OneMinusDstAlpha,
            BlendFactor::SrcAlphaSaturate => wgpu::BlendFactor::SrcAlphaSaturated,
            BlendFactor::BlendFactor => wgpu::BlendFactor::Constant,
            BlendFactor::InvBlendFactor => wgpu::BlendFactor::OneMinusConstant,
        }
    }
}

impl IntoWgpu<wgpu::BlendOperation> for BlendOperation {
    fn into_wgpu(self) -> wgpu::BlendOperation {
        match self {
            BlendOperation::Add => wgpu::BlendOperation::Add,
            BlendOperation::Subtract => wgpu::BlendOperation::Subtract,
            BlendOperation::ReverseSubtract => wgpu::BlendOperation::ReverseSubtract,
            BlendOperation::Min => wgpu::BlendOperation::Min,
            BlendOperation::Max => wgpu::BlendOperation::Max,
        }
    }
}

impl IntoWgpu<wgpu::PrimitiveTopology> for DrawMode {
    fn into_wgpu(self) -> wgpu::PrimitiveTopology {
        match self {
            DrawMode::PointList => wgpu::PrimitiveTopology::PointList,
            DrawMode::LineList => wgpu::PrimitiveTopology::LineList,
            DrawMode::LineStrip => wgpu::PrimitiveTopology::LineStrip,
            DrawMode::TriangleList => wgpu::PrimitiveTopology::TriangleList,
            DrawMode::TriangleStrip => wgpu::PrimitiveTopology::TriangleStrip,
        }
    }
}

impl IntoWgpu<wgpu::IndexFormat> for IndexFormat {
    fn into_wgpu(self) -> wgpu::IndexFormat {
        match self {
            IndexFormat::Uint16 => wgpu::IndexFormat::Uint16,
            IndexFormat::Uint32 => wgpu::IndexFormat::Uint32,
        }
    }
}

impl IntoWgpu<wgpu::Color> for LinearRgba {
    fn into_wgpu(self) -> wgpu::Color {
        wgpu::Color {
            r: self.r as f64,
            g: self.g as f64,
            b: self.b as f64,
            a: self.a as f64,
        }
    }
}

impl IntoWgpu<wgpu::Extent3d> for Extent2D {
    fn into_wgpu(self) -> wgpu::Extent3d {
        wgpu::Extent3d {
            width: self.width,
            height: self.height,
            depth_or_array_layers: 1,
        }
    }
}

/// The fixed shader-location numbering of the engine's vertex attributes.
fn shader_location(attribute: VertexAttributes) -> u32 {
    match attribute {
        VertexAttributes::POSITION => 0,
        VertexAttributes::COLOR => 1,
        VertexAttributes::NORMAL => 2,
        VertexAttributes::TEXCOORD0 => 3,
        VertexAttributes::TEXCOORD1 => 4,
        _ => unreachable!("shader_location is called per single attribute"),
    }
}

fn attribute_format(attribute: VertexAttributes) -> wgpu::VertexFormat {
    match attribute {
        VertexAttributes::POSITION | VertexAttributes::NORMAL => wgpu::VertexFormat::Float32x3,
        VertexAttributes::COLOR => wgpu::VertexFormat::Unorm8x4,
        VertexAttributes::TEXCOORD0 | VertexAttributes::TEXCOORD1 => wgpu::VertexFormat::Float32x2,
        _ => unreachable!("attribute_format is called per single attribute"),
    }
}

/// Builds the WGPU vertex attribute list for a packed vertex carrying
/// `attributes`, using the engine's fixed attribute order and locations.
pub fn vertex_attribute_layout(attributes: VertexAttributes) -> Vec<wgpu::VertexAttribute> {
    [
        VertexAttributes::POSITION,
        VertexAttributes::COLOR,
        VertexAttributes::NORMAL,
        VertexAttributes::TEXCOORD0,
        VertexAttributes::TEXCOORD1,
    ]
    .into_iter()
    .filter(|attribute| attributes.contains(*attribute))
    .map(|attribute| wgpu::VertexAttribute {
        format: attribute_format(attribute),
        offset: attributes
            .offset_of(attribute)
            .expect("attribute is present") as u64,
        shader_location: shader_location(attribute),
    })
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blend_factor_translation() {
        assert_eq!(
            BlendFactor::InvSrcAlpha.into_wgpu(),
            wgpu::BlendFactor::OneMinusSrcAlpha
        );
        assert_eq!(
            BlendFactor::BlendFactor.into_wgpu(),
            wgpu::BlendFactor::Constant
        );
        assert_eq!(
            BlendFactor::SrcAlphaSaturate.into_wgpu(),
            wgpu::BlendFactor::SrcAlphaSaturated
        );
    }

    #[test]
    fn draw_mode_translation() {
        assert_eq!(
            DrawMode::TriangleStrip.into_wgpu(),
            wgpu::PrimitiveTopology::TriangleStrip
        );
        assert_eq!(
            DrawMode::PointList.into_wgpu(),
            wgpu::PrimitiveTopology::PointList
        );
    }

    #[test]
    fn vertex_layout_matches_packed_offsets() {
        let attrs = VertexAttributes::POSITION
            | VertexAttributes::COLOR
            | VertexAttributes::TEXCOORD0;
        let layout = vertex_attribute_layout(attrs);

        assert_eq!(layout.len(), 3);
        assert_eq!(layout[0].shader_location, 0);
        assert_eq!(layout[0].offset, 0);
        assert_eq!(layout[1].format, wgpu::VertexFormat::Unorm8x4);
        assert_eq!(layout[1].offset, 12);
        assert_eq!(layout[2].shader_location, 3);
        assert_eq!(layout[2].offset, 16);
    }
}
