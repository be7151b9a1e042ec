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

//! Provides a 4x4 matrix type for transformations and projections.

use super::vector::{Vec3, Vec4};
use std::ops::Mul;

/// A 4x4 matrix with `f32` components, stored in column-major order.
///
/// Column-major storage matches what the graphics backends expect when the
/// matrix is pushed as a shader constant, so `to_cols_array` is a plain copy.
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
#[repr(C)]
pub struct Mat4 {
    /// The four columns of the matrix.
    pub cols: [Vec4; 4],
}

impl Mat4 {
    /// The identity matrix.
    pub const IDENTITY: Self = Self {
        cols: [
            Vec4::new(1.0, 0.0, 0.0, 0.0),
            Vec4::new(0.0, 1.0, 0.0, 0.0),
            Vec4::new(0.0, 0.0, 1.0, 0.0),
            Vec4::new(0.0, 0.0, 0.0, 1.0),
        ],
    };

    /// A matrix with all components set to `0.0`.
    pub const ZERO: Self = Self {
        cols: [Vec4::ZERO, Vec4::ZERO, Vec4::ZERO, Vec4::ZERO],
    };

    /// Creates a matrix from four column vectors.
    #[inline]
    pub const fn from_cols(c0: Vec4, c1: Vec4, c2: Vec4, c3: Vec4) -> Self {
        Self {
            cols: [c0, c1, c2, c3],
        }
    }

    /// Creates a translation matrix.
    #[inline]
    pub fn from_translation(translation: Vec3) -> Self {
        let mut result = Self::IDENTITY;
        result.cols[3] = Vec4::new(translation.x, translation.y, translation.z, 1.0);
        result
    }

    /// Creates a non-uniform scale matrix.
    #[inline]
    pub fn from_scale(scale: Vec3) -> Self {
        Self::from_cols(
            Vec4::new(scale.x, 0.0, 0.0, 0.0),
            Vec4::new(0.0, scale.y, 0.0, 0.0),
            Vec4::new(0.0, 0.0, scale.z, 0.0),
            Vec4::new(0.0, 0.0, 0.0, 1.0),
        )
    }

    /// Creates an orthographic projection matrix mapping the given box to
    /// the unit cube, with a `[0, 1]` depth range.
    pub fn orthographic(
        left: f32,
        right: f32,
        bottom: f32,
        top: f32,
        near: f32,
        far: f32,
    ) -> Self {
        let rcp_width = 1.0 / (right - left);
        let rcp_height = 1.0 / (top - bottom);
        let rcp_depth = 1.0 / (far - near);
        Self::from_cols(
            Vec4::new(2.0 * rcp_width, 0.0, 0.0, 0.0),
            Vec4::new(0.0, 2.0 * rcp_height, 0.0, 0.0),
            Vec4::new(0.0, 0.0, rcp_depth, 0.0),
            Vec4::new(
                -(right + left) * rcp_width,
                -(top + bottom) * rcp_height,
                -near * rcp_depth,
                1.0,
            ),
        )
    }

    /// Returns the transpose of this matrix.
    pub fn transpose(&self) -> Self {
        let c = &self.cols;
        Self::from_cols(
            Vec4::new(c[0].x, c[1].x, c[2].x, c[3].x),
            Vec4::new(c[0].y, c[1].y, c[2].y, c[3].y),
            Vec4::new(c[0].z, c[1].z, c[2].z, c[3].z),
            Vec4::new(c[0].w, c[1].w, c[2].w, c[3].w),
        )
    }

    /// Transforms a [`Vec4`] by this matrix.
    pub fn transform(&self, v: Vec4) -> Vec4 {
        self.cols[0] * v.x + self.cols[1] * v.y + self.cols[2] * v.z + self.cols[3] * v.w
    }

    /// Returns the components as a flat array in column-major order, ready
    /// to be pushed as a shader constant.
    pub fn to_cols_array(&self) -> [f32; 16] {
        let c = &self.cols;
        [
            c[0].x, c[0].y, c[0].z, c[0].w, c[1].x, c[1].y, c[1].z, c[1].w, c[2].x, c[2].y,
            c[2].z, c[2].w, c[3].x, c[3].y, c[3].z, c[3].w,
        ]
    }
}

impl Default for Mat4 {
    #[inline]
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Mul for Mat4 {
    type Output = Self;
    /// Multiplies two matrices (`self * rhs`), composing their transforms.
    fn mul(self, rhs: Self) -> Self::Output {
        Self::from_cols(
            self.transform(rhs.cols[0]),
            self.transform(rhs.cols[1]),
            self.transform(rhs.cols[2]),
            self.transform(rhs.cols[3]),
        )
    }
}

impl Mul<Vec4> for Mat4 {
    type Output = Vec4;
    #[inline]
    fn mul(self, rhs: Vec4) -> Self::Output {
        self.transform(rhs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn identity_is_neutral() {
        let v = Vec4::new(1.0, 2.0, 3.0, 1.0);
        assert_eq!(Mat4::IDENTITY * v, v);
        let m = Mat4::from_translation(Vec3::new(5.0, 0.0, 0.0));
        assert_eq!(Mat4::IDENTITY * m, m);
        assert_eq!(m * Mat4::IDENTITY, m);
    }

    #[test]
    fn translation_moves_points() {
        let m = Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0));
        let p = m * Vec4::new(0.0, 0.0, 0.0, 1.0);
        assert_eq!(p, Vec4::new(1.0, 2.0, 3.0, 1.0));

        // Direction vectors (w == 0) are unaffected by translation.
        let d = m * Vec4::new(1.0, 0.0, 0.0, 0.0);
        assert_eq!(d, Vec4::new(1.0, 0.0, 0.0, 0.0));
    }

    #[test]
    fn scale_then_translate_composes() {
        let s = Mat4::from_scale(Vec3::new(2.0, 2.0, 2.0));
        let t = Mat4::from_translation(Vec3::new(1.0, 0.0, 0.0));
        let p = (t * s) * Vec4::new(1.0, 1.0, 1.0, 1.0);
        assert_eq!(p, Vec4::new(3.0, 2.0, 2.0, 1.0));
    }

    #[test]
    fn orthographic_maps_corners() {
        let m = Mat4::orthographic(0.0, 800.0, 0.0, 600.0, 0.0, 1.0);
        let bottom_left = m * Vec4::new(0.0, 0.0, 0.0, 1.0);
        assert_relative_eq!(bottom_left.x, -1.0);
        assert_relative_eq!(bottom_left.y, -1.0);

        let top_right = m * Vec4::new(800.0, 600.0, 0.0, 1.0);
        assert_relative_eq!(top_right.x, 1.0);
        assert_relative_eq!(top_right.y, 1.0);
    }

    #[test]
    fn transpose_round_trips() {
        let m = Mat4::from_cols(
            Vec4::new(1.0, 2.0, 3.0, 4.0),
            Vec4::new(5.0, 6.0, 7.0, 8.0),
            Vec4::new(9.0, 10.0, 11.0, 12.0),
            Vec4::new(13.0, 14.0, 15.0, 16.0),
        );
        assert_eq!(m.transpose().transpose(), m);
        assert_eq!(m.transpose().cols[0], Vec4::new(1.0, 5.0, 9.0, 13.0));
    }

    #[test]
    fn cols_array_is_column_major() {
        let m = Mat4::from_translation(Vec3::new(7.0, 8.0, 9.0));
        let a = m.to_cols_array();
        assert_eq!(&a[12..15], &[7.0, 8.0, 9.0]);
    }
}
