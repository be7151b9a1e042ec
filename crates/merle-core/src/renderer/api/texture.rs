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

//! The staged texture resource and its mip-chain generation.
//!
//! Textures hold 8-bit RGBA pixel data as an ordered sequence of mip levels,
//! level 0 being the base image. Mip pixel data is generated on the CPU by an
//! iterative 2x2 box filter operating in approximately linear light, so that
//! minified textures keep their perceived brightness.

use crate::math::{is_power_of_two, Extent2D, LinearRgba};
use crate::renderer::api::staging::{DirtyFlags, Staged};
use crate::renderer::backend::DeviceCapabilities;
use crate::renderer::error::ResourceError;

/// Bytes per RGBA8 pixel.
const BYTES_PER_PIXEL: u32 = 4;

/// One mip level of a texture.
#[derive(Debug, Clone, Default)]
pub struct TextureLevel {
    /// The dimensions of this level.
    pub size: Extent2D,
    /// Bytes per row of pixel data.
    pub pitch: u32,
    /// Raw RGBA8 pixel data; empty for levels without CPU-side pixels
    /// (blank and render-target textures).
    pub pixels: Vec<u8>,
}

/// Creation-time options for a texture.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextureOptions {
    /// Whether the texture may be mutated after creation.
    pub dynamic: bool,
    /// Whether a mip chain should be computed.
    pub mipmaps: bool,
    /// Whether the texture is a render target.
    pub render_target: bool,
    /// The number of samples per pixel for a render target.
    pub sample_count: u32,
    /// Whether a render target carries a depth buffer.
    pub depth: bool,
}

/// The committed/pending snapshot of a texture.
#[derive(Debug, Clone)]
pub struct TextureData {
    /// The base dimensions of the texture.
    pub size: Extent2D,
    /// Whether the texture may be mutated after creation.
    pub dynamic: bool,
    /// Whether a mip chain was requested.
    pub mipmaps: bool,
    /// Whether a mip chain was actually computed for the current size.
    pub mip_levels_generated: bool,
    /// Whether the texture is a render target.
    pub render_target: bool,
    /// The number of samples per pixel for a render target.
    pub sample_count: u32,
    /// Whether a render target carries a depth buffer.
    pub depth: bool,
    /// Whether drawing to this render target clears its color buffer first.
    pub clear_color_buffer: bool,
    /// Whether drawing to this render target clears its depth buffer first.
    pub clear_depth_buffer: bool,
    /// The color used when clearing this render target.
    pub clear_color: LinearRgba,
    /// The ordered mip levels, level 0 being the base image.
    pub levels: Vec<TextureLevel>,
}

impl Default for TextureData {
    fn default() -> Self {
        Self {
            size: Extent2D::default(),
            dynamic: false,
            mipmaps: false,
            mip_levels_generated: false,
            render_target: false,
            sample_count: 1,
            depth: false,
            clear_color_buffer: true,
            clear_depth_buffer: false,
            clear_color: LinearRgba::TRANSPARENT,
            levels: Vec::new(),
        }
    }
}

/// A texture resource: staged state plus the device capabilities captured at
/// creation (the mip policy depends on non-power-of-two support).
#[derive(Debug)]
pub struct TextureResource {
    caps: DeviceCapabilities,
    state: Staged<TextureData>,
}

impl TextureResource {
    /// Creates a blank texture resource for a device with `caps`.
    pub fn new(caps: DeviceCapabilities) -> Self {
        Self {
            caps,
            state: Staged::new(TextureData::default()),
        }
    }

    /// Stages a blank texture descriptor of the given size.
    ///
    /// Mip level sizes (not pixel data) are computed when mipmaps are
    /// requested, the texture is not a render target, and the device supports
    /// the dimensions (non-power-of-two capable, or both dimensions powers of
    /// two).
    pub fn init(&self, size: Extent2D, options: TextureOptions) -> Result<(), ResourceError> {
        let npot = self.caps.npot_textures;
        self.state.stage(DirtyFlags::ALL, |pending| {
            pending.dynamic = options.dynamic;
            pending.mipmaps = options.mipmaps;
            pending.render_target = options.render_target;
            pending.sample_count = options.sample_count.max(1);
            pending.depth = options.depth;
            calculate_sizes(pending, size, npot);
            Ok(())
        })
    }

    /// Stages a texture initialized from RGBA8 pixel data, computing full
    /// mip pixel data immediately when the mip policy allows it.
    pub fn init_from_bytes(
        &self,
        pixels: &[u8],
        size: Extent2D,
        dynamic: bool,
        mipmaps: bool,
    ) -> Result<(), ResourceError> {
        let npot = self.caps.npot_textures;
        self.state.stage(DirtyFlags::ALL, |pending| {
            if pixels.len() != size.area() as usize * BYTES_PER_PIXEL as usize {
                return Err(ResourceError::InvalidData);
            }
            pending.dynamic = dynamic;
            pending.mipmaps = mipmaps;
            pending.render_target = false;
            pending.sample_count = 1;
            pending.depth = false;
            calculate_data(pending, pixels, size, npot);
            Ok(())
        })
    }

    /// Stages a resize of a dynamic texture, recomputing mip level sizes.
    ///
    /// Fails without mutating state for non-dynamic textures or non-positive
    /// dimensions.
    pub fn set_size(&self, size: Extent2D) -> Result<(), ResourceError> {
        let npot = self.caps.npot_textures;
        self.state.stage(DirtyFlags::ALL, |pending| {
            if !pending.dynamic {
                return Err(ResourceError::NotDynamic);
            }
            if size.is_empty() {
                return Err(ResourceError::InvalidSize { size });
            }
            calculate_sizes(pending, size, npot);
            Ok(())
        })
    }

    /// Stages new pixel data for a dynamic texture, recomputing the mip
    /// chain.
    ///
    /// Fails without mutating state for non-dynamic textures, non-positive
    /// dimensions, or a payload that does not match the size.
    pub fn set_data(&self, pixels: &[u8], size: Extent2D) -> Result<(), ResourceError> {
        let npot = self.caps.npot_textures;
        self.state.stage(DirtyFlags::ALL, |pending| {
            if !pending.dynamic {
                return Err(ResourceError::NotDynamic);
            }
            if size.is_empty() {
                return Err(ResourceError::InvalidSize { size });
            }
            if pixels.len() != size.area() as usize * BYTES_PER_PIXEL as usize {
                return Err(ResourceError::InvalidData);
            }
            calculate_data(pending, pixels, size, npot);
            Ok(())
        })
    }

    /// Stages whether drawing to this render target clears its color buffer.
    pub fn set_clear_color_buffer(&self, clear: bool) {
        let _ = self
            .state
            .stage::<_, std::convert::Infallible>(DirtyFlags::PARAMETERS, |pending| {
                pending.clear_color_buffer = clear;
                Ok(())
            });
    }

    /// Stages whether drawing to this render target clears its depth buffer.
    pub fn set_clear_depth_buffer(&self, clear: bool) {
        let _ = self
            .state
            .stage::<_, std::convert::Infallible>(DirtyFlags::PARAMETERS, |pending| {
                pending.clear_depth_buffer = clear;
                Ok(())
            });
    }

    /// Stages the color used when clearing this render target.
    pub fn set_clear_color(&self, color: LinearRgba) {
        let _ = self
            .state
            .stage::<_, std::convert::Infallible>(DirtyFlags::PARAMETERS, |pending| {
                pending.clear_color = color;
                Ok(())
            });
    }

    /// Commits staged state; see [`Staged::commit`].
    pub fn commit(&self) -> Option<(TextureData, DirtyFlags)> {
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
    pub fn read_committed<R>(&self, read: impl FnOnce(&TextureData) -> R) -> R {
        self.state.read_committed(read)
    }

    /// Reads the pending snapshot.
    pub fn read_pending<R>(&self, read: impl FnOnce(&TextureData) -> R) -> R {
        self.state.read_pending(read)
    }
}

/// Decides whether a mip chain is generated for the pending state and size.
fn mip_levels_allowed(data: &TextureData, size: Extent2D, npot_supported: bool) -> bool {
    data.mipmaps
        && !data.render_target
        && (npot_supported || (is_power_of_two(size.width) && is_power_of_two(size.height)))
}

/// Recomputes the mip level sizes (no pixel data) for `size`.
fn calculate_sizes(data: &mut TextureData, size: Extent2D, npot_supported: bool) {
    data.levels.clear();
    data.size = size;

    let mut width = size.width;
    let mut height = size.height;
    let mut pitch = width * BYTES_PER_PIXEL;
    data.levels.push(TextureLevel {
        size,
        pitch,
        pixels: Vec::new(),
    });

    data.mip_levels_generated = mip_levels_allowed(data, size, npot_supported);
    if !data.mip_levels_generated {
        return;
    }

    while width >= 2 && height >= 2 {
        width >>= 1;
        height >>= 1;
        pitch = width * BYTES_PER_PIXEL;
        data.levels.push(TextureLevel {
            size: Extent2D::new(width, height),
            pitch,
            pixels: Vec::new(),
        });
    }

    // Continue along the longer axis until it also reaches 1.
    if width > height {
        while width >= 2 {
            width >>= 1;
            pitch = width * BYTES_PER_PIXEL;
            data.levels.push(TextureLevel {
                size: Extent2D::new(width, height),
                pitch,
                pixels: Vec::new(),
            });
        }
    } else {
        while height >= 2 {
            height >>= 1;
            data.levels.push(TextureLevel {
                size: Extent2D::new(width, height),
                pitch,
                pixels: Vec::new(),
            });
        }
    }
}

/// Recomputes the full mip chain, pixel data included, from `pixels`.
fn calculate_data(data: &mut TextureData, pixels: &[u8], size: Extent2D, npot_supported: bool) {
    data.levels.clear();
    data.size = size;

    let mut width = size.width;
    let mut height = size.height;
    let mut pitch = width * BYTES_PER_PIXEL;
    data.levels.push(TextureLevel {
        size,
        pitch,
        pixels: pixels.to_vec(),
    });

    data.mip_levels_generated = mip_levels_allowed(data, size, npot_supported);
    if !data.mip_levels_generated {
        return;
    }

    // Working buffer sized for the in-place filter; degenerate 1-pixel axes
    // get doubled room for the row duplication/expansion in the tail loops.
    let mut buffer_size = (width * height * BYTES_PER_PIXEL) as usize;
    if width == 1 {
        buffer_size *= 2;
    }
    if height == 1 {
        buffer_size *= 2;
    }
    let mut mip_data = vec![0u8; buffer_size];
    mip_data[..pixels.len()].copy_from_slice(pixels);

    while width >= 2 && height >= 2 {
        downsample_rgba_2x2(width, height, pitch, &mut mip_data);

        width >>= 1;
        height >>= 1;
        pitch = width * BYTES_PER_PIXEL;

        let byte_count = (width * height * BYTES_PER_PIXEL) as usize;
        data.levels.push(TextureLevel {
            size: Extent2D::new(width, height),
            pitch,
            pixels: mip_data[..byte_count].to_vec(),
        });
    }

    if width > height {
        // height == 1: duplicate the remaining single row so each step can
        // run the 2x2 filter over a two-row image.
        while width >= 2 {
            let row_bytes = (width * BYTES_PER_PIXEL) as usize;
            mip_data.copy_within(..row_bytes, row_bytes);

            downsample_rgba_2x2(width, 2, pitch, &mut mip_data);

            width >>= 1;
            pitch = width * BYTES_PER_PIXEL;

            let byte_count = (width * height * BYTES_PER_PIXEL) as usize;
            data.levels.push(TextureLevel {
                size: Extent2D::new(width, height),
                pitch,
                pixels: mip_data[..byte_count].to_vec(),
            });
        }
    } else {
        // width == 1: expand each single-pixel row into a pair of columns so
        // each step can run the 2x2 filter over a two-column image.
        while height >= 2 {
            for i in (0..height as usize).rev() {
                let start = i * BYTES_PER_PIXEL as usize;
                let texel = [
                    mip_data[start],
                    mip_data[start + 1],
                    mip_data[start + 2],
                    mip_data[start + 3],
                ];
                let out = i * 2 * BYTES_PER_PIXEL as usize;
                mip_data[out..out + BYTES_PER_PIXEL as usize].copy_from_slice(&texel);
                mip_data[out + BYTES_PER_PIXEL as usize..out + 2 * BYTES_PER_PIXEL as usize]
                    .copy_from_slice(&texel);
            }

            downsample_rgba_2x2(2, height, 2 * BYTES_PER_PIXEL, &mut mip_data);

            height >>= 1;

            let byte_count = (width * height * BYTES_PER_PIXEL) as usize;
            data.levels.push(TextureLevel {
                size: Extent2D::new(width, height),
                pitch,
                pixels: mip_data[..byte_count].to_vec(),
            });
        }
    }
}

/// Halves an RGBA8 image in place with a 2x2 box filter in approximately
/// linear light.
///
/// Each color channel is raised to the power 2.2, averaged over the source
/// texels whose alpha is non-zero, and raised back to 1/2.2; alpha is the
/// plain average of the four texels. A block whose texels are all fully
/// transparent produces a fully transparent black output texel.
///
/// The destination is written at the start of `buffer`, behind the read
/// cursor, so the operation is safe in place.
fn downsample_rgba_2x2(width: u32, height: u32, pitch: u32, buffer: &mut [u8]) {
    let dst_width = width / 2;
    let dst_height = height / 2;

    if dst_width == 0 || dst_height == 0 {
        return;
    }

    let pitch = pitch as usize;
    let mut dst = 0usize;

    for y in 0..dst_height as usize {
        let row = y * pitch * 2;
        for x in 0..dst_width as usize {
            let texel = row + x * 8;

            let mut contributing = 0.0f32;
            let (mut r, mut g, mut b) = (0.0f32, 0.0f32, 0.0f32);
            let mut a = 0.0f32;

            for offset in [texel, texel + 4, texel + pitch, texel + pitch + 4] {
                if buffer[offset + 3] > 0 {
                    r += (buffer[offset] as f32).powf(2.2);
                    g += (buffer[offset + 1] as f32).powf(2.2);
                    b += (buffer[offset + 2] as f32).powf(2.2);
                    contributing += 1.0;
                }
                a += buffer[offset + 3] as f32;
            }

            if contributing > 0.0 {
                r /= contributing;
                g /= contributing;
                b /= contributing;
            }

            a *= 0.25;
            buffer[dst] = r.powf(1.0 / 2.2) as u8;
            buffer[dst + 1] = g.powf(1.0 / 2.2) as u8;
            buffer[dst + 2] = b.powf(1.0 / 2.2) as u8;
            buffer[dst + 3] = a as u8;
            dst += 4;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caps(npot: bool) -> DeviceCapabilities {
        DeviceCapabilities {
            npot_textures: npot,
            ..DeviceCapabilities::default()
        }
    }

    fn solid_image(size: Extent2D, rgba: [u8; 4]) -> Vec<u8> {
        rgba.repeat(size.area() as usize)
    }

    fn level_sizes(texture: &TextureResource) -> Vec<(u32, u32)> {
        texture.read_pending(|data| {
            data.levels
                .iter()
                .map(|level| (level.size.width, level.size.height))
                .collect()
        })
    }

    #[test]
    fn square_pot_mip_chain() {
        let texture = TextureResource::new(caps(true));
        let size = Extent2D::new(4, 4);
        texture
            .init_from_bytes(&solid_image(size, [255; 4]), size, false, true)
            .unwrap();

        assert_eq!(level_sizes(&texture), vec![(4, 4), (2, 2), (1, 1)]);
        texture.read_pending(|data| {
            assert!(data.mip_levels_generated);
            for level in &data.levels {
                assert_eq!(level.pixels.len(), level.size.area() as usize * 4);
                assert_eq!(level.pitch, level.size.width * 4);
            }
        });
    }

    #[test]
    fn wide_chain_continues_along_width() {
        let texture = TextureResource::new(caps(true));
        let size = Extent2D::new(8, 4);
        texture
            .init_from_bytes(&solid_image(size, [255; 4]), size, false, true)
            .unwrap();

        assert_eq!(
            level_sizes(&texture),
            vec![(8, 4), (4, 2), (2, 1), (1, 1)]
        );
    }

    #[test]
    fn tall_degenerate_chain_continues_along_height() {
        let texture = TextureResource::new(caps(true));
        let size = Extent2D::new(1, 8);
        texture
            .init_from_bytes(&solid_image(size, [10, 20, 30, 255]), size, false, true)
            .unwrap();

        assert_eq!(
            level_sizes(&texture),
            vec![(1, 8), (1, 4), (1, 2), (1, 1)]
        );
        texture.read_pending(|data| {
            for level in &data.levels {
                assert_eq!(level.pixels.len(), level.size.area() as usize * 4);
            }
        });
    }

    #[test]
    fn wide_degenerate_chain_continues_along_width() {
        let texture = TextureResource::new(caps(true));
        let size = Extent2D::new(8, 1);
        texture
            .init_from_bytes(&solid_image(size, [10, 20, 30, 255]), size, false, true)
            .unwrap();

        assert_eq!(
            level_sizes(&texture),
            vec![(8, 1), (4, 1), (2, 1), (1, 1)]
        );
    }

    #[test]
    fn single_pixel_has_no_sub_pixel_chain() {
        let texture = TextureResource::new(caps(true));
        let size = Extent2D::new(1, 1);
        texture
            .init_from_bytes(&[255, 255, 255, 255], size, false, true)
            .unwrap();

        assert_eq!(level_sizes(&texture), vec![(1, 1)]);
    }

    #[test]
    fn npot_without_support_skips_mip_generation() {
        let texture = TextureResource::new(caps(false));
        let size = Extent2D::new(6, 4);
        texture
            .init_from_bytes(&solid_image(size, [255; 4]), size, false, true)
            .unwrap();

        assert_eq!(level_sizes(&texture), vec![(6, 4)]);
        texture.read_pending(|data| assert!(!data.mip_levels_generated));
    }

    #[test]
    fn pot_without_npot_support_still_generates() {
        let texture = TextureResource::new(caps(false));
        let size = Extent2D::new(4, 4);
        texture
            .init_from_bytes(&solid_image(size, [255; 4]), size, false, true)
            .unwrap();

        assert_eq!(level_sizes(&texture).len(), 3);
    }

    #[test]
    fn render_target_never_generates_mips() {
        let texture = TextureResource::new(caps(true));
        texture
            .init(
                Extent2D::new(256, 256),
                TextureOptions {
                    mipmaps: true,
                    render_target: true,
                    ..Default::default()
                },
            )
            .unwrap();

        assert_eq!(level_sizes(&texture).len(), 1);
    }

    #[test]
    fn downsample_fully_transparent_block_is_transparent_black() {
        let mut buffer = vec![0u8; 16];
        // Four texels with non-zero color but zero alpha.
        for texel in buffer.chunks_exact_mut(4) {
            texel.copy_from_slice(&[200, 150, 100, 0]);
        }
        downsample_rgba_2x2(2, 2, 8, &mut buffer);
        assert_eq!(&buffer[..4], &[0, 0, 0, 0]);
    }

    #[test]
    fn downsample_averages_alpha_over_four_texels() {
        let mut buffer = vec![0u8; 16];
        buffer[..4].copy_from_slice(&[200, 0, 0, 255]);
        // Remaining three texels are transparent black.
        downsample_rgba_2x2(2, 2, 8, &mut buffer);

        // One contributing texel keeps its color (within pow round-trip
        // truncation); alpha is 255 / 4.
        assert!(buffer[0] >= 199 && buffer[0] <= 200, "r = {}", buffer[0]);
        assert_eq!(buffer[3], 63);
    }

    #[test]
    fn downsample_preserves_solid_white() {
        let mut buffer = solid_image(Extent2D::new(4, 4), [255, 255, 255, 255]);
        downsample_rgba_2x2(4, 4, 16, &mut buffer);
        for texel in buffer[..16].chunks_exact(4) {
            assert!(texel[0] >= 254);
            assert_eq!(texel[3], 255);
        }
    }

    #[test]
    fn set_size_requires_dynamic() {
        let texture = TextureResource::new(caps(true));
        texture
            .init(Extent2D::new(2, 2), TextureOptions::default())
            .unwrap();

        let result = texture.set_size(Extent2D::new(4, 4));
        assert!(matches!(result, Err(ResourceError::NotDynamic)));
    }

    #[test]
    fn set_size_rejects_zero_dimensions() {
        let texture = TextureResource::new(caps(true));
        texture
            .init(
                Extent2D::new(2, 2),
                TextureOptions {
                    dynamic: true,
                    ..Default::default()
                },
            )
            .unwrap();

        assert!(matches!(
            texture.set_size(Extent2D::new(0, 4)),
            Err(ResourceError::InvalidSize { .. })
        ));
        // The rejected call staged nothing.
        texture.read_pending(|data| assert_eq!(data.size, Extent2D::new(2, 2)));
    }

    #[test]
    fn set_data_is_last_write_wins() {
        let texture = TextureResource::new(caps(true));
        let size = Extent2D::new(1, 1);
        texture
            .init_from_bytes(&[0, 0, 0, 255], size, true, false)
            .unwrap();

        texture.set_data(&[10, 10, 10, 255], size).unwrap();
        texture.set_data(&[20, 20, 20, 255], size).unwrap();

        let (data, _) = texture.commit().unwrap();
        assert_eq!(&data.levels[0].pixels, &[20, 20, 20, 255]);
    }

    #[test]
    fn staging_sequences_keep_only_the_last_call() {
        let texture = TextureResource::new(caps(true));
        texture
            .init(
                Extent2D::new(2, 2),
                TextureOptions {
                    dynamic: true,
                    ..Default::default()
                },
            )
            .unwrap();

        texture.set_size(Extent2D::new(8, 8)).unwrap();
        let size = Extent2D::new(2, 2);
        texture
            .set_data(&solid_image(size, [5, 5, 5, 255]), size)
            .unwrap();

        // No trace of the intermediate resize survives the commit.
        let (data, _) = texture.commit().unwrap();
        assert_eq!(data.size, size);
        assert_eq!(data.levels.len(), 1);
        assert_eq!(data.levels[0].pixels.len(), 16);
    }

    #[test]
    fn init_rejects_mismatched_payload() {
        let texture = TextureResource::new(caps(true));
        let result = texture.init_from_bytes(&[0; 3], Extent2D::new(1, 1), false, false);
        assert!(matches!(result, Err(ResourceError::InvalidData)));
    }

    #[test]
    fn commit_then_sync_clears_dirty() {
        let texture = TextureResource::new(caps(true));
        texture
            .init_from_bytes(&[255; 4], Extent2D::new(1, 1), false, true)
            .unwrap();

        let (data, dirty) = texture.commit().unwrap();
        assert_eq!(data.levels.len(), 1);
        assert!(!dirty.is_empty());

        texture.mark_synced();
        assert!(!texture.awaiting_sync());
        assert!(texture.commit().is_none());
    }
}
