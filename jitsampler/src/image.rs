//! Texture and image views
//!
//! A view is the live, dynamic description of a bound texture: it carries
//! sizes, mip/layer ranges and a memory offset. Canonicalization strips all
//! of that down to a [`StaticTextureState`] so that views differing only in
//! dimensions or placement share one row of compiled functions.

use ash::vk;

use crate::format::{self, PixelFormat};
use crate::state::{StaticTextureState, Swizzle, TextureTarget, IDENTITY_SWIZZLE};

/// A texture view bound for sampling.
#[derive(Clone, Debug, PartialEq)]
pub struct TextureView {
    pub format: PixelFormat,
    pub target: TextureTarget,
    pub res_target: TextureTarget,
    pub width: u32,
    pub height: u32,
    pub depth: u32,
    pub first_level: u32,
    pub last_level: u32,
    pub first_layer: u32,
    pub last_layer: u32,
    pub samples: u32,
    pub swizzle: [Swizzle; 4],
    /// Byte offset of the view in its backing memory. Never part of a key.
    pub offset: u64,
}

impl TextureView {
    pub fn texture_2d(format: PixelFormat, width: u32, height: u32) -> Self {
        Self {
            format,
            target: TextureTarget::Texture2D,
            res_target: TextureTarget::Texture2D,
            width,
            height,
            depth: 1,
            first_level: 0,
            last_level: 0,
            first_layer: 0,
            last_layer: 0,
            samples: 1,
            swizzle: IDENTITY_SWIZZLE,
            offset: 0,
        }
    }

    /// A texel buffer view of `texels` elements. `PixelFormat::None` gives a
    /// raw, typeless buffer.
    pub fn buffer(format: PixelFormat, texels: u32) -> Self {
        Self {
            target: TextureTarget::Buffer,
            res_target: TextureTarget::Buffer,
            height: 1,
            ..Self::texture_2d(format, texels, 1)
        }
    }

    /// Canonical static state of the view.
    ///
    /// With `force_non_pot` the power-of-two flags are always cleared, so
    /// views that differ only in their dimensions collapse into one row.
    pub fn static_state(&self, force_non_pot: bool) -> StaticTextureState {
        let (pot_width, pot_height, pot_depth) = if force_non_pot {
            (false, false, false)
        } else {
            pot_flags(self.width, self.height, self.depth)
        };

        StaticTextureState {
            format: self.format,
            swizzle: self.swizzle,
            target: self.target,
            res_target: self.res_target,
            pot_width,
            pot_height,
            pot_depth,
            level_zero_only: self.first_level == 0 && self.last_level == 0,
            multisampled: self.samples > 1,
        }
    }

    /// Build a sampled view from Vulkan image and image-view create infos.
    pub fn from_vk(
        image: &vk::ImageCreateInfo<'_>,
        view: &vk::ImageViewCreateInfo<'_>,
    ) -> Option<Self> {
        let format = format::vk_to_pixel_format(view.format)?;
        let target = vk_to_texture_target(view.view_type)?;
        let range = &view.subresource_range;

        // REMAINING_* are u32::MAX, so clamping also resolves them.
        let level_count = range
            .level_count
            .min(image.mip_levels.saturating_sub(range.base_mip_level));
        let layer_count = range
            .layer_count
            .min(image.array_layers.saturating_sub(range.base_array_layer));

        Some(Self {
            format,
            target,
            res_target: vk_resource_target(image),
            width: image.extent.width,
            height: image.extent.height,
            depth: image.extent.depth,
            first_level: range.base_mip_level,
            last_level: range.base_mip_level.saturating_add(level_count.max(1) - 1),
            first_layer: range.base_array_layer,
            last_layer: range.base_array_layer.saturating_add(layer_count.max(1) - 1),
            samples: vk_to_sample_count(image.samples),
            swizzle: [
                vk_to_swizzle(view.components.r, Swizzle::R),
                vk_to_swizzle(view.components.g, Swizzle::G),
                vk_to_swizzle(view.components.b, Swizzle::B),
                vk_to_swizzle(view.components.a, Swizzle::A),
            ],
            offset: 0,
        })
    }
}

/// A view bound for read/write shader image access.
#[derive(Clone, Debug, PartialEq)]
pub struct ImageView {
    pub format: PixelFormat,
    pub target: TextureTarget,
    pub res_target: TextureTarget,
    pub width: u32,
    pub height: u32,
    pub depth: u32,
    pub level: u32,
    pub first_layer: u32,
    pub last_layer: u32,
    pub samples: u32,
    pub offset: u64,
}

impl ImageView {
    pub fn texture_2d(format: PixelFormat, width: u32, height: u32) -> Self {
        Self {
            format,
            target: TextureTarget::Texture2D,
            res_target: TextureTarget::Texture2D,
            width,
            height,
            depth: 1,
            level: 0,
            first_layer: 0,
            last_layer: 0,
            samples: 1,
            offset: 0,
        }
    }

    /// Canonical static state of the image view.
    ///
    /// A view addressing exactly one layer generates the same code as the
    /// non-array target, so array and 3D targets are folded down first.
    pub fn static_state(&self, force_non_pot: bool) -> StaticTextureState {
        let target = if self.first_layer == self.last_layer {
            self.target.single_layer()
        } else {
            self.target
        };
        let (pot_width, pot_height, pot_depth) = if force_non_pot {
            (false, false, false)
        } else {
            pot_flags(self.width, self.height, self.depth)
        };

        StaticTextureState {
            format: self.format,
            swizzle: IDENTITY_SWIZZLE,
            target,
            res_target: self.res_target,
            pot_width,
            pot_height,
            pot_depth,
            level_zero_only: false,
            multisampled: self.samples > 1,
        }
    }

    /// Build a storage view from Vulkan image and image-view create infos.
    pub fn from_vk(
        image: &vk::ImageCreateInfo<'_>,
        view: &vk::ImageViewCreateInfo<'_>,
    ) -> Option<Self> {
        let sampled = TextureView::from_vk(image, view)?;
        Some(Self {
            format: sampled.format,
            target: sampled.target,
            res_target: sampled.res_target,
            width: sampled.width,
            height: sampled.height,
            depth: sampled.depth,
            level: sampled.first_level,
            first_layer: sampled.first_layer,
            last_layer: sampled.last_layer,
            samples: sampled.samples,
            offset: 0,
        })
    }
}

fn pot_flags(width: u32, height: u32, depth: u32) -> (bool, bool, bool) {
    let pot = |v: u32| v == 0 || v.is_power_of_two();
    (pot(width), pot(height), pot(depth))
}

pub fn vk_to_texture_target(view_type: vk::ImageViewType) -> Option<TextureTarget> {
    match view_type {
        vk::ImageViewType::TYPE_1D => Some(TextureTarget::Texture1D),
        vk::ImageViewType::TYPE_2D => Some(TextureTarget::Texture2D),
        vk::ImageViewType::TYPE_3D => Some(TextureTarget::Texture3D),
        vk::ImageViewType::CUBE => Some(TextureTarget::Cube),
        vk::ImageViewType::TYPE_1D_ARRAY => Some(TextureTarget::Texture1DArray),
        vk::ImageViewType::TYPE_2D_ARRAY => Some(TextureTarget::Texture2DArray),
        vk::ImageViewType::CUBE_ARRAY => Some(TextureTarget::CubeArray),
        _ => None,
    }
}

fn vk_resource_target(image: &vk::ImageCreateInfo<'_>) -> TextureTarget {
    let arrayed = image.array_layers > 1;
    match image.image_type {
        vk::ImageType::TYPE_1D if arrayed => TextureTarget::Texture1DArray,
        vk::ImageType::TYPE_1D => TextureTarget::Texture1D,
        vk::ImageType::TYPE_3D => TextureTarget::Texture3D,
        _ if image.flags.contains(vk::ImageCreateFlags::CUBE_COMPATIBLE) => {
            if image.array_layers > 6 {
                TextureTarget::CubeArray
            } else {
                TextureTarget::Cube
            }
        }
        _ if arrayed => TextureTarget::Texture2DArray,
        _ => TextureTarget::Texture2D,
    }
}

fn vk_to_swizzle(swizzle: vk::ComponentSwizzle, identity: Swizzle) -> Swizzle {
    match swizzle {
        vk::ComponentSwizzle::R => Swizzle::R,
        vk::ComponentSwizzle::G => Swizzle::G,
        vk::ComponentSwizzle::B => Swizzle::B,
        vk::ComponentSwizzle::A => Swizzle::A,
        vk::ComponentSwizzle::ZERO => Swizzle::Zero,
        vk::ComponentSwizzle::ONE => Swizzle::One,
        _ => identity,
    }
}

fn vk_to_sample_count(samples: vk::SampleCountFlags) -> u32 {
    if samples.contains(vk::SampleCountFlags::TYPE_64) {
        64
    } else if samples.contains(vk::SampleCountFlags::TYPE_32) {
        32
    } else if samples.contains(vk::SampleCountFlags::TYPE_16) {
        16
    } else if samples.contains(vk::SampleCountFlags::TYPE_8) {
        8
    } else if samples.contains(vk::SampleCountFlags::TYPE_4) {
        4
    } else if samples.contains(vk::SampleCountFlags::TYPE_2) {
        2
    } else {
        1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dimensions_do_not_split_rows() {
        let a = TextureView::texture_2d(PixelFormat::Rgba8Unorm, 256, 256);
        let b = TextureView::texture_2d(PixelFormat::Rgba8Unorm, 300, 17);
        assert_eq!(a.static_state(true), b.static_state(true));

        // With the policy disabled the real power-of-two flags are kept
        assert_ne!(a.static_state(false), b.static_state(false));
        assert!(a.static_state(false).pot_width);
    }

    #[test]
    fn test_offset_is_not_part_of_state() {
        let a = TextureView::texture_2d(PixelFormat::R32Float, 64, 64);
        let b = TextureView {
            offset: 4096,
            ..a.clone()
        };
        assert_eq!(a.static_state(true), b.static_state(true));
    }

    #[test]
    fn test_single_layer_image_folds_target() {
        let mut view = ImageView::texture_2d(PixelFormat::R32Uint, 32, 32);
        view.target = TextureTarget::Texture2DArray;
        view.first_layer = 3;
        view.last_layer = 3;
        assert_eq!(view.static_state(true).target, TextureTarget::Texture2D);

        view.last_layer = 4;
        assert_eq!(view.static_state(true).target, TextureTarget::Texture2DArray);

        view.target = TextureTarget::Texture3D;
        view.last_layer = 3;
        assert_eq!(view.static_state(true).target, TextureTarget::Texture2D);
    }

    #[test]
    fn test_sampled_view_keeps_array_target() {
        let mut view = TextureView::texture_2d(PixelFormat::Rgba8Unorm, 8, 8);
        view.target = TextureTarget::Texture2DArray;
        assert_eq!(view.static_state(true).target, TextureTarget::Texture2DArray);
    }

    #[test]
    fn test_from_vk() {
        let image = vk::ImageCreateInfo::default()
            .image_type(vk::ImageType::TYPE_2D)
            .format(vk::Format::R8G8B8A8_UNORM)
            .extent(vk::Extent3D {
                width: 128,
                height: 64,
                depth: 1,
            })
            .mip_levels(4)
            .array_layers(6)
            .samples(vk::SampleCountFlags::TYPE_1);
        let view = vk::ImageViewCreateInfo::default()
            .view_type(vk::ImageViewType::TYPE_2D_ARRAY)
            .format(vk::Format::R8G8B8A8_UNORM)
            .components(vk::ComponentMapping {
                r: vk::ComponentSwizzle::IDENTITY,
                g: vk::ComponentSwizzle::IDENTITY,
                b: vk::ComponentSwizzle::IDENTITY,
                a: vk::ComponentSwizzle::ONE,
            })
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask: vk::ImageAspectFlags::COLOR,
                base_mip_level: 1,
                level_count: vk::REMAINING_MIP_LEVELS,
                base_array_layer: 2,
                layer_count: 1,
            });

        let sampled = TextureView::from_vk(&image, &view).unwrap();
        assert_eq!(sampled.first_level, 1);
        assert_eq!(sampled.last_level, 3);
        assert_eq!(sampled.swizzle[3], Swizzle::One);
        assert_eq!(sampled.res_target, TextureTarget::Texture2DArray);

        let storage = ImageView::from_vk(&image, &view).unwrap();
        assert_eq!(storage.static_state(true).target, TextureTarget::Texture2D);
    }

    #[test]
    fn test_from_vk_clamps_out_of_range_counts() {
        let image = vk::ImageCreateInfo::default()
            .image_type(vk::ImageType::TYPE_2D)
            .format(vk::Format::R8G8B8A8_UNORM)
            .extent(vk::Extent3D {
                width: 64,
                height: 64,
                depth: 1,
            })
            .mip_levels(7)
            .array_layers(4)
            .samples(vk::SampleCountFlags::TYPE_1);
        let view = vk::ImageViewCreateInfo::default()
            .view_type(vk::ImageViewType::TYPE_2D_ARRAY)
            .format(vk::Format::R8G8B8A8_UNORM)
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask: vk::ImageAspectFlags::COLOR,
                base_mip_level: 2,
                level_count: u32::MAX - 1,
                base_array_layer: 1,
                layer_count: u32::MAX - 1,
            });

        let sampled = TextureView::from_vk(&image, &view).unwrap();
        assert_eq!(sampled.last_level, 6);
        assert_eq!(sampled.last_layer, 3);

        let past_end = view.subresource_range(vk::ImageSubresourceRange {
            aspect_mask: vk::ImageAspectFlags::COLOR,
            base_mip_level: u32::MAX,
            level_count: 5,
            base_array_layer: 0,
            layer_count: 1,
        });
        let sampled = TextureView::from_vk(&image, &past_end).unwrap();
        assert_eq!(sampled.last_level, u32::MAX);
    }
}
