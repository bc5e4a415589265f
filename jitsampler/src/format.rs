//! Pixel formats as seen by the sampling code generator
//!
//! Only the properties that change generated code live here: channel
//! interpretation, plane count, block compression and which usages a format
//! supports on a given target.

use ash::vk;

use crate::state::TextureTarget;

/// Texel format of a texture or image view.
///
/// `None` is the typeless format used for raw buffer access; every format
/// check is skipped for it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum PixelFormat {
    #[default]
    None,

    R8Unorm,
    R8Snorm,
    R8Uint,
    R8Sint,
    Rg8Unorm,
    Rg8Uint,
    Rgba8Unorm,
    Rgba8Snorm,
    Rgba8Uint,
    Rgba8Sint,
    Rgba8Srgb,
    Bgra8Unorm,
    Bgra8Srgb,

    R16Uint,
    R16Sint,
    R16Float,
    R16Unorm,
    Rg16Float,
    Rgba16Uint,
    Rgba16Sint,
    Rgba16Float,

    R32Uint,
    R32Sint,
    R32Float,
    Rg32Uint,
    Rg32Float,
    Rgba32Uint,
    Rgba32Sint,
    Rgba32Float,

    Rgb10a2Unorm,
    Rg11b10Float,

    Depth16Unorm,
    Depth24Plus,
    Depth32Float,
    Depth24PlusStencil8,
    Depth32FloatStencil8,
    Stencil8,

    Bc1RgbaUnorm,
    Bc3RgbaUnorm,
    Bc4RUnorm,
    Bc5RgUnorm,
    Bc7RgbaUnorm,
    Etc2Rgb8Unorm,

    /// Two-plane 4:2:0 luma/chroma format.
    Nv12,
    /// Three-plane 4:2:0 luma/chroma format.
    Yuv420,
}

/// How the channels of a format are interpreted when read by a shader.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChannelKind {
    Unorm,
    Snorm,
    Srgb,
    Uint,
    Sint,
    Float,
    Depth,
    Stencil,
    Typeless,
}

/// The role a format is used in, for support queries.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FormatUsage {
    /// Filtered or unfiltered sampling through a sampler view.
    Sampled,
    /// Texel fetch from a buffer target.
    TexelBuffer,
    /// Read/write shader image access.
    Storage,
}

impl PixelFormat {
    pub fn channel_kind(self) -> ChannelKind {
        use PixelFormat::*;
        match self {
            None => ChannelKind::Typeless,
            R8Unorm | Rg8Unorm | Rgba8Unorm | Bgra8Unorm | R16Unorm | Rgb10a2Unorm
            | Bc1RgbaUnorm | Bc3RgbaUnorm | Bc4RUnorm | Bc5RgUnorm | Bc7RgbaUnorm
            | Etc2Rgb8Unorm | Nv12 | Yuv420 => ChannelKind::Unorm,
            R8Snorm | Rgba8Snorm => ChannelKind::Snorm,
            Rgba8Srgb | Bgra8Srgb => ChannelKind::Srgb,
            R8Uint | Rg8Uint | Rgba8Uint | R16Uint | Rgba16Uint | R32Uint | Rg32Uint
            | Rgba32Uint => ChannelKind::Uint,
            R8Sint | Rgba8Sint | R16Sint | Rgba16Sint | R32Sint | Rgba32Sint => ChannelKind::Sint,
            R16Float | Rg16Float | Rgba16Float | R32Float | Rg32Float | Rgba32Float
            | Rg11b10Float => ChannelKind::Float,
            Depth16Unorm | Depth24Plus | Depth32Float | Depth24PlusStencil8
            | Depth32FloatStencil8 => ChannelKind::Depth,
            Stencil8 => ChannelKind::Stencil,
        }
    }

    /// Integer formats that are returned to the shader without normalization.
    pub fn is_pure_integer(self) -> bool {
        matches!(
            self.channel_kind(),
            ChannelKind::Uint | ChannelKind::Sint | ChannelKind::Stencil
        )
    }

    /// Whether texels reach the shader as floating point values. Normalized
    /// and depth formats count as floating.
    pub fn has_float_texels(self) -> bool {
        !self.is_pure_integer() && self != PixelFormat::None
    }

    pub fn is_depth_or_stencil(self) -> bool {
        matches!(self.channel_kind(), ChannelKind::Depth | ChannelKind::Stencil)
    }

    pub fn is_compressed(self) -> bool {
        use PixelFormat::*;
        matches!(
            self,
            Bc1RgbaUnorm | Bc3RgbaUnorm | Bc4RUnorm | Bc5RgUnorm | Bc7RgbaUnorm | Etc2Rgb8Unorm
        )
    }

    pub fn num_planes(self) -> u32 {
        match self {
            PixelFormat::Nv12 => 2,
            PixelFormat::Yuv420 => 3,
            _ => 1,
        }
    }

    pub fn num_channels(self) -> u32 {
        use PixelFormat::*;
        match self {
            None => 0,
            R8Unorm | R8Snorm | R8Uint | R8Sint | R16Uint | R16Sint | R16Float | R16Unorm
            | R32Uint | R32Sint | R32Float | Depth16Unorm | Depth24Plus | Depth32Float
            | Stencil8 | Bc4RUnorm => 1,
            Rg8Unorm | Rg8Uint | Rg16Float | Rg32Uint | Rg32Float | Depth24PlusStencil8
            | Depth32FloatStencil8 | Bc5RgUnorm => 2,
            Rg11b10Float | Etc2Rgb8Unorm | Nv12 | Yuv420 => 3,
            _ => 4,
        }
    }

    /// Single-channel 32-bit formats, the only ones image atomics operate on.
    pub fn supports_atomics(self) -> bool {
        matches!(
            self,
            PixelFormat::R32Uint | PixelFormat::R32Sint | PixelFormat::R32Float
        )
    }

    /// Whether the format can be used in `usage` on `target`.
    pub fn supports(self, target: TextureTarget, usage: FormatUsage) -> bool {
        if self == PixelFormat::None {
            return true;
        }
        if self.num_planes() > 1 {
            return false;
        }
        let is_buffer = target == TextureTarget::Buffer;
        match usage {
            FormatUsage::TexelBuffer => {
                (!self.is_compressed() && !self.is_depth_or_stencil() && self.num_channels() != 3)
                    || self == PixelFormat::Rg11b10Float
            }
            FormatUsage::Sampled => {
                if is_buffer {
                    return !self.is_compressed() && !self.is_depth_or_stencil();
                }
                if self.is_compressed() {
                    return target != TextureTarget::Texture1D
                        && target != TextureTarget::Texture1DArray;
                }
                !(self.is_depth_or_stencil() && target == TextureTarget::Texture3D)
            }
            FormatUsage::Storage => {
                !self.is_compressed()
                    && !self.is_depth_or_stencil()
                    && self.channel_kind() != ChannelKind::Srgb
            }
        }
    }
}

/// Convert a Vulkan format to the sampling pixel format
pub fn vk_to_pixel_format(format: vk::Format) -> Option<PixelFormat> {
    match format {
        vk::Format::UNDEFINED => Some(PixelFormat::None),

        // 8-bit formats
        vk::Format::R8_UNORM => Some(PixelFormat::R8Unorm),
        vk::Format::R8_SNORM => Some(PixelFormat::R8Snorm),
        vk::Format::R8_UINT => Some(PixelFormat::R8Uint),
        vk::Format::R8_SINT => Some(PixelFormat::R8Sint),
        vk::Format::R8G8_UNORM => Some(PixelFormat::Rg8Unorm),
        vk::Format::R8G8_UINT => Some(PixelFormat::Rg8Uint),

        // RGBA8
        vk::Format::R8G8B8A8_UNORM | vk::Format::A8B8G8R8_UNORM_PACK32 => {
            Some(PixelFormat::Rgba8Unorm)
        }
        vk::Format::R8G8B8A8_SNORM | vk::Format::A8B8G8R8_SNORM_PACK32 => {
            Some(PixelFormat::Rgba8Snorm)
        }
        vk::Format::R8G8B8A8_UINT => Some(PixelFormat::Rgba8Uint),
        vk::Format::R8G8B8A8_SINT => Some(PixelFormat::Rgba8Sint),
        vk::Format::R8G8B8A8_SRGB | vk::Format::A8B8G8R8_SRGB_PACK32 => {
            Some(PixelFormat::Rgba8Srgb)
        }
        vk::Format::B8G8R8A8_UNORM => Some(PixelFormat::Bgra8Unorm),
        vk::Format::B8G8R8A8_SRGB => Some(PixelFormat::Bgra8Srgb),

        // 16-bit formats
        vk::Format::R16_UINT => Some(PixelFormat::R16Uint),
        vk::Format::R16_SINT => Some(PixelFormat::R16Sint),
        vk::Format::R16_SFLOAT => Some(PixelFormat::R16Float),
        vk::Format::R16_UNORM => Some(PixelFormat::R16Unorm),
        vk::Format::R16G16_SFLOAT => Some(PixelFormat::Rg16Float),
        vk::Format::R16G16B16A16_UINT => Some(PixelFormat::Rgba16Uint),
        vk::Format::R16G16B16A16_SINT => Some(PixelFormat::Rgba16Sint),
        vk::Format::R16G16B16A16_SFLOAT => Some(PixelFormat::Rgba16Float),

        // 32-bit formats
        vk::Format::R32_UINT => Some(PixelFormat::R32Uint),
        vk::Format::R32_SINT => Some(PixelFormat::R32Sint),
        vk::Format::R32_SFLOAT => Some(PixelFormat::R32Float),
        vk::Format::R32G32_UINT => Some(PixelFormat::Rg32Uint),
        vk::Format::R32G32_SFLOAT => Some(PixelFormat::Rg32Float),
        vk::Format::R32G32B32A32_UINT => Some(PixelFormat::Rgba32Uint),
        vk::Format::R32G32B32A32_SINT => Some(PixelFormat::Rgba32Sint),
        vk::Format::R32G32B32A32_SFLOAT => Some(PixelFormat::Rgba32Float),

        // Packed formats
        vk::Format::A2B10G10R10_UNORM_PACK32 => Some(PixelFormat::Rgb10a2Unorm),
        vk::Format::B10G11R11_UFLOAT_PACK32 => Some(PixelFormat::Rg11b10Float),

        // Depth/Stencil formats
        vk::Format::D16_UNORM => Some(PixelFormat::Depth16Unorm),
        vk::Format::X8_D24_UNORM_PACK32 => Some(PixelFormat::Depth24Plus),
        vk::Format::D32_SFLOAT => Some(PixelFormat::Depth32Float),
        vk::Format::D24_UNORM_S8_UINT => Some(PixelFormat::Depth24PlusStencil8),
        vk::Format::D32_SFLOAT_S8_UINT => Some(PixelFormat::Depth32FloatStencil8),
        vk::Format::S8_UINT => Some(PixelFormat::Stencil8),

        // Compressed formats
        vk::Format::BC1_RGBA_UNORM_BLOCK | vk::Format::BC1_RGB_UNORM_BLOCK => {
            Some(PixelFormat::Bc1RgbaUnorm)
        }
        vk::Format::BC3_UNORM_BLOCK => Some(PixelFormat::Bc3RgbaUnorm),
        vk::Format::BC4_UNORM_BLOCK => Some(PixelFormat::Bc4RUnorm),
        vk::Format::BC5_UNORM_BLOCK => Some(PixelFormat::Bc5RgUnorm),
        vk::Format::BC7_UNORM_BLOCK => Some(PixelFormat::Bc7RgbaUnorm),
        vk::Format::ETC2_R8G8B8_UNORM_BLOCK => Some(PixelFormat::Etc2Rgb8Unorm),

        // Multi-planar formats
        vk::Format::G8_B8R8_2PLANE_420_UNORM => Some(PixelFormat::Nv12),
        vk::Format::G8_B8_R8_3PLANE_420_UNORM => Some(PixelFormat::Yuv420),

        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_formats_are_not_float() {
        assert!(PixelFormat::R32Uint.is_pure_integer());
        assert!(!PixelFormat::R32Uint.has_float_texels());
        assert!(PixelFormat::Rgba8Unorm.has_float_texels());
        assert!(PixelFormat::Depth32Float.has_float_texels());
        assert!(!PixelFormat::None.has_float_texels());
    }

    #[test]
    fn test_planar_formats_unsupported() {
        assert_eq!(PixelFormat::Nv12.num_planes(), 2);
        assert!(!PixelFormat::Nv12.supports(TextureTarget::Texture2D, FormatUsage::Sampled));
        assert!(PixelFormat::None.supports(TextureTarget::Buffer, FormatUsage::TexelBuffer));
    }

    #[test]
    fn test_storage_support() {
        assert!(PixelFormat::R32Uint.supports(TextureTarget::Texture2D, FormatUsage::Storage));
        assert!(!PixelFormat::Bc7RgbaUnorm.supports(TextureTarget::Texture2D, FormatUsage::Storage));
        assert!(!PixelFormat::Rgba8Srgb.supports(TextureTarget::Texture2D, FormatUsage::Storage));
        assert!(!PixelFormat::Depth32Float.supports(TextureTarget::Buffer, FormatUsage::Sampled));
    }

    #[test]
    fn test_vk_conversion() {
        assert_eq!(
            vk_to_pixel_format(vk::Format::R8G8B8A8_UNORM),
            Some(PixelFormat::Rgba8Unorm)
        );
        assert_eq!(vk_to_pixel_format(vk::Format::UNDEFINED), Some(PixelFormat::None));
        assert_eq!(vk_to_pixel_format(vk::Format::R64_UINT), None);
    }
}
