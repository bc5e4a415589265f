//! Static texture and sampler state
//!
//! These records are the cache keys of the sampler matrix. They carry only
//! what changes generated code (format, target, filtering modes, ...) and
//! never pointers, offsets or sizes, so structurally identical bindings
//! compare and hash equal.

use crate::format::PixelFormat;

/// Texture binding target.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TextureTarget {
    Buffer,
    Texture1D,
    #[default]
    Texture2D,
    Texture3D,
    Cube,
    Rect,
    Texture1DArray,
    Texture2DArray,
    CubeArray,
}

impl TextureTarget {
    /// Number of coordinate dimensions addressed by the target, excluding
    /// the array layer.
    pub fn dims(self) -> u32 {
        match self {
            TextureTarget::Buffer | TextureTarget::Texture1D | TextureTarget::Texture1DArray => 1,
            TextureTarget::Texture2D
            | TextureTarget::Rect
            | TextureTarget::Texture2DArray
            | TextureTarget::Cube
            | TextureTarget::CubeArray => 2,
            TextureTarget::Texture3D => 3,
        }
    }

    pub fn is_array(self) -> bool {
        matches!(
            self,
            TextureTarget::Texture1DArray | TextureTarget::Texture2DArray | TextureTarget::CubeArray
        )
    }

    /// The target a single-layer view of `self` behaves like.
    pub fn single_layer(self) -> TextureTarget {
        match self {
            TextureTarget::Texture1DArray => TextureTarget::Texture1D,
            TextureTarget::Texture2DArray | TextureTarget::Texture3D => TextureTarget::Texture2D,
            TextureTarget::CubeArray => TextureTarget::Cube,
            other => other,
        }
    }
}

/// Source of one output channel of a texture view.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Swizzle {
    R,
    G,
    B,
    A,
    Zero,
    One,
}

pub const IDENTITY_SWIZZLE: [Swizzle; 4] = [Swizzle::R, Swizzle::G, Swizzle::B, Swizzle::A];

/// Canonical description of a texture binding.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct StaticTextureState {
    pub format: PixelFormat,
    pub swizzle: [Swizzle; 4],
    /// Target of the view.
    pub target: TextureTarget,
    /// Target of the underlying resource.
    pub res_target: TextureTarget,
    pub pot_width: bool,
    pub pot_height: bool,
    pub pot_depth: bool,
    pub level_zero_only: bool,
    pub multisampled: bool,
}

impl Default for StaticTextureState {
    fn default() -> Self {
        Self {
            format: PixelFormat::None,
            swizzle: IDENTITY_SWIZZLE,
            target: TextureTarget::Texture2D,
            res_target: TextureTarget::Texture2D,
            pot_width: false,
            pot_height: false,
            pot_depth: false,
            level_zero_only: false,
            multisampled: false,
        }
    }
}

impl StaticTextureState {
    /// Typeless textures share one function table across all samplers.
    pub fn is_typeless(&self) -> bool {
        self.format == PixelFormat::None
    }

    /// Stable byte encoding used for content hashing.
    pub fn write_bytes(&self, out: &mut Vec<u8>) {
        out.push(self.format as u8);
        out.extend(self.swizzle.iter().map(|s| *s as u8));
        out.push(self.target as u8);
        out.push(self.res_target as u8);
        out.push(pack_flags(&[
            self.pot_width,
            self.pot_height,
            self.pot_depth,
            self.level_zero_only,
            self.multisampled,
        ]));
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum WrapMode {
    #[default]
    Repeat,
    ClampToEdge,
    ClampToBorder,
    MirrorRepeat,
    MirrorClampToEdge,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Filter {
    #[default]
    Nearest,
    Linear,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MipFilter {
    #[default]
    None,
    Nearest,
    Linear,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CompareFunc {
    #[default]
    Never,
    Less,
    Equal,
    LessEqual,
    Greater,
    NotEqual,
    GreaterEqual,
    Always,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ReductionMode {
    #[default]
    WeightedAverage,
    Min,
    Max,
}

/// Canonical description of a sampler binding.
///
/// `Default` is the all-zero state used when compiling functions that do
/// not depend on a sampler (texel fetch, typeless textures).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct StaticSamplerState {
    pub wrap_s: WrapMode,
    pub wrap_t: WrapMode,
    pub wrap_r: WrapMode,
    pub min_img_filter: Filter,
    pub mag_img_filter: Filter,
    pub min_mip_filter: MipFilter,
    pub compare_mode: bool,
    pub compare_func: CompareFunc,
    pub normalized_coords: bool,
    pub seamless_cube_map: bool,
    pub aniso: bool,
    pub reduction_mode: ReductionMode,
    pub min_max_lod_equal: bool,
    pub lod_bias_non_zero: bool,
    pub apply_min_lod: bool,
    pub apply_max_lod: bool,
}

impl StaticSamplerState {
    /// Shared state for sampler-independent compilation.
    pub const DUMMY: StaticSamplerState = StaticSamplerState {
        wrap_s: WrapMode::Repeat,
        wrap_t: WrapMode::Repeat,
        wrap_r: WrapMode::Repeat,
        min_img_filter: Filter::Nearest,
        mag_img_filter: Filter::Nearest,
        min_mip_filter: MipFilter::None,
        compare_mode: false,
        compare_func: CompareFunc::Never,
        normalized_coords: false,
        seamless_cube_map: false,
        aniso: false,
        reduction_mode: ReductionMode::WeightedAverage,
        min_max_lod_equal: false,
        lod_bias_non_zero: false,
        apply_min_lod: false,
        apply_max_lod: false,
    };

    /// Any linear filtering, which pure integer formats cannot do.
    pub fn uses_linear_filtering(&self) -> bool {
        self.min_img_filter == Filter::Linear
            || self.mag_img_filter == Filter::Linear
            || self.min_mip_filter == MipFilter::Linear
    }

    /// Stable byte encoding used for content hashing.
    pub fn write_bytes(&self, out: &mut Vec<u8>) {
        out.push(self.wrap_s as u8);
        out.push(self.wrap_t as u8);
        out.push(self.wrap_r as u8);
        out.push(self.min_img_filter as u8);
        out.push(self.mag_img_filter as u8);
        out.push(self.min_mip_filter as u8);
        out.push(self.compare_func as u8);
        out.push(self.reduction_mode as u8);
        out.push(pack_flags(&[
            self.compare_mode,
            self.normalized_coords,
            self.seamless_cube_map,
            self.aniso,
            self.min_max_lod_equal,
            self.lod_bias_non_zero,
            self.apply_min_lod,
            self.apply_max_lod,
        ]));
    }
}

fn pack_flags(flags: &[bool]) -> u8 {
    debug_assert!(flags.len() <= 8);
    flags
        .iter()
        .enumerate()
        .fold(0u8, |acc, (bit, &set)| acc | ((set as u8) << bit))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_layer_targets() {
        assert_eq!(TextureTarget::Texture1DArray.single_layer(), TextureTarget::Texture1D);
        assert_eq!(TextureTarget::Texture2DArray.single_layer(), TextureTarget::Texture2D);
        assert_eq!(TextureTarget::Texture3D.single_layer(), TextureTarget::Texture2D);
        assert_eq!(TextureTarget::CubeArray.single_layer(), TextureTarget::Cube);
        assert_eq!(TextureTarget::Cube.single_layer(), TextureTarget::Cube);

        for target in [
            TextureTarget::Texture1DArray,
            TextureTarget::Texture2DArray,
            TextureTarget::CubeArray,
        ] {
            assert!(target.is_array());
            assert!(!target.single_layer().is_array());
        }
        assert!(!TextureTarget::Texture3D.is_array());
    }

    #[test]
    fn test_dummy_sampler_is_default() {
        assert_eq!(StaticSamplerState::DUMMY, StaticSamplerState::default());
    }

    #[test]
    fn test_byte_encoding_distinguishes_states() {
        let a = StaticTextureState {
            format: PixelFormat::Rgba8Unorm,
            ..Default::default()
        };
        let b = StaticTextureState {
            multisampled: true,
            ..a
        };

        let (mut ea, mut eb) = (Vec::new(), Vec::new());
        a.write_bytes(&mut ea);
        b.write_bytes(&mut eb);
        assert_ne!(ea, eb);

        let mut again = Vec::new();
        a.write_bytes(&mut again);
        assert_eq!(ea, again);
    }
}
