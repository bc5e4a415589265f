//! Sampler descriptions
//!
//! Maps a dynamic sampler object (LOD values, border colors, anisotropy
//! level) to its [`StaticSamplerState`]. Only the facts generated code
//! branches on survive canonicalization.

use ash::vk;

use crate::state::{CompareFunc, Filter, MipFilter, ReductionMode, StaticSamplerState, WrapMode};

/// Largest mip level index a texture can have.
pub const MAX_TEXTURE_LEVEL: f32 = 14.0;

#[derive(Clone, Debug, PartialEq)]
pub struct SamplerDesc {
    pub wrap_s: WrapMode,
    pub wrap_t: WrapMode,
    pub wrap_r: WrapMode,
    pub min_filter: Filter,
    pub mag_filter: Filter,
    pub mip_filter: MipFilter,
    pub compare: Option<CompareFunc>,
    pub normalized_coords: bool,
    pub seamless_cube_map: bool,
    pub max_anisotropy: f32,
    pub reduction_mode: ReductionMode,
    pub lod_bias: f32,
    pub min_lod: f32,
    pub max_lod: f32,
    pub border_color: [f32; 4],
}

impl Default for SamplerDesc {
    fn default() -> Self {
        Self {
            wrap_s: WrapMode::Repeat,
            wrap_t: WrapMode::Repeat,
            wrap_r: WrapMode::Repeat,
            min_filter: Filter::Nearest,
            mag_filter: Filter::Nearest,
            mip_filter: MipFilter::None,
            compare: None,
            normalized_coords: true,
            seamless_cube_map: true,
            max_anisotropy: 1.0,
            reduction_mode: ReductionMode::WeightedAverage,
            lod_bias: 0.0,
            min_lod: 0.0,
            max_lod: MAX_TEXTURE_LEVEL,
            border_color: [0.0; 4],
        }
    }
}

impl SamplerDesc {
    pub fn linear() -> Self {
        Self {
            min_filter: Filter::Linear,
            mag_filter: Filter::Linear,
            mip_filter: MipFilter::Linear,
            ..Self::default()
        }
    }

    pub fn shadow(func: CompareFunc) -> Self {
        Self {
            compare: Some(func),
            ..Self::linear()
        }
    }

    /// Canonical static state of the sampler.
    ///
    /// LOD clamping only matters when mipmapping is enabled; otherwise the
    /// LOD related flags stay cleared so such samplers dedup together.
    pub fn static_state(&self) -> StaticSamplerState {
        let mut state = StaticSamplerState {
            wrap_s: self.wrap_s,
            wrap_t: self.wrap_t,
            wrap_r: self.wrap_r,
            min_img_filter: self.min_filter,
            mag_img_filter: self.mag_filter,
            min_mip_filter: self.mip_filter,
            compare_mode: self.compare.is_some(),
            compare_func: self.compare.unwrap_or(CompareFunc::Never),
            normalized_coords: self.normalized_coords,
            seamless_cube_map: self.seamless_cube_map,
            aniso: self.max_anisotropy > 1.0,
            reduction_mode: self.reduction_mode,
            ..StaticSamplerState::DUMMY
        };

        if self.mip_filter != MipFilter::None {
            state.min_max_lod_equal = self.min_lod == self.max_lod;
            state.lod_bias_non_zero = self.lod_bias != 0.0;
            state.apply_min_lod = self.min_lod > 0.0;
            state.apply_max_lod = self.max_lod < MAX_TEXTURE_LEVEL;
        }

        state
    }

    pub fn from_vk(create_info: &vk::SamplerCreateInfo<'_>) -> Self {
        let compare = if create_info.compare_enable == vk::TRUE {
            Some(vk_to_compare_func(create_info.compare_op))
        } else {
            None
        };

        let max_anisotropy = if create_info.anisotropy_enable == vk::TRUE {
            create_info.max_anisotropy.clamp(1.0, 16.0)
        } else {
            1.0
        };

        Self {
            wrap_s: vk_to_wrap_mode(create_info.address_mode_u),
            wrap_t: vk_to_wrap_mode(create_info.address_mode_v),
            wrap_r: vk_to_wrap_mode(create_info.address_mode_w),
            min_filter: vk_to_filter(create_info.min_filter),
            mag_filter: vk_to_filter(create_info.mag_filter),
            mip_filter: vk_to_mip_filter(create_info.mipmap_mode),
            compare,
            normalized_coords: create_info.unnormalized_coordinates != vk::TRUE,
            seamless_cube_map: true,
            max_anisotropy,
            reduction_mode: ReductionMode::WeightedAverage,
            lod_bias: create_info.mip_lod_bias,
            min_lod: create_info.min_lod,
            max_lod: create_info.max_lod.min(MAX_TEXTURE_LEVEL),
            border_color: vk_to_border_color(create_info.border_color),
        }
    }
}

fn vk_to_wrap_mode(mode: vk::SamplerAddressMode) -> WrapMode {
    match mode {
        vk::SamplerAddressMode::REPEAT => WrapMode::Repeat,
        vk::SamplerAddressMode::MIRRORED_REPEAT => WrapMode::MirrorRepeat,
        vk::SamplerAddressMode::CLAMP_TO_EDGE => WrapMode::ClampToEdge,
        vk::SamplerAddressMode::CLAMP_TO_BORDER => WrapMode::ClampToBorder,
        vk::SamplerAddressMode::MIRROR_CLAMP_TO_EDGE => WrapMode::MirrorClampToEdge,
        _ => WrapMode::ClampToEdge,
    }
}

fn vk_to_filter(filter: vk::Filter) -> Filter {
    match filter {
        vk::Filter::NEAREST => Filter::Nearest,
        _ => Filter::Linear,
    }
}

// Vulkan has no "no mipmapping" mode; NEAREST with max_lod 0 is the usual
// spelling and is kept as a real mip filter here.
fn vk_to_mip_filter(mode: vk::SamplerMipmapMode) -> MipFilter {
    match mode {
        vk::SamplerMipmapMode::NEAREST => MipFilter::Nearest,
        _ => MipFilter::Linear,
    }
}

fn vk_to_compare_func(op: vk::CompareOp) -> CompareFunc {
    match op {
        vk::CompareOp::NEVER => CompareFunc::Never,
        vk::CompareOp::LESS => CompareFunc::Less,
        vk::CompareOp::EQUAL => CompareFunc::Equal,
        vk::CompareOp::LESS_OR_EQUAL => CompareFunc::LessEqual,
        vk::CompareOp::GREATER => CompareFunc::Greater,
        vk::CompareOp::NOT_EQUAL => CompareFunc::NotEqual,
        vk::CompareOp::GREATER_OR_EQUAL => CompareFunc::GreaterEqual,
        _ => CompareFunc::Always,
    }
}

fn vk_to_border_color(color: vk::BorderColor) -> [f32; 4] {
    match color {
        vk::BorderColor::FLOAT_OPAQUE_BLACK | vk::BorderColor::INT_OPAQUE_BLACK => {
            [0.0, 0.0, 0.0, 1.0]
        }
        vk::BorderColor::FLOAT_OPAQUE_WHITE | vk::BorderColor::INT_OPAQUE_WHITE => [1.0; 4],
        _ => [0.0; 4],
    }
}
