//! Operation key space
//!
//! Sample keys pack every static property of a texture-sample instruction
//! into a dense 11-bit integer:
//!
//! ```text
//!  bit  0      shadow compare
//!  bit  1      texel offsets
//!  bits 2..3   op type        (texture, fetch, gather, lod query)
//!  bits 4..5   lod control    (implicit, bias, explicit, derivatives)
//!  bits 6..7   lod property   (scalar, per element, per quad)
//!  bits 8..9   gather component
//!  bit  10     multisample fetch
//! ```
//!
//! Image operation ids enumerate load/store/atomic variants, with the whole
//! range duplicated for multisampled images.

use std::fmt;

pub const SAMPLE_KEY_COUNT: usize = 1 << 11;

const SHADOW: u16 = 1 << 0;
const OFFSETS: u16 = 1 << 1;
const OP_TYPE_SHIFT: u16 = 2;
const OP_TYPE_MASK: u16 = 3 << OP_TYPE_SHIFT;
const LOD_CONTROL_SHIFT: u16 = 4;
const LOD_CONTROL_MASK: u16 = 3 << LOD_CONTROL_SHIFT;
const LOD_PROPERTY_SHIFT: u16 = 6;
const LOD_PROPERTY_MASK: u16 = 3 << LOD_PROPERTY_SHIFT;
const GATHER_COMP_SHIFT: u16 = 8;
const GATHER_COMP_MASK: u16 = 3 << GATHER_COMP_SHIFT;
const FETCH_MS: u16 = 1 << 10;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SampleOp {
    Texture,
    /// Texel fetch; independent of any sampler.
    Fetch,
    Gather,
    LodQuery,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LodControl {
    Implicit,
    Bias,
    Explicit,
    Derivatives,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LodProperty {
    Scalar,
    PerElement,
    PerQuad,
}

/// Dense sample operation key.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SampleKey(u16);

impl SampleKey {
    pub fn new(op: SampleOp, lod_control: LodControl, lod_property: LodProperty) -> Self {
        let op_bits = match op {
            SampleOp::Texture => 0,
            SampleOp::Fetch => 1,
            SampleOp::Gather => 2,
            SampleOp::LodQuery => 3,
        };
        let control_bits = match lod_control {
            LodControl::Implicit => 0,
            LodControl::Bias => 1,
            LodControl::Explicit => 2,
            LodControl::Derivatives => 3,
        };
        let property_bits = match lod_property {
            LodProperty::Scalar => 0,
            LodProperty::PerElement => 1,
            LodProperty::PerQuad => 2,
        };
        Self(
            (op_bits << OP_TYPE_SHIFT)
                | (control_bits << LOD_CONTROL_SHIFT)
                | (property_bits << LOD_PROPERTY_SHIFT),
        )
    }

    /// Plain implicit-LOD filtered sample.
    pub fn basic() -> Self {
        Self::new(SampleOp::Texture, LodControl::Implicit, LodProperty::Scalar)
    }

    /// Texel fetch with an explicit level.
    pub fn fetch() -> Self {
        Self::new(SampleOp::Fetch, LodControl::Explicit, LodProperty::Scalar)
    }

    pub fn from_index(index: usize) -> Option<Self> {
        (index < SAMPLE_KEY_COUNT).then_some(Self(index as u16))
    }

    pub fn with_shadow(self) -> Self {
        Self(self.0 | SHADOW)
    }

    pub fn with_offsets(self) -> Self {
        Self(self.0 | OFFSETS)
    }

    pub fn with_fetch_ms(self) -> Self {
        Self(self.0 | FETCH_MS)
    }

    pub fn with_gather_component(self, component: u8) -> Self {
        debug_assert!(component < 4);
        Self((self.0 & !GATHER_COMP_MASK) | (((component & 3) as u16) << GATHER_COMP_SHIFT))
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }

    pub fn op(self) -> SampleOp {
        match (self.0 & OP_TYPE_MASK) >> OP_TYPE_SHIFT {
            0 => SampleOp::Texture,
            1 => SampleOp::Fetch,
            2 => SampleOp::Gather,
            _ => SampleOp::LodQuery,
        }
    }

    pub fn lod_control(self) -> LodControl {
        match (self.0 & LOD_CONTROL_MASK) >> LOD_CONTROL_SHIFT {
            0 => LodControl::Implicit,
            1 => LodControl::Bias,
            2 => LodControl::Explicit,
            _ => LodControl::Derivatives,
        }
    }

    /// The encoding leaves value 3 unused; it decodes as per-quad.
    pub fn lod_property(self) -> LodProperty {
        match (self.0 & LOD_PROPERTY_MASK) >> LOD_PROPERTY_SHIFT {
            0 => LodProperty::Scalar,
            1 => LodProperty::PerElement,
            _ => LodProperty::PerQuad,
        }
    }

    pub fn gather_component(self) -> u8 {
        ((self.0 & GATHER_COMP_MASK) >> GATHER_COMP_SHIFT) as u8
    }

    pub fn is_shadow(self) -> bool {
        self.0 & SHADOW != 0
    }

    pub fn has_offsets(self) -> bool {
        self.0 & OFFSETS != 0
    }

    pub fn is_fetch_ms(self) -> bool {
        self.0 & FETCH_MS != 0
    }

    /// Fetch keys never depend on a sampler.
    pub fn is_sampler_independent(self) -> bool {
        self.op() == SampleOp::Fetch
    }
}

impl fmt::Debug for SampleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SampleKey")
            .field("index", &self.0)
            .field("op", &self.op())
            .field("lod_control", &self.lod_control())
            .field("shadow", &self.is_shadow())
            .finish()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AtomicOp {
    Add,
    IMin,
    UMin,
    IMax,
    UMax,
    And,
    Or,
    Xor,
    Exchange,
    FAdd,
    FMin,
    FMax,
}

impl AtomicOp {
    pub const ALL: [AtomicOp; 12] = [
        AtomicOp::Add,
        AtomicOp::IMin,
        AtomicOp::UMin,
        AtomicOp::IMax,
        AtomicOp::UMax,
        AtomicOp::And,
        AtomicOp::Or,
        AtomicOp::Xor,
        AtomicOp::Exchange,
        AtomicOp::FAdd,
        AtomicOp::FMin,
        AtomicOp::FMax,
    ];

    pub fn is_float(self) -> bool {
        matches!(self, AtomicOp::FAdd | AtomicOp::FMin | AtomicOp::FMax)
    }

    /// Exchange moves bits around and works for any 32-bit format.
    pub fn is_integer(self) -> bool {
        !self.is_float() && self != AtomicOp::Exchange
    }
}

/// Kind of shader image access.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ImageOpKind {
    Load,
    SparseLoad,
    Store,
    AtomicCompareSwap,
    Atomic(AtomicOp),
}

const IMAGE_BASE_OPS: usize = 4;
pub const IMAGE_OP_KIND_COUNT: usize = IMAGE_BASE_OPS + AtomicOp::ALL.len();
pub const IMAGE_OP_COUNT: usize = IMAGE_OP_KIND_COUNT * 2;

/// Dense image operation id; multisample variants occupy the upper half.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ImageOpId(u8);

impl ImageOpId {
    pub fn new(kind: ImageOpKind, multisample: bool) -> Self {
        let base = match kind {
            ImageOpKind::Load => 0,
            ImageOpKind::SparseLoad => 1,
            ImageOpKind::Store => 2,
            ImageOpKind::AtomicCompareSwap => 3,
            ImageOpKind::Atomic(op) => {
                let pos = AtomicOp::ALL
                    .iter()
                    .position(|candidate| *candidate == op)
                    .unwrap_or_default();
                IMAGE_BASE_OPS + pos
            }
        };
        let ms = if multisample { IMAGE_OP_KIND_COUNT } else { 0 };
        Self((base + ms) as u8)
    }

    pub fn from_index(index: usize) -> Option<Self> {
        (index < IMAGE_OP_COUNT).then_some(Self(index as u8))
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }

    pub fn is_multisample(self) -> bool {
        self.index() >= IMAGE_OP_KIND_COUNT
    }

    pub fn kind(self) -> ImageOpKind {
        match self.index() % IMAGE_OP_KIND_COUNT {
            0 => ImageOpKind::Load,
            1 => ImageOpKind::SparseLoad,
            2 => ImageOpKind::Store,
            3 => ImageOpKind::AtomicCompareSwap,
            n => ImageOpKind::Atomic(AtomicOp::ALL[n - IMAGE_BASE_OPS]),
        }
    }

    pub fn all() -> impl Iterator<Item = ImageOpId> {
        (0..IMAGE_OP_COUNT).map(|i| ImageOpId(i as u8))
    }
}

/// Size queries compiled once per texture.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum QueryKind {
    Size,
    Samples,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_key_fields() {
        let key = SampleKey::new(SampleOp::Gather, LodControl::Bias, LodProperty::PerQuad)
            .with_shadow()
            .with_gather_component(2);

        assert_eq!(key.op(), SampleOp::Gather);
        assert_eq!(key.lod_control(), LodControl::Bias);
        assert_eq!(key.lod_property(), LodProperty::PerQuad);
        assert_eq!(key.gather_component(), 2);
        assert!(key.is_shadow());
        assert!(!key.has_offsets());
        assert!(key.index() < SAMPLE_KEY_COUNT);
    }

    #[test]
    fn test_max_key_in_range() {
        let key = SampleKey::new(SampleOp::LodQuery, LodControl::Derivatives, LodProperty::PerQuad)
            .with_shadow()
            .with_offsets()
            .with_gather_component(3)
            .with_fetch_ms();
        assert!(key.index() < SAMPLE_KEY_COUNT);
        assert!(SampleKey::from_index(SAMPLE_KEY_COUNT).is_none());
    }

    #[test]
    fn test_fetch_is_sampler_independent() {
        assert!(SampleKey::fetch().is_sampler_independent());
        assert!(!SampleKey::basic().is_sampler_independent());
        assert_eq!(SampleKey::basic().index(), 0);
    }

    #[test]
    fn test_image_op_ids() {
        assert_eq!(IMAGE_OP_COUNT, 32);
        for id in ImageOpId::all() {
            assert_eq!(ImageOpId::new(id.kind(), id.is_multisample()), id);
        }

        let ms_store = ImageOpId::new(ImageOpKind::Store, true);
        assert!(ms_store.is_multisample());
        assert_eq!(ms_store.kind(), ImageOpKind::Store);
        assert_ne!(ms_store, ImageOpId::new(ImageOpKind::Store, false));
    }
}
