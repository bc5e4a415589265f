//! Function compiler façade
//!
//! The sampler matrix never lowers anything itself. It hands a static
//! description of one function to [`FunctionCompiler`], which
//!
//! 1. rejects combinations the format/target/sampler cannot support,
//! 2. hashes the description into a [`CacheKey`] and looks for a persisted object,
//! 3. asks the [`CodegenBackend`] to produce native code (reusing the object if found),
//! 4. persists newly generated objects and keeps the owning [`JitModule`] alive.
//!
//! Modules are only released by [`FunctionCompiler::teardown`]; every pointer
//! handed out before that stays valid.

use std::ffi::c_void;
use std::fmt;
use std::ptr::NonNull;
use std::sync::Arc;

use log::{debug, trace, warn};

use crate::disk_cache::{CacheKey, DiskCache};
use crate::format::FormatUsage;
use crate::key::{ImageOpId, ImageOpKind, QueryKind, SampleKey, SampleOp};
use crate::state::{StaticSamplerState, StaticTextureState, TextureTarget};

pub const IMAGE_FUNCTION_SALT: &str = "jitsampler-image-v1";
pub const SAMPLE_FUNCTION_SALT: &str = "jitsampler-sample-v1";
pub const SIZE_FUNCTION_SALT: &str = "jitsampler-size-v1";

/// Entry point of a compiled function.
///
/// Callers cast it to the signature of its function family. The pointer is
/// valid until the owning matrix is torn down.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct CompiledFunction(NonNull<c_void>);

// Points at immutable machine code owned by a JitModule.
unsafe impl Send for CompiledFunction {}
unsafe impl Sync for CompiledFunction {}

impl CompiledFunction {
    pub fn from_ptr(ptr: *const c_void) -> Option<Self> {
        NonNull::new(ptr as *mut c_void).map(Self)
    }

    pub fn as_ptr(self) -> *const c_void {
        self.0.as_ptr()
    }
}

impl fmt::Debug for CompiledFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CompiledFunction({:p})", self.0)
    }
}

/// Owner of executable code produced by a backend.
pub trait JitModule: Send + Sync {
    /// Size of the generated code in bytes.
    fn code_size(&self) -> usize;
}

/// Which family a function belongs to; each family has its own cache salt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FunctionFamily {
    Sample,
    Image,
    Size,
}

impl FunctionFamily {
    pub fn salt(self) -> &'static str {
        match self {
            FunctionFamily::Sample => SAMPLE_FUNCTION_SALT,
            FunctionFamily::Image => IMAGE_FUNCTION_SALT,
            FunctionFamily::Size => SIZE_FUNCTION_SALT,
        }
    }
}

/// Static description of one function to compile.
#[derive(Clone, Copy, Debug)]
pub enum FunctionDesc<'a> {
    Sample {
        texture: &'a StaticTextureState,
        sampler: &'a StaticSamplerState,
        key: SampleKey,
    },
    Image {
        texture: &'a StaticTextureState,
        op: ImageOpId,
    },
    Query {
        texture: &'a StaticTextureState,
        kind: QueryKind,
    },
}

impl FunctionDesc<'_> {
    pub fn family(&self) -> FunctionFamily {
        match self {
            FunctionDesc::Sample { .. } => FunctionFamily::Sample,
            FunctionDesc::Image { .. } => FunctionFamily::Image,
            FunctionDesc::Query { .. } => FunctionFamily::Size,
        }
    }

    pub fn texture(&self) -> &StaticTextureState {
        match self {
            FunctionDesc::Sample { texture, .. }
            | FunctionDesc::Image { texture, .. }
            | FunctionDesc::Query { texture, .. } => texture,
        }
    }

    /// Serialized inputs, hashed together with the family salt.
    pub fn write_bytes(&self, out: &mut Vec<u8>) {
        self.texture().write_bytes(out);
        match self {
            FunctionDesc::Sample { sampler, key, .. } => {
                sampler.write_bytes(out);
                out.extend_from_slice(&(key.index() as u16).to_le_bytes());
            }
            FunctionDesc::Image { op, .. } => out.push(op.index() as u8),
            FunctionDesc::Query { kind, .. } => out.push(match kind {
                QueryKind::Size => 0,
                QueryKind::Samples => 1,
            }),
        }
    }

    /// Whether the combination can be compiled at all. Unsupported
    /// combinations become permanent empty slots.
    pub fn is_supported(&self) -> bool {
        match *self {
            FunctionDesc::Sample {
                texture,
                sampler,
                key,
            } => sample_supported(texture, sampler, key),
            FunctionDesc::Image { texture, op } => image_supported(texture, op),
            FunctionDesc::Query { .. } => true,
        }
    }
}

fn sample_supported(
    texture: &StaticTextureState,
    sampler: &StaticSamplerState,
    key: SampleKey,
) -> bool {
    if texture.is_typeless() {
        return true;
    }
    let format = texture.format;
    let op = key.op();

    if op != SampleOp::LodQuery && sampler.compare_mode != key.is_shadow() {
        return false;
    }
    if key.is_shadow() && !format.has_float_texels() {
        return false;
    }
    if op == SampleOp::Gather && texture.target.dims() != 2 {
        return false;
    }
    if op != SampleOp::Fetch && !sampler.normalized_coords {
        let rect_like = matches!(
            texture.target,
            TextureTarget::Texture1D
                | TextureTarget::Texture2D
                | TextureTarget::Rect
                | TextureTarget::Texture1DArray
                | TextureTarget::Texture2DArray
        );
        if !rect_like || !texture.level_zero_only {
            return false;
        }
    }
    if format.is_pure_integer() && (sampler.uses_linear_filtering() || sampler.aniso) {
        return false;
    }
    if sampler.aniso && texture.target.dims() != 2 {
        return false;
    }
    if key.is_fetch_ms() && !texture.multisampled {
        return false;
    }

    let usage = if op == SampleOp::Fetch && texture.target == TextureTarget::Buffer {
        FormatUsage::TexelBuffer
    } else {
        FormatUsage::Sampled
    };
    format.supports(texture.target, usage)
}

fn image_supported(texture: &StaticTextureState, op: ImageOpId) -> bool {
    if texture.is_typeless() {
        return true;
    }
    let format = texture.format;
    if !format.supports(texture.target, FormatUsage::Storage) {
        return false;
    }
    if op.is_multisample() != texture.multisampled {
        return false;
    }
    if op.is_multisample()
        && !matches!(
            texture.target,
            TextureTarget::Texture2D | TextureTarget::Texture2DArray
        )
    {
        return false;
    }
    match op.kind() {
        ImageOpKind::Load | ImageOpKind::SparseLoad | ImageOpKind::Store => true,
        ImageOpKind::AtomicCompareSwap => format.supports_atomics(),
        ImageOpKind::Atomic(atomic) => {
            format.supports_atomics()
                && (!atomic.is_float() || format.has_float_texels())
                && (!atomic.is_integer() || format.is_pure_integer())
        }
    }
}

/// Everything a backend gets to build one function.
pub struct CompileRequest<'a> {
    pub desc: FunctionDesc<'a>,
    pub cache_key: CacheKey,
    /// Previously persisted object for `cache_key`, if any.
    pub cached_object: Option<&'a [u8]>,
}

/// Output of a backend.
pub struct CompiledCode {
    pub entry: CompiledFunction,
    pub module: Box<dyn JitModule>,
    /// Object to persist under the request's cache key. Ignored when the
    /// request already carried a cached object.
    pub object: Option<Vec<u8>>,
}

/// The lowering pass that turns a function description into native code.
pub trait CodegenBackend: Send + Sync {
    /// `None` means the backend cannot express this function; the slot stays
    /// empty just like a pre-check rejection.
    fn compile(&self, request: &CompileRequest<'_>) -> Option<CompiledCode>;
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CompilerStats {
    pub requests: usize,
    pub unsupported: usize,
    pub backend_calls: usize,
    pub cache_hits: usize,
    pub cache_stores: usize,
    pub modules: usize,
    pub code_bytes: usize,
}

pub struct FunctionCompiler {
    backend: Box<dyn CodegenBackend>,
    disk_cache: Option<Arc<dyn DiskCache>>,
    modules: Vec<Box<dyn JitModule>>,
    stats: CompilerStats,
}

impl FunctionCompiler {
    pub fn new(backend: impl CodegenBackend + 'static) -> Self {
        Self {
            backend: Box::new(backend),
            disk_cache: None,
            modules: Vec::new(),
            stats: CompilerStats::default(),
        }
    }

    pub fn with_disk_cache(mut self, cache: Option<Arc<dyn DiskCache>>) -> Self {
        self.disk_cache = cache;
        self
    }

    /// Compile one function, or return `None` if the combination is not
    /// supported.
    pub fn compile(&mut self, desc: FunctionDesc<'_>) -> Option<CompiledFunction> {
        self.stats.requests += 1;

        if !desc.is_supported() {
            self.stats.unsupported += 1;
            trace!("Unsupported {:?} function: {:?}", desc.family(), desc);
            return None;
        }

        let mut payload = Vec::with_capacity(32);
        desc.write_bytes(&mut payload);
        let cache_key = CacheKey::compute(desc.family().salt(), &payload);

        let cached = self.disk_cache.as_ref().and_then(|cache| cache.load(&cache_key));
        if cached.is_some() {
            self.stats.cache_hits += 1;
            trace!("Function cache hit {:?}", cache_key);
        }

        self.stats.backend_calls += 1;
        let request = CompileRequest {
            desc,
            cache_key,
            cached_object: cached.as_deref(),
        };
        let Some(code) = self.backend.compile(&request) else {
            self.stats.unsupported += 1;
            debug!("Backend declined {:?} function {:?}", desc.family(), cache_key);
            return None;
        };

        if cached.is_none() {
            if let (Some(cache), Some(object)) = (&self.disk_cache, &code.object) {
                match cache.store(&cache_key, object) {
                    Ok(()) => self.stats.cache_stores += 1,
                    Err(e) => warn!("Failed to persist function {:?}: {}", cache_key, e),
                }
            }
        }

        self.stats.code_bytes += code.module.code_size();
        self.modules.push(code.module);
        self.stats.modules = self.modules.len();
        Some(code.entry)
    }

    pub fn stats(&self) -> CompilerStats {
        self.stats
    }

    /// Release every module. Pointers returned so far become dangling.
    pub fn teardown(&mut self) {
        if !self.modules.is_empty() {
            debug!(
                "Releasing {} JIT modules ({} bytes of code)",
                self.modules.len(),
                self.stats.code_bytes
            );
        }
        self.modules.clear();
        self.stats.modules = 0;
        self.stats.code_bytes = 0;
    }
}

impl fmt::Debug for FunctionCompiler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionCompiler")
            .field("stats", &self.stats)
            .field("disk_cache", &self.disk_cache.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disk_cache::MemoryDiskCache;
    use crate::format::PixelFormat;
    use crate::key::{AtomicOp, LodControl, LodProperty};
    use crate::sampler::SamplerDesc;
    use crate::state::CompareFunc;
    use crate::testing::CountingBackend;

    fn rgba8() -> StaticTextureState {
        StaticTextureState {
            format: PixelFormat::Rgba8Unorm,
            ..Default::default()
        }
    }

    #[test]
    fn test_shadow_requires_compare_sampler() {
        let texture = StaticTextureState {
            format: PixelFormat::Depth32Float,
            ..Default::default()
        };
        let plain = SamplerDesc::linear().static_state();
        let shadow = SamplerDesc::shadow(CompareFunc::Less).static_state();
        let key = SampleKey::basic().with_shadow();

        assert!(!sample_supported(&texture, &plain, key));
        assert!(sample_supported(&texture, &shadow, key));
        assert!(!sample_supported(&texture, &shadow, SampleKey::basic()));

        let lodq = SampleKey::new(SampleOp::LodQuery, LodControl::Implicit, LodProperty::Scalar);
        assert!(sample_supported(&texture, &shadow, lodq));
    }

    #[test]
    fn test_integer_format_restrictions() {
        let texture = StaticTextureState {
            format: PixelFormat::R32Uint,
            ..Default::default()
        };
        let linear = SamplerDesc::linear().static_state();
        let nearest = SamplerDesc::default().static_state();
        let shadow = SamplerDesc::shadow(CompareFunc::Less).static_state();

        assert!(!sample_supported(&texture, &linear, SampleKey::basic()));
        assert!(sample_supported(&texture, &nearest, SampleKey::basic()));
        assert!(!sample_supported(&texture, &shadow, SampleKey::basic().with_shadow()));
    }

    #[test]
    fn test_gather_and_multisample_restrictions() {
        let sampler = SamplerDesc::linear().static_state();
        let gather = SampleKey::new(SampleOp::Gather, LodControl::Implicit, LodProperty::Scalar);

        let tex3d = StaticTextureState {
            target: TextureTarget::Texture3D,
            ..rgba8()
        };
        assert!(!sample_supported(&tex3d, &sampler, gather));
        assert!(sample_supported(&rgba8(), &sampler, gather));

        let fetch_ms = SampleKey::fetch().with_fetch_ms();
        assert!(!sample_supported(&rgba8(), &StaticSamplerState::DUMMY, fetch_ms));
        let ms = StaticTextureState {
            multisampled: true,
            ..rgba8()
        };
        assert!(sample_supported(&ms, &StaticSamplerState::DUMMY, fetch_ms));
    }

    #[test]
    fn test_typeless_skips_checks() {
        let texture = StaticTextureState::default();
        let key = SampleKey::new(SampleOp::Gather, LodControl::Bias, LodProperty::Scalar);
        assert!(sample_supported(&texture, &StaticSamplerState::DUMMY, key.with_shadow()));
    }

    #[test]
    fn test_image_atomics() {
        let uint = StaticTextureState {
            format: PixelFormat::R32Uint,
            ..Default::default()
        };
        let float = StaticTextureState {
            format: PixelFormat::R32Float,
            ..Default::default()
        };
        let add = ImageOpId::new(ImageOpKind::Atomic(AtomicOp::Add), false);
        let fadd = ImageOpId::new(ImageOpKind::Atomic(AtomicOp::FAdd), false);
        let xchg = ImageOpId::new(ImageOpKind::Atomic(AtomicOp::Exchange), false);

        assert!(image_supported(&uint, add));
        assert!(!image_supported(&float, add));
        assert!(image_supported(&float, fadd));
        assert!(!image_supported(&uint, fadd));
        assert!(image_supported(&float, xchg));
        assert!(!image_supported(&rgba8(), xchg));
        assert!(image_supported(&rgba8(), ImageOpId::new(ImageOpKind::Load, false)));
        assert!(!image_supported(&rgba8(), ImageOpId::new(ImageOpKind::Load, true)));
    }

    #[test]
    fn test_unsupported_skips_backend() {
        let backend = CountingBackend::new();
        let mut compiler = FunctionCompiler::new(backend.clone());
        let texture = StaticTextureState {
            format: PixelFormat::R32Uint,
            ..Default::default()
        };
        let sampler = SamplerDesc::linear().static_state();

        let result = compiler.compile(FunctionDesc::Sample {
            texture: &texture,
            sampler: &sampler,
            key: SampleKey::basic(),
        });
        assert!(result.is_none());
        assert_eq!(backend.calls(), 0);
        assert_eq!(compiler.stats().unsupported, 1);
    }

    #[test]
    fn test_disk_cache_round_trip_across_compilers() {
        let cache: Arc<dyn DiskCache> = Arc::new(MemoryDiskCache::new());
        let texture = rgba8();
        let desc = FunctionDesc::Query {
            texture: &texture,
            kind: QueryKind::Size,
        };

        let first = CountingBackend::new();
        let mut compiler = FunctionCompiler::new(first.clone()).with_disk_cache(Some(cache.clone()));
        assert!(compiler.compile(desc).is_some());
        assert_eq!(compiler.stats().cache_stores, 1);
        assert_eq!(first.cached_requests(), 0);

        let second = CountingBackend::new();
        let mut compiler = FunctionCompiler::new(second.clone()).with_disk_cache(Some(cache));
        assert!(compiler.compile(desc).is_some());
        assert_eq!(compiler.stats().cache_hits, 1);
        assert_eq!(compiler.stats().cache_stores, 0);
        assert_eq!(second.cached_requests(), 1);
    }

    #[test]
    fn test_families_use_distinct_salts() {
        let texture = rgba8();
        let sampler = StaticSamplerState::DUMMY;
        let sample = FunctionDesc::Sample {
            texture: &texture,
            sampler: &sampler,
            key: SampleKey::basic(),
        };
        let size = FunctionDesc::Query {
            texture: &texture,
            kind: QueryKind::Size,
        };
        let image = FunctionDesc::Image {
            texture: &texture,
            op: ImageOpId::new(ImageOpKind::Load, false),
        };
        assert_ne!(sample.family().salt(), size.family().salt());
        assert_ne!(size.family().salt(), image.family().salt());
    }

    #[test]
    fn test_teardown_releases_modules() {
        let backend = CountingBackend::new();
        let mut compiler = FunctionCompiler::new(backend.clone());
        let texture = rgba8();
        for kind in [QueryKind::Size, QueryKind::Samples] {
            compiler.compile(FunctionDesc::Query {
                texture: &texture,
                kind,
            });
        }
        assert_eq!(compiler.stats().modules, 2);
        assert_eq!(backend.live_modules(), 2);

        compiler.teardown();
        assert_eq!(compiler.stats().modules, 0);
        assert_eq!(backend.live_modules(), 0);
    }
}
