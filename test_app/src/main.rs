use std::ffi::c_void;

use ash::vk;
use jitsampler::compiler::CompilerStats;
use jitsampler::image::{ImageView, TextureView};
use jitsampler::key::{LodControl, LodProperty, SampleOp};
use jitsampler::sampler::SamplerDesc;
use jitsampler::shader::{parse_spirv, ShaderScanner};
use jitsampler::{
    CodegenBackend, CompileRequest, CompiledCode, CompiledFunction, ImageOpId, ImageOpKind,
    JitModule, MatrixConfig, SampleKey, SamplerContext,
};

const SHADE_SPV: &[u8] = include_bytes!(concat!(env!("OUT_DIR"), "/shade.spv"));
const SWIZZLE_SPV: &[u8] = include_bytes!(concat!(env!("OUT_DIR"), "/swizzle.spv"));

/// Stand-in code generator: every function is a small heap blob whose
/// address serves as the entry point.
struct StubBackend;

struct StubModule {
    code: Box<[u8]>,
}

impl JitModule for StubModule {
    fn code_size(&self) -> usize {
        self.code.len()
    }
}

impl CodegenBackend for StubBackend {
    fn compile(&self, request: &CompileRequest<'_>) -> Option<CompiledCode> {
        let code: Box<[u8]> = match request.cached_object {
            Some(object) => object.into(),
            None => request.cache_key.0.into(),
        };
        let entry = CompiledFunction::from_ptr(code.as_ptr() as *const c_void)?;
        let object = request.cached_object.is_none().then(|| code.to_vec());
        Some(CompiledCode {
            entry,
            module: Box::new(StubModule { code }),
            object,
        })
    }
}

fn spirv_words(bytes: &[u8]) -> Vec<u32> {
    bytes
        .chunks_exact(4)
        .map(|chunk| u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

fn mark(found: Option<CompiledFunction>) -> &'static str {
    if found.is_some() {
        "✓"
    } else {
        "✗ (unsupported)"
    }
}

fn image_2d(format: vk::Format, width: u32, height: u32) -> vk::ImageCreateInfo<'static> {
    vk::ImageCreateInfo::default()
        .image_type(vk::ImageType::TYPE_2D)
        .format(format)
        .extent(vk::Extent3D {
            width,
            height,
            depth: 1,
        })
        .mip_levels(1)
        .array_layers(1)
        .samples(vk::SampleCountFlags::TYPE_1)
}

fn view_2d(format: vk::Format) -> vk::ImageViewCreateInfo<'static> {
    vk::ImageViewCreateInfo::default()
        .view_type(vk::ImageViewType::TYPE_2D)
        .format(format)
        .subresource_range(vk::ImageSubresourceRange {
            aspect_mask: vk::ImageAspectFlags::COLOR,
            base_mip_level: 0,
            level_count: vk::REMAINING_MIP_LEVELS,
            base_array_layer: 0,
            layer_count: vk::REMAINING_ARRAY_LAYERS,
        })
}

fn print_stats(stats: &CompilerStats) {
    println!(
        "   requests={} unsupported={} compiled={} cache_hits={} modules={} code_bytes={}",
        stats.requests,
        stats.unsupported,
        stats.backend_calls,
        stats.cache_hits,
        stats.modules,
        stats.code_bytes
    );
}

fn main() -> jitsampler::Result<()> {
    jitsampler::init();

    println!("jitsampler Test Application");
    println!("===========================\n");

    println!("1. Creating sampler context...");
    let config = MatrixConfig::from_env()?;
    println!(
        "   force_non_pot={} disk_cache={:?}",
        config.force_non_pot, config.disk_cache_dir
    );
    let context = SamplerContext::new(config, StubBackend)?;
    println!("   ✓ Context created");

    println!("\n2. Scanning fragment shader...");
    let shade = parse_spirv(&spirv_words(SHADE_SPV))?;
    for event in shade.events() {
        println!("     - {:?}", event);
    }
    context.register_shader(&shade);
    println!("   ✓ {} sample keys active", context.stats().active_sample_keys);

    println!("\n3. Creating texture handles...");
    let albedo = TextureView::from_vk(
        &image_2d(vk::Format::R8G8B8A8_UNORM, 512, 512),
        &view_2d(vk::Format::R8G8B8A8_UNORM),
    )
    .ok_or_else(|| jitsampler::SamplerError::InvalidConfig("unsupported albedo format".into()))?;
    let shadow_map = TextureView::from_vk(
        &image_2d(vk::Format::D32_SFLOAT, 1024, 1024),
        &view_2d(vk::Format::D32_SFLOAT),
    )
    .ok_or_else(|| jitsampler::SamplerError::InvalidConfig("unsupported depth format".into()))?;

    let linear = SamplerDesc::from_vk(
        &vk::SamplerCreateInfo::default()
            .mag_filter(vk::Filter::LINEAR)
            .min_filter(vk::Filter::LINEAR)
            .mipmap_mode(vk::SamplerMipmapMode::LINEAR)
            .max_lod(vk::LOD_CLAMP_NONE),
    );
    let compare = SamplerDesc::from_vk(
        &vk::SamplerCreateInfo::default()
            .mag_filter(vk::Filter::LINEAR)
            .min_filter(vk::Filter::LINEAR)
            .compare_enable(true)
            .compare_op(vk::CompareOp::LESS_OR_EQUAL),
    );

    let albedo_handle = context.create_texture_handle(Some(&albedo), Some(&linear));
    let shadow_handle = context.create_texture_handle(Some(&shadow_map), Some(&compare));
    let lut_handle = context.create_texture_handle(Some(&albedo), None);
    println!(
        "   ✓ handles {:#x} {:#x} {:#x} ({} rows, {} samplers)",
        albedo_handle,
        shadow_handle,
        lut_handle,
        context.stats().textures,
        context.stats().samplers
    );

    println!("\n4. Looking up draw-time functions...");
    let implicit = SampleKey::new(SampleOp::Texture, LodControl::Implicit, LodProperty::PerQuad);
    let shadow = SampleKey::new(SampleOp::Texture, LodControl::Explicit, LodProperty::Scalar).with_shadow();
    println!(
        "   albedo sample:        {}",
        mark(context.sample_function(albedo_handle, albedo_handle, implicit)?)
    );
    println!(
        "   shadow compare:       {}",
        mark(context.sample_function(shadow_handle, shadow_handle, shadow)?)
    );
    println!(
        "   shadow, no compare:   {}",
        mark(context.sample_function(shadow_handle, albedo_handle, shadow)?)
    );
    println!(
        "   grade lut fetch:      {}",
        mark(context.sample_function(lut_handle, 0, SampleKey::fetch())?)
    );
    println!("   albedo size query:    {}", mark(context.size_function(albedo_handle)?));

    println!("\n5. Scanning compute shader and creating image handle...");
    let swizzle = parse_spirv(&spirv_words(SWIZZLE_SPV))?;
    context.register_shader(&swizzle);
    let target = ImageView::from_vk(
        &image_2d(vk::Format::R8G8B8A8_UNORM, 256, 256),
        &view_2d(vk::Format::R8G8B8A8_UNORM),
    )
    .ok_or_else(|| jitsampler::SamplerError::InvalidConfig("unsupported image format".into()))?;
    let image_handle = context.create_image_handle(&target);
    let store = ImageOpId::new(ImageOpKind::Store, false);
    println!(
        "   image store:          {}",
        mark(context.image_function(image_handle, store)?)
    );

    println!("\n6. Releasing handles and shaders...");
    context.delete_image_handle(image_handle)?;
    context.delete_texture_handle(lut_handle)?;
    context.delete_texture_handle(shadow_handle)?;
    context.delete_texture_handle(albedo_handle)?;
    context.unregister_shader(&swizzle);
    context.unregister_shader(&shade);
    let stats = context.stats();
    println!(
        "   ✓ {} rows kept warm, {} sample keys active, {} image ops active",
        stats.textures, stats.active_sample_keys, stats.active_image_ops
    );
    print_stats(&stats.compiler);

    println!("\n7. Tearing down...");
    context.teardown();
    print_stats(&context.stats().compiler);

    println!("\n✓ All steps completed");
    Ok(())
}
