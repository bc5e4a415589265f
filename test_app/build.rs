use std::path::PathBuf;

const SHADE_WGSL: &str = r#"
@group(0) @binding(0) var albedo: texture_2d<f32>;
@group(0) @binding(1) var albedo_sampler: sampler;
@group(0) @binding(2) var shadow_map: texture_depth_2d;
@group(0) @binding(3) var shadow_sampler: sampler_comparison;
@group(0) @binding(4) var grade_lut: texture_2d<f32>;

@fragment
fn fs_main(@location(0) uv: vec2<f32>, @location(1) shadow_coord: vec3<f32>) -> @location(0) vec4<f32> {
    let base = textureSample(albedo, albedo_sampler, uv);
    let lit = textureSampleCompareLevel(shadow_map, shadow_sampler, shadow_coord.xy, shadow_coord.z);
    let graded = textureLoad(grade_lut, vec2<i32>(base.rg * 15.0), 0);
    return vec4<f32>(graded.rgb * lit, base.a);
}
"#;

const SWIZZLE_WGSL: &str = r#"
@group(0) @binding(0) var src: texture_2d<f32>;
@group(0) @binding(1) var dst: texture_storage_2d<rgba8unorm, write>;

@compute @workgroup_size(8, 8)
fn cs_main(@builtin(global_invocation_id) id: vec3<u32>) {
    let texel = textureLoad(src, vec2<i32>(id.xy), 0);
    textureStore(dst, vec2<i32>(id.xy), texel.bgra);
}
"#;

fn compile_wgsl(source: &str, stage: naga::ShaderStage, entry: &str, out_path: &PathBuf) {
    let module = naga::front::wgsl::parse_str(source)
        .unwrap_or_else(|e| panic!("WGSL parse error for {:?}: {}", entry, e));

    let mut validator = naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::all(),
    );
    let info = validator
        .validate(&module)
        .unwrap_or_else(|e| panic!("WGSL validation error for {:?}: {}", entry, e));

    let options = naga::back::spv::Options {
        lang_version: (1, 3),
        ..Default::default()
    };
    let pipeline_options = naga::back::spv::PipelineOptions {
        shader_stage: stage,
        entry_point: entry.to_string(),
    };

    let words = naga::back::spv::write_vec(&module, &info, &options, Some(&pipeline_options))
        .unwrap_or_else(|e| panic!("SPIR-V write error for {:?}: {}", entry, e));

    let bytes: Vec<u8> = words.iter().flat_map(|w| w.to_le_bytes()).collect();
    std::fs::write(out_path, &bytes)
        .unwrap_or_else(|e| panic!("Failed to write {:?}: {}", out_path, e));
}

fn main() {
    let out_dir = std::env::var("OUT_DIR").expect("OUT_DIR not set");
    let out = PathBuf::from(out_dir);

    compile_wgsl(
        SHADE_WGSL,
        naga::ShaderStage::Fragment,
        "fs_main",
        &out.join("shade.spv"),
    );
    compile_wgsl(
        SWIZZLE_WGSL,
        naga::ShaderStage::Compute,
        "cs_main",
        &out.join("swizzle.spv"),
    );

    println!("cargo:rerun-if-changed=build.rs");
}
