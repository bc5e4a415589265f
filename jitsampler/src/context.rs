//! Per-context façade
//!
//! Owns the sampler matrix behind a reader-writer lock together with the
//! bindless handle tables. Handle creation, deletion and shader registration
//! take the write lock; draw-time lookups only read.

use log::{debug, info};
use parking_lot::{RwLock, RwLockReadGuard};

use crate::compiler::{CodegenBackend, CompiledFunction, FunctionCompiler};
use crate::config::MatrixConfig;
use crate::error::{Result, SamplerError};
use crate::handle::{HandleAllocator, ImageHandle, TextureHandle};
use crate::image::{ImageView, TextureView};
use crate::key::{ImageOpId, SampleKey};
use crate::matrix::{MatrixStats, RowId, SamplerMatrix, TextureUsage};
use crate::sampler::SamplerDesc;
use crate::shader::{ScanEvent, ShaderScanner};

pub struct SamplerContext {
    config: MatrixConfig,
    matrix: RwLock<SamplerMatrix>,
    textures: HandleAllocator<TextureHandle>,
    images: HandleAllocator<ImageHandle>,
}

impl SamplerContext {
    pub fn new(config: MatrixConfig, backend: impl CodegenBackend + 'static) -> Result<Self> {
        let disk_cache = config.open_disk_cache()?;
        info!(
            "Creating sampler context (force_non_pot={}, disk cache: {})",
            config.force_non_pot,
            if disk_cache.is_some() { "on" } else { "off" }
        );
        let compiler = FunctionCompiler::new(backend).with_disk_cache(disk_cache);

        Ok(Self {
            config,
            matrix: RwLock::new(SamplerMatrix::new(compiler)),
            textures: HandleAllocator::new("texture"),
            images: HandleAllocator::new("image"),
        })
    }

    pub fn config(&self) -> &MatrixConfig {
        &self.config
    }

    /// Create a texture handle. Either part may be absent so textures and
    /// samplers can be bound separately.
    pub fn create_texture_handle(
        &self,
        view: Option<&TextureView>,
        sampler: Option<&SamplerDesc>,
    ) -> u64 {
        let mut matrix = self.matrix.write();
        let texture = view.map(|view| {
            let state = view.static_state(self.config.force_non_pot);
            matrix.register_texture(state, TextureUsage::Sampled)
        });
        let sampler = sampler.map(|desc| matrix.register_sampler(desc.static_state()));
        drop(matrix);

        let handle = self.textures.allocate(TextureHandle { texture, sampler });
        debug!(
            "Created texture handle {:#x} (row {:?}, sampler {:?})",
            handle, texture, sampler
        );
        handle
    }

    pub fn delete_texture_handle(&self, handle: u64) -> Result<()> {
        let record = self.textures.remove(handle)?;
        if let Some(row) = record.texture {
            self.matrix.write().release_texture(row);
        }
        debug!("Deleted texture handle {:#x}", handle);
        Ok(())
    }

    pub fn create_image_handle(&self, view: &ImageView) -> u64 {
        let state = view.static_state(self.config.force_non_pot);
        let texture = self.matrix.write().register_texture(state, TextureUsage::Storage);

        let handle = self.images.allocate(ImageHandle { texture });
        debug!("Created image handle {:#x} (row {:?})", handle, texture);
        handle
    }

    /// Deleting an image handle drops its row reference, like texture handles.
    pub fn delete_image_handle(&self, handle: u64) -> Result<()> {
        let record = self.images.remove(handle)?;
        self.matrix.write().release_texture(record.texture);
        debug!("Deleted image handle {:#x}", handle);
        Ok(())
    }

    pub fn texture_handle(&self, handle: u64) -> Result<TextureHandle> {
        self.textures.get(handle).map(|record| *record)
    }

    pub fn image_handle(&self, handle: u64) -> Result<ImageHandle> {
        self.images.get(handle).map(|record| *record)
    }

    /// Activate every sample key and image op the shader uses.
    pub fn register_shader<S: ShaderScanner + ?Sized>(&self, shader: &S) {
        let mut matrix = self.matrix.write();
        let mut events = 0usize;
        shader.scan(&mut |event| {
            events += 1;
            match event {
                ScanEvent::Sample(key) => matrix.register_sample_key(key),
                ScanEvent::Image { .. } => {
                    if let Some(op) = event.image_op() {
                        matrix.register_image_op(op);
                    }
                }
                ScanEvent::Query(_) => {}
            }
        });
        debug!("Registered shader ({} texture/image operations)", events);
    }

    /// Drop the sample key references taken by [`Self::register_shader`].
    /// Image ops stay active.
    pub fn unregister_shader<S: ShaderScanner + ?Sized>(&self, shader: &S) {
        let mut matrix = self.matrix.write();
        shader.scan(&mut |event| {
            if let ScanEvent::Sample(key) = event {
                matrix.unregister_sample_key(key);
            }
        });
        debug!("Unregistered shader");
    }

    /// Draw-time lookup of a sampling function. The texture and sampler may
    /// come from different handles; fetch keys need no sampler.
    pub fn sample_function(
        &self,
        texture_handle: u64,
        sampler_handle: u64,
        key: SampleKey,
    ) -> Result<Option<CompiledFunction>> {
        let row = self.texture_row(texture_handle)?;
        let matrix = self.matrix.read();
        if key.is_sampler_independent() {
            return Ok(matrix.fetch_function(row, key));
        }

        let sampler = self.textures.get(sampler_handle)?.sampler.ok_or_else(|| {
            SamplerError::InvalidHandle(format!(
                "texture handle {:#x} carries no sampler",
                sampler_handle
            ))
        })?;
        Ok(matrix.sample_function(row, sampler, key))
    }

    pub fn image_function(&self, handle: u64, op: ImageOpId) -> Result<Option<CompiledFunction>> {
        let row = self.images.get(handle)?.texture;
        Ok(self.matrix.read().image_function(row, op))
    }

    pub fn size_function(&self, texture_handle: u64) -> Result<Option<CompiledFunction>> {
        let row = self.texture_row(texture_handle)?;
        Ok(self.matrix.read().size_function(row))
    }

    pub fn samples_function(&self, texture_handle: u64) -> Result<Option<CompiledFunction>> {
        let row = self.texture_row(texture_handle)?;
        Ok(self.matrix.read().samples_function(row))
    }

    pub fn image_size_function(&self, handle: u64) -> Result<Option<CompiledFunction>> {
        let row = self.images.get(handle)?.texture;
        Ok(self.matrix.read().size_function(row))
    }

    pub fn matrix(&self) -> RwLockReadGuard<'_, SamplerMatrix> {
        self.matrix.read()
    }

    pub fn stats(&self) -> MatrixStats {
        self.matrix.read().stats()
    }

    /// Forget every handle and release all compiled code. Registered
    /// shaders stay registered and may be unregistered afterwards.
    pub fn teardown(&self) {
        info!(
            "Sampler context teardown ({} texture handles, {} image handles live)",
            self.textures.count(),
            self.images.count()
        );
        self.textures.clear();
        self.images.clear();
        self.matrix.write().teardown();
    }

    fn texture_row(&self, handle: u64) -> Result<RowId> {
        self.textures.get(handle)?.texture.ok_or_else(|| {
            SamplerError::InvalidHandle(format!("texture handle {:#x} carries no texture", handle))
        })
    }
}
