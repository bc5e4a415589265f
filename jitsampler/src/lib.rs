//! jitsampler - per-context cache of JIT-compiled texture functions
//!
//! A software rasterizer cannot afford to interpret sampler state per texel.
//! Instead every (texture state, sampler state, sample operation) combination
//! in use gets its own compiled function, looked up at draw time by plain
//! array indexing.
//!
//! ```text
//! shader scan ─┐                       ┌─> sample tables  [row][sampler][key]
//! handles ─────┼─> SamplerMatrix ──────┼─> fetch / image tables [row][op]
//!              │        │              └─> size / samples queries [row]
//!              │        v
//!              │   FunctionCompiler ──> CodegenBackend, DiskCache
//! ```

pub mod compiler;
pub mod config;
pub mod context;
pub mod disk_cache;
pub mod error;
pub mod format;
pub mod handle;
pub mod image;
pub mod key;
pub mod matrix;
pub mod sampler;
pub mod shader;
pub mod state;

#[cfg(test)]
mod testing;

pub use compiler::{CodegenBackend, CompileRequest, CompiledCode, CompiledFunction, FunctionDesc, JitModule};
pub use config::MatrixConfig;
pub use context::SamplerContext;
pub use error::{Result, SamplerError};
pub use key::{ImageOpId, ImageOpKind, QueryKind, SampleKey};
pub use matrix::{RowId, SamplerMatrix, TextureUsage};

use log::info;

/// Install the logger. Safe to call more than once.
pub fn init() {
    #[cfg(not(target_arch = "wasm32"))]
    {
        let _ = env_logger::builder()
            .filter_level(log::LevelFilter::Info)
            .parse_default_env()
            .try_init();
    }

    info!("jitsampler v{} initialized", env!("CARGO_PKG_VERSION"));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init() {
        init();
        init();
    }
}
