//! Test backend producing real heap-backed modules.

use std::ffi::c_void;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::compiler::{CodegenBackend, CompileRequest, CompiledCode, CompiledFunction, JitModule};

#[derive(Default)]
struct Counters {
    calls: AtomicUsize,
    cached_requests: AtomicUsize,
    live_modules: AtomicUsize,
}

/// Backend that counts invocations and hands out distinct, stable pointers.
#[derive(Clone, Default)]
pub struct CountingBackend {
    counters: Arc<Counters>,
}

impl CountingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> usize {
        self.counters.calls.load(Ordering::SeqCst)
    }

    pub fn cached_requests(&self) -> usize {
        self.counters.cached_requests.load(Ordering::SeqCst)
    }

    pub fn live_modules(&self) -> usize {
        self.counters.live_modules.load(Ordering::SeqCst)
    }
}

struct HeapModule {
    code: Box<[u8]>,
    counters: Arc<Counters>,
}

impl JitModule for HeapModule {
    fn code_size(&self) -> usize {
        self.code.len()
    }
}

impl Drop for HeapModule {
    fn drop(&mut self) {
        self.counters.live_modules.fetch_sub(1, Ordering::SeqCst);
    }
}

impl CodegenBackend for CountingBackend {
    fn compile(&self, request: &CompileRequest<'_>) -> Option<CompiledCode> {
        self.counters.calls.fetch_add(1, Ordering::SeqCst);
        if request.cached_object.is_some() {
            self.counters.cached_requests.fetch_add(1, Ordering::SeqCst);
        }

        let code: Box<[u8]> = request.cache_key.0.to_vec().into_boxed_slice();
        let entry = CompiledFunction::from_ptr(code.as_ptr() as *const c_void)?;
        self.counters.live_modules.fetch_add(1, Ordering::SeqCst);
        let object = request.cache_key.0.to_vec();

        Some(CompiledCode {
            entry,
            module: Box::new(HeapModule {
                code,
                counters: self.counters.clone(),
            }),
            object: Some(object),
        })
    }
}
