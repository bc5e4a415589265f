//! Bindless handle records
//!
//! A texture handle may carry a texture row, a sampler column or both, so a
//! caller can bind textures and samplers separately. Image handles always
//! reference a storage row. Handle ids are `u64`; 0 is the null handle.

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::sync::Arc;

use crate::error::{Result, SamplerError};
use crate::matrix::RowId;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TextureHandle {
    pub texture: Option<RowId>,
    pub sampler: Option<u32>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ImageHandle {
    pub texture: RowId,
}

/// Thread-safe id allocator
pub struct HandleAllocator<T> {
    kind: &'static str,
    next_handle: RwLock<u64>,
    objects: RwLock<FxHashMap<u64, Arc<T>>>,
}

impl<T> HandleAllocator<T> {
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            next_handle: RwLock::new(1),
            objects: RwLock::new(FxHashMap::default()),
        }
    }

    pub fn allocate(&self, object: T) -> u64 {
        let mut next = self.next_handle.write();
        let handle = *next;
        *next += 1;

        self.objects.write().insert(handle, Arc::new(object));
        handle
    }

    pub fn get(&self, handle: u64) -> Result<Arc<T>> {
        self.objects
            .read()
            .get(&handle)
            .cloned()
            .ok_or_else(|| self.invalid(handle))
    }

    /// Remove a handle; a second removal of the same id is an error.
    pub fn remove(&self, handle: u64) -> Result<Arc<T>> {
        self.objects
            .write()
            .remove(&handle)
            .ok_or_else(|| self.invalid(handle))
    }

    pub fn contains(&self, handle: u64) -> bool {
        self.objects.read().contains_key(&handle)
    }

    pub fn count(&self) -> usize {
        self.objects.read().len()
    }

    /// Forget every handle without returning them.
    pub fn clear(&self) {
        self.objects.write().clear();
    }

    fn invalid(&self, handle: u64) -> SamplerError {
        SamplerError::InvalidHandle(format!("unknown {} handle {:#x}", self.kind, handle))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_allocator() {
        let allocator = HandleAllocator::new("test");

        let handle1 = allocator.allocate(42);
        let handle2 = allocator.allocate(100);

        assert_eq!(handle1, 1);
        assert_ne!(handle1, handle2);
        assert_eq!(*allocator.get(handle1).unwrap(), 42);
        assert_eq!(*allocator.get(handle2).unwrap(), 100);

        allocator.remove(handle1).unwrap();
        assert!(allocator.get(handle1).is_err());
        assert!(allocator.contains(handle2));
    }

    #[test]
    fn test_double_remove_is_invalid_handle() {
        let allocator = HandleAllocator::new("image");
        let handle = allocator.allocate("view");

        assert!(allocator.remove(handle).is_ok());
        let err = allocator.remove(handle).unwrap_err();
        assert!(err.is_contract_violation());
        assert!(err.to_string().contains("image"));
        assert!(allocator.get(0).is_err());
    }

    #[test]
    fn test_handle_count() {
        let allocator = HandleAllocator::new("test");
        assert_eq!(allocator.count(), 0);

        let h1 = allocator.allocate("test1");
        allocator.allocate("test2");
        assert_eq!(allocator.count(), 2);

        allocator.remove(h1).unwrap();
        assert_eq!(allocator.count(), 1);

        allocator.clear();
        assert_eq!(allocator.count(), 0);
    }
}
