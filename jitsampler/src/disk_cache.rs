//! Persistent store for compiled function objects
//!
//! Keys are content hashes of everything a compiled function depends on, so
//! two runs that ask for the same function find the same artifact. The store
//! is opaque to the sampler matrix; only the function compiler talks to it.

use std::fmt;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use log::debug;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use sha1::{Digest, Sha1};
use tempfile::NamedTempFile;

/// SHA-1 content hash of a salted function description.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey(pub [u8; 20]);

impl CacheKey {
    pub fn compute(salt: &str, payload: &[u8]) -> Self {
        let mut hasher = Sha1::new();
        hasher.update(salt.as_bytes());
        hasher.update(payload);
        let mut key = [0u8; 20];
        key.copy_from_slice(&hasher.finalize());
        Self(key)
    }

    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{:02x}", b)).collect()
    }
}

impl fmt::Debug for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CacheKey({})", self.to_hex())
    }
}

/// Key/value store for compiled objects.
pub trait DiskCache: Send + Sync {
    fn load(&self, key: &CacheKey) -> Option<Vec<u8>>;
    fn store(&self, key: &CacheKey, object: &[u8]) -> io::Result<()>;
}

/// Process-local store, mostly useful for tests and for sharing objects
/// between contexts of one process.
#[derive(Default)]
pub struct MemoryDiskCache {
    entries: RwLock<FxHashMap<CacheKey, Vec<u8>>>,
}

impl MemoryDiskCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl DiskCache for MemoryDiskCache {
    fn load(&self, key: &CacheKey) -> Option<Vec<u8>> {
        self.entries.read().get(key).cloned()
    }

    fn store(&self, key: &CacheKey, object: &[u8]) -> io::Result<()> {
        self.entries.write().insert(*key, object.to_vec());
        Ok(())
    }
}

/// Directory-backed store: one file per key, fanned out by the first hash
/// byte as `<root>/ab/cdef...`.
pub struct DirectoryDiskCache {
    root: PathBuf,
}

impl DirectoryDiskCache {
    pub fn open(root: impl Into<PathBuf>) -> io::Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        debug!("Opened function cache at {}", root.display());
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &CacheKey) -> PathBuf {
        let hex = key.to_hex();
        self.root.join(&hex[..2]).join(&hex[2..])
    }
}

impl DiskCache for DirectoryDiskCache {
    fn load(&self, key: &CacheKey) -> Option<Vec<u8>> {
        fs::read(self.path_for(key)).ok()
    }

    fn store(&self, key: &CacheKey, object: &[u8]) -> io::Result<()> {
        let path = self.path_for(key);
        let dir = path.parent().unwrap_or(&self.root);
        fs::create_dir_all(dir)?;

        // Readers must never observe a partially written object.
        let mut tmp = NamedTempFile::new_in(dir)?;
        tmp.write_all(object)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&path).map_err(|err| err.error)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_salt_changes_key() {
        let a = CacheKey::compute("sample", b"payload");
        let b = CacheKey::compute("image", b"payload");
        assert_ne!(a, b);
        assert_eq!(a, CacheKey::compute("sample", b"payload"));
        assert_eq!(a.to_hex().len(), 40);
    }

    #[test]
    fn test_memory_cache() {
        let cache = MemoryDiskCache::new();
        let key = CacheKey::compute("s", b"x");
        assert!(cache.load(&key).is_none());
        cache.store(&key, &[1, 2, 3]).unwrap();
        assert_eq!(cache.load(&key), Some(vec![1, 2, 3]));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_directory_cache_persists() {
        let dir = tempfile::tempdir().unwrap();
        let key = CacheKey::compute("s", b"persist");

        {
            let cache = DirectoryDiskCache::open(dir.path()).unwrap();
            cache.store(&key, b"object code").unwrap();
        }

        let reopened = DirectoryDiskCache::open(dir.path()).unwrap();
        assert_eq!(reopened.root(), dir.path());
        assert_eq!(reopened.load(&key).as_deref(), Some(&b"object code"[..]));
        assert!(reopened.load(&CacheKey::compute("s", b"other")).is_none());
    }

    #[test]
    fn test_directory_cache_concurrent_stores() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DirectoryDiskCache::open(dir.path()).unwrap();
        let key = CacheKey::compute("s", b"shared");
        let object = vec![0xabu8; 64 * 1024];

        for _ in 0..20 {
            std::thread::scope(|scope| {
                for _ in 0..4 {
                    scope.spawn(|| cache.store(&key, &object).unwrap());
                }
            });
            assert_eq!(cache.load(&key).as_deref(), Some(&object[..]));
        }

        let leftovers = fs::read_dir(cache.path_for(&key).parent().unwrap())
            .unwrap()
            .count();
        assert_eq!(leftovers, 1);
    }
}
