//! Runtime configuration
//!
//! Read once when a context is created. Environment variables:
//!
//! - `JITSAMPLER_CACHE_DIR`: directory of the persistent function cache
//! - `JITSAMPLER_CACHE_DISABLE`: `1`/`true` disables the persistent cache
//! - `JITSAMPLER_KEEP_POT`: `1`/`true` keeps real power-of-two flags on
//!   texture states instead of forcing them off

use std::path::PathBuf;
use std::sync::Arc;

use log::debug;

use crate::disk_cache::{DirectoryDiskCache, DiskCache};
use crate::error::{Result, SamplerError};

pub const CACHE_DIR_ENV: &str = "JITSAMPLER_CACHE_DIR";
pub const CACHE_DISABLE_ENV: &str = "JITSAMPLER_CACHE_DISABLE";
pub const KEEP_POT_ENV: &str = "JITSAMPLER_KEEP_POT";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MatrixConfig {
    /// Clear power-of-two flags so textures differing only in size share a row.
    pub force_non_pot: bool,
    pub disk_cache_dir: Option<PathBuf>,
    pub disk_cache_disabled: bool,
}

impl Default for MatrixConfig {
    fn default() -> Self {
        Self {
            force_non_pot: true,
            disk_cache_dir: None,
            disk_cache_disabled: false,
        }
    }
}

impl MatrixConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let disk_cache_dir = lookup(CACHE_DIR_ENV)
            .map(|dir| dir.trim().to_string())
            .filter(|dir| !dir.is_empty())
            .map(PathBuf::from);
        let disk_cache_disabled = parse_bool(CACHE_DISABLE_ENV, lookup(CACHE_DISABLE_ENV))?;
        let keep_pot = parse_bool(KEEP_POT_ENV, lookup(KEEP_POT_ENV))?;

        Ok(Self {
            force_non_pot: !keep_pot,
            disk_cache_dir,
            disk_cache_disabled,
        })
    }

    /// The configured persistent cache, if any.
    pub fn open_disk_cache(&self) -> Result<Option<Arc<dyn DiskCache>>> {
        if self.disk_cache_disabled {
            debug!("Function disk cache disabled");
            return Ok(None);
        }
        match &self.disk_cache_dir {
            Some(dir) => Ok(Some(Arc::new(DirectoryDiskCache::open(dir)?))),
            None => Ok(None),
        }
    }
}

fn parse_bool(name: &str, raw: Option<String>) -> Result<bool> {
    let Some(raw) = raw else {
        return Ok(false);
    };

    let value = raw.trim();
    if value == "1" || value.eq_ignore_ascii_case("true") {
        Ok(true)
    } else if value == "0" || value.eq_ignore_ascii_case("false") {
        Ok(false)
    } else {
        Err(SamplerError::InvalidConfig(format!(
            "{} must be 0, 1, true or false (got {:?})",
            name, raw
        )))
    }
}
