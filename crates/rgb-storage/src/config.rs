//! History configuration.

use std::path::PathBuf;

use mc_world::WorldOptions;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Settings for a [`RevisionHistory`](crate::RevisionHistory).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Parent of the session directory. `None` uses the system temp dir.
    pub temp_dir: Option<PathBuf>,
    /// zlib level for chunk records written by the history (0-9).
    pub compression_level: u32,
    /// Region files kept open per backend.
    pub region_cache_size: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            temp_dir: None,
            compression_level: 6,
            region_cache_size: 16,
        }
    }
}

impl HistoryConfig {
    /// Read `RGB_HISTORY_TMPDIR`, `RGB_REGION_COMPRESSION` and
    /// `RGB_REGION_CACHE`, falling back to defaults.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// [`from_env`](Self::from_env) over an arbitrary variable source.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            temp_dir: lookup("RGB_HISTORY_TMPDIR")
                .filter(|dir| !dir.is_empty())
                .map(PathBuf::from),
            compression_level: parsed(&lookup, "RGB_REGION_COMPRESSION")
                .filter(|level| *level <= 9)
                .unwrap_or(defaults.compression_level),
            region_cache_size: parsed(&lookup, "RGB_REGION_CACHE")
                .filter(|size| *size > 0)
                .unwrap_or(defaults.region_cache_size),
        }
    }

    pub(crate) const fn world_options(&self, readonly: bool) -> WorldOptions {
        WorldOptions {
            readonly,
            compression_level: self.compression_level,
            region_cache_size: self.region_cache_size,
        }
    }
}

fn parsed<T: core::str::FromStr>(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Option<T> {
    let raw = lookup(name)?;
    let value = raw.trim().parse().ok();
    if value.is_none() {
        warn!("ignoring invalid {name}={raw:?}");
    }
    value
}
