use std::path::{Path, PathBuf};
use std::sync::Arc;

use configs::CacheOptions;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use once_cell::sync::Lazy;
use tracing::info;

use crate::ejection::{EjectOnDrop, EjectionRegistry};
use crate::errors::CacheError;
use crate::storage::JsonCache;

static GLOBAL: Lazy<CacheRegistry> = Lazy::new(CacheRegistry::new);

/// The process-wide registry behind [`cache`].
pub fn global() -> &'static CacheRegistry {
    &GLOBAL
}

/// Get the cache for `file_path` from the process-wide registry, creating it
/// on first use. Later calls for the same path ignore `options`.
pub fn cache(file_path: impl AsRef<Path>, options: CacheOptions) -> Result<JsonCache, CacheError> {
    global().get_or_create(file_path, options)
}

/// One [`JsonCache`] per file path, plus the ejection registry its
/// ejectable caches report to.
#[derive(Debug, Default)]
pub struct CacheRegistry {
    instances: DashMap<PathBuf, JsonCache>,
    ejection: Arc<EjectionRegistry>,
}

impl CacheRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_create(&self, file_path: impl AsRef<Path>, options: CacheOptions) -> Result<JsonCache, CacheError> {
        let file_path = file_path.as_ref();
        if file_path.as_os_str().is_empty() {
            return Err(CacheError::missing("file path", "cache"));
        }

        // the entry lock is held while loading so racing first calls share one instance
        match self.instances.entry(file_path.to_path_buf()) {
            Entry::Occupied(existing) => {
                let cache = existing.get().clone();
                if cache.options().ejectable {
                    // the listener may have died with the runtime that spawned it
                    self.ejection.ensure_interrupt_listener();
                }
                Ok(cache)
            }
            Entry::Vacant(slot) => {
                let cache = JsonCache::open(file_path.to_path_buf(), options)?;
                if cache.options().ejectable {
                    self.ejection.register(file_path, cache.save_hook());
                    self.ejection.install_hooks();
                }
                info!(
                    path = %file_path.display(),
                    wait_ms = cache.options().wait,
                    ejectable = cache.options().ejectable,
                    "cache instance created"
                );
                slot.insert(cache.clone());
                Ok(cache)
            }
        }
    }

    /// Existing instance for `file_path`, without creating one.
    pub fn get(&self, file_path: impl AsRef<Path>) -> Option<JsonCache> {
        self.instances.get(file_path.as_ref()).map(|entry| entry.value().clone())
    }

    pub fn contains(&self, file_path: impl AsRef<Path>) -> bool {
        self.instances.contains_key(file_path.as_ref())
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    pub fn ejection(&self) -> &Arc<EjectionRegistry> {
        &self.ejection
    }

    /// Flush every ejectable cache now.
    pub fn eject(&self) -> Result<usize, CacheError> {
        self.ejection.eject()
    }

    /// Guard that flushes every ejectable cache when dropped.
    pub fn eject_guard(&self) -> EjectOnDrop {
        self.ejection.guard()
    }

    /// Forget every instance and save hook. Pending debounced writes still
    /// fire; a later request for the same path reloads from disk.
    pub fn reset(&self) {
        self.instances.clear();
        self.ejection.clear();
    }
}
