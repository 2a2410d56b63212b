//! In-process key-value cache mirrored to a JSON file.
//! - One instance per file path, shared through [`CacheRegistry`] (or the global [`cache`] factory).
//! - Mutations schedule a debounced background write; `save` writes synchronously.
//! - Ejectable caches are flushed on interrupt, panic, or when an [`EjectOnDrop`] guard drops.

pub mod ejection;
pub mod errors;
pub mod key;
pub mod registry;
pub mod storage;

pub use configs::CacheOptions;
pub use ejection::{EjectOnDrop, EjectionRegistry, SaveHook};
pub use errors::CacheError;
pub use key::{CacheKey, DisplayKey};
pub use registry::{cache, global, CacheRegistry};
pub use storage::JsonCache;
