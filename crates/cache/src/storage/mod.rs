//! File-backed storage for the cache: the instance itself and the debouncer
//! that batches its background writes.

pub mod debounce;
pub mod json_cache;

pub use json_cache::JsonCache;
