//! Shared helpers for the json_cache workspace.
//! - `utils::logging`: tracing subscriber setup and the per-cache operation logger.
//! - `env`: filesystem preparation used before a cache file is opened.

pub mod env;
pub mod utils;
