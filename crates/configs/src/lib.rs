use anyhow::anyhow;
use anyhow::Result;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Per-cache options. Only the first request for a path applies them.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CacheOptions {
    /// Emit operation lines through the `json_cache` tracing target. Nothing
    /// is printed unless the host has installed a tracing subscriber, e.g.
    /// `common::utils::logging::init_logging_default`.
    #[serde(default)]
    pub out: bool,
    /// Debounce window for background writes, in milliseconds.
    #[serde(default = "default_wait")]
    pub wait: u64,
    /// Register with the ejection registry so termination flushes this cache.
    #[serde(default)]
    pub ejectable: bool,
}

fn default_wait() -> u64 { 1000 }

impl Default for CacheOptions {
    fn default() -> Self {
        Self { out: false, wait: default_wait(), ejectable: false }
    }
}

impl CacheOptions {
    pub fn wait_duration(&self) -> Duration {
        Duration::from_millis(self.wait)
    }

    pub fn with_out(mut self, out: bool) -> Self {
        self.out = out;
        self
    }

    pub fn with_wait(mut self, wait_ms: u64) -> Self {
        self.wait = wait_ms;
        self
    }

    pub fn with_ejectable(mut self, ejectable: bool) -> Self {
        self.ejectable = ejectable;
        self
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub cache: CacheConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_path")]
    pub path: PathBuf,
    #[serde(flatten)]
    pub options: CacheOptions,
}

fn default_path() -> PathBuf { PathBuf::from(".cache/store.json") }

impl Default for CacheConfig {
    fn default() -> Self {
        Self { path: default_path(), options: CacheOptions::default() }
    }
}

pub fn load_default() -> Result<AppConfig> {
    let path = std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());
    load_from_file(&path)
}

pub fn load_from_file(path: &str) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path)?;
    load_from_str(&content)
}

pub fn load_from_str(content: &str) -> Result<AppConfig> {
    let cfg: AppConfig = toml::from_str(content)?;
    Ok(cfg)
}

impl AppConfig {
    pub fn load_and_validate() -> Result<Self> {
        let mut cfg = load_default()?;
        cfg.normalize_and_validate()?;
        Ok(cfg)
    }

    pub fn normalize_and_validate(&mut self) -> Result<()> {
        self.cache.normalize()?;
        Ok(())
    }
}

impl CacheConfig {
    fn normalize(&mut self) -> Result<()> {
        let raw = self.path.to_string_lossy();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(anyhow!("cache.path must not be empty"));
        }
        if trimmed.len() != raw.len() {
            self.path = PathBuf::from(trimmed);
        }
        Ok(())
    }
}
