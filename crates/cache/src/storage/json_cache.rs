use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard, TryLockError};

use common::env::ensure_parent_dir;
use common::utils::logging::{make_logger, Logger};
use configs::CacheOptions;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};
use tokio::runtime::Handle;
use tracing::{debug, warn};

use crate::ejection::SaveHook;
use crate::errors::CacheError;
use crate::key::CacheKey;
use crate::storage::debounce::Debouncer;

struct Inner {
    file_path: PathBuf,
    storage: RwLock<Value>,
    options: CacheOptions,
    log: Logger,
    debouncer: Debouncer,
}

/// In-memory JSON value mirrored to a single file.
///
/// Cloning is cheap and every clone is the same instance: a mutation through
/// one handle is visible through all of them. Mutations schedule a debounced
/// background write; [`JsonCache::save`] writes synchronously.
#[derive(Clone)]
pub struct JsonCache {
    inner: Arc<Inner>,
}

impl fmt::Debug for JsonCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsonCache")
            .field("file_path", &self.inner.file_path)
            .field("options", &self.inner.options)
            .finish_non_exhaustive()
    }
}

impl JsonCache {
    /// Load (or start empty) the cache for `file_path`. Needs a tokio runtime;
    /// debounced writes run on the mutating caller's runtime and fall back to
    /// this one. Registry bookkeeping lives in `CacheRegistry`.
    pub(crate) fn open(file_path: PathBuf, options: CacheOptions) -> Result<Self, CacheError> {
        let runtime = Handle::try_current().map_err(|_| CacheError::NoRuntime)?;
        ensure_parent_dir(&file_path).map_err(|e| CacheError::io(&file_path, e))?;
        let storage = load_storage(&file_path)?;

        Ok(Self {
            inner: Arc::new(Inner {
                debouncer: Debouncer::new(options.wait_duration(), runtime),
                log: make_logger(options.out),
                storage: RwLock::new(storage),
                file_path,
                options,
            }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.inner.file_path
    }

    pub fn options(&self) -> &CacheOptions {
        &self.inner.options
    }

    /// Whether both handles point at the same instance.
    pub fn same_instance(&self, other: &JsonCache) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Snapshot of the whole storage value.
    pub fn get(&self) -> Value {
        self.inner.log.log("get", format_args!(""));
        self.read().clone()
    }

    /// Replace storage wholesale. Falsy data (`null`, `false`, `0`, `""`) is rejected.
    pub fn set(&self, data: Value) -> Result<Value, CacheError> {
        if !is_truthy(&data) {
            return Err(CacheError::InvalidArgument(format!("missing data in \"set\": {}", data)));
        }
        self.inner.log.log("set", format_args!("{}", data));
        *self.write() = data.clone();
        self.schedule_write();
        Ok(data)
    }

    /// Value stored under `key`, or `None` when absent.
    pub fn get_item<K: CacheKey>(&self, key: K) -> Result<Option<Value>, CacheError> {
        let key = key.cache_key().ok_or_else(|| CacheError::missing("key", "get_item"))?;
        self.inner.log.log("get_item", format_args!("{}", key));
        Ok(self.read().get(key.as_str()).cloned())
    }

    /// Typed read of the value under `key`.
    pub fn get_item_as<K: CacheKey, T: DeserializeOwned>(&self, key: K) -> Result<Option<T>, CacheError> {
        match self.get_item(key)? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    /// Store `value` under `key`, overwriting. The value itself is not validated.
    pub fn set_item<K: CacheKey, T: Serialize>(&self, key: K, value: T) -> Result<T, CacheError> {
        let key = key.cache_key().ok_or_else(|| CacheError::missing("key", "set_item"))?;
        let json = serde_json::to_value(&value)?;
        self.inner.log.log("set_item", format_args!("{} {}", key, json));
        {
            let mut storage = self.write();
            let map = storage.as_object_mut().ok_or(CacheError::NotAnObject)?;
            map.insert(key, json);
        }
        self.schedule_write();
        Ok(value)
    }

    /// Mutate storage in place, then schedule a write.
    pub fn update<R>(&self, f: impl FnOnce(&mut Value) -> R) -> R {
        self.inner.log.log("update", format_args!(""));
        let out = {
            let mut storage = self.write();
            f(&mut *storage)
        };
        self.schedule_write();
        out
    }

    /// Mutate the value under `key` in place; an absent key starts as `null`.
    pub fn update_item<K: CacheKey, R>(&self, key: K, f: impl FnOnce(&mut Value) -> R) -> Result<R, CacheError> {
        let key = key.cache_key().ok_or_else(|| CacheError::missing("key", "update_item"))?;
        self.inner.log.log("update_item", format_args!("{}", key));
        let out = {
            let mut storage = self.write();
            let map = storage.as_object_mut().ok_or(CacheError::NotAnObject)?;
            f(map.entry(key).or_insert(Value::Null))
        };
        self.schedule_write();
        Ok(out)
    }

    /// Reset storage to an empty object.
    pub fn clear(&self) -> &Self {
        self.inner.log.log("clear", format_args!(""));
        *self.write() = Value::Object(Map::new());
        self.schedule_write();
        self
    }

    /// Serialize storage as pretty JSON and write it now, blocking the caller.
    pub fn save(&self) -> Result<(), CacheError> {
        let data = serde_json::to_string_pretty(&*self.read())?;
        std::fs::write(&self.inner.file_path, data).map_err(|e| CacheError::io(&self.inner.file_path, e))
    }

    /// Whether a debounced write is still waiting to fire.
    pub fn is_write_pending(&self) -> bool {
        self.inner.debouncer.is_pending()
    }

    /// Synchronous save callback for the ejection registry.
    pub(crate) fn save_hook(&self) -> SaveHook {
        let cache = self.clone();
        Arc::new(move || cache.save_for_ejection())
    }

    /// Like `save`, but never blocks on a storage lock held by a panicking
    /// thread: inside a panic hook a busy lock skips this file.
    fn save_for_ejection(&self) -> Result<(), CacheError> {
        let guard = match self.inner.storage.try_read() {
            Ok(guard) => guard,
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
            Err(TryLockError::WouldBlock) if std::thread::panicking() => {
                warn!(path = %self.inner.file_path.display(), "storage locked during panic; skipping flush");
                return Ok(());
            }
            Err(TryLockError::WouldBlock) => self.read(),
        };
        let data = serde_json::to_string_pretty(&*guard)?;
        drop(guard);
        std::fs::write(&self.inner.file_path, data).map_err(|e| CacheError::io(&self.inner.file_path, e))
    }

    fn schedule_write(&self) {
        let inner = Arc::clone(&self.inner);
        self.inner.debouncer.schedule(move || async move { inner.write_async().await });
    }

    fn read(&self) -> RwLockReadGuard<'_, Value> {
        self.inner.storage.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Value> {
        self.inner.storage.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Inner {
    /// Background write of the storage as it is now. Failures are dropped.
    async fn write_async(&self) {
        let data = {
            let storage = self.storage.read().unwrap_or_else(PoisonError::into_inner);
            serde_json::to_string_pretty(&*storage)
        };
        let result = match data {
            Ok(data) => tokio::fs::write(&self.file_path, data).await.map_err(|e| e.to_string()),
            Err(e) => Err(e.to_string()),
        };
        match result {
            Ok(()) => debug!(path = %self.file_path.display(), "debounced write complete"),
            Err(error) => debug!(path = %self.file_path.display(), %error, "debounced write failed; discarded"),
        }
    }
}

fn load_storage(path: &Path) -> Result<Value, CacheError> {
    match std::fs::read_to_string(path) {
        Ok(content) => serde_json::from_str(&content)
            .map_err(|source| CacheError::MalformedStoreFile { path: path.to_path_buf(), source }),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Value::Object(Map::new())),
        Err(e) => Err(CacheError::io(path, e)),
    }
}

/// JavaScript-style truthiness; empty arrays and objects are truthy.
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0 && !f.is_nan()).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
