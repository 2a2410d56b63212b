//! Ejection: synchronous flush of every ejectable cache before the process goes away.
//!
//! The registry only knows save callbacks keyed by file path, never the caches
//! themselves. The panic hook is installed at most once per registry. The
//! interrupt listener is a task on a tokio runtime and is respawned on the
//! caller's runtime whenever the previous one has gone away. Normal exit is
//! covered by holding an [`EjectOnDrop`] guard.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use common::utils::logging::LOG_PREFIX;
use once_cell::sync::OnceCell;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::errors::CacheError;

/// Synchronous save callback registered by an ejectable cache.
pub type SaveHook = Arc<dyn Fn() -> Result<(), CacheError> + Send + Sync>;

/// Exit status used after flushing on interrupt (128 + SIGINT).
pub const INTERRUPT_EXIT_CODE: i32 = 130;

#[derive(Default)]
pub struct EjectionRegistry {
    hooks: Mutex<Vec<(PathBuf, SaveHook)>>,
    installed: OnceCell<()>,
    interrupt_listener: Mutex<Option<JoinHandle<()>>>,
}

impl EjectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `hook` under `path`. Re-registering a path replaces its hook
    /// but keeps its original position in the flush order.
    pub fn register(&self, path: impl Into<PathBuf>, hook: SaveHook) {
        let path = path.into();
        let mut hooks = self.lock();
        match hooks.iter_mut().find(|(p, _)| *p == path) {
            Some(slot) => slot.1 = hook,
            None => hooks.push((path, hook)),
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Registered paths in flush order.
    pub fn paths(&self) -> Vec<PathBuf> {
        self.lock().iter().map(|(p, _)| p.clone()).collect()
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.lock().iter().any(|(p, _)| p == path)
    }

    /// Call every save hook in registration order.
    ///
    /// The first failing hook stops the flush and its error is returned;
    /// hooks after it do not run. Returns how many hooks ran.
    pub fn eject(&self) -> Result<usize, CacheError> {
        info!(target: "json_cache", "{} ejecting", LOG_PREFIX);
        // hooks run without the registry lock held
        let hooks: Vec<SaveHook> = self.lock().iter().map(|(_, h)| Arc::clone(h)).collect();
        for hook in &hooks {
            hook()?;
        }
        info!(target: "json_cache", "{} saved", LOG_PREFIX);
        Ok(hooks.len())
    }

    /// Zero-argument handler that performs [`EjectionRegistry::eject`].
    pub fn handler(self: &Arc<Self>) -> impl Fn() -> Result<usize, CacheError> + Send + Sync + 'static {
        let registry = Arc::clone(self);
        move || registry.eject()
    }

    /// Install the panic hook (first call only) and make sure an interrupt
    /// listener is alive; returns whether this call installed the panic hook.
    pub fn install_hooks(self: &Arc<Self>) -> bool {
        let mut installed_now = false;
        self.installed.get_or_init(|| {
            installed_now = true;
            self.install_panic_hook();
        });
        self.ensure_interrupt_listener();
        installed_now
    }

    pub fn hooks_installed(&self) -> bool {
        self.installed.get().is_some()
    }

    /// Whether an interrupt listener task is currently alive.
    pub fn interrupt_listener_active(&self) -> bool {
        let listener = self.interrupt_listener.lock().unwrap_or_else(PoisonError::into_inner);
        listener.as_ref().map(|h| !h.is_finished()).unwrap_or(false)
    }

    /// Spawn the interrupt listener on the current runtime unless one is
    /// still running. A listener dies with the runtime it was spawned on.
    pub fn ensure_interrupt_listener(self: &Arc<Self>) -> bool {
        let mut listener = self.interrupt_listener.lock().unwrap_or_else(PoisonError::into_inner);
        if listener.as_ref().map(|h| !h.is_finished()).unwrap_or(false) {
            return true;
        }
        let runtime = match Handle::try_current() {
            Ok(runtime) => runtime,
            Err(_) => {
                warn!("no tokio runtime; interrupt will not flush ejectable caches");
                return false;
            }
        };
        let registry = Arc::clone(self);
        *listener = Some(runtime.spawn(async move {
            if registry.flush_on_signal(tokio::signal::ctrl_c()).await.is_some() {
                std::process::exit(INTERRUPT_EXIT_CODE);
            }
        }));
        true
    }

    /// Wait for `signal`, then eject. `None` when the signal could not be
    /// awaited, otherwise the outcome of the flush.
    pub(crate) async fn flush_on_signal<S>(&self, signal: S) -> Option<Result<usize, CacheError>>
    where
        S: Future<Output = std::io::Result<()>>,
    {
        if let Err(e) = signal.await {
            warn!(error = %e, "cannot listen for interrupt");
            return None;
        }
        info!(event = "shutdown_signal", "received Ctrl+C, flushing caches");
        let flushed = self.eject();
        if let Err(e) = &flushed {
            error!(event = "eject_failed", error = %e, "flush on interrupt failed");
        }
        Some(flushed)
    }

    /// Drop every registered hook. Installed termination hooks stay in place
    /// and simply find nothing to flush.
    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Guard that ejects when dropped; hold it for the life of `main`.
    pub fn guard(self: &Arc<Self>) -> EjectOnDrop {
        EjectOnDrop { registry: Arc::clone(self) }
    }

    fn install_panic_hook(self: &Arc<Self>) {
        let registry = Arc::clone(self);
        let previous = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |panic_info| {
            if let Err(e) = registry.eject() {
                error!(event = "eject_failed", error = %e, "flush during panic failed");
            }
            previous(panic_info);
        }));
    }

    fn lock(&self) -> MutexGuard<'_, Vec<(PathBuf, SaveHook)>> {
        self.hooks.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for EjectionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EjectionRegistry")
            .field("paths", &self.paths())
            .field("hooks_installed", &self.hooks_installed())
            .field("interrupt_listener_active", &self.interrupt_listener_active())
            .finish()
    }
}

/// Flushes its registry on drop, covering normal process exit.
#[must_use = "the flush happens when the guard is dropped"]
pub struct EjectOnDrop {
    registry: Arc<EjectionRegistry>,
}

impl Drop for EjectOnDrop {
    fn drop(&mut self) {
        if let Err(e) = self.registry.eject() {
            error!(event = "eject_failed", error = %e, "flush on exit failed");
        }
    }
}
