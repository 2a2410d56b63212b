use std::future::Future;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::trace;

/// Trailing-edge debouncer backed by a single replaceable tokio task.
///
/// Each `schedule` aborts the pending task (if any) and spawns a new one that
/// sleeps for the window before running. A burst of calls therefore produces
/// one run, `wait` after the last call.
///
/// The task goes to the caller's runtime when there is one; the handle given
/// at construction is only the fallback for calls made outside any runtime.
#[derive(Debug)]
pub struct Debouncer {
    wait: Duration,
    runtime: Handle,
    pending: Mutex<Option<JoinHandle<()>>>,
}

impl Debouncer {
    pub fn new(wait: Duration, runtime: Handle) -> Self {
        Self { wait, runtime, pending: Mutex::new(None) }
    }

    /// Replace any pending run with `task`, delayed by the window.
    pub fn schedule<F, Fut>(&self, task: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let wait = self.wait;
        let runtime = Handle::try_current().unwrap_or_else(|_| self.runtime.clone());
        let next = runtime.spawn(async move {
            tokio::time::sleep(wait).await;
            task().await;
        });

        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = pending.replace(next) {
            previous.abort();
            trace!("superseded pending debounced run");
        }
    }

    /// Abort the pending run; returns whether one was still waiting.
    #[cfg(test)]
    pub(crate) fn cancel(&self) -> bool {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        match pending.take() {
            Some(handle) if !handle.is_finished() => {
                handle.abort();
                true
            }
            _ => false,
        }
    }

    pub fn is_pending(&self) -> bool {
        let pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        pending.as_ref().map(|h| !h.is_finished()).unwrap_or(false)
    }
}
