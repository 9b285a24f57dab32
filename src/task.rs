//! Background task plumbing: named thread spawn and cooperative stop.
//!
//! Every long-lived loop (ingestion, display routines) runs on its own
//! named OS thread and sleeps only through [`StopToken::wait`], so a stop
//! request wakes it immediately instead of after the full sleep.

use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use crate::error::{Error, Result};

/// Stack size for background loops. They hold no large buffers.
pub const TASK_STACK_KB: usize = 64;

/// Spawn `f` on a named thread.
pub fn spawn_named(
    name: &str,
    f: impl FnOnce() + Send + 'static,
) -> Result<JoinHandle<()>> {
    log::debug!("Spawning '{}' (stack={}KB)", name, TASK_STACK_KB);
    std::thread::Builder::new()
        .name(name.into())
        .stack_size(TASK_STACK_KB * 1024)
        .spawn(f)
        .map_err(|e| Error::Spawn(format!("{name}: {e}")))
}

/// Shared cancellation flag with a wakeable sleep.
#[derive(Debug, Clone, Default)]
pub struct StopToken {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl StopToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request stop and wake every waiter.
    pub fn stop(&self) {
        let (flag, cvar) = &*self.inner;
        *flag.lock().unwrap_or_else(|p| p.into_inner()) = true;
        cvar.notify_all();
    }

    pub fn is_stopped(&self) -> bool {
        let (flag, _) = &*self.inner;
        *flag.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Sleep up to `timeout`. Returns `true` if stop was requested
    /// before or during the wait.
    pub fn wait(&self, timeout: Duration) -> bool {
        let (flag, cvar) = &*self.inner;
        let guard = flag.lock().unwrap_or_else(|p| p.into_inner());
        let (guard, _) = cvar
            .wait_timeout_while(guard, timeout, |stopped| !*stopped)
            .unwrap_or_else(|p| p.into_inner());
        *guard
    }
}
