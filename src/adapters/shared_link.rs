//! Shared, lock-guarded link handle.
//!
//! Every background task and caller-facing operation talks to the board
//! through one [`SharedLink`]. Each send or receive takes the single
//! lock for the duration of one line, so writes from concurrent tasks
//! never interleave at the byte level. Relative order between tasks is
//! whatever order they acquire the lock in.

use std::sync::{Arc, Mutex, MutexGuard};

use log::debug;

use crate::app::ports::{CommandSink, Link};
use crate::error::{ConnectionError, Result};

type BoxedLink = Box<dyn Link>;

/// Cloneable handle to the one [`Link`].
#[derive(Clone)]
pub struct SharedLink {
    inner: Arc<Mutex<BoxedLink>>,
}

impl SharedLink {
    pub fn new(link: impl Link + 'static) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Box::new(link))),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, BoxedLink>> {
        self.inner
            .lock()
            .map_err(|_| ConnectionError::LockPoisoned.into())
    }

    pub fn ensure_open(&self) -> Result<()> {
        self.lock()?.ensure_open()
    }

    pub fn is_open(&self) -> bool {
        self.lock().map(|l| l.is_open()).unwrap_or(false)
    }

    /// Non-blocking receive of one line.
    pub fn try_receive_line(&self) -> Result<Option<String>> {
        let line = self.lock()?.try_receive_line()?;
        if let Some(l) = &line {
            debug!("RX {}", l);
        }
        Ok(line)
    }

    pub fn close(&self) {
        if let Ok(mut link) = self.lock() {
            link.close();
        }
    }
}

impl CommandSink for SharedLink {
    fn send_line(&self, line: &str) -> Result<()> {
        debug!("TX {}", line);
        self.lock()?.send_line(line)
    }
}
