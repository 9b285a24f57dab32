//! Display loop manager.
//!
//! At most one routine runs per physical display. Starting a routine on
//! a busy slot stops the old one and joins its thread before the new one
//! is spawned, so the old routine's last write always precedes the new
//! routine's first.
//!
//! ```text
//!   start(slot, kind)
//!     │  lock slots
//!     ├─ old? ── stop token ─▶ join ─▶ Stopped
//!     └─ spawn new ─▶ Running ─▶ (stop | finish) ─▶ Stopped
//! ```

pub mod routine;

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::JoinHandle;

use log::{info, warn};

use crate::app::ports::{CommandSink, WallClock};
use crate::config::TimingConfig;
use crate::error::Result;
use crate::task::{StopToken, spawn_named};

pub use routine::{RoutineKind, RoutineState};
use routine::{Routine, StateCell};

/// A physical display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    /// Four-digit seven-segment display (TM1637).
    NumericDisplay,
    /// 16x2 character LCD.
    CharacterDisplay,
}

impl Slot {
    pub const ALL: [Slot; 2] = [Slot::NumericDisplay, Slot::CharacterDisplay];

    fn thread_name(self) -> &'static str {
        match self {
            Self::NumericDisplay => "disp-numeric",
            Self::CharacterDisplay => "disp-lcd",
        }
    }
}

struct ActiveRoutine {
    kind: RoutineKind,
    stop: StopToken,
    state: StateCell,
    handle: Option<JoinHandle<()>>,
}

impl ActiveRoutine {
    /// Signal and wait for the thread to exit.
    fn halt(mut self, slot: Slot) {
        self.state.begin_stop();
        self.stop.stop();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("Display {:?}: {} thread panicked", slot, self.kind);
            }
        }
        self.state.set(RoutineState::Stopped);
    }
}

/// Owner of the per-slot display routines.
pub struct DisplayManager {
    sink: Arc<dyn CommandSink>,
    clock: Arc<dyn WallClock>,
    timing: TimingConfig,
    slots: Mutex<HashMap<Slot, ActiveRoutine>>,
}

impl DisplayManager {
    pub fn new(
        sink: Arc<dyn CommandSink>,
        clock: Arc<dyn WallClock>,
        timing: TimingConfig,
    ) -> Self {
        Self {
            sink,
            clock,
            timing,
            slots: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<Slot, ActiveRoutine>> {
        self.slots.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Start `kind` on `slot`, superseding whatever runs there.
    ///
    /// On a validation error the current routine is left untouched.
    pub fn start(&self, slot: Slot, kind: RoutineKind) -> Result<()> {
        kind.check_for(slot)?;

        let mut slots = self.lock();
        if let Some(old) = slots.remove(&slot) {
            info!("Display {:?}: {} superseded by {}", slot, old.kind, kind);
            old.halt(slot);
        }

        let stop = StopToken::new();
        let state = StateCell::new();
        let routine = Routine {
            slot,
            kind,
            sink: Arc::clone(&self.sink),
            clock: Arc::clone(&self.clock),
            timing: self.timing.clone(),
            stop: stop.clone(),
            state: state.clone(),
        };
        let handle = spawn_named(slot.thread_name(), move || routine.run())?;

        slots.insert(
            slot,
            ActiveRoutine {
                kind,
                stop,
                state,
                handle: Some(handle),
            },
        );
        Ok(())
    }

    /// Stop the routine on `slot` and wait for it. Returns whether one
    /// was still running.
    pub fn stop(&self, slot: Slot) -> bool {
        let Some(old) = self.lock().remove(&slot) else {
            return false;
        };
        let was_running = old.state.get() == RoutineState::Running;
        old.halt(slot);
        was_running
    }

    /// Stop every slot.
    pub fn stop_all(&self) {
        for slot in Slot::ALL {
            self.stop(slot);
        }
    }

    /// State of the most recent routine on `slot`, if any.
    pub fn state(&self, slot: Slot) -> Option<RoutineState> {
        self.lock().get(&slot).map(|r| r.state.get())
    }

    /// Routines currently `Running`, in slot order.
    pub fn running(&self) -> Vec<(Slot, RoutineKind)> {
        let slots = self.lock();
        Slot::ALL
            .iter()
            .filter_map(|slot| {
                slots
                    .get(slot)
                    .filter(|r| r.state.get() == RoutineState::Running)
                    .map(|r| (*slot, r.kind))
            })
            .collect()
    }
}

impl Drop for DisplayManager {
    fn drop(&mut self) {
        self.stop_all();
    }
}
