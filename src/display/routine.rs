//! Display routine bodies.
//!
//! Each routine is a loop of "write, then sleep one refresh" that checks
//! its [`StopToken`] before every write and sleeps only through
//! [`StopToken::wait`]. A stop request is therefore honoured within one
//! write, never after a full refresh.

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Instant;

use chrono::Timelike;
use log::{info, warn};

use crate::app::ports::{CommandSink, WallClock};
use crate::config::TimingConfig;
use crate::error::{Error, Result};
use crate::protocol::command::{Command, LcdRow};
use crate::rules::action::check_countdown;
use crate::task::StopToken;

use super::Slot;

// ═══════════════════════════════════════════════════════════════
//  Kinds and states
// ═══════════════════════════════════════════════════════════════

/// What a routine shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoutineKind {
    /// Current wall time, once per refresh.
    LiveClock,
    /// Time since start, counting up from zero.
    Stopwatch,
    /// Time left from `minutes:seconds`, then an audible alert.
    /// Numeric display only.
    Countdown { minutes: u8, seconds: u8 },
}

impl RoutineKind {
    /// Reject kinds the slot cannot show and durations it cannot address.
    pub fn check_for(&self, slot: Slot) -> Result<()> {
        if let Self::Countdown { minutes, seconds } = *self {
            if slot == Slot::CharacterDisplay {
                return Err(Error::invalid(
                    "countdown routines run on the numeric display only",
                ));
            }
            check_countdown(u32::from(minutes), u32::from(seconds))?;
            if minutes == 0 && seconds == 0 {
                return Err(Error::invalid("countdown must be at least one second"));
            }
        }
        Ok(())
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::LiveClock => "clock",
            Self::Stopwatch => "stopwatch",
            Self::Countdown { .. } => "countdown",
        }
    }
}

impl core::fmt::Display for RoutineKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Countdown { minutes, seconds } => {
                write!(f, "countdown {minutes:02}:{seconds:02}")
            }
            other => f.write_str(other.name()),
        }
    }
}

/// Lifecycle of one routine instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RoutineState {
    Running = 0,
    /// Stop requested; the thread has not exited yet.
    Stopping = 1,
    /// The thread has exited, either stopped or finished on its own.
    Stopped = 2,
}

/// Lock-free state cell shared between a routine and its manager.
#[derive(Debug, Clone)]
pub struct StateCell(Arc<AtomicU8>);

impl StateCell {
    pub fn new() -> Self {
        Self(Arc::new(AtomicU8::new(RoutineState::Running as u8)))
    }

    pub fn get(&self) -> RoutineState {
        match self.0.load(Ordering::Acquire) {
            0 => RoutineState::Running,
            1 => RoutineState::Stopping,
            _ => RoutineState::Stopped,
        }
    }

    pub fn set(&self, state: RoutineState) {
        self.0.store(state as u8, Ordering::Release);
    }

    /// `Running` → `Stopping`; leaves a finished routine `Stopped`.
    pub fn begin_stop(&self) {
        let _ = self.0.compare_exchange(
            RoutineState::Running as u8,
            RoutineState::Stopping as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
    }
}

impl Default for StateCell {
    fn default() -> Self {
        Self::new()
    }
}

// ═══════════════════════════════════════════════════════════════
//  Routine body
// ═══════════════════════════════════════════════════════════════

/// Everything a routine thread owns.
pub struct Routine {
    pub slot: Slot,
    pub kind: RoutineKind,
    pub sink: Arc<dyn CommandSink>,
    pub clock: Arc<dyn WallClock>,
    pub timing: TimingConfig,
    pub stop: StopToken,
    pub state: StateCell,
}

impl Routine {
    /// Thread entry point. Marks the routine `Stopped` on every exit path.
    pub fn run(self) {
        info!("Display {:?}: {} started", self.slot, self.kind);
        let finished = match self.kind {
            RoutineKind::LiveClock => self.live_clock(),
            RoutineKind::Stopwatch => self.stopwatch(),
            RoutineKind::Countdown { minutes, seconds } => {
                self.countdown(u32::from(minutes) * 60 + u32::from(seconds))
            }
        };
        self.state.set(RoutineState::Stopped);
        if finished {
            info!("Display {:?}: {} finished", self.slot, self.kind);
        } else {
            info!("Display {:?}: {} stopped", self.slot, self.kind);
        }
    }

    /// Send unless stop has been requested. Returns `false` once stopped.
    ///
    /// Send failures are logged and the routine carries on; the link
    /// reconnects on the next write.
    fn write(&self, cmd: &Command) -> bool {
        if self.stop.is_stopped() {
            return false;
        }
        if let Err(e) = self.sink.send(cmd) {
            warn!("Display {:?}: {} write failed: {}", self.slot, self.kind, e);
        }
        true
    }

    /// Sleep one refresh. Returns `false` if stop arrived meanwhile.
    fn tick(&self) -> bool {
        !self.stop.wait(self.timing.refresh())
    }

    fn live_clock(&self) -> bool {
        loop {
            let now = self.clock.now();
            let wrote = match self.slot {
                Slot::NumericDisplay => self.write(&Command::pair(now.hour(), now.minute())),
                Slot::CharacterDisplay => {
                    self.write(&Command::lcd(LcdRow::Top, &now.format("%H:%M:%S").to_string()))
                        && self.write(&Command::lcd(
                            LcdRow::Bottom,
                            &now.format("%d/%m/%Y %a").to_string(),
                        ))
                }
            };
            if !wrote || !self.tick() {
                return false;
            }
        }
    }

    fn stopwatch(&self) -> bool {
        let started = Instant::now();
        if self.slot == Slot::CharacterDisplay && !self.write(&Command::lcd(LcdRow::Top, "Stopwatch:")) {
            return false;
        }
        loop {
            let secs = started.elapsed().as_secs();
            let wrote = match self.slot {
                Slot::NumericDisplay => self.write(&numeric_elapsed(secs)),
                Slot::CharacterDisplay => self.write(&Command::lcd(
                    LcdRow::Bottom,
                    &format!("{:02}:{:02}:{:02}", secs / 3600, (secs / 60) % 60, secs % 60),
                )),
            };
            if !wrote || !self.tick() {
                return false;
            }
        }
    }

    /// Counts `total` down to one, then alerts. Returns `true` when it
    /// reached the alert without being stopped.
    fn countdown(&self, total: u32) -> bool {
        for remaining in (1..=total).rev() {
            if !self.write(&Command::pair(remaining / 60, remaining % 60)) || !self.tick() {
                return false;
            }
        }

        let beeps = self.timing.alert_beeps;
        for i in 0..beeps {
            let beep = Command::BuzzerBeep {
                duration_ms: self.timing.alert_beep_ms,
            };
            if !self.write(&beep) {
                return false;
            }
            if i + 1 < beeps && self.stop.wait(self.timing.alert_gap()) {
                return false;
            }
        }
        true
    }
}

/// Four digits for an elapsed time: `MMSS` under an hour, then `HHMM`,
/// saturating at `9959`.
fn numeric_elapsed(secs: u64) -> Command {
    if secs < 3600 {
        Command::pair((secs / 60) as u32, (secs % 60) as u32)
    } else {
        let hours = (secs / 3600).min(99) as u32;
        Command::pair(hours, ((secs / 60) % 60) as u32)
    }
}
