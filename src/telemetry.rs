//! Live telemetry mirrored from the board.
//!
//! [`TelemetryStore`] is written only by ingestion and read by status
//! queries. Each event is applied under one write lock, so a reader
//! always sees a whole snapshot: every field from before an event or
//! every field from after it.

use std::sync::RwLock;
use std::time::Instant;

use crate::app::events::TelemetryEvent;

/// Immutable view of the last reported device state.
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryState {
    /// Seconds left on the board's countdown.
    pub timer_remaining_secs: u32,
    pub timer_active: bool,
    /// Last clock string the board reported, verbatim.
    pub clock_mirror: Option<String>,
    /// Last distance reading in centimetres.
    pub distance_cm: Option<f32>,
    /// When any field last changed.
    pub last_update: Instant,
}

impl TelemetryState {
    pub fn new() -> Self {
        Self {
            timer_remaining_secs: 0,
            timer_active: false,
            clock_mirror: None,
            distance_cm: None,
            last_update: Instant::now(),
        }
    }

    /// Apply one event's mutation.
    pub fn apply(&mut self, event: &TelemetryEvent) {
        match event {
            TelemetryEvent::TimerRemaining(secs) => {
                self.timer_remaining_secs = *secs;
                self.timer_active = true;
            }
            TelemetryEvent::TimerFinished => {
                self.timer_remaining_secs = 0;
                self.timer_active = false;
            }
            TelemetryEvent::ClockReport(s) => self.clock_mirror = Some(s.clone()),
            TelemetryEvent::DistanceReport(cm) => self.distance_cm = Some(*cm),
        }
        self.last_update = Instant::now();
    }
}

impl Default for TelemetryState {
    fn default() -> Self {
        Self::new()
    }
}

/// Lock-guarded owner of the one [`TelemetryState`].
#[derive(Debug, Default)]
pub struct TelemetryStore {
    state: RwLock<TelemetryState>,
}

impl TelemetryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply `event` atomically.
    pub fn update(&self, event: &TelemetryEvent) {
        // A panicked writer cannot leave a half-applied event behind;
        // apply() only assigns whole fields.
        let mut state = self.state.write().unwrap_or_else(|p| p.into_inner());
        state.apply(event);
    }

    /// Copy of the current state.
    pub fn read(&self) -> TelemetryState {
        self.state
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }
}
