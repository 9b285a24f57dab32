//! Control service: the one object a front end drives.
//!
//! [`ControlService`] owns the shared link, telemetry store, rule engine,
//! display manager and ingestion thread. Every operation either sends
//! commands, registers a rule, or starts/stops a display routine, and
//! returns a `Result` whose error carries a human-readable reason.
//!
//! ```text
//!   caller ──▶ ┌──────────────────────────┐ ──▶ SharedLink ──▶ board
//!              │      ControlService      │
//!              │ rules · displays · state │ ◀── Ingestion ◀── board
//!              └──────────────────────────┘
//! ```

use core::fmt;
use std::sync::Arc;

use chrono::Timelike;
use log::{info, warn};

use crate::adapters::clock::LocalClock;
use crate::adapters::serial::SerialLink;
use crate::adapters::shared_link::SharedLink;
use crate::app::ports::{CommandSink, WallClock};
use crate::config::{ControlConfig, TimingConfig};
use crate::display::{DisplayManager, RoutineKind, Slot};
use crate::error::{Error, Result};
use crate::ingest::{IngestStats, Ingestion, IngestionHandle};
use crate::protocol::command::{Command, LcdRow};
use crate::rules::action::{ActionSpec, check_countdown};
use crate::rules::engine::RuleEngine;
use crate::rules::rule::{PendingRule, RuleId, TriggerKind, TriggerRule};
use crate::telemetry::{TelemetryState, TelemetryStore};

// ───────────────────────────────────────────────────────────────
// ControlService
// ───────────────────────────────────────────────────────────────

pub struct ControlService {
    link: SharedLink,
    telemetry: Arc<TelemetryStore>,
    rules: Arc<RuleEngine>,
    displays: DisplayManager,
    clock: Arc<dyn WallClock>,
    timing: TimingConfig,
    ingestion: Option<IngestionHandle>,
    stats: Arc<IngestStats>,
    shut_down: bool,
}

impl ControlService {
    /// Assemble the service around `link`. Ingestion is not started;
    /// call [`start`](Self::start).
    pub fn new(link: SharedLink, clock: Arc<dyn WallClock>, timing: TimingConfig) -> Self {
        let sink: Arc<dyn CommandSink> = Arc::new(link.clone());
        Self {
            displays: DisplayManager::new(sink, Arc::clone(&clock), timing.clone()),
            clock,
            link,
            telemetry: Arc::new(TelemetryStore::new()),
            rules: Arc::new(RuleEngine::new()),
            timing,
            ingestion: None,
            stats: Arc::new(IngestStats::default()),
            shut_down: false,
        }
    }

    /// Open the serial port named in `config` and start ingestion.
    pub fn connect(config: &ControlConfig) -> Result<Self> {
        config.validate()?;
        let link = SharedLink::new(SerialLink::new(config.link.clone()));
        link.ensure_open()?;
        let mut service = Self::new(link, Arc::new(LocalClock::new()), config.timing.clone());
        service.start()?;
        Ok(service)
    }

    /// Start the ingestion thread. Idempotent.
    pub fn start(&mut self) -> Result<()> {
        if self.ingestion.is_some() {
            return Ok(());
        }
        let ingestion = Ingestion::new(
            self.link.clone(),
            Arc::clone(&self.telemetry),
            Arc::clone(&self.rules),
            self.timing.clone(),
        );
        self.stats = ingestion.stats();
        self.ingestion = Some(ingestion.spawn()?);
        self.shut_down = false;
        Ok(())
    }

    /// Stop every routine and the ingestion thread, then close the link.
    ///
    /// Returns `false` if the service was already shut down and nothing
    /// was done.
    pub fn shutdown(&mut self) -> bool {
        if self.shut_down {
            return false;
        }
        self.shut_down = true;
        self.displays.stop_all();
        if let Some(mut ingestion) = self.ingestion.take() {
            ingestion.stop();
        }
        self.link.close();
        info!("Service: shut down");
        true
    }

    fn send(&self, cmd: Command) -> Result<()> {
        self.link.send(&cmd)
    }

    // ── LED ───────────────────────────────────────────────────

    pub fn led_on(&self) -> Result<()> {
        self.send(Command::LedOn)
    }

    pub fn led_off(&self) -> Result<()> {
        self.send(Command::LedOff)
    }

    pub fn led_toggle(&self) -> Result<()> {
        self.send(Command::LedToggle)
    }

    pub fn led_blink(&self, interval_ms: u32) -> Result<()> {
        if interval_ms == 0 {
            return Err(Error::invalid("blink interval must be positive"));
        }
        self.send(Command::LedBlink { interval_ms })
    }

    // ── Buzzer ────────────────────────────────────────────────

    pub fn buzzer_on(&self) -> Result<()> {
        self.send(Command::BuzzerOn)
    }

    pub fn buzzer_off(&self) -> Result<()> {
        self.send(Command::BuzzerOff)
    }

    pub fn buzzer_beep(&self, duration_ms: u32) -> Result<()> {
        if duration_ms == 0 {
            return Err(Error::invalid("beep duration must be positive"));
        }
        self.send(Command::BuzzerBeep { duration_ms })
    }

    // ── Character display ─────────────────────────────────────

    /// Write `text` to row 1 or 2; longer text is cut at 16 columns.
    pub fn lcd_write(&self, line: u8, text: &str) -> Result<()> {
        self.send(Command::lcd(LcdRow::from_number(line)?, text))
    }

    pub fn lcd_message(&self, line1: &str, line2: &str) -> Result<()> {
        self.send(Command::lcd(LcdRow::Top, line1))?;
        self.send(Command::lcd(LcdRow::Bottom, line2))
    }

    pub fn lcd_clear(&self) -> Result<()> {
        self.send(Command::LcdClear)
    }

    pub fn lcd_backlight(&self, on: bool) -> Result<()> {
        self.send(Command::LcdBacklight(on))
    }

    // ── Numeric display ───────────────────────────────────────

    pub fn display_number(&self, n: i32) -> Result<()> {
        self.send(Command::number(n)?)
    }

    /// Static `HHMM` time.
    pub fn display_time(&self, hhmm: &str) -> Result<()> {
        let (hours, minutes) = parse_hhmm(hhmm)?;
        self.send(Command::pair(hours, minutes))
    }

    /// Brightness, clamped to 0-15.
    pub fn display_brightness(&self, level: i32) -> Result<()> {
        self.send(Command::brightness(level))
    }

    pub fn display_clear(&self) -> Result<()> {
        self.send(Command::DisplayClear)
    }

    // ── Board-run clocks and stopwatches ──────────────────────
    //
    // These hand the slot to the board firmware, so any host routine on
    // the same slot is stopped first.

    /// Start the board's LCD clock from the host wall time. While it runs
    /// the board reports `CLOCK:LCD:HH:MM:SS`, which `ClockEquals` rules
    /// match against.
    pub fn lcd_show_current_time(&self) -> Result<()> {
        self.displays.stop(Slot::CharacterDisplay);
        self.send(Command::LcdClock(self.clock.now()))
    }

    pub fn lcd_start_stopwatch(&self) -> Result<()> {
        self.displays.stop(Slot::CharacterDisplay);
        self.send(Command::LcdStopwatch(true))
    }

    pub fn lcd_stop_stopwatch(&self) -> Result<()> {
        self.send(Command::LcdStopwatch(false))
    }

    /// Start the board's numeric-display clock from the host wall time.
    pub fn display_current_time(&self) -> Result<()> {
        self.displays.stop(Slot::NumericDisplay);
        let now = self.clock.now();
        self.send(Command::DisplayClock {
            hours: now.hour() as u8,
            minutes: now.minute() as u8,
        })
    }

    pub fn display_start_stopwatch(&self) -> Result<()> {
        self.displays.stop(Slot::NumericDisplay);
        self.send(Command::DisplayStopwatch(true))
    }

    pub fn display_stop_stopwatch(&self) -> Result<()> {
        self.send(Command::DisplayStopwatch(false))
    }

    /// Countdown run by the board itself; it reports back with
    /// `TIMER:REMAINING` and `COUNTDOWN:FINISHED`.
    pub fn start_device_countdown(&self, minutes: u32, seconds: u32) -> Result<()> {
        check_countdown(minutes, seconds)?;
        let total_secs = minutes * 60 + seconds;
        if total_secs == 0 {
            return Err(Error::invalid("countdown must be at least one second"));
        }
        self.send(Command::DisplayCountdown { total_secs })
    }

    // ── Distance sensor ───────────────────────────────────────

    pub fn ultrasonic_start(&self) -> Result<()> {
        self.send(Command::UltraStart)
    }

    pub fn ultrasonic_stop(&self) -> Result<()> {
        self.send(Command::UltraStop)
    }

    /// Request one reading. The `ULTRA:` reply is logged by ingestion.
    pub fn ultrasonic_read(&self) -> Result<()> {
        self.send(Command::UltraRead)
    }

    pub fn request_device_status(&self) -> Result<()> {
        self.send(Command::Status)
    }

    /// Stop every display routine, then switch every peripheral off.
    ///
    /// Every command is attempted; the first failure is returned.
    pub fn all_off(&self) -> Result<()> {
        self.displays.stop_all();
        let mut first_err = None;
        for cmd in [
            Command::LedOff,
            Command::BuzzerOff,
            Command::LcdClear,
            Command::DisplayClear,
            Command::UltraStop,
        ] {
            if let Err(e) = self.send(cmd) {
                warn!("Service: all-off step failed: {}", e);
                first_err.get_or_insert(e);
            }
        }
        first_err.map_or(Ok(()), Err)
    }

    // ── Display routines ──────────────────────────────────────

    pub fn start_routine(&self, slot: Slot, kind: RoutineKind) -> Result<()> {
        self.displays.start(slot, kind)
    }

    /// Returns whether a routine was still running on `slot`.
    pub fn stop_routine(&self, slot: Slot) -> bool {
        self.displays.stop(slot)
    }

    pub fn displays(&self) -> &DisplayManager {
        &self.displays
    }

    // ── Automation ────────────────────────────────────────────

    pub fn when_timer_finishes(&self, kind: &str, params: &str) -> Result<RuleId> {
        let action = ActionSpec::parse(kind, params)?;
        self.rules
            .register(TriggerRule::one_shot(TriggerKind::TimerZero, action)?)
    }

    /// Fires when the board reports exactly `hh_mm_ss`. The board only
    /// reports its clock while its LCD clock runs
    /// ([`lcd_show_current_time`](Self::lcd_show_current_time)); a time it
    /// never reports verbatim never fires.
    pub fn when_time_equals(&self, hh_mm_ss: &str, kind: &str, params: &str) -> Result<RuleId> {
        let action = ActionSpec::parse(kind, params)?;
        self.rules.register(TriggerRule::one_shot(
            TriggerKind::ClockEquals(hh_mm_ss.to_string()),
            action,
        )?)
    }

    /// Needs the sensor streaming; see [`ultrasonic_start`](Self::ultrasonic_start).
    pub fn when_distance_less_than(&self, cm: f32, kind: &str, params: &str) -> Result<RuleId> {
        let action = ActionSpec::parse(kind, params)?;
        self.rules
            .register(TriggerRule::one_shot(TriggerKind::DistanceBelow(cm), action)?)
    }

    /// Stream distance readings to LCD row 2 until rules are cleared.
    ///
    /// The echo rule is registered only once both setup commands were
    /// sent, so a failed setup leaves nothing pending.
    pub fn show_live_distance_on_lcd(&self) -> Result<RuleId> {
        self.send(Command::UltraStart)?;
        self.send(Command::lcd(LcdRow::Top, "Distance:"))?;
        self.rules.register(TriggerRule::distance_echo())
    }

    pub fn clear_pending(&self) -> usize {
        self.rules.clear_all()
    }

    pub fn pending(&self) -> Vec<PendingRule> {
        self.rules.snapshot()
    }

    pub fn rules(&self) -> &RuleEngine {
        &self.rules
    }

    // ── Status ────────────────────────────────────────────────

    pub fn telemetry(&self) -> TelemetryState {
        self.telemetry.read()
    }

    pub fn status(&self) -> StatusReport {
        StatusReport {
            telemetry: self.telemetry.read(),
            pending: self.rules.snapshot(),
            routines: self.displays.running(),
            link_open: self.link.is_open(),
            lines_received: IngestStats::get(&self.stats.lines),
            parse_errors: IngestStats::get(&self.stats.parse_errors),
        }
    }

    /// Open the link if needed.
    pub fn test_connection(&self) -> Result<()> {
        self.link.ensure_open()
    }
}

impl Drop for ControlService {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn parse_hhmm(hhmm: &str) -> Result<(u32, u32)> {
    let bad = || Error::invalid(format!("time '{hhmm}' must be 4 digits HHMM, e.g. 1430"));
    if hhmm.len() != 4 || !hhmm.bytes().all(|b| b.is_ascii_digit()) {
        return Err(bad());
    }
    let hours: u32 = hhmm[..2].parse().map_err(|_| bad())?;
    let minutes: u32 = hhmm[2..].parse().map_err(|_| bad())?;
    if hours > 23 || minutes > 59 {
        return Err(bad());
    }
    Ok((hours, minutes))
}

// ───────────────────────────────────────────────────────────────
// Status report
// ───────────────────────────────────────────────────────────────

/// Point-in-time view for status queries.
#[derive(Debug, Clone)]
pub struct StatusReport {
    pub telemetry: TelemetryState,
    pub pending: Vec<PendingRule>,
    pub routines: Vec<(Slot, RoutineKind)>,
    pub link_open: bool,
    pub lines_received: u64,
    pub parse_errors: u64,
}

const RULE: &str = "============================================================";

impl fmt::Display for StatusReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let t = &self.telemetry;
        writeln!(f, "{RULE}")?;
        writeln!(f, "PERIPHERAL STATUS")?;
        writeln!(f, "{RULE}")?;
        writeln!(f, "Link: {}", if self.link_open { "OPEN" } else { "CLOSED" })?;

        if t.timer_active {
            let (m, s) = (t.timer_remaining_secs / 60, t.timer_remaining_secs % 60);
            writeln!(f, "Timer: ACTIVE - {m:02}:{s:02} remaining")?;
        } else {
            writeln!(f, "Timer: INACTIVE")?;
        }
        match &t.clock_mirror {
            Some(clock) => writeln!(f, "Clock: {clock}")?,
            None => writeln!(f, "Clock: NOT RUNNING")?,
        }
        match t.distance_cm {
            Some(cm) => writeln!(f, "Distance: {cm:.2} cm ({})", Proximity::from_cm(cm))?,
            None => writeln!(f, "Distance: NOT MONITORING")?,
        }
        if self.routines.is_empty() {
            writeln!(f, "Routines: none")?;
        } else {
            let list: Vec<String> = self
                .routines
                .iter()
                .map(|(slot, kind)| format!("{slot:?}={kind}"))
                .collect();
            writeln!(f, "Routines: {}", list.join(", "))?;
        }

        writeln!(f)?;
        writeln!(f, "Pending conditional actions: {}", self.pending.len())?;
        for (i, p) in self.pending.iter().enumerate() {
            writeln!(f, "  {}. {}", i + 1, p.rule)?;
        }
        writeln!(f)?;
        writeln!(
            f,
            "Lines received: {} ({} unparseable)",
            self.lines_received, self.parse_errors
        )?;
        writeln!(
            f,
            "Last update: {:.1} seconds ago",
            t.last_update.elapsed().as_secs_f32()
        )?;
        write!(f, "{RULE}")
    }
}

// ───────────────────────────────────────────────────────────────
// Proximity
// ───────────────────────────────────────────────────────────────

/// Coarse distance band.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Proximity {
    VeryClose,
    Close,
    Medium,
    Far,
}

impl Proximity {
    pub fn from_cm(cm: f32) -> Self {
        if cm < 10.0 {
            Self::VeryClose
        } else if cm < 30.0 {
            Self::Close
        } else if cm < 100.0 {
            Self::Medium
        } else {
            Self::Far
        }
    }
}

impl fmt::Display for Proximity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::VeryClose => "VERY CLOSE",
            Self::Close => "CLOSE",
            Self::Medium => "MEDIUM",
            Self::Far => "FAR",
        })
    }
}
