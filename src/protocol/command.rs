//! Outbound command vocabulary.
//!
//! Grammar: `<SUBSYSTEM>:<VERB>[:<ARG>...]`, one command per line. The
//! [`Display`](core::fmt::Display) impl renders the exact wire text;
//! [`codec::encode_line`](super::codec::encode_line) adds the terminator.

use core::fmt;

use chrono::NaiveDateTime;

use crate::error::{Error, Result};

/// Character display width.
pub const LCD_COLS: usize = 16;

/// Text for one character-display row: at most [`LCD_COLS`] characters,
/// sized for four UTF-8 bytes per character.
pub type LcdText = heapless::String<{ LCD_COLS * 4 }>;

/// Four-character payload for the numeric display (`-999`..`9999`, `HHMM`).
pub type Digits = heapless::String<4>;

/// Lowest and highest value the numeric display can show.
pub const NUMERIC_RANGE: core::ops::RangeInclusive<i32> = -999..=9999;

/// Brightness steps on the numeric display.
pub const MAX_BRIGHTNESS: u8 = 15;

/// Character display row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LcdRow {
    Top,
    Bottom,
}

impl LcdRow {
    /// Row from a 1-based line number.
    pub fn from_number(n: u8) -> Result<Self> {
        match n {
            1 => Ok(Self::Top),
            2 => Ok(Self::Bottom),
            _ => Err(Error::invalid(format!("LCD line must be 1 or 2, got {n}"))),
        }
    }

    fn index(self) -> u8 {
        match self {
            Self::Top => 1,
            Self::Bottom => 2,
        }
    }
}

/// A single command understood by the board firmware.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    LedOn,
    LedOff,
    LedToggle,
    LedBlink { interval_ms: u32 },
    BuzzerOn,
    BuzzerOff,
    BuzzerBeep { duration_ms: u32 },
    LcdWrite { row: LcdRow, text: LcdText },
    LcdClear,
    LcdBacklight(bool),
    DisplayNumber(Digits),
    DisplayClear,
    DisplayBrightness(u8),
    /// Start the board's own countdown on the numeric display.
    DisplayCountdown { total_secs: u32 },
    /// Seed the board's LCD clock. While it runs the board reports
    /// `CLOCK:LCD:HH:MM:SS` every second.
    LcdClock(NaiveDateTime),
    /// Seed the board's numeric-display clock (`HH:MM`).
    DisplayClock { hours: u8, minutes: u8 },
    /// Start (`true`) or stop the board's LCD stopwatch.
    LcdStopwatch(bool),
    /// Start (`true`) or stop the board's numeric-display stopwatch.
    DisplayStopwatch(bool),
    UltraStart,
    UltraStop,
    UltraRead,
    Status,
    /// Pre-formatted line sent verbatim.
    Raw(String),
}

impl Command {
    /// Write `text` to a display row, truncated to [`LCD_COLS`].
    pub fn lcd(row: LcdRow, text: &str) -> Self {
        Self::LcdWrite {
            row,
            text: lcd_text(text),
        }
    }

    /// Show an integer on the numeric display.
    pub fn number(n: i32) -> Result<Self> {
        if !NUMERIC_RANGE.contains(&n) {
            return Err(Error::invalid(format!(
                "number {n} outside displayable range -999..9999"
            )));
        }
        let mut digits = Digits::new();
        // Cannot overflow: the range check bounds it to 4 characters.
        let _ = fmt::write(&mut digits, format_args!("{n}"));
        Ok(Self::DisplayNumber(digits))
    }

    /// Show two zero-padded two-digit fields, e.g. `MMSS` or `HHMM`.
    /// Fields above 99 saturate at 99.
    pub fn pair(high: u32, low: u32) -> Self {
        let mut digits = Digits::new();
        let _ = fmt::write(&mut digits, format_args!("{:02}{:02}", high.min(99), low.min(99)));
        Self::DisplayNumber(digits)
    }

    /// Brightness, clamped to `0..=15` as the board expects.
    pub fn brightness(level: i32) -> Self {
        Self::DisplayBrightness(level.clamp(0, i32::from(MAX_BRIGHTNESS)) as u8)
    }
}

/// Truncate `text` to [`LCD_COLS`] characters.
pub fn lcd_text(text: &str) -> LcdText {
    let mut out = LcdText::new();
    for ch in text.chars().take(LCD_COLS) {
        // Capacity covers LCD_COLS characters of any width.
        let _ = out.push(ch);
    }
    out
}

fn start_stop(on: bool) -> &'static str {
    if on { "START" } else { "STOP" }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LedOn => f.write_str("LED:ON"),
            Self::LedOff => f.write_str("LED:OFF"),
            Self::LedToggle => f.write_str("LED:TOGGLE"),
            Self::LedBlink { interval_ms } => write!(f, "LED:BLINK:{interval_ms}"),
            Self::BuzzerOn => f.write_str("BUZZER:ON"),
            Self::BuzzerOff => f.write_str("BUZZER:OFF"),
            Self::BuzzerBeep { duration_ms } => write!(f, "BUZZER:BEEP:{duration_ms}"),
            Self::LcdWrite { row, text } => write!(f, "LCD:LINE{}:{}", row.index(), text),
            Self::LcdClear => f.write_str("LCD:CLEAR"),
            Self::LcdBacklight(on) => {
                write!(f, "LCD:BACKLIGHT:{}", if *on { "ON" } else { "OFF" })
            }
            Self::DisplayNumber(digits) => write!(f, "TM1637:NUM:{digits}"),
            Self::DisplayClear => f.write_str("TM1637:CLEAR"),
            Self::DisplayBrightness(level) => write!(f, "TM1637:BRIGHTNESS:{level}"),
            Self::DisplayCountdown { total_secs } => write!(f, "TM1637:COUNTDOWN:{total_secs}"),
            Self::LcdClock(now) => write!(f, "LCD:CLOCK:{}", now.format("%H:%M:%S:%m/%d/%Y:%a")),
            Self::DisplayClock { hours, minutes } => {
                write!(f, "TM1637:CLOCK:{hours:02}:{minutes:02}")
            }
            Self::LcdStopwatch(on) => write!(f, "LCD:STOPWATCH:{}", start_stop(*on)),
            Self::DisplayStopwatch(on) => write!(f, "TM1637:STOPWATCH:{}", start_stop(*on)),
            Self::UltraStart => f.write_str("ULTRA:START"),
            Self::UltraStop => f.write_str("ULTRA:STOP"),
            Self::UltraRead => f.write_str("ULTRA:READ"),
            Self::Status => f.write_str("STATUS"),
            Self::Raw(line) => f.write_str(line),
        }
    }
}
