//! Action specifications: what a fired rule does.
//!
//! Actions arrive as a `(kind, params)` string pair from the front end
//! and are parsed into the closed [`ActionSpec`] variant at registration
//! time. Unknown kinds and malformed parameters are rejected there, so
//! nothing that reaches the engine can fail to interpret.

use core::fmt;

use crate::app::ports::CommandSink;
use crate::error::{Error, Result};
use crate::protocol::command::{Command, LcdRow};

/// Default beep and blink duration when no parameter is given.
pub const DEFAULT_ACTION_MS: u32 = 1000;

/// Largest minutes value the four-digit numeric display can show.
pub const MAX_COUNTDOWN_MINUTES: u8 = 99;

/// One of the five things a rule can do when it fires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionSpec {
    /// `BUZZER:BEEP:<ms>`
    Beep(u32),
    /// `TM1637:COUNTDOWN:<minutes * 60 + seconds>`
    StartCountdown { minutes: u8, seconds: u8 },
    /// `LED:BLINK:<ms>`
    Blink(u32),
    /// `LCD:LINE1:<line1>` then `LCD:LINE2:<line2>`
    ShowMessage { line1: String, line2: String },
    /// The text, sent verbatim.
    RawCommand(String),
}

impl ActionSpec {
    /// Parse the front-end vocabulary.
    ///
    /// | kind              | params        | default |
    /// |-------------------|---------------|---------|
    /// | `buzzer_beep`     | `<ms>`        | 1000    |
    /// | `start_timer`     | `MM:SS`       | none    |
    /// | `led_blink`       | `<ms>`        | 1000    |
    /// | `display_message` | `line1[\|line2]` | none |
    /// | `custom_command`  | `<line>`      | none    |
    pub fn parse(kind: &str, params: &str) -> Result<Self> {
        let params = params.trim();
        let spec = match kind.trim() {
            "buzzer_beep" => Self::Beep(parse_ms(params, "beep duration")?),
            "start_timer" => {
                let (minutes, seconds) = parse_mm_ss(params)?;
                Self::StartCountdown { minutes, seconds }
            }
            "led_blink" => Self::Blink(parse_ms(params, "blink interval")?),
            "display_message" => {
                let (line1, line2) = params.split_once('|').unwrap_or((params, ""));
                Self::ShowMessage {
                    line1: line1.to_string(),
                    line2: line2.to_string(),
                }
            }
            "custom_command" => Self::RawCommand(params.to_string()),
            other => {
                return Err(Error::invalid(format!(
                    "unknown action '{other}' (expected buzzer_beep, start_timer, \
                     led_blink, display_message or custom_command)"
                )));
            }
        };
        spec.validate()?;
        Ok(spec)
    }

    /// Check ranges for directly-constructed specs.
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::Beep(0) | Self::Blink(0) => Err(Error::invalid("duration must be positive")),
            Self::StartCountdown { minutes, seconds } => {
                check_countdown(u32::from(*minutes), u32::from(*seconds))
            }
            Self::ShowMessage { line1, line2 } => {
                if line1.contains('\n') || line2.contains('\n') {
                    Err(Error::invalid("message lines must not contain newlines"))
                } else {
                    Ok(())
                }
            }
            Self::RawCommand(text) => {
                if text.trim().is_empty() {
                    Err(Error::invalid("custom command must not be empty"))
                } else if text.contains('\n') {
                    Err(Error::invalid("custom command must be a single line"))
                } else {
                    Ok(())
                }
            }
            _ => Ok(()),
        }
    }

    /// The commands this action sends, in order.
    pub fn commands(&self) -> Vec<Command> {
        match self {
            Self::Beep(ms) => vec![Command::BuzzerBeep { duration_ms: *ms }],
            Self::StartCountdown { minutes, seconds } => vec![Command::DisplayCountdown {
                total_secs: u32::from(*minutes) * 60 + u32::from(*seconds),
            }],
            Self::Blink(ms) => vec![Command::LedBlink { interval_ms: *ms }],
            Self::ShowMessage { line1, line2 } => vec![
                Command::lcd(LcdRow::Top, line1),
                Command::lcd(LcdRow::Bottom, line2),
            ],
            Self::RawCommand(text) => vec![Command::Raw(text.clone())],
        }
    }

    /// Send every command of this action through `sink`.
    ///
    /// Stops at the first failed send.
    pub fn execute(&self, sink: &dyn CommandSink) -> Result<()> {
        for cmd in self.commands() {
            sink.send(&cmd)?;
        }
        Ok(())
    }

    /// Front-end name of this kind.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Beep(_) => "buzzer_beep",
            Self::StartCountdown { .. } => "start_timer",
            Self::Blink(_) => "led_blink",
            Self::ShowMessage { .. } => "display_message",
            Self::RawCommand(_) => "custom_command",
        }
    }
}

impl fmt::Display for ActionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Beep(ms) => write!(f, "beep {ms}ms"),
            Self::StartCountdown { minutes, seconds } => {
                write!(f, "countdown {minutes:02}:{seconds:02}")
            }
            Self::Blink(ms) => write!(f, "blink {ms}ms"),
            Self::ShowMessage { line1, line2 } => write!(f, "message '{line1}' / '{line2}'"),
            Self::RawCommand(text) => write!(f, "raw '{text}'"),
        }
    }
}

/// Reject countdowns the four-digit `MMSS` display cannot address.
pub fn check_countdown(minutes: u32, seconds: u32) -> Result<()> {
    if minutes > u32::from(MAX_COUNTDOWN_MINUTES) {
        return Err(Error::invalid(format!(
            "minutes {minutes} exceeds {MAX_COUNTDOWN_MINUTES}"
        )));
    }
    if seconds > 59 {
        return Err(Error::invalid(format!("seconds {seconds} must be 0-59")));
    }
    Ok(())
}

fn parse_ms(params: &str, what: &str) -> Result<u32> {
    if params.is_empty() {
        return Ok(DEFAULT_ACTION_MS);
    }
    params
        .parse::<u32>()
        .map_err(|_| Error::invalid(format!("{what} '{params}' is not a whole number of ms")))
}

fn parse_mm_ss(params: &str) -> Result<(u8, u8)> {
    let bad = || Error::invalid(format!("timer '{params}' must be MM:SS, e.g. 02:00"));
    let (m, s) = params.split_once(':').ok_or_else(bad)?;
    let minutes: u8 = m.trim().parse().map_err(|_| bad())?;
    let seconds: u8 = s.trim().parse().map_err(|_| bad())?;
    check_countdown(u32::from(minutes), u32::from(seconds))?;
    Ok((minutes, seconds))
}
