//! Trigger rules: a condition paired with an action.

use core::fmt;

use crate::error::{Error, Result};
use crate::rules::action::ActionSpec;

/// Identifier handed out at registration. Monotonic, never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RuleId(pub u64);

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The condition a rule waits for.
#[derive(Debug, Clone, PartialEq)]
pub enum TriggerKind {
    /// The board's countdown finished.
    TimerZero,
    /// The board reported exactly this clock string.
    ClockEquals(String),
    /// A distance reading strictly below this many centimetres.
    DistanceBelow(f32),
    /// Every distance reading; mirrors it to the character display.
    /// Never consumed.
    ContinuousDistanceEcho,
}

impl TriggerKind {
    /// One-shot kinds are removed when they fire.
    pub fn is_one_shot(&self) -> bool {
        !matches!(self, Self::ContinuousDistanceEcho)
    }
}

impl fmt::Display for TriggerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TimerZero => f.write_str("when timer → 0"),
            Self::ClockEquals(target) => write!(f, "when clock = {target}"),
            Self::DistanceBelow(cm) => write!(f, "when distance < {cm}cm"),
            Self::ContinuousDistanceEcho => f.write_str("on every distance"),
        }
    }
}

/// A validated, not-yet-registered rule.
#[derive(Debug, Clone, PartialEq)]
pub struct TriggerRule {
    pub kind: TriggerKind,
    /// `None` only for [`TriggerKind::ContinuousDistanceEcho`].
    pub action: Option<ActionSpec>,
}

impl TriggerRule {
    /// A one-shot rule. Fails if `kind` is not one-shot or is malformed.
    pub fn one_shot(kind: TriggerKind, action: ActionSpec) -> Result<Self> {
        let rule = Self {
            kind,
            action: Some(action),
        };
        rule.validate()?;
        Ok(rule)
    }

    /// The persistent distance-to-display echo.
    pub fn distance_echo() -> Self {
        Self {
            kind: TriggerKind::ContinuousDistanceEcho,
            action: None,
        }
    }

    pub fn validate(&self) -> Result<()> {
        match (&self.kind, &self.action) {
            (TriggerKind::ContinuousDistanceEcho, None) => Ok(()),
            (TriggerKind::ContinuousDistanceEcho, Some(_)) => {
                Err(Error::invalid("distance echo rules carry no action"))
            }
            (_, None) => Err(Error::invalid("one-shot rules need an action")),
            (kind, Some(action)) => {
                match kind {
                    TriggerKind::ClockEquals(target) => check_clock_target(target)?,
                    TriggerKind::DistanceBelow(cm) if !cm.is_finite() || *cm <= 0.0 => {
                        return Err(Error::invalid(format!(
                            "distance threshold {cm} must be a positive number"
                        )));
                    }
                    _ => {}
                }
                action.validate()
            }
        }
    }
}

impl fmt::Display for TriggerRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.action {
            Some(action) => write!(f, "{}: {}", self.kind, action),
            None => write!(f, "{}: show on LCD line 2", self.kind),
        }
    }
}

/// A registered rule as seen by status queries.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingRule {
    pub id: RuleId,
    pub rule: TriggerRule,
}

/// `HH:MM:SS`, 24-hour, zero-padded; the only format the board emits.
pub fn check_clock_target(target: &str) -> Result<()> {
    let bad = || Error::invalid(format!("time '{target}' must be HH:MM:SS (24-hour)"));
    let bytes = target.as_bytes();
    if bytes.len() != 8 || bytes[2] != b':' || bytes[5] != b':' {
        return Err(bad());
    }
    let field = |i: usize, max: u8| -> Result<()> {
        let (a, b) = (bytes[i], bytes[i + 1]);
        if !a.is_ascii_digit() || !b.is_ascii_digit() {
            return Err(bad());
        }
        if (a - b'0') * 10 + (b - b'0') > max {
            return Err(bad());
        }
        Ok(())
    };
    field(0, 23)?;
    field(3, 59)?;
    field(6, 59)
}
