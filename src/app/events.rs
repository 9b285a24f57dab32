//! Inbound telemetry events.
//!
//! Produced by [`protocol::status::classify`](crate::protocol::status::classify),
//! applied to [`TelemetryStore`](crate::telemetry::TelemetryStore) first and
//! then offered to the [`RuleEngine`](crate::rules::engine::RuleEngine).

/// Telemetry reported by the board.
#[derive(Debug, Clone, PartialEq)]
pub enum TelemetryEvent {
    /// The board's countdown has this many seconds left.
    TimerRemaining(u32),

    /// The board's countdown reached zero.
    TimerFinished,

    /// The board's character-display clock shows this value (`HH:MM:SS`).
    ClockReport(String),

    /// Ultrasonic distance reading in centimetres.
    DistanceReport(f32),
}

impl TelemetryEvent {
    /// Short name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::TimerRemaining(_) => "timer-remaining",
            Self::TimerFinished => "timer-finished",
            Self::ClockReport(_) => "clock",
            Self::DistanceReport(_) => "distance",
        }
    }
}
