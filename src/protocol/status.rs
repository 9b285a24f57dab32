//! Inbound status-line classification.
//!
//! Status grammar emitted by the board:
//!
//! | Line                       | Classified as                         |
//! |----------------------------|---------------------------------------|
//! | `TIMER:REMAINING:<secs>`   | [`TelemetryEvent::TimerRemaining`]    |
//! | `COUNTDOWN:FINISHED`       | [`TelemetryEvent::TimerFinished`]     |
//! | `CLOCK:LCD:<HH:MM:SS>`     | [`TelemetryEvent::ClockReport`]       |
//! | `DISTANCE:<cm>`            | [`TelemetryEvent::DistanceReport`]    |
//! | `ULTRA:<cm>`               | [`Inbound::SensorReply`]              |
//! | `OK:<...>`                 | [`Inbound::Ack`]                      |
//! | `ERROR:<...>`              | [`Inbound::DeviceError`]              |
//! | `STATUS:<...>`             | [`Inbound::Status`]                   |
//! | anything else              | [`Inbound::Unrecognized`]             |
//!
//! Only the first four reach telemetry and the rule engine.

use crate::app::events::TelemetryEvent;
use crate::error::ParseError;

const TIMER_REMAINING: &str = "TIMER:REMAINING:";
const COUNTDOWN_FINISHED: &str = "COUNTDOWN:FINISHED";
const CLOCK_REPORT: &str = "CLOCK:LCD:";
const DISTANCE: &str = "DISTANCE:";
const ULTRA_REPLY: &str = "ULTRA:";
const ACK: &str = "OK:";
const DEVICE_ERROR: &str = "ERROR:";
const STATUS: &str = "STATUS:";

/// A classified inbound line.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// Telemetry that updates state and is offered to the rule engine.
    Telemetry(TelemetryEvent),
    /// Reply to a single `ULTRA:READ` request.
    SensorReply(f32),
    /// Command acknowledgement.
    Ack(String),
    /// The board rejected a command.
    DeviceError(String),
    /// Free-form status report (reply to `STATUS`).
    Status(String),
    /// Not part of the vocabulary; ignored.
    Unrecognized,
}

/// Classify one trimmed, non-empty line.
///
/// A recognised telemetry prefix followed by a malformed payload is a
/// [`ParseError`]; unknown prefixes are [`Inbound::Unrecognized`].
pub fn classify(line: &str) -> Result<Inbound, ParseError> {
    let line = line.trim();

    if let Some(rest) = line.strip_prefix(TIMER_REMAINING) {
        let secs = rest.trim().parse::<u32>().map_err(|_| ParseError {
            line: line.to_string(),
            reason: "timer remaining is not a non-negative integer",
        })?;
        return Ok(Inbound::Telemetry(TelemetryEvent::TimerRemaining(secs)));
    }

    if line.starts_with(COUNTDOWN_FINISHED) {
        return Ok(Inbound::Telemetry(TelemetryEvent::TimerFinished));
    }

    if let Some(rest) = line.strip_prefix(CLOCK_REPORT) {
        let clock = rest.trim();
        if clock.is_empty() {
            return Err(ParseError {
                line: line.to_string(),
                reason: "empty clock report",
            });
        }
        return Ok(Inbound::Telemetry(TelemetryEvent::ClockReport(
            clock.to_string(),
        )));
    }

    if let Some(rest) = line.strip_prefix(DISTANCE) {
        let cm = parse_distance(rest).ok_or_else(|| ParseError {
            line: line.to_string(),
            reason: "distance is not a finite number",
        })?;
        return Ok(Inbound::Telemetry(TelemetryEvent::DistanceReport(cm)));
    }

    if let Some(rest) = line.strip_prefix(ULTRA_REPLY) {
        // The board also acknowledges ULTRA:START/STOP with words.
        return Ok(match parse_distance(rest) {
            Some(cm) => Inbound::SensorReply(cm),
            None => Inbound::Ack(line.to_string()),
        });
    }

    if let Some(rest) = line.strip_prefix(ACK) {
        return Ok(Inbound::Ack(rest.to_string()));
    }
    if let Some(rest) = line.strip_prefix(DEVICE_ERROR) {
        return Ok(Inbound::DeviceError(rest.trim().to_string()));
    }
    if let Some(rest) = line.strip_prefix(STATUS) {
        return Ok(Inbound::Status(rest.trim().to_string()));
    }

    Ok(Inbound::Unrecognized)
}

fn parse_distance(text: &str) -> Option<f32> {
    text.trim().parse::<f32>().ok().filter(|cm| cm.is_finite())
}
