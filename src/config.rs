//! Controller configuration.
//!
//! Read once at startup: defaults, then an optional JSON file, then
//! command-line overrides for the port and baud rate. Nothing here is
//! reloaded at runtime.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlConfig {
    pub link: LinkConfig,
    pub timing: TimingConfig,
}

/// Serial link parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    /// Serial device path (e.g. `/dev/ttyACM0`, `COM6`).
    pub port: String,
    /// Baud rate; the board firmware listens at 9600.
    pub baud_rate: u32,
    /// Per-call read timeout on the port (milliseconds).
    pub read_timeout_ms: u64,
    /// Opening the port resets the board; wait this long before talking.
    pub reset_delay_ms: u64,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            port: "/dev/ttyACM0".into(),
            baud_rate: 9600,
            read_timeout_ms: 100,
            reset_delay_ms: 2000,
        }
    }
}

/// Internal cadences for the background loops.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Ingestion sleep when no line is available (milliseconds).
    pub idle_poll_ms: u64,
    /// Ingestion sleep after a read or parse failure (milliseconds).
    pub error_backoff_ms: u64,
    /// Display routine refresh cadence (milliseconds).
    pub refresh_ms: u64,
    /// Number of beeps issued when a countdown routine reaches zero.
    pub alert_beeps: u8,
    /// Duration of each alert beep (milliseconds).
    pub alert_beep_ms: u32,
    /// Pause between alert beeps (milliseconds).
    pub alert_gap_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            idle_poll_ms: 50,
            error_backoff_ms: 500,
            refresh_ms: 1000,
            alert_beeps: 3,
            alert_beep_ms: 300,
            alert_gap_ms: 500,
        }
    }
}

impl TimingConfig {
    pub fn idle_poll(&self) -> Duration {
        Duration::from_millis(self.idle_poll_ms)
    }

    pub fn error_backoff(&self) -> Duration {
        Duration::from_millis(self.error_backoff_ms)
    }

    pub fn refresh(&self) -> Duration {
        Duration::from_millis(self.refresh_ms)
    }

    pub fn alert_gap(&self) -> Duration {
        Duration::from_millis(self.alert_gap_ms)
    }
}

impl ControlConfig {
    /// Load from a JSON file. Missing fields take their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::invalid(format!("cannot read {}: {e}", path.display())))?;
        let config: Self = serde_json::from_str(&text)
            .map_err(|e| Error::invalid(format!("bad config {}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that cannot work. Nothing is clamped.
    pub fn validate(&self) -> Result<()> {
        if self.link.port.trim().is_empty() {
            return Err(Error::invalid("link.port must not be empty"));
        }
        if self.link.baud_rate == 0 {
            return Err(Error::invalid("link.baud_rate must be positive"));
        }
        let t = &self.timing;
        if t.idle_poll_ms == 0 || t.idle_poll_ms > 1000 {
            return Err(Error::invalid("timing.idle_poll_ms must be 1-1000"));
        }
        if t.error_backoff_ms < t.idle_poll_ms {
            return Err(Error::invalid(
                "timing.error_backoff_ms must not be shorter than idle_poll_ms",
            ));
        }
        if t.refresh_ms == 0 {
            return Err(Error::invalid("timing.refresh_ms must be positive"));
        }
        Ok(())
    }
}
