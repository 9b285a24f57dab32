//! Port traits: the boundary between the automation core and the outside world.
//!
//! ```text
//!   SerialLink ──▶ Link ──▶ SharedLink ──▶ CommandSink ──▶ RuleEngine / routines
//!   LocalClock ──▶ WallClock ──▶ live clock routines
//! ```
//!
//! Adapters implement these traits; the core only ever sees the traits,
//! so every component is testable against in-memory fakes.

use std::sync::Arc;

use chrono::NaiveDateTime;

use crate::error::Result;
use crate::protocol::command::Command;

// ───────────────────────────────────────────────────────────────
// Link port (driven adapter: byte stream to the board)
// ───────────────────────────────────────────────────────────────

/// Line-oriented connection to the peripheral board.
///
/// Implementations are single-owner; share one through
/// [`SharedLink`](crate::adapters::shared_link::SharedLink).
pub trait Link: Send {
    /// Open the connection if it is not already open.
    fn ensure_open(&mut self) -> Result<()>;

    /// Whether the connection is currently open.
    fn is_open(&self) -> bool;

    /// Send one line. The terminator is added by the implementation.
    fn send_line(&mut self, line: &str) -> Result<()>;

    /// Return the next complete line if one is available. Never blocks
    /// longer than the port's read timeout.
    fn try_receive_line(&mut self) -> Result<Option<String>>;

    /// Close the connection. The next call to any other method reopens it.
    fn close(&mut self);
}

// ───────────────────────────────────────────────────────────────
// Command sink (domain → link)
// ───────────────────────────────────────────────────────────────

/// Write side used by the rule engine and display routines.
pub trait CommandSink: Send + Sync {
    /// Send one raw line.
    fn send_line(&self, line: &str) -> Result<()>;

    /// Send a typed command.
    fn send(&self, cmd: &Command) -> Result<()> {
        self.send_line(&cmd.to_string())
    }
}

impl<T: CommandSink + ?Sized> CommandSink for Arc<T> {
    fn send_line(&self, line: &str) -> Result<()> {
        (**self).send_line(line)
    }
}

// ───────────────────────────────────────────────────────────────
// Wall clock
// ───────────────────────────────────────────────────────────────

/// Source of local wall time for clock routines.
pub trait WallClock: Send + Sync {
    fn now(&self) -> NaiveDateTime;
}

impl<T: WallClock + ?Sized> WallClock for Arc<T> {
    fn now(&self) -> NaiveDateTime {
        (**self).now()
    }
}
