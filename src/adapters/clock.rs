//! Host wall-clock adapter.
//!
//! Implements [`WallClock`] with the local time zone of the machine the
//! controller runs on. The board has no RTC; the live clock routines
//! push this time to the displays once per refresh.

use chrono::NaiveDateTime;

use crate::app::ports::WallClock;

/// Local system time.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalClock;

impl LocalClock {
    pub fn new() -> Self {
        Self
    }
}

impl WallClock for LocalClock {
    fn now(&self) -> NaiveDateTime {
        chrono::Local::now().naive_local()
    }
}

/// A clock frozen at one instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDateTime);

impl WallClock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        self.0
    }
}
