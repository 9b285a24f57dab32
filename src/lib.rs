//! periphctl: serial remote control and reactive automation for a
//! microcontroller peripheral board (LED, buzzer, 16x2 LCD, TM1637
//! four-digit display, ultrasonic distance sensor).
//!
//! The board streams status lines; [`ingest`] turns them into
//! [`telemetry`] updates and feeds the [`rules`] engine, which fires
//! "when C then A" actions back over the same link. [`display`] runs the
//! host-driven clock, stopwatch and countdown routines, one per display.
//! [`app::service::ControlService`] ties it together for a front end.

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod config;
pub mod console;
pub mod display;
pub mod error;
pub mod ingest;
pub mod protocol;
pub mod rules;
pub mod task;
pub mod telemetry;

pub use error::{Error, Result};
