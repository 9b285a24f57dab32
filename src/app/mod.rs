//! Application layer: port traits, inbound events and the control facade.
//!
//! The automation core only talks to the outside world through the
//! traits in [`ports`]; [`service::ControlService`] wires the concrete
//! adapters to the core.

pub mod events;
pub mod ports;
pub mod service;
