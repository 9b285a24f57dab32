//! Line protocol spoken with the peripheral board.
//!
//! ```text
//!   bytes ──▶ LineDecoder ──▶ status::classify ──▶ Inbound
//!   Command ──▶ Display ──▶ encode_line ──▶ bytes
//! ```

pub mod codec;
pub mod command;
pub mod status;
