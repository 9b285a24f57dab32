//! Serial port adapter.
//!
//! Implements [`Link`] on top of the `serialport` crate. The port is
//! opened lazily and dropped on any I/O failure, so the next call
//! reconnects. Opening the port resets the board (DTR toggle), so every
//! open waits `reset_delay_ms` before the first command goes out.

use std::io::{ErrorKind, Read, Write};
use std::time::Duration;

use log::{info, warn};
use serialport::SerialPort;

use crate::app::ports::Link;
use crate::config::LinkConfig;
use crate::error::{ConnectionError, Result};
use crate::protocol::codec::{LineDecoder, encode_line};

const READ_CHUNK: usize = 256;

/// Serial connection to the peripheral board.
pub struct SerialLink {
    config: LinkConfig,
    port: Option<Box<dyn SerialPort>>,
    decoder: LineDecoder,
}

impl SerialLink {
    /// Create a closed link. Nothing is opened until first use.
    pub fn new(config: LinkConfig) -> Self {
        Self {
            config,
            port: None,
            decoder: LineDecoder::new(),
        }
    }

    pub fn port_name(&self) -> &str {
        &self.config.port
    }

    /// Drop the port after a failure and report it.
    fn fail(&mut self, what: &str, err: &std::io::Error) -> ConnectionError {
        warn!("Link {}: {} failed ({}), closing", self.config.port, what, err);
        self.port = None;
        self.decoder.reset();
        ConnectionError::Io(format!("{what}: {err}"))
    }
}

impl Link for SerialLink {
    fn ensure_open(&mut self) -> Result<()> {
        if self.port.is_some() {
            return Ok(());
        }

        info!(
            "Link: opening {} @ {} baud",
            self.config.port, self.config.baud_rate
        );
        let port = serialport::new(&self.config.port, self.config.baud_rate)
            .timeout(Duration::from_millis(self.config.read_timeout_ms))
            .open()
            .map_err(|e| ConnectionError::OpenFailed {
                port: self.config.port.clone(),
                reason: e.to_string(),
            })?;

        std::thread::sleep(Duration::from_millis(self.config.reset_delay_ms));
        self.decoder.reset();
        self.port = Some(port);
        info!("Link: connected to {}", self.config.port);
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.port.is_some()
    }

    fn send_line(&mut self, line: &str) -> Result<()> {
        self.ensure_open()?;
        let bytes = encode_line(line);
        let result = match self.port.as_mut() {
            Some(port) => port.write_all(&bytes).and_then(|()| port.flush()),
            None => return Err(ConnectionError::Closed.into()),
        };
        result.map_err(|e| self.fail("write", &e).into())
    }

    fn try_receive_line(&mut self) -> Result<Option<String>> {
        if let Some(line) = self.decoder.next_line() {
            return Ok(Some(line));
        }
        self.ensure_open()?;

        let mut buf = [0u8; READ_CHUNK];
        let result = match self.port.as_mut() {
            Some(port) => match port.bytes_to_read() {
                Ok(0) => return Ok(None),
                Ok(waiting) => port.read(&mut buf[..(waiting as usize).min(READ_CHUNK)]),
                Err(e) => Err(std::io::Error::other(e)),
            },
            None => return Err(ConnectionError::Closed.into()),
        };

        match result {
            Ok(0) => Ok(None),
            Ok(n) => {
                self.decoder.feed(&buf[..n]);
                Ok(self.decoder.next_line())
            }
            Err(e) if e.kind() == ErrorKind::TimedOut => Ok(None),
            Err(e) => Err(self.fail("read", &e).into()),
        }
    }

    fn close(&mut self) {
        if self.port.take().is_some() {
            info!("Link: closed {}", self.config.port);
        }
        self.decoder.reset();
    }
}
