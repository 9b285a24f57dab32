//! Newline-delimited line codec.
//!
//! Wire format: one ASCII command or status report per line,
//! terminated by `\n` (the board's `Serial.println` also emits `\r`).
//!
//! The decoder accumulates incoming bytes and yields complete lines.
//! A single port read may return part of a line, one line, or several
//! lines concatenated; all three are handled.

use std::collections::VecDeque;

/// Maximum accepted line length in bytes. Longer lines are dropped.
pub const MAX_LINE_LEN: usize = 256;

/// Decoder state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DecoderState {
    /// Accumulating bytes of the current line.
    Collecting,
    /// Current line overflowed; skip until the next newline.
    Discarding,
}

/// Streaming line decoder.
pub struct LineDecoder {
    state: DecoderState,
    buf: heapless::Vec<u8, MAX_LINE_LEN>,
    ready: VecDeque<String>,
    dropped: u32,
}

impl Default for LineDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl LineDecoder {
    pub fn new() -> Self {
        Self {
            state: DecoderState::Collecting,
            buf: heapless::Vec::new(),
            ready: VecDeque::new(),
            dropped: 0,
        }
    }

    /// Feed raw bytes. Completed, non-blank lines are queued for
    /// [`next_line`](Self::next_line) in arrival order.
    pub fn feed(&mut self, data: &[u8]) {
        for &byte in data {
            match (self.state, byte) {
                (DecoderState::Discarding, b'\n') => {
                    self.state = DecoderState::Collecting;
                }
                (DecoderState::Discarding, _) => {}
                (DecoderState::Collecting, b'\n') => self.finish_line(),
                (DecoderState::Collecting, b'\r') => {}
                (DecoderState::Collecting, _) => {
                    if self.buf.push(byte).is_err() {
                        // Overlong line: drop what we have and skip the rest.
                        self.buf.clear();
                        self.dropped = self.dropped.saturating_add(1);
                        self.state = DecoderState::Discarding;
                    }
                }
            }
        }
    }

    /// Pop the oldest complete line.
    pub fn next_line(&mut self) -> Option<String> {
        self.ready.pop_front()
    }

    /// Number of complete lines waiting.
    pub fn pending(&self) -> usize {
        self.ready.len()
    }

    /// Lines discarded for exceeding [`MAX_LINE_LEN`].
    pub fn dropped(&self) -> u32 {
        self.dropped
    }

    /// Reset decoder state (e.g. after a reconnect). Queued lines are discarded.
    pub fn reset(&mut self) {
        self.state = DecoderState::Collecting;
        self.buf.clear();
        self.ready.clear();
    }

    fn finish_line(&mut self) {
        let line = String::from_utf8_lossy(&self.buf).trim().to_string();
        self.buf.clear();
        if !line.is_empty() {
            self.ready.push_back(line);
        }
    }
}

/// Encode one outbound line: the text plus the `\n` terminator.
///
/// Embedded newlines would split the command on the device side, so they
/// are replaced with spaces.
pub fn encode_line(line: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(line.len() + 1);
    out.extend(line.bytes().map(|b| if b == b'\n' || b == b'\r' { b' ' } else { b }));
    out.push(b'\n');
    out
}
