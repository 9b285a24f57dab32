//! Fuzz target: `LineDecoder::feed`
//!
//! Splits arbitrary input at a fuzzer-chosen point and feeds both halves,
//! asserting that every yielded line is non-blank, terminator-free and
//! bounded, and that a reset leaves nothing queued.
//!
//! cargo fuzz run fuzz_line_decoder

#![no_main]

use libfuzzer_sys::fuzz_target;
use periphctl::protocol::codec::{LineDecoder, MAX_LINE_LEN};

fuzz_target!(|data: &[u8]| {
    let split = data.first().map_or(0, |b| usize::from(*b)).min(data.len());
    let (a, b) = data.split_at(split);

    let mut decoder = LineDecoder::new();
    decoder.feed(a);
    decoder.feed(b);

    while let Some(line) = decoder.next_line() {
        assert!(!line.is_empty());
        assert!(!line.contains('\n') && !line.contains('\r'));
        // Lossy decoding may widen each invalid byte to U+FFFD (3 bytes).
        assert!(line.len() <= MAX_LINE_LEN * 3);
    }

    decoder.feed(data);
    decoder.reset();
    assert_eq!(decoder.pending(), 0);
    assert!(decoder.next_line().is_none());
});
