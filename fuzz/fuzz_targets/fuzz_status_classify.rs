//! Fuzz target: `classify`
//!
//! Any UTF-8 text must classify or fail with a `ParseError`, never
//! panic. Telemetry results must carry sane payloads.
//!
//! cargo fuzz run fuzz_status_classify

#![no_main]

use libfuzzer_sys::fuzz_target;
use periphctl::app::events::TelemetryEvent;
use periphctl::protocol::status::{Inbound, classify};

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    match classify(text) {
        Ok(Inbound::Telemetry(TelemetryEvent::DistanceReport(cm))) => assert!(cm.is_finite()),
        Ok(Inbound::Telemetry(TelemetryEvent::ClockReport(clock))) => assert!(!clock.is_empty()),
        Ok(Inbound::SensorReply(cm)) => assert!(cm.is_finite()),
        Ok(_) => {}
        Err(e) => assert!(!e.reason.is_empty()),
    }
});
