//! Ingestion: classification, ordering, backoff and stop.

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use periphctl::ingest::{Ingestion, Step};
use periphctl::rules::{ActionSpec, RuleEngine, TriggerKind, TriggerRule};
use periphctl::telemetry::TelemetryStore;

use crate::mock_link::{LinkTap, eventually, fast_timing, scripted_link};

struct Rig {
    ingestion: Ingestion,
    telemetry: Arc<TelemetryStore>,
    rules: Arc<RuleEngine>,
    tap: LinkTap,
}

fn rig() -> Rig {
    let (link, tap) = scripted_link();
    let telemetry = Arc::new(TelemetryStore::new());
    let rules = Arc::new(RuleEngine::new());
    let ingestion = Ingestion::new(link, Arc::clone(&telemetry), Arc::clone(&rules), fast_timing());
    Rig {
        ingestion,
        telemetry,
        rules,
        tap,
    }
}

#[test]
fn telemetry_lines_update_state() {
    let r = rig();
    for line in ["TIMER:REMAINING:90", "CLOCK:LCD:08:00:00", "DISTANCE:42.5"] {
        r.tap.push(line);
        assert_eq!(r.ingestion.step(), Step::Handled);
    }
    let s = r.telemetry.read();
    assert_eq!(s.timer_remaining_secs, 90);
    assert!(s.timer_active);
    assert_eq!(s.clock_mirror.as_deref(), Some("08:00:00"));
    assert_eq!(s.distance_cm, Some(42.5));

    r.tap.push("COUNTDOWN:FINISHED");
    r.ingestion.step();
    let s = r.telemetry.read();
    assert_eq!(s.timer_remaining_secs, 0);
    assert!(!s.timer_active);
}

#[test]
fn lines_are_processed_in_arrival_order() {
    let r = rig();
    for secs in [5, 4, 3] {
        r.tap.push(&format!("TIMER:REMAINING:{secs}"));
    }
    while r.ingestion.step() == Step::Handled {}
    assert_eq!(r.telemetry.read().timer_remaining_secs, 3);
}

#[test]
fn non_telemetry_lines_touch_nothing() {
    let r = rig();
    r.rules
        .register(TriggerRule::one_shot(TriggerKind::TimerZero, ActionSpec::Beep(1)).unwrap())
        .unwrap();
    let before = r.telemetry.read();
    for line in ["OK:LED:ON", "ERROR:Unknown command", "STATUS:LED=ON", "ULTRA:12.3", "hello"] {
        r.tap.push(line);
        assert_eq!(r.ingestion.step(), Step::Handled);
    }
    assert_eq!(r.telemetry.read(), before);
    assert_eq!(r.rules.len(), 1);
    assert_eq!(r.ingestion.stats().events.load(Ordering::Relaxed), 0);
    assert_eq!(r.ingestion.stats().lines.load(Ordering::Relaxed), 5);
}

#[test]
fn malformed_payload_is_dropped_and_counted() {
    let r = rig();
    r.tap.push("DISTANCE:far");
    r.tap.push("TIMER:REMAINING:-3");
    assert_eq!(r.ingestion.step(), Step::Failed);
    assert_eq!(r.ingestion.step(), Step::Failed);
    assert_eq!(r.ingestion.step(), Step::Idle);
    assert_eq!(r.ingestion.stats().parse_errors.load(Ordering::Relaxed), 2);
    assert!(r.telemetry.read().distance_cm.is_none());
}

#[test]
fn event_reaches_rules_after_state_update() {
    let r = rig();
    r.rules
        .register(
            TriggerRule::one_shot(TriggerKind::DistanceBelow(10.0), ActionSpec::Beep(500)).unwrap(),
        )
        .unwrap();
    r.tap.push("DISTANCE:8.0");
    r.ingestion.step();
    assert_eq!(r.telemetry.read().distance_cm, Some(8.0));
    assert_eq!(r.tap.sent(), ["BUZZER:BEEP:500"]);
    assert!(r.rules.is_empty());
}

#[test]
fn read_errors_back_off_and_recover() {
    let r = rig();
    r.tap.fail_next_reads(3);
    r.tap.push("DISTANCE:12.0");

    let telemetry = Arc::clone(&r.telemetry);
    let stats = r.ingestion.stats();
    let mut handle = r.ingestion.spawn().unwrap();
    assert!(eventually(Duration::from_secs(2), || {
        telemetry.read().distance_cm == Some(12.0)
    }));
    assert!(handle.is_running());
    assert_eq!(stats.link_errors.load(Ordering::Relaxed), 3);
    handle.stop();
    assert!(!handle.is_running());
}

#[test]
fn nothing_changes_after_stop_returns() {
    let r = rig();
    let telemetry = Arc::clone(&r.telemetry);
    let tap = r.tap.clone();
    let mut handle = r.ingestion.spawn().unwrap();

    tap.push("CLOCK:LCD:10:00:00");
    assert!(eventually(Duration::from_secs(2), || telemetry.read().clock_mirror.is_some()));
    handle.stop();

    tap.push("CLOCK:LCD:10:00:01");
    std::thread::sleep(Duration::from_millis(30));
    assert_eq!(telemetry.read().clock_mirror.as_deref(), Some("10:00:00"));
    assert_eq!(tap.inbound_len(), 1);
}
