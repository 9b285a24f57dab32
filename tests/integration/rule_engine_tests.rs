//! Rule engine behaviour under concurrency and through the ingestion path.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use periphctl::app::events::TelemetryEvent;
use periphctl::rules::{ActionSpec, RuleEngine, TriggerKind, TriggerRule};

use crate::mock_link::scripted_link;

fn timer_rule(ms: u32) -> TriggerRule {
    TriggerRule::one_shot(TriggerKind::TimerZero, ActionSpec::Beep(ms)).unwrap()
}

#[test]
fn concurrent_registration_then_one_event_fires_all_in_order() {
    let engine = Arc::new(RuleEngine::new());
    let (link, tap) = scripted_link();

    // Noise events run alongside registration to exercise the lock.
    let noise_done = Arc::new(AtomicBool::new(false));
    let noise = {
        let engine = Arc::clone(&engine);
        let link = link.clone();
        let done = Arc::clone(&noise_done);
        std::thread::spawn(move || {
            while !done.load(Ordering::SeqCst) {
                engine.on_event(&TelemetryEvent::DistanceReport(500.0), &link);
                engine.on_event(&TelemetryEvent::ClockReport("00:00:00".into()), &link);
            }
        })
    };

    let registrars: Vec<_> = (0..8u32)
        .map(|t| {
            let engine = Arc::clone(&engine);
            std::thread::spawn(move || {
                for i in 0..25u32 {
                    engine.register(timer_rule(t * 1000 + i + 1)).unwrap();
                }
            })
        })
        .collect();
    for r in registrars {
        r.join().unwrap();
    }
    noise_done.store(true, Ordering::SeqCst);
    noise.join().unwrap();

    assert_eq!(engine.len(), 200);
    assert!(tap.sent().is_empty());

    let expected: Vec<String> = engine
        .snapshot()
        .iter()
        .map(|p| match &p.rule.action {
            Some(ActionSpec::Beep(ms)) => format!("BUZZER:BEEP:{ms}"),
            other => panic!("unexpected action {other:?}"),
        })
        .collect();
    let ids: Vec<_> = engine.snapshot().iter().map(|p| p.id).collect();

    let report = engine.on_event(&TelemetryEvent::TimerFinished, &link);
    assert_eq!(report.fired, ids, "fired in registration order");
    assert!(report.failed.is_empty());
    assert_eq!(tap.sent(), expected);
    assert!(engine.is_empty());
}

#[test]
fn registration_racing_with_firing_loses_and_duplicates_nothing() {
    let engine = Arc::new(RuleEngine::new());
    let (link, tap) = scripted_link();

    let stop = Arc::new(AtomicBool::new(false));
    let firer = {
        let engine = Arc::clone(&engine);
        let link = link.clone();
        let stop = Arc::clone(&stop);
        std::thread::spawn(move || {
            while !stop.load(Ordering::SeqCst) {
                engine.on_event(&TelemetryEvent::TimerFinished, &link);
                std::thread::yield_now();
            }
        })
    };

    let registrars: Vec<_> = (0..4u32)
        .map(|t| {
            let engine = Arc::clone(&engine);
            std::thread::spawn(move || {
                for i in 0..100u32 {
                    engine.register(timer_rule(t * 1000 + i + 1)).unwrap();
                }
            })
        })
        .collect();
    for r in registrars {
        r.join().unwrap();
    }
    stop.store(true, Ordering::SeqCst);
    firer.join().unwrap();

    // Whatever the firer missed fires now.
    engine.on_event(&TelemetryEvent::TimerFinished, &link);
    assert!(engine.is_empty());

    let sent = tap.sent();
    assert_eq!(sent.len(), 400);
    let unique: HashSet<_> = sent.iter().collect();
    assert_eq!(unique.len(), 400, "no rule fired twice");
}

#[test]
fn mixed_rules_only_the_matching_kind_fires() {
    let engine = RuleEngine::new();
    let (link, tap) = scripted_link();

    engine.register(timer_rule(100)).unwrap();
    engine
        .register(
            TriggerRule::one_shot(
                TriggerKind::ClockEquals("12:00:00".into()),
                ActionSpec::Blink(250),
            )
            .unwrap(),
        )
        .unwrap();
    engine
        .register(TriggerRule::one_shot(TriggerKind::DistanceBelow(20.0), ActionSpec::Beep(50)).unwrap())
        .unwrap();
    engine.register(TriggerRule::distance_echo()).unwrap();

    engine.on_event(&TelemetryEvent::ClockReport("12:00:00".into()), &link);
    assert_eq!(tap.sent(), ["LED:BLINK:250"]);
    assert_eq!(engine.len(), 3);

    tap.clear_sent();
    engine.on_event(&TelemetryEvent::DistanceReport(25.0), &link);
    engine.on_event(&TelemetryEvent::DistanceReport(15.0), &link);
    assert_eq!(
        tap.sent(),
        [
            "LCD:LINE2:25.00 cm        ",
            "BUZZER:BEEP:50",
            "LCD:LINE2:15.00 cm        ",
        ]
    );
    assert_eq!(engine.len(), 2);

    assert_eq!(engine.clear_all(), 2);
    tap.clear_sent();
    engine.on_event(&TelemetryEvent::TimerFinished, &link);
    engine.on_event(&TelemetryEvent::DistanceReport(1.0), &link);
    assert!(tap.sent().is_empty());
}

#[test]
fn failed_send_is_logged_not_retried() {
    let engine = RuleEngine::new();
    let (link, tap) = scripted_link();
    engine.register(timer_rule(500)).unwrap();

    tap.set_fail_sends(true);
    let report = engine.on_event(&TelemetryEvent::TimerFinished, &link);
    assert_eq!(report.failed.len(), 1);

    tap.set_fail_sends(false);
    engine.on_event(&TelemetryEvent::TimerFinished, &link);
    assert!(tap.sent().is_empty());
    assert!(engine.is_empty());
}
