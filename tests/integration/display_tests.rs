//! Display routines: supersession, self-termination and stop latency.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::NaiveDate;
use periphctl::adapters::clock::FixedClock;
use periphctl::app::ports::CommandSink;
use periphctl::config::TimingConfig;
use periphctl::display::{DisplayManager, RoutineKind, RoutineState, Slot};

use crate::mock_link::{LinkTap, eventually, fast_timing, scripted_link};

fn manager(timing: TimingConfig) -> (DisplayManager, LinkTap) {
    let (link, tap) = scripted_link();
    let clock = FixedClock(
        NaiveDate::from_ymd_opt(2025, 12, 7)
            .and_then(|d| d.and_hms_opt(14, 30, 45))
            .unwrap(),
    );
    let sink: Arc<dyn CommandSink> = Arc::new(link);
    (DisplayManager::new(sink, Arc::new(clock), timing), tap)
}

#[test]
fn countdown_from_three_seconds_alerts_and_finishes() {
    let (displays, tap) = manager(fast_timing());
    displays
        .start(Slot::NumericDisplay, RoutineKind::Countdown { minutes: 0, seconds: 3 })
        .unwrap();

    assert!(eventually(Duration::from_secs(2), || {
        displays.state(Slot::NumericDisplay) == Some(RoutineState::Stopped)
    }));
    assert_eq!(
        tap.sent(),
        [
            "TM1637:NUM:0003",
            "TM1637:NUM:0002",
            "TM1637:NUM:0001",
            "BUZZER:BEEP:300",
            "BUZZER:BEEP:300",
            "BUZZER:BEEP:300",
        ]
    );
    assert!(displays.running().is_empty());
}

#[test]
fn minutes_roll_over_in_mmss() {
    let (displays, tap) = manager(fast_timing());
    displays
        .start(Slot::NumericDisplay, RoutineKind::Countdown { minutes: 1, seconds: 1 })
        .unwrap();
    assert!(tap.wait_for(Duration::from_secs(2), |s| s.len() >= 3));
    displays.stop(Slot::NumericDisplay);
    let sent = tap.sent();
    assert_eq!(&sent[..3], ["TM1637:NUM:0101", "TM1637:NUM:0100", "TM1637:NUM:0059"]);
}

#[test]
fn superseding_routine_never_interleaves_with_the_old_one() {
    let (displays, tap) = manager(fast_timing());
    displays
        .start(Slot::NumericDisplay, RoutineKind::Countdown { minutes: 99, seconds: 0 })
        .unwrap();
    assert!(tap.wait_for(Duration::from_secs(2), |s| s.len() >= 3));

    displays.start(Slot::NumericDisplay, RoutineKind::Stopwatch).unwrap();
    assert_eq!(displays.state(Slot::NumericDisplay), Some(RoutineState::Running));
    assert_eq!(displays.running(), [(Slot::NumericDisplay, RoutineKind::Stopwatch)]);

    assert!(tap.wait_for(Duration::from_secs(2), |s| {
        s.iter().filter(|l| *l == "TM1637:NUM:0000").count() >= 2
    }));
    displays.stop(Slot::NumericDisplay);

    let sent = tap.sent();
    let first_stopwatch = sent.iter().position(|l| l == "TM1637:NUM:0000").unwrap();
    assert!(first_stopwatch > 0);
    assert!(
        sent[..first_stopwatch].iter().all(|l| l.starts_with("TM1637:NUM:98") || l.starts_with("TM1637:NUM:99")),
        "only countdown writes before the takeover: {sent:?}"
    );
    assert!(
        sent[first_stopwatch..].iter().all(|l| l.starts_with("TM1637:NUM:00")),
        "no countdown write after the takeover: {sent:?}"
    );
}

#[test]
fn slots_are_independent() {
    let (displays, tap) = manager(fast_timing());
    displays.start(Slot::NumericDisplay, RoutineKind::LiveClock).unwrap();
    displays.start(Slot::CharacterDisplay, RoutineKind::LiveClock).unwrap();
    assert_eq!(displays.running().len(), 2);

    assert!(tap.wait_for(Duration::from_secs(2), |s| {
        s.iter().any(|l| l == "TM1637:NUM:1430")
            && s.iter().any(|l| l == "LCD:LINE1:14:30:45")
            && s.iter().any(|l| l == "LCD:LINE2:07/12/2025 Sun")
    }));

    assert!(displays.stop(Slot::CharacterDisplay));
    assert_eq!(displays.running(), [(Slot::NumericDisplay, RoutineKind::LiveClock)]);
    displays.stop_all();
    assert!(displays.running().is_empty());
}

#[test]
fn character_stopwatch_labels_then_counts() {
    let (displays, tap) = manager(fast_timing());
    displays.start(Slot::CharacterDisplay, RoutineKind::Stopwatch).unwrap();
    assert!(tap.wait_for(Duration::from_secs(2), |s| s.len() >= 2));
    displays.stop(Slot::CharacterDisplay);
    let sent = tap.sent();
    assert_eq!(sent[0], "LCD:LINE1:Stopwatch:");
    assert_eq!(sent[1], "LCD:LINE2:00:00:00");
}

#[test]
fn stop_is_bounded_by_one_write_not_the_refresh() {
    let timing = TimingConfig {
        refresh_ms: 60_000,
        ..fast_timing()
    };
    let (displays, tap) = manager(timing);
    displays.start(Slot::NumericDisplay, RoutineKind::LiveClock).unwrap();
    assert!(tap.wait_for(Duration::from_secs(2), |s| !s.is_empty()));

    let started = Instant::now();
    assert!(displays.stop(Slot::NumericDisplay));
    assert!(started.elapsed() < Duration::from_secs(2));
    assert_eq!(displays.state(Slot::NumericDisplay), None);
}

#[test]
fn rejected_start_leaves_the_current_routine_running() {
    let (displays, _tap) = manager(fast_timing());
    displays.start(Slot::CharacterDisplay, RoutineKind::LiveClock).unwrap();

    let err = displays
        .start(Slot::CharacterDisplay, RoutineKind::Countdown { minutes: 1, seconds: 0 })
        .unwrap_err();
    assert!(err.to_string().contains("numeric display"));
    assert!(displays
        .start(Slot::NumericDisplay, RoutineKind::Countdown { minutes: 100, seconds: 0 })
        .is_err());

    assert_eq!(displays.running(), [(Slot::CharacterDisplay, RoutineKind::LiveClock)]);
}

#[test]
fn stopping_an_idle_slot_is_a_no_op() {
    let (displays, tap) = manager(fast_timing());
    assert!(!displays.stop(Slot::NumericDisplay));
    assert_eq!(displays.state(Slot::NumericDisplay), None);
    assert!(tap.sent().is_empty());
}

#[test]
fn stopping_a_finished_countdown_reports_not_running() {
    let (displays, _tap) = manager(fast_timing());
    displays
        .start(Slot::NumericDisplay, RoutineKind::Countdown { minutes: 0, seconds: 1 })
        .unwrap();
    assert!(eventually(Duration::from_secs(2), || {
        displays.state(Slot::NumericDisplay) == Some(RoutineState::Stopped)
    }));
    assert!(!displays.stop(Slot::NumericDisplay));
}
