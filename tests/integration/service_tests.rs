//! End-to-end through `ControlService` with a running ingestion thread.

use std::sync::Arc;
use std::time::Duration;

use periphctl::adapters::clock::LocalClock;
use periphctl::app::service::ControlService;
use periphctl::console;
use periphctl::display::{RoutineKind, Slot};
use periphctl::error::Error;
use periphctl::rules::TriggerKind;

use crate::mock_link::{LinkTap, eventually, fast_timing, scripted_link};

fn service() -> (ControlService, LinkTap) {
    let (link, tap) = scripted_link();
    let mut service = ControlService::new(link, Arc::new(LocalClock::new()), fast_timing());
    service.start().unwrap();
    (service, tap)
}

#[test]
fn timer_finish_beeps_exactly_once() {
    let (service, tap) = service();
    service.when_timer_finishes("buzzer_beep", "500").unwrap();

    tap.push("TIMER:REMAINING:1");
    tap.push("COUNTDOWN:FINISHED");
    assert!(tap.wait_for(Duration::from_secs(2), |s| s.iter().any(|l| l == "BUZZER:BEEP:500")));

    tap.push("COUNTDOWN:FINISHED");
    std::thread::sleep(Duration::from_millis(30));
    assert_eq!(tap.count("BUZZER:BEEP:500"), 1);
    assert!(service
        .pending()
        .iter()
        .all(|p| p.rule.kind != TriggerKind::TimerZero));
    assert!(!service.telemetry().timer_active);
}

#[test]
fn clock_rule_starts_a_board_countdown() {
    let (service, tap) = service();
    service.when_time_equals("07:15:00", "start_timer", "02:00").unwrap();

    tap.push("CLOCK:LCD:07:14:59");
    tap.push("CLOCK:LCD:07:15:00");
    assert!(tap.wait_for(Duration::from_secs(2), |s| s.iter().any(|l| l == "TM1637:COUNTDOWN:120")));
    assert!(service.pending().is_empty());
}

#[test]
fn board_clock_reports_fire_time_rules() {
    let (service, tap) = service();
    service.when_time_equals("07:15:00", "buzzer_beep", "400").unwrap();
    tap.reply_to("LCD:CLOCK:", "CLOCK:LCD:07:14:59");
    tap.reply_to("LCD:CLOCK:", "CLOCK:LCD:07:15:00");

    service.lcd_show_current_time().unwrap();
    assert!(tap.wait_for(Duration::from_secs(2), |s| s.iter().any(|l| l == "BUZZER:BEEP:400")));
    assert!(tap.sent()[0].starts_with("LCD:CLOCK:"));
    assert!(service.pending().is_empty());
    assert_eq!(service.telemetry().clock_mirror.as_deref(), Some("07:15:00"));
}

#[test]
fn board_clock_takes_the_slot_from_a_host_routine() {
    let (service, tap) = service();
    service.start_routine(Slot::NumericDisplay, RoutineKind::Stopwatch).unwrap();
    assert!(tap.wait_for(Duration::from_secs(2), |s| !s.is_empty()));

    service.display_start_stopwatch().unwrap();
    assert!(service.displays().running().is_empty());
    assert_eq!(tap.sent().last().map(String::as_str), Some("TM1637:STOPWATCH:START"));
    std::thread::sleep(Duration::from_millis(30));
    assert_eq!(tap.sent().last().map(String::as_str), Some("TM1637:STOPWATCH:START"));

    service.display_stop_stopwatch().unwrap();
    service.lcd_start_stopwatch().unwrap();
    service.lcd_stop_stopwatch().unwrap();
    let sent = tap.sent();
    assert_eq!(
        &sent[sent.len() - 3..],
        ["TM1637:STOPWATCH:STOP", "LCD:STOPWATCH:START", "LCD:STOPWATCH:STOP"]
    );
    service.display_current_time().unwrap();
    assert!(tap.sent().last().is_some_and(|l| l.starts_with("TM1637:CLOCK:")));
}

#[test]
fn live_distance_echo_until_cleared() {
    let (service, tap) = service();
    service.show_live_distance_on_lcd().unwrap();
    assert_eq!(tap.sent(), ["ULTRA:START", "LCD:LINE1:Distance:"]);

    tap.push("DISTANCE:12.5");
    assert!(tap.wait_for(Duration::from_secs(2), |s| s.iter().any(|l| l == "LCD:LINE2:12.50 cm        ")));
    assert_eq!(service.pending().len(), 1);

    assert_eq!(service.clear_pending(), 1);
    tap.clear_sent();
    tap.push("DISTANCE:99.0");
    assert!(eventually(Duration::from_secs(2), || service.telemetry().distance_cm == Some(99.0)));
    std::thread::sleep(Duration::from_millis(20));
    assert!(tap.sent().is_empty());
}

#[test]
fn direct_commands_render_the_wire_protocol() {
    let (service, tap) = service();
    service.led_blink(250).unwrap();
    service.buzzer_beep(100).unwrap();
    service.lcd_write(2, "Hello").unwrap();
    service.lcd_message("A", "B").unwrap();
    service.display_number(-42).unwrap();
    service.display_time("0915").unwrap();
    service.display_brightness(99).unwrap();
    service.start_device_countdown(1, 30).unwrap();
    service.ultrasonic_read().unwrap();
    service.request_device_status().unwrap();
    assert_eq!(
        tap.sent(),
        [
            "LED:BLINK:250",
            "BUZZER:BEEP:100",
            "LCD:LINE2:Hello",
            "LCD:LINE1:A",
            "LCD:LINE2:B",
            "TM1637:NUM:-42",
            "TM1637:NUM:0915",
            "TM1637:BRIGHTNESS:15",
            "TM1637:COUNTDOWN:90",
            "ULTRA:READ",
            "STATUS",
        ]
    );
}

#[test]
fn invalid_requests_fail_and_send_nothing() {
    let (service, tap) = service();
    assert!(matches!(service.display_number(10_000), Err(Error::Validation(_))));
    assert!(service.lcd_write(3, "x").is_err());
    assert!(service.display_time("9:15").is_err());
    assert!(service.start_device_countdown(100, 0).is_err());
    assert!(service.when_time_equals("7:15", "buzzer_beep", "").is_err());
    assert!(service.when_timer_finishes("dance", "").is_err());
    assert!(service.when_distance_less_than(f32::NAN, "buzzer_beep", "").is_err());
    assert!(service
        .start_routine(Slot::CharacterDisplay, RoutineKind::Countdown { minutes: 1, seconds: 0 })
        .is_err());
    assert!(tap.sent().is_empty());
    assert!(service.pending().is_empty());
}

#[test]
fn all_off_stops_routines_then_silences_everything() {
    let (service, tap) = service();
    service.start_routine(Slot::NumericDisplay, RoutineKind::Stopwatch).unwrap();
    service.start_routine(Slot::CharacterDisplay, RoutineKind::LiveClock).unwrap();
    assert!(tap.wait_for(Duration::from_secs(2), |s| s.len() >= 3));

    service.all_off().unwrap();
    assert!(service.displays().running().is_empty());
    let sent = tap.sent();
    assert_eq!(
        &sent[sent.len() - 5..],
        ["LED:OFF", "BUZZER:OFF", "LCD:CLEAR", "TM1637:CLEAR", "ULTRA:STOP"]
    );
    std::thread::sleep(Duration::from_millis(30));
    assert_eq!(tap.sent().len(), sent.len(), "no routine writes after all-off");
}

#[test]
fn failed_live_distance_setup_leaves_no_rule() {
    let (service, tap) = service();
    tap.fail_sends_after(1);
    assert!(service.show_live_distance_on_lcd().unwrap_err().is_connection());
    assert_eq!(tap.sent(), ["ULTRA:START"]);
    assert!(service.pending().is_empty());

    tap.push("DISTANCE:12.5");
    assert!(eventually(Duration::from_secs(2), || service.telemetry().distance_cm == Some(12.5)));
    std::thread::sleep(Duration::from_millis(20));
    assert_eq!(tap.sent(), ["ULTRA:START"]);
}

#[test]
fn send_failure_is_a_connection_error() {
    let (service, tap) = service();
    tap.set_fail_sends(true);
    let err = service.led_on().unwrap_err();
    assert!(err.is_connection());
    assert!(service.all_off().is_err());
}

#[test]
fn status_reports_everything() {
    let (service, tap) = service();
    service.when_distance_less_than(10.0, "led_blink", "200").unwrap();
    service.start_routine(Slot::NumericDisplay, RoutineKind::LiveClock).unwrap();
    tap.push("TIMER:REMAINING:75");
    tap.push("DISTANCE:25.0");
    assert!(eventually(Duration::from_secs(2), || service.telemetry().distance_cm.is_some()));

    let report = service.status();
    assert_eq!(report.pending.len(), 1);
    assert_eq!(report.routines, [(Slot::NumericDisplay, RoutineKind::LiveClock)]);
    let text = report.to_string();
    assert!(text.contains("Timer: ACTIVE - 01:15 remaining"), "{text}");
    assert!(text.contains("Distance: 25.00 cm (CLOSE)"), "{text}");
    assert!(text.contains("1. when distance < 10cm: blink 200ms"), "{text}");
    assert!(text.contains("NumericDisplay=clock"), "{text}");
}

#[test]
fn console_lines_drive_the_service() {
    let (service, tap) = service();
    for line in ["led on", "when timer buzzer_beep 250", "display 7"] {
        let cmd = console::parse(line).unwrap();
        console::execute(&service, cmd).unwrap();
    }
    assert_eq!(tap.sent(), ["LED:ON", "TM1637:NUM:7"]);
    let listing = console::execute(&service, console::parse("rules").unwrap()).unwrap();
    assert!(listing.contains("beep 250ms"));
    let cleared = console::execute(&service, console::parse("rules clear").unwrap()).unwrap();
    assert_eq!(cleared, "ok: cleared 1 rule(s)");
}

#[test]
fn console_prompts_again_after_every_line() {
    let (service, tap) = service();
    let input = "led dance\nled on\nexit\nled off\n";
    let mut out = Vec::new();
    console::run(&service, input.as_bytes(), &mut out).unwrap();

    let out = String::from_utf8(out).unwrap();
    assert_eq!(
        out,
        "> error: validation: usage: led on|off|toggle|blink [ms]\n> ok: LED on\n> "
    );
    assert_eq!(tap.sent(), ["LED:ON"], "nothing runs after exit");
}

#[test]
fn shutdown_closes_the_link() {
    let (mut service, tap) = service();
    service.led_on().unwrap();
    assert!(tap.is_open());
    service.start_routine(Slot::NumericDisplay, RoutineKind::LiveClock).unwrap();
    assert!(service.shutdown());
    assert!(!tap.is_open());
    assert!(!service.shutdown(), "second shutdown is a no-op");
    assert!(service.displays().running().is_empty());
    assert!(service.test_connection().is_ok());
    assert!(tap.is_open());
}
