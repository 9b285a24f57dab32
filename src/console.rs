//! Interactive console: one text line in, one service call out.
//!
//! Keywords are case-insensitive; free text (LCD lines, action params)
//! is passed through as typed.

use std::io::{self, BufRead, Write};

use log::warn;

use crate::app::service::ControlService;
use crate::display::{RoutineKind, Slot};
use crate::error::{Error, Result};

/// One parsed console line.
#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleCommand {
    Empty,
    Help,
    Exit,
    LedOn,
    LedOff,
    LedToggle,
    LedBlink(u32),
    BuzzerOn,
    BuzzerOff,
    BuzzerBeep(u32),
    LcdWrite(u8, String),
    LcdClear,
    LcdBacklight(bool),
    LiveDistance,
    StartRoutine(Slot, RoutineKind),
    StopRoutine(Slot),
    DisplayNumber(i32),
    DisplayTime(String),
    DisplayClear,
    DisplayBrightness(i32),
    DeviceCountdown(u32, u32),
    BoardClock(Slot),
    BoardStopwatch(Slot, bool),
    UltraStart,
    UltraStop,
    UltraRead,
    WhenTimer { kind: String, params: String },
    WhenTime { at: String, kind: String, params: String },
    WhenDistance { cm: f32, kind: String, params: String },
    Rules,
    RulesClear,
    Status,
    DeviceStatus,
    Ping,
    AllOff,
}

pub const HELP: &str = "\
led on|off|toggle|blink [ms]
buzzer on|off|beep [ms]
lcd 1:<text> | lcd 2:<text> | lcd clear | lcd light on|off
lcd clock | lcd stopwatch | lcd stop | lcd distance
display <n> | display time HHMM | display clear | display brightness [0-15]
display clock | display stopwatch | display timer:MM:SS | display stop
display countdown MM:SS            (run by the board)
lcd board clock|stopwatch|stop     (run by the board; needed for 'when time')
display board clock|stopwatch|stop
ultra start|stop|read
when timer <action> [params]
when time HH:MM:SS <action> [params]
when distance <cm> <action> [params]
  actions: buzzer_beep [ms], start_timer MM:SS, led_blink [ms],
           display_message line1|line2, custom_command <line>
rules | rules clear | status | device | ping | alloff | help | exit";

fn board(slot: Slot, verb: Option<&str>, usage: &str) -> Result<ConsoleCommand> {
    match verb.map(str::to_ascii_lowercase).as_deref() {
        Some("clock") => Ok(ConsoleCommand::BoardClock(slot)),
        Some("stopwatch") => Ok(ConsoleCommand::BoardStopwatch(slot, true)),
        Some("stop") => Ok(ConsoleCommand::BoardStopwatch(slot, false)),
        _ => Err(bad(usage)),
    }
}

fn bad(usage: &str) -> Error {
    Error::invalid(format!("usage: {usage}"))
}

fn num<T: core::str::FromStr>(word: Option<&str>, default: T, usage: &str) -> Result<T> {
    match word {
        None => Ok(default),
        Some(w) => w.parse().map_err(|_| bad(usage)),
    }
}

fn mm_ss(text: &str, usage: &str) -> Result<(u32, u32)> {
    let (m, s) = text.split_once(':').ok_or_else(|| bad(usage))?;
    Ok((
        m.parse().map_err(|_| bad(usage))?,
        s.parse().map_err(|_| bad(usage))?,
    ))
}

/// Split off the first whitespace-delimited word.
fn word(text: &str) -> (&str, &str) {
    let text = text.trim_start();
    match text.split_once(char::is_whitespace) {
        Some((w, rest)) => (w, rest.trim_start()),
        None => (text, ""),
    }
}

/// Parse one line of console input.
pub fn parse(line: &str) -> Result<ConsoleCommand> {
    use ConsoleCommand as C;

    let (head, rest) = word(line.trim());
    let head = head.to_ascii_lowercase();
    let (sub, tail) = word(rest);
    let sub_lc = sub.to_ascii_lowercase();
    let arg = tail.split_whitespace().next();

    let cmd = match head.as_str() {
        "" => C::Empty,
        "help" | "?" => C::Help,
        "exit" | "quit" => C::Exit,
        "led" => match sub_lc.as_str() {
            "on" => C::LedOn,
            "off" => C::LedOff,
            "toggle" => C::LedToggle,
            "blink" => C::LedBlink(num(arg, 500, "led blink [ms]")?),
            _ => return Err(bad("led on|off|toggle|blink [ms]")),
        },
        "buzzer" => match sub_lc.as_str() {
            "on" => C::BuzzerOn,
            "off" => C::BuzzerOff,
            "beep" => C::BuzzerBeep(num(arg, 100, "buzzer beep [ms]")?),
            _ => return Err(bad("buzzer on|off|beep [ms]")),
        },
        "lcd" => {
            if let Some(text) = rest.strip_prefix("1:") {
                C::LcdWrite(1, text.to_string())
            } else if let Some(text) = rest.strip_prefix("2:") {
                C::LcdWrite(2, text.to_string())
            } else {
                match sub_lc.as_str() {
                    "clear" => C::LcdClear,
                    "light" => match arg.map(str::to_ascii_lowercase).as_deref() {
                        Some("on") => C::LcdBacklight(true),
                        Some("off") => C::LcdBacklight(false),
                        _ => return Err(bad("lcd light on|off")),
                    },
                    "clock" => C::StartRoutine(Slot::CharacterDisplay, RoutineKind::LiveClock),
                    "stopwatch" => {
                        C::StartRoutine(Slot::CharacterDisplay, RoutineKind::Stopwatch)
                    }
                    "stop" => C::StopRoutine(Slot::CharacterDisplay),
                    "distance" => C::LiveDistance,
                    "board" => board(Slot::CharacterDisplay, arg, "lcd board clock|stopwatch|stop")?,
                    _ => return Err(bad("lcd 1:<text>|2:<text>|clear|light|clock|stopwatch|stop|distance|board")),
                }
            }
        }
        "display" => {
            const USAGE: &str = "display <n>|time HHMM|clear|brightness|clock|stopwatch|timer:MM:SS|countdown MM:SS|stop|board";
            if let Some(t) = sub_lc.strip_prefix("timer:") {
                let (m, s) = mm_ss(t, "display timer:MM:SS")?;
                C::StartRoutine(
                    Slot::NumericDisplay,
                    RoutineKind::Countdown {
                        minutes: u8::try_from(m).map_err(|_| bad("display timer:MM:SS"))?,
                        seconds: u8::try_from(s).map_err(|_| bad("display timer:MM:SS"))?,
                    },
                )
            } else {
                match sub_lc.as_str() {
                    "clear" => C::DisplayClear,
                    "clock" => C::StartRoutine(Slot::NumericDisplay, RoutineKind::LiveClock),
                    "stopwatch" => C::StartRoutine(Slot::NumericDisplay, RoutineKind::Stopwatch),
                    "stop" => C::StopRoutine(Slot::NumericDisplay),
                    "board" => board(Slot::NumericDisplay, arg, "display board clock|stopwatch|stop")?,
                    "brightness" => C::DisplayBrightness(num(arg, 15, "display brightness [0-15]")?),
                    "time" => C::DisplayTime(arg.ok_or_else(|| bad("display time HHMM"))?.to_string()),
                    "countdown" => {
                        let t = arg.ok_or_else(|| bad("display countdown MM:SS"))?;
                        let (m, s) = mm_ss(t, "display countdown MM:SS")?;
                        C::DeviceCountdown(m, s)
                    }
                    other => C::DisplayNumber(other.parse().map_err(|_| bad(USAGE))?),
                }
            }
        }
        "ultra" => match sub_lc.as_str() {
            "start" => C::UltraStart,
            "stop" => C::UltraStop,
            "read" => C::UltraRead,
            _ => return Err(bad("ultra start|stop|read")),
        },
        "when" => {
            let (first, after) = word(tail);
            match sub_lc.as_str() {
                "timer" if !first.is_empty() => C::WhenTimer {
                    kind: first.to_string(),
                    params: after.to_string(),
                },
                "time" => {
                    let (kind, params) = word(after);
                    if first.is_empty() || kind.is_empty() {
                        return Err(bad("when time HH:MM:SS <action> [params]"));
                    }
                    C::WhenTime {
                        at: first.to_string(),
                        kind: kind.to_string(),
                        params: params.to_string(),
                    }
                }
                "distance" => {
                    let (kind, params) = word(after);
                    let cm = first
                        .parse()
                        .map_err(|_| bad("when distance <cm> <action> [params]"))?;
                    if kind.is_empty() {
                        return Err(bad("when distance <cm> <action> [params]"));
                    }
                    C::WhenDistance {
                        cm,
                        kind: kind.to_string(),
                        params: params.to_string(),
                    }
                }
                _ => return Err(bad("when timer|time|distance ...")),
            }
        }
        "rules" => match sub_lc.as_str() {
            "" => C::Rules,
            "clear" => C::RulesClear,
            _ => return Err(bad("rules [clear]")),
        },
        "status" => C::Status,
        "device" => C::DeviceStatus,
        "ping" => C::Ping,
        "alloff" => C::AllOff,
        other => {
            return Err(Error::invalid(format!(
                "unknown command '{other}', type 'help'"
            )));
        }
    };
    Ok(cmd)
}

/// Run `cmd` against `service`, returning the text to show the user.
pub fn execute(service: &ControlService, cmd: ConsoleCommand) -> Result<String> {
    use ConsoleCommand as C;

    let done = |what: &str| -> Result<String> { Ok(format!("ok: {what}")) };
    match cmd {
        C::Empty | C::Exit => Ok(String::new()),
        C::Help => Ok(HELP.to_string()),
        C::LedOn => service.led_on().and_then(|()| done("LED on")),
        C::LedOff => service.led_off().and_then(|()| done("LED off")),
        C::LedToggle => service.led_toggle().and_then(|()| done("LED toggled")),
        C::LedBlink(ms) => service.led_blink(ms).and_then(|()| done("LED blinking")),
        C::BuzzerOn => service.buzzer_on().and_then(|()| done("buzzer on")),
        C::BuzzerOff => service.buzzer_off().and_then(|()| done("buzzer off")),
        C::BuzzerBeep(ms) => service.buzzer_beep(ms).and_then(|()| done("beep")),
        C::LcdWrite(row, text) => service.lcd_write(row, &text).and_then(|()| done("LCD written")),
        C::LcdClear => service.lcd_clear().and_then(|()| done("LCD cleared")),
        C::LcdBacklight(on) => service.lcd_backlight(on).and_then(|()| done("backlight set")),
        C::LiveDistance => service
            .show_live_distance_on_lcd()
            .map(|id| format!("ok: live distance on LCD (rule {id}); 'rules clear' to stop")),
        C::StartRoutine(slot, kind) => service
            .start_routine(slot, kind)
            .map(|()| format!("ok: {kind} running on {slot:?}")),
        C::StopRoutine(slot) => Ok(if service.stop_routine(slot) {
            format!("ok: {slot:?} stopped")
        } else {
            format!("ok: nothing running on {slot:?}")
        }),
        C::DisplayNumber(n) => service.display_number(n).and_then(|()| done("number shown")),
        C::DisplayTime(t) => service.display_time(&t).and_then(|()| done("time shown")),
        C::DisplayClear => service.display_clear().and_then(|()| done("display cleared")),
        C::DisplayBrightness(l) => service
            .display_brightness(l)
            .and_then(|()| done("brightness set")),
        C::DeviceCountdown(m, s) => service
            .start_device_countdown(m, s)
            .and_then(|()| done("board countdown started")),
        C::BoardClock(Slot::CharacterDisplay) => service
            .lcd_show_current_time()
            .and_then(|()| done("board clock on LCD")),
        C::BoardClock(Slot::NumericDisplay) => service
            .display_current_time()
            .and_then(|()| done("board clock on numeric display")),
        C::BoardStopwatch(Slot::CharacterDisplay, true) => service
            .lcd_start_stopwatch()
            .and_then(|()| done("board stopwatch on LCD")),
        C::BoardStopwatch(Slot::CharacterDisplay, false) => service
            .lcd_stop_stopwatch()
            .and_then(|()| done("board stopwatch stopped")),
        C::BoardStopwatch(Slot::NumericDisplay, true) => service
            .display_start_stopwatch()
            .and_then(|()| done("board stopwatch on numeric display")),
        C::BoardStopwatch(Slot::NumericDisplay, false) => service
            .display_stop_stopwatch()
            .and_then(|()| done("board stopwatch stopped")),
        C::UltraStart => service.ultrasonic_start().and_then(|()| done("sensor streaming")),
        C::UltraStop => service.ultrasonic_stop().and_then(|()| done("sensor stopped")),
        C::UltraRead => service.ultrasonic_read().and_then(|()| done("reading requested")),
        C::WhenTimer { kind, params } => service
            .when_timer_finishes(&kind, &params)
            .map(|id| format!("ok: rule {id} waits for the timer")),
        C::WhenTime { at, kind, params } => service
            .when_time_equals(&at, &kind, &params)
            .map(|id| format!("ok: rule {id} waits for {at}")),
        C::WhenDistance { cm, kind, params } => service
            .when_distance_less_than(cm, &kind, &params)
            .map(|id| format!("ok: rule {id} waits for distance < {cm}cm")),
        C::Rules => {
            let pending = service.pending();
            if pending.is_empty() {
                return Ok("no pending rules".into());
            }
            let lines: Vec<String> = pending
                .iter()
                .map(|p| format!("  {} {}", p.id, p.rule))
                .collect();
            Ok(lines.join("\n"))
        }
        C::RulesClear => Ok(format!("ok: cleared {} rule(s)", service.clear_pending())),
        C::Status => Ok(service.status().to_string()),
        C::DeviceStatus => service
            .request_device_status()
            .and_then(|()| done("status requested from board")),
        C::Ping => service.test_connection().and_then(|()| done("link open")),
        C::AllOff => service.all_off().and_then(|()| done("everything off")),
    }
}

/// Read commands from `input` until `exit` or end of input, writing a
/// reply and a fresh `> ` prompt after every line.
pub fn run(service: &ControlService, input: impl BufRead, mut out: impl Write) -> io::Result<()> {
    write!(out, "> ")?;
    out.flush()?;
    for line in input.lines() {
        let outcome = match parse(&line?) {
            Ok(ConsoleCommand::Exit) => break,
            Ok(cmd) => execute(service, cmd).inspect_err(|e| warn!("command failed: {}", e)),
            Err(e) => Err(e),
        };
        match outcome {
            Ok(reply) if reply.is_empty() => {}
            Ok(reply) => writeln!(out, "{reply}")?,
            Err(e) => writeln!(out, "error: {e}")?,
        }
        write!(out, "> ")?;
        out.flush()?;
    }
    Ok(())
}
