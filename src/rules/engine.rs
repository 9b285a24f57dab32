//! Rule engine: pending trigger rules and their evaluation.
//!
//! ```text
//!   register() ─┐                       ┌─▶ ActionSpec::execute ─▶ CommandSink
//!   clear_all() ├─▶ Mutex<Vec<rule>> ───┤      (lock released)
//!   on_event() ─┘   match + remove      └─▶ distance echo ─▶ LCD:LINE2
//!                   under one lock
//! ```
//!
//! `on_event` is snapshot-then-apply: matching rules are collected and the
//! one-shots among them removed in a single critical section, then the
//! lock is dropped and the actions run in registration order. A rule is
//! therefore consumed exactly once even if its send fails, and a
//! `register` racing with `on_event` either lands wholly before the
//! event (and may fire) or wholly after it (and waits for the next one).

use std::sync::{Mutex, MutexGuard};

use log::{debug, info, warn};

use crate::app::events::TelemetryEvent;
use crate::app::ports::CommandSink;
use crate::error::{ActionExecutionError, Error, Result};
use crate::protocol::command::{Command, LCD_COLS, LcdRow};
use crate::rules::action::ActionSpec;
use crate::rules::rule::{PendingRule, RuleId, TriggerKind, TriggerRule};

// ═══════════════════════════════════════════════════════════════
//  Fire report
// ═══════════════════════════════════════════════════════════════

/// What one `on_event` call did.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FireReport {
    /// Every rule whose work ran, in the order it ran. Includes echoes.
    pub fired: Vec<RuleId>,
    /// The subset of `fired` whose command could not be sent.
    pub failed: Vec<RuleId>,
}

impl FireReport {
    pub fn is_empty(&self) -> bool {
        self.fired.is_empty()
    }
}

/// Work collected under the lock and run after it is released.
enum Work {
    Action(ActionSpec),
    Echo(f32),
}

// ═══════════════════════════════════════════════════════════════
//  Engine
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Default)]
struct Pending {
    next_id: u64,
    rules: Vec<PendingRule>,
}

/// Owner of the pending-rule collection.
#[derive(Debug, Default)]
pub struct RuleEngine {
    pending: Mutex<Pending>,
}

impl RuleEngine {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Pending> {
        // Every mutation below is a single push / retain / clear, so a
        // panic elsewhere cannot leave the Vec half-edited.
        self.pending.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Validate and append `rule`. Nothing is queued on error.
    pub fn register(&self, rule: TriggerRule) -> Result<RuleId> {
        rule.validate()?;
        let mut pending = self.lock();
        pending.next_id += 1;
        let id = RuleId(pending.next_id);
        info!("Rules: registered {} {}", id, rule);
        pending.rules.push(PendingRule { id, rule });
        Ok(id)
    }

    /// Drop every pending rule. Returns how many were removed.
    pub fn clear_all(&self) -> usize {
        let mut pending = self.lock();
        let count = pending.rules.len();
        pending.rules.clear();
        info!("Rules: cleared {} pending", count);
        count
    }

    /// Pending rules in registration order.
    pub fn snapshot(&self) -> Vec<PendingRule> {
        self.lock().rules.clone()
    }

    pub fn len(&self) -> usize {
        self.lock().rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Evaluate `event` against the pending rules and run what matched.
    pub fn on_event(&self, event: &TelemetryEvent, sink: &dyn CommandSink) -> FireReport {
        let work = self.take_matches(event);
        let mut report = FireReport::default();

        for (id, item) in work {
            report.fired.push(id);
            let outcome = match &item {
                Work::Action(action) => {
                    info!("Rules: {} fired on {} → {}", id, event.name(), action);
                    action.execute(sink).map_err(|cause| ActionExecutionError {
                        action: action.to_string(),
                        cause: Box::new(cause),
                    })
                }
                Work::Echo(cm) => {
                    debug!("Rules: {} echo {:.2} cm", id, cm);
                    sink.send(&echo_command(*cm))
                        .map_err(|cause| ActionExecutionError {
                            action: "distance echo".into(),
                            cause: Box::new(cause),
                        })
                }
            };
            if let Err(e) = outcome {
                warn!("Rules: {} {}", id, Error::from(e));
                report.failed.push(id);
            }
        }
        report
    }

    /// Collect matching rules and remove the one-shots among them, in
    /// one critical section.
    fn take_matches(&self, event: &TelemetryEvent) -> Vec<(RuleId, Work)> {
        let mut pending = self.lock();

        let mut work = Vec::new();
        for p in &pending.rules {
            if let Some(item) = match_rule(&p.rule, event) {
                work.push((p.id, item));
            }
        }
        if work.is_empty() {
            return work;
        }

        let consumed: Vec<RuleId> = pending
            .rules
            .iter()
            .filter(|p| p.rule.kind.is_one_shot())
            .filter(|p| work.iter().any(|(id, _)| *id == p.id))
            .map(|p| p.id)
            .collect();
        pending.rules.retain(|p| !consumed.contains(&p.id));
        work
    }
}

fn match_rule(rule: &TriggerRule, event: &TelemetryEvent) -> Option<Work> {
    let hit = match (&rule.kind, event) {
        (TriggerKind::TimerZero, TelemetryEvent::TimerFinished) => true,
        (TriggerKind::ClockEquals(target), TelemetryEvent::ClockReport(s)) => s == target,
        (TriggerKind::DistanceBelow(t), TelemetryEvent::DistanceReport(cm)) => cm < t,
        (TriggerKind::ContinuousDistanceEcho, TelemetryEvent::DistanceReport(cm)) => {
            return Some(Work::Echo(*cm));
        }
        _ => false,
    };
    if hit {
        rule.action.clone().map(Work::Action)
    } else {
        None
    }
}

/// `LCD:LINE2:<cm> cm`, padded to the full row so shorter readings
/// overwrite longer ones.
pub fn echo_command(cm: f32) -> Command {
    let text = format!("{cm:.2} cm");
    Command::lcd(LcdRow::Bottom, &format!("{text:<width$}", width = LCD_COLS))
}
