//! Reactive automation: "when C becomes true, do A".
//!
//! - [`action`]: the five action kinds and their wire commands.
//! - [`rule`]: trigger conditions and validated rules.
//! - [`engine`]: the pending-rule collection and event evaluation.

pub mod action;
pub mod engine;
pub mod rule;

pub use action::ActionSpec;
pub use engine::{FireReport, RuleEngine};
pub use rule::{PendingRule, RuleId, TriggerKind, TriggerRule};
