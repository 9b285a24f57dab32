//! Ingestion loop: board status lines in, telemetry and rule firings out.
//!
//! ```text
//!   SharedLink.try_receive_line ──▶ classify ──▶ TelemetryStore.update
//!        (lock held per line)                    └─▶ RuleEngine.on_event
//!                                                     (lock released)
//! ```
//!
//! The link lock is released before an event is dispatched, because
//! fired actions need the link to send. Events are handled in the order
//! they were read. Read and parse failures are logged and followed by a
//! longer backoff; nothing in here ends the loop except a stop request.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

use log::{debug, info, warn};

use crate::adapters::shared_link::SharedLink;
use crate::config::TimingConfig;
use crate::error::Result;
use crate::protocol::status::{Inbound, classify};
use crate::rules::engine::RuleEngine;
use crate::task::{StopToken, spawn_named};
use crate::telemetry::TelemetryStore;

/// Outcome of one ingestion step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// No line was available.
    Idle,
    /// A line was read and handled (telemetry or otherwise).
    Handled,
    /// The read or the parse failed.
    Failed,
}

/// Counters kept across the life of the loop.
#[derive(Debug, Default)]
pub struct IngestStats {
    pub lines: AtomicU64,
    pub events: AtomicU64,
    pub parse_errors: AtomicU64,
    pub link_errors: AtomicU64,
}

impl IngestStats {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get(counter: &AtomicU64) -> u64 {
        counter.load(Ordering::Relaxed)
    }
}

/// The ingestion loop and the components it feeds.
#[derive(Clone)]
pub struct Ingestion {
    link: SharedLink,
    telemetry: Arc<TelemetryStore>,
    rules: Arc<RuleEngine>,
    timing: TimingConfig,
    stats: Arc<IngestStats>,
}

impl Ingestion {
    pub fn new(
        link: SharedLink,
        telemetry: Arc<TelemetryStore>,
        rules: Arc<RuleEngine>,
        timing: TimingConfig,
    ) -> Self {
        Self {
            link,
            telemetry,
            rules,
            timing,
            stats: Arc::new(IngestStats::default()),
        }
    }

    pub fn stats(&self) -> Arc<IngestStats> {
        Arc::clone(&self.stats)
    }

    /// Read and handle at most one line. Never sleeps.
    pub fn step(&self) -> Step {
        let line = match self.link.try_receive_line() {
            Ok(Some(line)) => line,
            Ok(None) => return Step::Idle,
            Err(e) => {
                IngestStats::bump(&self.stats.link_errors);
                warn!("Ingest: read failed: {}", e);
                return Step::Failed;
            }
        };
        IngestStats::bump(&self.stats.lines);

        match classify(&line) {
            Ok(Inbound::Telemetry(event)) => {
                IngestStats::bump(&self.stats.events);
                self.telemetry.update(&event);
                self.rules.on_event(&event, &self.link);
            }
            Ok(Inbound::SensorReply(cm)) => debug!("Ingest: sensor reply {:.2} cm", cm),
            Ok(Inbound::Ack(text)) => debug!("Ingest: ack {}", text),
            Ok(Inbound::DeviceError(text)) => warn!("Ingest: device error: {}", text),
            Ok(Inbound::Status(text)) => info!("Ingest: device status: {}", text),
            Ok(Inbound::Unrecognized) => debug!("Ingest: ignored {:?}", line),
            Err(e) => {
                IngestStats::bump(&self.stats.parse_errors);
                warn!("Ingest: {}", e);
                return Step::Failed;
            }
        }
        Step::Handled
    }

    /// Sleep that follows a step.
    fn pause_after(&self, step: Step) -> Duration {
        match step {
            Step::Handled => Duration::ZERO,
            Step::Idle => self.timing.idle_poll(),
            Step::Failed => self.timing.error_backoff(),
        }
    }

    /// Run until `stop` is requested.
    pub fn run(&self, stop: &StopToken) {
        info!("Ingest: started");
        while !stop.is_stopped() {
            let step = self.step();
            if step == Step::Failed {
                debug!("Ingest: backing off {:?}", self.timing.error_backoff());
            }
            let pause = self.pause_after(step);
            if !pause.is_zero() && stop.wait(pause) {
                break;
            }
        }
        info!("Ingest: stopped");
    }

    /// Run on a background thread.
    pub fn spawn(self) -> Result<IngestionHandle> {
        let stop = StopToken::new();
        let token = stop.clone();
        let handle = spawn_named("ingest", move || self.run(&token))?;
        Ok(IngestionHandle {
            stop,
            handle: Some(handle),
        })
    }
}

/// Stops and joins the ingestion thread; also on drop.
pub struct IngestionHandle {
    stop: StopToken,
    handle: Option<JoinHandle<()>>,
}

impl IngestionHandle {
    /// Request stop and wait. No telemetry or rule mutation happens
    /// after this returns.
    pub fn stop(&mut self) {
        self.stop.stop();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("Ingest: thread panicked");
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Drop for IngestionHandle {
    fn drop(&mut self) {
        self.stop();
    }
}
