//! Async driver for the decision core.
//!
//! The engine itself is a pure sequential step; this loop supplies the
//! cadence, the preemptive fast path for EMERGENCY_STOP/DISARM, and the
//! dispatch of approved intents. Only approved intents ever reach the
//! dispatcher.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::bus::{EventBus, LatestCache};
use crate::config::AppConfig;
use crate::error::CoreError;
use crate::kernel::engine::{IntentEngine, TickOutput};
use crate::kernel::intent::Intent;
use crate::kernel::mode::Mode;
use crate::safety::{DisarmReason, SafetyGuard};
use crate::telemetry::{CoreSnapshot, DecisionRecord, DecisionRecorder};
use crate::time::epoch_secs;

/// Boundary to OS actuation. Implementations live outside the core; the
/// stdout NDJSON dispatcher in the binary is the reference one.
pub trait ActionDispatcher: Send {
    fn dispatch(&mut self, intent: &Intent) -> Result<(), CoreError>;
}

pub struct ControlLoop<D: ActionDispatcher> {
    cfg: AppConfig,
    bus: EventBus,
    cache: Arc<LatestCache>,
    engine: IntentEngine,
    guard: SafetyGuard,
    recorder: DecisionRecorder,
    dispatcher: D,
    shutdown: CancellationToken,
    snapshot_tx: watch::Sender<CoreSnapshot>,
}

impl<D: ActionDispatcher> ControlLoop<D> {
    pub fn new(cfg: AppConfig, bus: EventBus, dispatcher: D, shutdown: CancellationToken) -> Self {
        let engine = IntentEngine::new(cfg.clone());
        let guard = SafetyGuard::new(cfg.safety.clone());
        let recorder = DecisionRecorder::new();
        let initial = recorder.snapshot(Mode::Safe, guard.snapshot());
        let (snapshot_tx, _) = watch::channel(initial);
        Self {
            cache: bus.cache(),
            cfg,
            bus,
            engine,
            guard,
            recorder,
            dispatcher,
            shutdown,
            snapshot_tx,
        }
    }

    /// Read-only observability feed for overlay/logging collaborators.
    /// Updated once per tick; never consulted by decision logic.
    pub fn observe(&self) -> watch::Receiver<CoreSnapshot> {
        self.snapshot_tx.subscribe()
    }

    pub fn snapshot(&self) -> CoreSnapshot {
        self.recorder
            .snapshot(self.engine.mode(), self.guard.snapshot())
    }

    /// Drive the core until cancelled. Preemptive signals are handled the
    /// instant the priority watch flips, not at the next cadence boundary.
    pub async fn run(mut self) {
        let period = Duration::from_millis(self.cfg.tick_period_ms().max(1));
        let mut cadence = interval(period);
        cadence.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut priority = self.bus.priority();

        info!(tick_ms = period.as_millis() as u64, "control loop started");

        loop {
            tokio::select! {
                biased;

                _ = self.shutdown.cancelled() => {
                    let now = epoch_secs();
                    let armed_before = self.guard.armed();
                    let released = self.engine.shutdown(&mut self.guard, now);
                    self.forward_forced(released);
                    self.record_arming_edge(armed_before, now);
                    info!("control loop stopped");
                    return;
                }

                changed = priority.changed() => {
                    if changed.is_err() {
                        return;
                    }
                    let event = priority.borrow_and_update().clone();
                    if let Some(event) = event {
                        let now = epoch_secs();
                        let armed_before = self.guard.armed();
                        let forced = self.engine.preempt(&mut self.guard, &event, now);
                        self.forward_forced(forced);
                        self.record_arming_edge(armed_before, now);
                        self.publish_snapshot();
                    }
                }

                _ = cadence.tick() => {
                    self.step(epoch_secs());
                }
            }
        }
    }

    /// One synchronous tick: engine step, telemetry, dispatch.
    pub fn step(&mut self, now: f64) {
        let mode_before = self.engine.mode();
        let armed_before = self.guard.armed();
        let output = self.engine.tick(&self.cache, &mut self.guard, now);
        self.record_arming_edge(armed_before, now);
        self.apply(mode_before, output);
        self.publish_snapshot();
    }

    fn record_arming_edge(&mut self, armed_before: bool, now: f64) {
        match (armed_before, self.guard.armed()) {
            (false, true) => self.recorder.record(DecisionRecord::Armed { ts: now }),
            (true, false) => {
                let reason = self.guard.last_disarm().unwrap_or(DisarmReason::Explicit);
                self.recorder
                    .record(DecisionRecord::Disarmed { reason, ts: now });
            }
            _ => {}
        }
    }

    fn apply(&mut self, mode_before: Mode, output: TickOutput) {
        let mode_after = self.engine.mode();
        if mode_before != mode_after {
            debug!(from = mode_before.name(), to = mode_after.name(), "mode transition");
            self.recorder.record(DecisionRecord::ModeTransition {
                from: mode_before,
                to: mode_after,
                tick: self.engine.tick_count(),
            });
        }

        for (intent, reason) in &output.blocked {
            debug!(intent = intent.kind.name(), reason = reason.name(), "blocked");
            self.recorder.record(DecisionRecord::Blocked {
                intent: intent.kind.name(),
                reason: *reason,
                ts: intent.ts,
            });
        }

        for intent in output.approved {
            self.recorder.record(DecisionRecord::Approved {
                intent: intent.kind.name(),
                ts: intent.ts,
            });
            if let Err(err) = self.dispatcher.dispatch(&intent) {
                warn!(error = %err, "dispatch failed");
                if matches!(err, CoreError::ChannelClosed) {
                    self.shutdown.cancel();
                    return;
                }
            }
        }
    }

    fn forward_forced(&mut self, intents: Vec<Intent>) {
        for intent in intents {
            self.recorder.record(DecisionRecord::Approved {
                intent: intent.kind.name(),
                ts: intent.ts,
            });
            if let Err(err) = self.dispatcher.dispatch(&intent) {
                warn!(error = %err, "dispatch failed during forced release");
            }
        }
    }

    fn publish_snapshot(&mut self) {
        let snap = self
            .recorder
            .snapshot(self.engine.mode(), self.guard.snapshot());
        self.snapshot_tx.send_replace(snap);
    }
}
