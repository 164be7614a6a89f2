//! The fusion state machine. One logical actor: on each control tick it reads
//! a consistent snapshot of the latest-value cache, updates session and
//! smoothing state, derives at most one proposed intent, and asks the
//! SafetyGuard to gate it. Preemptive control signals (EMERGENCY_STOP,
//! DISARM) take a separate path applied the instant they are observed.

use tracing::{debug, info};

use crate::bus::{
    Channel, ControlSignal, Event, GazeDirection, GestureSignal, LatestCache, Signal, VoiceCommand,
};
use crate::config::AppConfig;
use crate::kernel::filters::{EmaFilter, StabilityFilter};
use crate::kernel::intent::{Intent, IntentKind, ScrollDirection};
use crate::kernel::mode::Mode;
use crate::kernel::pinch::PinchSession;
use crate::safety::{ClickContext, Decision, DisarmReason, RejectReason, SafetyGuard};
use crate::time::{ms_to_secs, Tick};

/// Everything one tick decided. Approved intents are already gate-checked and
/// ordered for dispatch (a forced DRAG_STOP always precedes its CANCEL).
#[derive(Debug, Default)]
pub struct TickOutput {
    pub approved: Vec<Intent>,
    pub blocked: Vec<(Intent, RejectReason)>,
}

pub struct IntentEngine {
    cfg: AppConfig,
    mode: Mode,
    stability: StabilityFilter,
    ema: EmaFilter,
    pinch: Option<PinchSession>,
    tick: Tick,
    /// Control/voice events already acted on, so a cached event is never
    /// applied twice across ticks (or across the preempt path).
    consumed_control_ts: Option<f64>,
    consumed_voice_stop_ts: Option<f64>,
}

impl IntentEngine {
    pub fn new(cfg: AppConfig) -> Self {
        let stability = StabilityFilter::new(cfg.stability_frames);
        let ema = EmaFilter::new(cfg.ema_alpha);
        Self {
            cfg,
            mode: Mode::Safe,
            stability,
            ema,
            pinch: None,
            tick: Tick::new(),
            consumed_control_ts: None,
            consumed_voice_stop_ts: None,
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn tick_count(&self) -> u64 {
        self.tick.frame
    }

    /// Immediate path for EMERGENCY_STOP / DISARM, called by the driver the
    /// moment the priority watch fires. Not queued behind the cadence.
    pub fn preempt(&mut self, guard: &mut SafetyGuard, event: &Event, now: f64) -> Vec<Intent> {
        let Signal::Control(sig) = &event.signal else {
            return Vec::new();
        };
        if !sig.is_preemptive() || self.consumed_control_ts == Some(event.ts) {
            return Vec::new();
        }
        self.consumed_control_ts = Some(event.ts);

        let reason = match sig {
            ControlSignal::EmergencyStop => DisarmReason::EmergencyStop,
            ControlSignal::Disarm => DisarmReason::Explicit,
            ControlSignal::Arm => unreachable!("ARM is not preemptive"),
        };
        info!(signal = sig.name(), "preemptive stop");
        self.forced_cancel(guard, reason, now, true)
    }

    /// Release anything held before teardown. No action stays held across a
    /// process exit.
    pub fn shutdown(&mut self, guard: &mut SafetyGuard, now: f64) -> Vec<Intent> {
        self.forced_cancel(guard, DisarmReason::Shutdown, now, false)
    }

    /// One control tick. MUST NOT block; the guard call is inline and
    /// synchronous by design.
    pub fn tick(&mut self, cache: &LatestCache, guard: &mut SafetyGuard, now: f64) -> TickOutput {
        self.tick = self.tick.next();
        let mut out = TickOutput::default();

        // Tracking-loss watchdog runs before anything else: fail-closed.
        let gesture_seen = cache.last_seen(Channel::Gesture);
        let gaze_seen = self.gaze_presence_ts(cache);
        if guard.check_tracking(now, gesture_seen, gaze_seen) {
            out.approved
                .extend(self.forced_cancel(guard, DisarmReason::TrackingLoss, now, false));
            self.sync_mode(guard);
            return out;
        }

        // Priority 1: control channel. Preemptive signals may already have
        // been consumed by the preempt path; the tick path is the fallback
        // ordering for when the driver saw them via the cache first.
        if let Some(event) = cache.fresh(Channel::Control, now) {
            if self.consumed_control_ts != Some(event.ts) {
                if let Signal::Control(sig) = &event.signal {
                    self.consumed_control_ts = Some(event.ts);
                    match sig {
                        ControlSignal::EmergencyStop => {
                            out.approved.extend(self.forced_cancel(
                                guard,
                                DisarmReason::EmergencyStop,
                                now,
                                true,
                            ));
                            self.sync_mode(guard);
                            return out;
                        }
                        ControlSignal::Disarm => {
                            out.approved.extend(self.forced_cancel(
                                guard,
                                DisarmReason::Explicit,
                                now,
                                true,
                            ));
                            self.sync_mode(guard);
                            return out;
                        }
                        ControlSignal::Arm => {
                            guard.arm(now, self.tracking_present(cache, now));
                        }
                    }
                }
            }
        }

        // Voice "stop": ordinary cancellation, ahead of any new proposal.
        if let Some(event) = cache.fresh(Channel::Voice, now) {
            if let Signal::Voice(VoiceCommand::Stop) = &event.signal {
                if self.consumed_voice_stop_ts != Some(event.ts) {
                    self.consumed_voice_stop_ts = Some(event.ts);
                    if self.anything_to_cancel(guard) {
                        out.approved.extend(self.forced_cancel(
                            guard,
                            DisarmReason::VoiceStop,
                            now,
                            false,
                        ));
                        self.sync_mode(guard);
                        return out;
                    }
                }
            }
        }

        // Unresolved click candidate from an earlier tick, bounded by the
        // correlation window. Resolved before new proposals.
        let pending_ctx = self.click_context(cache, now);
        if let Some(decision) = guard.resolve_pending(now, &pending_ctx) {
            if matches!(&decision, Decision::Approved(i) if i.kind == IntentKind::Click) {
                if let Some(s) = self.pinch.as_mut() {
                    s.clicked = true;
                }
            }
            self.record(decision, &mut out);
        }

        // Feed the stability filter with the latest gesture frame.
        let gesture_event = cache.fresh(Channel::Gesture, now);
        let sample = gesture_event.as_ref().and_then(|e| match &e.signal {
            Signal::Gesture { gesture, .. } => Some((e.ts, *gesture)),
            _ => None,
        });
        let stable = self.stability.observe(sample);
        let confidence = gesture_event.as_ref().map(|e| e.confidence).unwrap_or(0.0);

        // Pinch bookkeeping happens regardless of which rule fires below:
        // a session ends when PINCH stops being the stable gesture for longer
        // than the debounce window. Session timing is keyed to producer frame
        // timestamps, not the tick clock, so a cached frame sitting inside
        // its staleness window cannot stretch the held duration.
        if matches!(stable, Some(GestureSignal::Pinch)) {
            if let Some((frame_ts, _)) = sample {
                match &mut self.pinch {
                    Some(session) => session.touch(frame_ts, confidence),
                    None => {
                        debug!("pinch session started");
                        self.pinch = Some(PinchSession::begin(frame_ts, confidence));
                    }
                }
            }
        } else if let Some(session) = self.pinch {
            if session.expired(now, ms_to_secs(self.cfg.safety.pinch_debounce_ms)) {
                if session.drag_started {
                    // Releasing a held button is never confidence-gated.
                    let intent = Intent::new(now, IntentKind::DragStop, 1.0);
                    let decision = guard.approve(intent, now, &pending_ctx);
                    self.record(decision, &mut out);
                    if self.mode == Mode::DragMode {
                        self.mode = if guard.armed() { Mode::Armed } else { Mode::Safe };
                    }
                } else if !session.clicked {
                    // Pinch released below the drag threshold: the click
                    // candidate carries the completed held duration, so the
                    // hold-band arm of the two-signal rule can now fire.
                    let release_ctx = ClickContext {
                        pinch_started: Some(session.started),
                        pinch_duration: Some(session.held_duration()),
                        pinch_released: true,
                        voice_click_ts: self.voice_click_ts(cache, now),
                    };
                    let intent = Intent::new(now, IntentKind::Click, session.confidence);
                    let decision = guard.approve(intent, now, &release_ctx);
                    self.record(decision, &mut out);
                }
                debug!("pinch session ended");
                self.pinch = None;
            }
        }

        // Context for this tick's proposals, after session bookkeeping.
        let click_ctx = self.click_context(cache, now);

        // Fusion priority order: first match wins, at most one proposal.
        match stable {
            Some(GestureSignal::OpenPalm) => {
                if self.anything_to_cancel(guard) {
                    out.approved.extend(self.forced_cancel(
                        guard,
                        DisarmReason::OpenPalm,
                        now,
                        false,
                    ));
                }
            }
            Some(GestureSignal::Pinch) => {
                let session = self
                    .pinch
                    .expect("stable PINCH without a session is an invariant break");
                let duration = session.duration(now);
                if duration >= ms_to_secs(self.cfg.safety.drag_hold_ms) {
                    if !session.drag_started {
                        let intent = Intent::new(now, IntentKind::DragStart, confidence);
                        match guard.approve(intent, now, &click_ctx) {
                            Decision::Approved(intent) => {
                                if let Some(s) = self.pinch.as_mut() {
                                    s.drag_started = true;
                                }
                                self.mode = Mode::DragMode;
                                out.approved.push(intent);
                            }
                            decision => self.record(decision, &mut out),
                        }
                    }
                    // Drag is a standing state: nothing re-emitted per tick.
                } else if !session.clicked {
                    let intent = Intent::new(now, IntentKind::Click, session.confidence);
                    match guard.approve(intent, now, &click_ctx) {
                        Decision::Approved(intent) => {
                            if let Some(s) = self.pinch.as_mut() {
                                s.clicked = true;
                            }
                            out.approved.push(intent);
                        }
                        decision => self.record(decision, &mut out),
                    }
                }
            }
            Some(GestureSignal::Point { x, y }) => {
                if guard.armed() && self.mode != Mode::DragMode {
                    self.mode = Mode::CursorMove;
                }
                let (sx, sy) = self.ema.update(x, y);
                let intent = Intent::new(now, IntentKind::Move { x: sx, y: sy }, confidence);
                self.record(guard.approve(intent, now, &click_ctx), &mut out);
            }
            Some(GestureSignal::Fist { dy }) => {
                if dy.abs() >= self.cfg.safety.scroll_min_dy {
                    let direction = if dy < 0.0 {
                        ScrollDirection::Up
                    } else {
                        ScrollDirection::Down
                    };
                    let intent = Intent::new(
                        now,
                        IntentKind::Scroll {
                            direction,
                            magnitude: dy.abs(),
                        },
                        confidence,
                    );
                    self.record(guard.approve(intent, now, &click_ctx), &mut out);
                }
            }
            None => {
                // No actionable gesture. The tracking-loss timer consulted
                // above is the only consumer of this silence.
            }
        }

        if !matches!(stable, Some(GestureSignal::Point { .. })) {
            self.ema.reset();
            if self.mode == Mode::CursorMove {
                self.mode = if guard.armed() { Mode::Armed } else { Mode::Safe };
            }
        }

        self.sync_mode(guard);
        out
    }

    /// Convert in-flight work to forced, always-approved cancellations.
    /// Order matters: an open drag is released (DRAG_STOP) before the CANCEL
    /// so the dispatcher never sees a cancel with a button still held.
    fn forced_cancel(
        &mut self,
        guard: &mut SafetyGuard,
        reason: DisarmReason,
        now: f64,
        always_emit_cancel: bool,
    ) -> Vec<Intent> {
        let drag_open = self.pinch.map(|s| s.drag_started).unwrap_or(false)
            || self.mode == Mode::DragMode;

        let mut intents = Vec::new();
        if drag_open {
            intents.push(guard.force(Intent::new(now, IntentKind::DragStop, 1.0)));
        }
        if always_emit_cancel || drag_open || guard.armed() || self.pinch.is_some() {
            intents.push(guard.force(Intent::new(now, IntentKind::Cancel, 1.0)));
        }

        guard.disarm(reason);
        self.pinch = None;
        self.ema.reset();
        self.stability.reset();
        if self.mode != Mode::Safe {
            info!(from = self.mode.name(), reason = reason.name(), "mode -> SAFE");
        }
        self.mode = Mode::Safe;
        intents
    }

    fn sync_mode(&mut self, guard: &SafetyGuard) {
        if !guard.armed() {
            self.mode = Mode::Safe;
        } else if self.mode == Mode::Safe {
            self.mode = Mode::Armed;
        }
    }

    fn anything_to_cancel(&self, guard: &SafetyGuard) -> bool {
        guard.armed() || self.pinch.is_some() || self.mode != Mode::Safe
    }

    fn click_context(&self, cache: &LatestCache, now: f64) -> ClickContext {
        ClickContext {
            pinch_started: self.pinch.map(|s| s.started),
            pinch_duration: self.pinch.map(|s| s.duration(now)),
            pinch_released: false,
            voice_click_ts: self.voice_click_ts(cache, now),
        }
    }

    fn voice_click_ts(&self, cache: &LatestCache, now: f64) -> Option<f64> {
        cache
            .fresh(Channel::Voice, now)
            .and_then(|e| matches!(e.signal, Signal::Voice(VoiceCommand::Click)).then_some(e.ts))
    }

    /// A gaze publish only counts as presence while a face is in frame.
    fn gaze_presence_ts(&self, cache: &LatestCache) -> Option<f64> {
        cache.latest(Channel::Gaze).and_then(|e| match e.signal {
            Signal::Gaze(GazeDirection::None) => None,
            Signal::Gaze(_) => Some(e.ts),
            _ => None,
        })
    }

    fn tracking_present(&self, cache: &LatestCache, now: f64) -> bool {
        cache.fresh(Channel::Gesture, now).is_some()
            || cache
                .fresh(Channel::Gaze, now)
                .map(|e| !matches!(e.signal, Signal::Gaze(GazeDirection::None)))
                .unwrap_or(false)
    }

    fn record(&self, decision: Decision, out: &mut TickOutput) {
        match decision {
            Decision::Approved(intent) => out.approved.push(intent),
            Decision::Blocked { intent, reason } => out.blocked.push((intent, reason)),
            Decision::Held => {}
        }
    }
}
