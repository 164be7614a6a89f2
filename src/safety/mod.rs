//! Safety gating for proposed intents: arming, confidence floors, rate
//! limits, and the two-signal click confirmation.
//!
//! Every rejection is a normal, observable value with a reason code. Nothing
//! here retries; the engine may re-propose on a later tick if conditions
//! change. The guard exclusively owns arming and rate-limiter state.

use std::collections::VecDeque;

use serde::Serialize;
use tracing::{info, warn};

use crate::config::SafetyConfig;
use crate::kernel::intent::{Intent, IntentKind};
use crate::time::ms_to_secs;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RejectReason {
    NotArmed,
    LowConfidence,
    RateLimited,
    Unconfirmed,
}

impl RejectReason {
    pub fn name(&self) -> &'static str {
        match self {
            RejectReason::NotArmed => "NOT_ARMED",
            RejectReason::LowConfidence => "LOW_CONFIDENCE",
            RejectReason::RateLimited => "RATE_LIMITED",
            RejectReason::Unconfirmed => "UNCONFIRMED",
        }
    }
}

/// Why the guard dropped to disarmed. FORCED_SAFE transitions always succeed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DisarmReason {
    Explicit,
    EmergencyStop,
    OpenPalm,
    VoiceStop,
    TrackingLoss,
    Shutdown,
}

impl DisarmReason {
    pub fn name(&self) -> &'static str {
        match self {
            DisarmReason::Explicit => "DISARM",
            DisarmReason::EmergencyStop => "EMERGENCY_STOP",
            DisarmReason::OpenPalm => "OPEN_PALM",
            DisarmReason::VoiceStop => "VOICE_STOP",
            DisarmReason::TrackingLoss => "TRACKING_LOSS",
            DisarmReason::Shutdown => "SHUTDOWN",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    Approved(Intent),
    Blocked {
        intent: Intent,
        reason: RejectReason,
    },
    /// Click candidate parked awaiting its second signal; bounded by the
    /// correlation window, after which it drops as `Unconfirmed`.
    Held,
}

/// The correlation inputs for the two-signal click rule, snapshotted by the
/// engine from the cache each tick.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClickContext {
    pub pinch_started: Option<f64>,
    pub pinch_duration: Option<f64>,
    /// The pinch has ended; `pinch_duration` is its final held duration.
    /// The hold-band confirmation only reads a completed measurement, so a
    /// pinch on its way to becoming a drag never self-confirms a click.
    pub pinch_released: bool,
    pub voice_click_ts: Option<f64>,
}

#[derive(Debug, Clone, Copy)]
struct PendingClick {
    intent_ts: f64,
    confidence: f32,
    pinch_started: f64,
    held_since: f64,
}

/// Read-only view for the overlay/logging collaborators.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct SafetySnapshot {
    pub armed: bool,
    pub click_cooldown_remaining_ms: u64,
    pub scroll_burst_used: u32,
    pub pending_click: bool,
}

pub struct SafetyGuard {
    cfg: SafetyConfig,
    armed: bool,
    armed_at: Option<f64>,
    last_click_ts: Option<f64>,
    scroll_times: VecDeque<f64>,
    pending: Option<PendingClick>,
    last_disarm: Option<DisarmReason>,
    last_now: f64,
}

impl SafetyGuard {
    pub fn new(cfg: SafetyConfig) -> Self {
        Self {
            cfg,
            armed: false,
            armed_at: None,
            last_click_ts: None,
            scroll_times: VecDeque::new(),
            pending: None,
            last_disarm: None,
            last_now: 0.0,
        }
    }

    pub fn armed(&self) -> bool {
        self.armed
    }

    /// ARM only takes while tracking is present. Fail-closed: an arm request
    /// during tracking loss is refused, not deferred.
    pub fn arm(&mut self, now: f64, tracking_present: bool) -> bool {
        if !tracking_present {
            warn!("ARM refused: no tracking signal");
            return false;
        }
        if !self.armed {
            info!("armed");
        }
        self.armed = true;
        self.armed_at = Some(now);
        true
    }

    /// Drop to disarmed and clear everything the arming session accumulated:
    /// rate-limiter timestamps and any pending click candidate.
    pub fn disarm(&mut self, reason: DisarmReason) {
        if self.armed {
            info!(reason = reason.name(), "disarmed");
        }
        self.armed = false;
        self.armed_at = None;
        self.last_click_ts = None;
        self.scroll_times.clear();
        self.pending = None;
        self.last_disarm = Some(reason);
    }

    /// Reason for the most recent drop to disarmed, for telemetry.
    pub fn last_disarm(&self) -> Option<DisarmReason> {
        self.last_disarm
    }

    /// Tracking-loss watchdog, consulted every tick before proposals.
    /// `gesture_seen`/`gaze_seen` are the last publish timestamps the engine
    /// considers evidence of presence. Returns true when this call disarmed.
    pub fn check_tracking(
        &mut self,
        now: f64,
        gesture_seen: Option<f64>,
        gaze_seen: Option<f64>,
    ) -> bool {
        if !self.armed {
            return false;
        }
        let reference = [gesture_seen, gaze_seen, self.armed_at]
            .into_iter()
            .flatten()
            .fold(f64::NEG_INFINITY, f64::max);
        if now - reference > ms_to_secs(self.cfg.tracking_loss_ms) {
            warn!("tracking lost, forcing disarm");
            self.disarm(DisarmReason::TrackingLoss);
            return true;
        }
        false
    }

    /// Gate a proposed intent. The intent comes back unchanged on approval;
    /// a blocked intent is discarded by the caller, never retried here.
    pub fn approve(&mut self, intent: Intent, now: f64, ctx: &ClickContext) -> Decision {
        self.last_now = now;

        if !self.armed && intent.kind != IntentKind::Cancel {
            return Decision::Blocked {
                intent,
                reason: RejectReason::NotArmed,
            };
        }

        if intent.confidence < self.cfg.confidence.for_kind(&intent.kind) {
            return Decision::Blocked {
                intent,
                reason: RejectReason::LowConfidence,
            };
        }

        if let Some(reason) = self.rate_limited(&intent.kind, now) {
            return Decision::Blocked { intent, reason };
        }

        if intent.kind == IntentKind::Click {
            if !self.click_confirmed(ctx) {
                self.hold_click(&intent, ctx, now);
                return Decision::Held;
            }
            self.pending = None;
        }

        // A drag supersedes any click candidate from the same pinch.
        if intent.kind == IntentKind::DragStart {
            self.pending = None;
        }

        self.commit(&intent.kind, now);
        Decision::Approved(intent)
    }

    /// FORCED_SAFE path: cancel conversions are approved unconditionally so
    /// the dispatcher releases any held action. Never rejected.
    pub fn force(&mut self, intent: Intent) -> Intent {
        self.pending = None;
        intent
    }

    /// Re-examine a held click candidate. Approves once if its second signal
    /// arrived, drops it as `Unconfirmed` once the correlation window is
    /// spent, otherwise leaves it pending.
    pub fn resolve_pending(&mut self, now: f64, ctx: &ClickContext) -> Option<Decision> {
        let pending = self.pending?;

        let window = ms_to_secs(self.cfg.voice_correlation_ms);
        let confirm_ctx = ClickContext {
            pinch_started: Some(pending.pinch_started),
            ..*ctx
        };

        if self.click_confirmed(&confirm_ctx) {
            self.pending = None;
            let intent = Intent::new(now, IntentKind::Click, pending.confidence);
            // Confirmation does not bypass arming or the cooldown.
            if !self.armed {
                return Some(Decision::Blocked {
                    intent,
                    reason: RejectReason::NotArmed,
                });
            }
            if let Some(reason) = self.rate_limited(&IntentKind::Click, now) {
                return Some(Decision::Blocked { intent, reason });
            }
            self.commit(&IntentKind::Click, now);
            return Some(Decision::Approved(intent));
        }

        if now - pending.held_since > window {
            self.pending = None;
            return Some(Decision::Blocked {
                intent: Intent::new(pending.intent_ts, IntentKind::Click, pending.confidence),
                reason: RejectReason::Unconfirmed,
            });
        }

        None
    }

    pub fn snapshot(&self) -> SafetySnapshot {
        let cooldown = ms_to_secs(self.cfg.click_cooldown_ms);
        let remaining = self
            .last_click_ts
            .map(|ts| (cooldown - (self.last_now - ts)).max(0.0))
            .unwrap_or(0.0);
        SafetySnapshot {
            armed: self.armed,
            click_cooldown_remaining_ms: (remaining * 1000.0) as u64,
            scroll_burst_used: self.scroll_times.len() as u32,
            pending_click: self.pending.is_some(),
        }
    }

    fn rate_limited(&mut self, kind: &IntentKind, now: f64) -> Option<RejectReason> {
        if kind.is_click_family() {
            if let Some(last) = self.last_click_ts {
                if now - last < ms_to_secs(self.cfg.click_cooldown_ms) {
                    return Some(RejectReason::RateLimited);
                }
            }
        }
        if matches!(kind, IntentKind::Scroll { .. }) {
            let window = ms_to_secs(self.cfg.scroll_burst_window_ms);
            while let Some(&front) = self.scroll_times.front() {
                if now - front > window {
                    self.scroll_times.pop_front();
                } else {
                    break;
                }
            }
            if self.scroll_times.len() >= self.cfg.scroll_burst_max as usize {
                return Some(RejectReason::RateLimited);
            }
        }
        None
    }

    /// Two-signal confirmation: a correlated voice "click", or a completed
    /// pinch whose held duration landed in the click band (at least
    /// click-hold, still under drag).
    fn click_confirmed(&self, ctx: &ClickContext) -> bool {
        let Some(pinch_started) = ctx.pinch_started else {
            return false;
        };

        if let Some(voice_ts) = ctx.voice_click_ts {
            if (voice_ts - pinch_started).abs() <= ms_to_secs(self.cfg.voice_correlation_ms) {
                return true;
            }
        }

        if ctx.pinch_released {
            if let Some(duration) = ctx.pinch_duration {
                let click_band =
                    ms_to_secs(self.cfg.click_hold_ms)..ms_to_secs(self.cfg.drag_hold_ms);
                if click_band.contains(&duration) {
                    return true;
                }
            }
        }

        false
    }

    fn hold_click(&mut self, intent: &Intent, ctx: &ClickContext, now: f64) {
        let pinch_started = ctx.pinch_started.unwrap_or(now);
        match &self.pending {
            // Same pinch already pending: keep the original hold clock.
            Some(p) if p.pinch_started == pinch_started => {}
            _ => {
                self.pending = Some(PendingClick {
                    intent_ts: intent.ts,
                    confidence: intent.confidence,
                    pinch_started,
                    held_since: now,
                });
            }
        }
    }

    fn commit(&mut self, kind: &IntentKind, now: f64) {
        if kind.is_click_family() {
            self.last_click_ts = Some(now);
        }
        if matches!(kind, IntentKind::Scroll { .. }) {
            self.scroll_times.push_back(now);
        }
    }
}
