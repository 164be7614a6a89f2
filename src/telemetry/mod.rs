//! Observability sidecar: a bounded ring of decision records plus a snapshot
//! computed from it.
//!
//! Read-only by contract. Nothing in the decision path (engine or guard) may
//! consult this module; it exists for the overlay and logging collaborators.

use std::collections::VecDeque;

use serde::Serialize;

use crate::kernel::mode::Mode;
use crate::safety::{DisarmReason, RejectReason, SafetySnapshot};

const MAX_RECORDS: usize = 4_096;

/// One observable outcome. Only names, reasons, and timestamps; no payload
/// coordinates leak into telemetry.
#[derive(Debug, Clone, Serialize)]
pub enum DecisionRecord {
    Approved { intent: &'static str, ts: f64 },
    Blocked {
        intent: &'static str,
        reason: RejectReason,
        ts: f64,
    },
    ModeTransition {
        from: Mode,
        to: Mode,
        tick: u64,
    },
    Disarmed { reason: DisarmReason, ts: f64 },
    Armed { ts: f64 },
}

#[derive(Debug)]
pub struct DecisionRecorder {
    buffer: VecDeque<DecisionRecord>,
}

impl DecisionRecorder {
    pub fn new() -> Self {
        Self {
            buffer: VecDeque::with_capacity(MAX_RECORDS),
        }
    }

    pub fn record(&mut self, record: DecisionRecord) {
        if self.buffer.len() >= MAX_RECORDS {
            self.buffer.pop_front();
        }
        self.buffer.push_back(record);
    }

    /// Aggregate view over the retained window.
    pub fn snapshot(&self, mode: Mode, safety: SafetySnapshot) -> CoreSnapshot {
        let mut snap = CoreSnapshot {
            mode,
            armed: safety.armed,
            safety,
            ..CoreSnapshot::empty(mode)
        };

        for record in &self.buffer {
            match record {
                DecisionRecord::Approved { intent, ts } => {
                    snap.approved_total += 1;
                    snap.last_approved = Some(LastIntent {
                        intent,
                        ts: *ts,
                    });
                }
                DecisionRecord::Blocked { intent, reason, ts } => {
                    match reason {
                        RejectReason::NotArmed => snap.blocked_not_armed += 1,
                        RejectReason::LowConfidence => snap.blocked_low_confidence += 1,
                        RejectReason::RateLimited => snap.blocked_rate_limited += 1,
                        RejectReason::Unconfirmed => snap.blocked_unconfirmed += 1,
                    }
                    snap.last_blocked = Some(LastBlocked {
                        intent,
                        reason: *reason,
                        ts: *ts,
                    });
                }
                DecisionRecord::Disarmed { .. } => snap.disarms += 1,
                DecisionRecord::Armed { .. } | DecisionRecord::ModeTransition { .. } => {}
            }
        }
        snap
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

impl Default for DecisionRecorder {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct LastIntent {
    pub intent: &'static str,
    pub ts: f64,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct LastBlocked {
    pub intent: &'static str,
    pub reason: RejectReason,
    pub ts: f64,
}

/// The read-only state exposed to overlay/logging collaborators.
#[derive(Debug, Clone, Serialize)]
pub struct CoreSnapshot {
    pub mode: Mode,
    pub armed: bool,
    pub last_approved: Option<LastIntent>,
    pub last_blocked: Option<LastBlocked>,
    pub approved_total: u64,
    pub blocked_not_armed: u64,
    pub blocked_low_confidence: u64,
    pub blocked_rate_limited: u64,
    pub blocked_unconfirmed: u64,
    pub disarms: u64,
    pub safety: SafetySnapshot,
}

impl CoreSnapshot {
    fn empty(mode: Mode) -> Self {
        Self {
            mode,
            armed: false,
            last_approved: None,
            last_blocked: None,
            approved_total: 0,
            blocked_not_armed: 0,
            blocked_low_confidence: 0,
            blocked_rate_limited: 0,
            blocked_unconfirmed: 0,
            disarms: 0,
            safety: SafetySnapshot {
                armed: false,
                click_cooldown_remaining_ms: 0,
                scroll_burst_used: 0,
                pending_click: false,
            },
        }
    }
}
