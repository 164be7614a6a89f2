use std::path::Path;

use serde::Deserialize;

use crate::error::CoreError;
use crate::kernel::intent::IntentKind;

/// All tunables for the decision core. Every value here is an input, nothing
/// in the pipeline hardcodes a threshold. Defaults mirror the shipped
/// calibration; a JSON file can override any subset.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Control cadence of the intent engine.
    pub tick_hz: u32,
    /// Consecutive producer samples before a gesture classification is
    /// accepted into fusion.
    pub stability_frames: u32,
    /// EMA factor for pointer smoothing: smoothed = alpha*raw + (1-alpha)*prev.
    pub ema_alpha: f32,
    /// Depth of each subscriber's event queue before oldest events drop.
    pub bus_queue_depth: usize,
    pub staleness: StalenessConfig,
    pub safety: SafetyConfig,
}

/// Per-channel windows after which the latest cached event reads as absent.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StalenessConfig {
    pub gesture_ms: u64,
    pub gaze_ms: u64,
    pub voice_ms: u64,
    pub control_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SafetyConfig {
    /// PINCH held at least this long reads as a drag, not a click.
    pub drag_hold_ms: u64,
    /// PINCH held at least this long (but under drag) self-confirms a click.
    pub click_hold_ms: u64,
    /// PINCH gap tolerated before the session is destroyed.
    pub pinch_debounce_ms: u64,
    /// Voice "click" must land within this window of the pinch to confirm.
    pub voice_correlation_ms: u64,
    /// Shared cooldown for the click family (CLICK/DOUBLE_CLICK/RIGHT_CLICK).
    pub click_cooldown_ms: u64,
    pub scroll_burst_window_ms: u64,
    pub scroll_burst_max: u32,
    /// Minimum |dy| on a FIST before it counts as scroll motion.
    pub scroll_min_dy: f32,
    /// No gesture and no gaze for this long forces disarm.
    pub tracking_loss_ms: u64,
    pub confidence: ConfidenceThresholds,
}

/// Per-kind minimum confidence. CANCEL is deliberately 0.0: a cancel must
/// never be rejected for being uncertain.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ConfidenceThresholds {
    pub cursor_move: f32,
    pub click: f32,
    pub drag: f32,
    pub scroll: f32,
    pub cancel: f32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            tick_hz: 30,
            stability_frames: 3,
            ema_alpha: 0.35,
            bus_queue_depth: 256,
            staleness: StalenessConfig::default(),
            safety: SafetyConfig::default(),
        }
    }
}

impl Default for StalenessConfig {
    fn default() -> Self {
        Self {
            gesture_ms: 300,
            gaze_ms: 500,
            voice_ms: 1500,
            control_ms: 1000,
        }
    }
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            drag_hold_ms: 600,
            click_hold_ms: 150,
            pinch_debounce_ms: 150,
            voice_correlation_ms: 900,
            click_cooldown_ms: 250,
            scroll_burst_window_ms: 1000,
            scroll_burst_max: 5,
            scroll_min_dy: 0.15,
            tracking_loss_ms: 800,
            confidence: ConfidenceThresholds::default(),
        }
    }
}

impl Default for ConfidenceThresholds {
    fn default() -> Self {
        Self {
            cursor_move: 0.5,
            click: 0.7,
            drag: 0.7,
            scroll: 0.6,
            cancel: 0.0,
        }
    }
}

impl ConfidenceThresholds {
    pub fn for_kind(&self, kind: &IntentKind) -> f32 {
        match kind {
            IntentKind::Move { .. } => self.cursor_move,
            IntentKind::Click | IntentKind::DoubleClick | IntentKind::RightClick => self.click,
            IntentKind::DragStart | IntentKind::DragStop => self.drag,
            IntentKind::Scroll { .. } => self.scroll,
            IntentKind::Cancel => self.cancel,
        }
    }
}

impl AppConfig {
    pub fn tick_period_ms(&self) -> u64 {
        (1000 / self.tick_hz.max(1)) as u64
    }

    /// Load from a JSON file, falling back to defaults for absent fields.
    pub fn load(path: &Path) -> Result<Self, CoreError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| CoreError::Config(format!("read {}: {e}", path.display())))?;
        serde_json::from_str(&raw)
            .map_err(|e| CoreError::Config(format!("parse {}: {e}", path.display())))
    }
}
