/// Contiguous PINCH observation window. Supports long-pinch drag and the
/// two-signal click confirmation; destroyed once PINCH has not been seen for
/// longer than the debounce window.
#[derive(Debug, Clone, Copy)]
pub struct PinchSession {
    pub started: f64,
    pub last_seen: f64,
    /// Peak classifier confidence over the session; the click candidate
    /// inherits it.
    pub confidence: f32,
    /// One click per session; stops an approved click re-firing every tick.
    pub clicked: bool,
    /// DRAG_START already emitted for this session.
    pub drag_started: bool,
}

impl PinchSession {
    pub fn begin(now: f64, confidence: f32) -> Self {
        Self {
            started: now,
            last_seen: now,
            confidence,
            clicked: false,
            drag_started: false,
        }
    }

    pub fn touch(&mut self, now: f64, confidence: f32) {
        self.last_seen = now;
        self.confidence = self.confidence.max(confidence);
    }

    pub fn duration(&self, now: f64) -> f64 {
        (now - self.started).max(0.0)
    }

    /// Duration the pinch was actually observed for, once it has ended.
    pub fn held_duration(&self) -> f64 {
        (self.last_seen - self.started).max(0.0)
    }

    /// PINCH gap exceeded the debounce window; session is over.
    pub fn expired(&self, now: f64, debounce_secs: f64) -> bool {
        now - self.last_seen > debounce_secs
    }
}
