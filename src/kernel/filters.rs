use crate::bus::GestureSignal;

/// N-consecutive-sample stability gate for the gesture channel.
///
/// A raw classification only enters fusion once it has been the reported
/// value for `required` consecutive producer samples; a single-frame flip
/// neither surfaces nor destroys an established run's standing. Samples are
/// detected by timestamp change, so a tick that observes no new producer
/// frame leaves the counters untouched.
#[derive(Debug)]
pub struct StabilityFilter {
    required: u32,
    candidate: Option<GestureSignal>,
    run: u32,
    accepted: Option<GestureSignal>,
    last_sample_ts: Option<f64>,
}

impl StabilityFilter {
    pub fn new(required: u32) -> Self {
        Self {
            required: required.max(1),
            candidate: None,
            run: 0,
            accepted: None,
            last_sample_ts: None,
        }
    }

    /// Feed the latest cached gesture sample (or absence). Returns the
    /// currently accepted, stable gesture.
    pub fn observe(&mut self, sample: Option<(f64, GestureSignal)>) -> Option<GestureSignal> {
        match sample {
            None => {
                // Channel absent/stale: everything resets. Absence is
                // no-signal, not the last known gesture.
                self.candidate = None;
                self.run = 0;
                self.accepted = None;
            }
            Some((ts, gesture)) => {
                if self.last_sample_ts == Some(ts) {
                    // Same producer frame as last tick; no new evidence.
                    return self.accepted;
                }
                self.last_sample_ts = Some(ts);

                match &self.candidate {
                    Some(current) if current.same_kind(&gesture) => {
                        self.run = self.run.saturating_add(1);
                        // Refresh metadata so POINT vectors track the frame.
                        self.candidate = Some(gesture);
                    }
                    _ => {
                        self.candidate = Some(gesture);
                        self.run = 1;
                    }
                }

                if self.run >= self.required {
                    self.accepted = self.candidate;
                } else if let Some(acc) = self.accepted {
                    // An unstable newcomer does not dethrone the accepted
                    // gesture unless it completes its own run.
                    if acc.same_kind(&gesture) {
                        self.accepted = Some(gesture);
                    }
                }
            }
        }
        self.accepted
    }

    pub fn accepted(&self) -> Option<GestureSignal> {
        self.accepted
    }

    pub fn reset(&mut self) {
        self.candidate = None;
        self.run = 0;
        self.accepted = None;
    }
}

/// Exponential moving average over the raw pointing vector:
/// `smoothed = alpha * raw + (1 - alpha) * smoothed_prev`.
#[derive(Debug, Clone, Copy)]
pub struct EmaFilter {
    alpha: f32,
    state: Option<(f32, f32)>,
}

impl EmaFilter {
    pub fn new(alpha: f32) -> Self {
        Self {
            alpha: alpha.clamp(0.0, 1.0),
            state: None,
        }
    }

    pub fn update(&mut self, x: f32, y: f32) -> (f32, f32) {
        let next = match self.state {
            None => (x, y),
            Some((px, py)) => (
                self.alpha * x + (1.0 - self.alpha) * px,
                self.alpha * y + (1.0 - self.alpha) * py,
            ),
        };
        self.state = Some(next);
        next
    }

    pub fn reset(&mut self) {
        self.state = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point() -> GestureSignal {
        GestureSignal::Point { x: 0.5, y: 0.5 }
    }

    #[test]
    fn gesture_needs_n_consecutive_samples() {
        let mut filter = StabilityFilter::new(3);
        assert_eq!(filter.observe(Some((1.0, point()))), None);
        assert_eq!(filter.observe(Some((1.1, point()))), None);
        assert!(filter.observe(Some((1.2, point()))).is_some());
    }

    #[test]
    fn single_frame_flip_does_not_dethrone() {
        let mut filter = StabilityFilter::new(3);
        for i in 0..3 {
            filter.observe(Some((1.0 + i as f64 * 0.1, point())));
        }
        assert!(matches!(
            filter.accepted(),
            Some(GestureSignal::Point { .. })
        ));

        // One FIST frame: accepted gesture stands.
        filter.observe(Some((1.4, GestureSignal::Fist { dy: 0.0 })));
        assert!(matches!(
            filter.accepted(),
            Some(GestureSignal::Point { .. })
        ));

        // But a completed FIST run takes over.
        filter.observe(Some((1.5, GestureSignal::Fist { dy: 0.0 })));
        filter.observe(Some((1.6, GestureSignal::Fist { dy: 0.0 })));
        assert!(matches!(filter.accepted(), Some(GestureSignal::Fist { .. })));
    }

    #[test]
    fn repeated_tick_without_new_frame_adds_no_evidence() {
        let mut filter = StabilityFilter::new(2);
        filter.observe(Some((1.0, point())));
        // Same producer timestamp observed on three engine ticks.
        filter.observe(Some((1.0, point())));
        filter.observe(Some((1.0, point())));
        assert_eq!(filter.accepted(), None);
    }

    #[test]
    fn absence_clears_acceptance() {
        let mut filter = StabilityFilter::new(1);
        filter.observe(Some((1.0, point())));
        assert!(filter.accepted().is_some());
        filter.observe(None);
        assert_eq!(filter.accepted(), None);
    }

    #[test]
    fn ema_converges_toward_raw() {
        let mut ema = EmaFilter::new(0.5);
        assert_eq!(ema.update(1.0, 0.0), (1.0, 0.0));
        let (x, _) = ema.update(0.0, 0.0);
        assert!((x - 0.5).abs() < 1e-6);
        let (x, _) = ema.update(0.0, 0.0);
        assert!((x - 0.25).abs() < 1e-6);
    }
}
