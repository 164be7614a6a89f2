use std::time::{SystemTime, UNIX_EPOCH};

/// Logical frame counter for the control cadence. Wall time lives on the
/// events themselves (epoch seconds); the tick only orders engine steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Tick {
    pub frame: u64,
}

impl Tick {
    pub fn new() -> Self {
        Tick { frame: 0 }
    }

    pub fn next(&self) -> Self {
        Tick {
            frame: self.frame + 1,
        }
    }
}

impl Default for Tick {
    fn default() -> Self {
        Self::new()
    }
}

/// Current wall time as float epoch seconds, the unit every producer stamps
/// its events with.
pub fn epoch_secs() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

/// Millisecond config values to the seconds the core computes in.
pub fn ms_to_secs(ms: u64) -> f64 {
    ms as f64 / 1000.0
}
