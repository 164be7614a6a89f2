use serde::Serialize;

/// Exactly one mode is active at any instant (the enum makes two-at-once
/// unrepresentable). `Safe` is both the initial state and the universal
/// fallback reachable from every other mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Mode {
    Safe,
    Armed,
    CursorMove,
    DragMode,
}

impl Default for Mode {
    fn default() -> Self {
        Mode::Safe
    }
}

impl Mode {
    pub fn name(&self) -> &'static str {
        match self {
            Mode::Safe => "SAFE",
            Mode::Armed => "ARMED",
            Mode::CursorMove => "CURSOR_MOVE",
            Mode::DragMode => "DRAG_MODE",
        }
    }
}
