use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

/// Discrete action candidate derived from fused signals. Metadata is a fixed
/// field set per kind; nothing downstream ever pattern-matches a free-form
/// object.
#[derive(Debug, Clone, PartialEq)]
pub enum IntentKind {
    /// Smoothed absolute pointer target, normalized [0,1] screen coords.
    Move { x: f32, y: f32 },
    Click,
    DoubleClick,
    RightClick,
    DragStart,
    DragStop,
    Scroll {
        direction: ScrollDirection,
        magnitude: f32,
    },
    Cancel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ScrollDirection {
    Up,
    Down,
}

impl IntentKind {
    pub fn name(&self) -> &'static str {
        match self {
            IntentKind::Move { .. } => "MOVE",
            IntentKind::Click => "CLICK",
            IntentKind::DoubleClick => "DOUBLE_CLICK",
            IntentKind::RightClick => "RIGHT_CLICK",
            IntentKind::DragStart => "DRAG_START",
            IntentKind::DragStop => "DRAG_STOP",
            IntentKind::Scroll { .. } => "SCROLL",
            IntentKind::Cancel => "CANCEL",
        }
    }

    /// CLICK/DOUBLE_CLICK/RIGHT_CLICK share one cooldown.
    pub fn is_click_family(&self) -> bool {
        matches!(
            self,
            IntentKind::Click | IntentKind::DoubleClick | IntentKind::RightClick
        )
    }
}

/// Produced by the intent engine, mutated by nobody. Either approved and
/// forwarded or discarded; never queued for retry.
#[derive(Debug, Clone, PartialEq)]
pub struct Intent {
    pub id: Uuid,
    pub ts: f64,
    pub kind: IntentKind,
    pub confidence: f32,
}

impl Intent {
    pub fn new(ts: f64, kind: IntentKind, confidence: f32) -> Self {
        Self {
            id: Uuid::new_v4(),
            ts,
            kind,
            confidence,
        }
    }

    /// Outbound wire shape for the action dispatcher:
    /// `{ "ts", "type": "intent", "name", "confidence", "meta" }`.
    pub fn to_wire(&self) -> Value {
        let mut meta = serde_json::Map::new();
        match &self.kind {
            IntentKind::Move { x, y } => {
                meta.insert("x_norm".into(), (*x as f64).into());
                meta.insert("y_norm".into(), (*y as f64).into());
            }
            IntentKind::Scroll {
                direction,
                magnitude,
            } => {
                meta.insert(
                    "direction".into(),
                    match direction {
                        ScrollDirection::Up => "up",
                        ScrollDirection::Down => "down",
                    }
                    .into(),
                );
                meta.insert("magnitude".into(), (*magnitude as f64).into());
            }
            _ => {}
        }
        serde_json::json!({
            "ts": self.ts,
            "type": "intent",
            "name": self.kind.name(),
            "confidence": self.confidence,
            "meta": Value::Object(meta),
        })
    }
}
