use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::WireError;

/// The four signal channels flowing through the bus. One latest-value slot
/// exists per channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    Gesture,
    Gaze,
    Voice,
    Control,
}

impl Channel {
    pub const ALL: [Channel; 4] = [
        Channel::Gesture,
        Channel::Gaze,
        Channel::Voice,
        Channel::Control,
    ];

    pub fn index(self) -> usize {
        match self {
            Channel::Gesture => 0,
            Channel::Gaze => 1,
            Channel::Voice => 2,
            Channel::Control => 3,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Channel::Gesture => "gesture",
            Channel::Gaze => "gaze",
            Channel::Voice => "voice",
            Channel::Control => "control",
        }
    }
}

/// Hand gesture classification with its fixed metadata per kind.
/// The producer is the measurement authority: POINT carries the raw pointing
/// vector, FIST carries vertical motion in normalized units/sec.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GestureSignal {
    OpenPalm,
    Fist { dy: f32 },
    Point { x: f32, y: f32 },
    Pinch,
}

impl GestureSignal {
    pub fn name(&self) -> &'static str {
        match self {
            GestureSignal::OpenPalm => "OPEN_PALM",
            GestureSignal::Fist { .. } => "FIST",
            GestureSignal::Point { .. } => "POINT",
            GestureSignal::Pinch => "PINCH",
        }
    }

    /// Same classification regardless of per-frame metadata. This is the
    /// equality the stability filter counts runs with.
    pub fn same_kind(&self, other: &GestureSignal) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handedness {
    Left,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GazeDirection {
    Left,
    Center,
    Right,
    /// No face in frame. Counts toward tracking loss.
    None,
}

impl GazeDirection {
    pub fn name(&self) -> &'static str {
        match self {
            GazeDirection::Left => "LEFT",
            GazeDirection::Center => "CENTER",
            GazeDirection::Right => "RIGHT",
            GazeDirection::None => "NONE",
        }
    }
}

/// Canonical transcribed push-to-talk command. Unknown commands are preserved
/// so the log shows what the transcriber actually heard.
#[derive(Debug, Clone, PartialEq)]
pub enum VoiceCommand {
    Click,
    Stop,
    Other(String),
}

impl VoiceCommand {
    pub fn name(&self) -> &str {
        match self {
            VoiceCommand::Click => "click",
            VoiceCommand::Stop => "stop",
            VoiceCommand::Other(s) => s.as_str(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlSignal {
    Arm,
    Disarm,
    EmergencyStop,
}

impl ControlSignal {
    pub fn name(&self) -> &'static str {
        match self {
            ControlSignal::Arm => "ARM",
            ControlSignal::Disarm => "DISARM",
            ControlSignal::EmergencyStop => "EMERGENCY_STOP",
        }
    }

    /// Applied the instant they are observed, never queued behind the tick.
    pub fn is_preemptive(&self) -> bool {
        matches!(self, ControlSignal::Disarm | ControlSignal::EmergencyStop)
    }
}

/// Tagged payload per channel. Replaces the free-form meta object of the wire
/// format with a fixed field set per kind, so fusion can match exhaustively.
#[derive(Debug, Clone, PartialEq)]
pub enum Signal {
    Gesture {
        gesture: GestureSignal,
        handedness: Option<Handedness>,
    },
    Gaze(GazeDirection),
    Voice(VoiceCommand),
    Control(ControlSignal),
}

impl Signal {
    pub fn channel(&self) -> Channel {
        match self {
            Signal::Gesture { .. } => Channel::Gesture,
            Signal::Gaze(_) => Channel::Gaze,
            Signal::Voice(_) => Channel::Voice,
            Signal::Control(_) => Channel::Control,
        }
    }
}

/// Canonical event flowing through the system. Immutable once published.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "WireEvent", into = "WireEvent")]
pub struct Event {
    /// Producer timestamp, float epoch seconds.
    pub ts: f64,
    pub confidence: f32,
    pub signal: Signal,
}

impl Event {
    pub fn new(ts: f64, confidence: f32, signal: Signal) -> Self {
        Self {
            ts,
            confidence,
            signal,
        }
    }

    pub fn gesture(ts: f64, confidence: f32, gesture: GestureSignal) -> Self {
        Self::new(
            ts,
            confidence,
            Signal::Gesture {
                gesture,
                handedness: None,
            },
        )
    }

    pub fn gaze(ts: f64, confidence: f32, dir: GazeDirection) -> Self {
        Self::new(ts, confidence, Signal::Gaze(dir))
    }

    pub fn voice(ts: f64, confidence: f32, cmd: VoiceCommand) -> Self {
        Self::new(ts, confidence, Signal::Voice(cmd))
    }

    pub fn control(ts: f64, signal: ControlSignal) -> Self {
        Self::new(ts, 1.0, Signal::Control(signal))
    }

    pub fn channel(&self) -> Channel {
        self.signal.channel()
    }

    /// Age relative to the observer's clock. Negative clock skew clamps to 0.
    pub fn age(&self, now: f64) -> f64 {
        (now - self.ts).max(0.0)
    }
}

/// JSON mirror of the external wire shape:
/// `{ "ts", "type", "name", "confidence", "meta" }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireEvent {
    pub ts: f64,
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub meta: Value,
}

fn meta_f32(meta: &Value, field: &'static str) -> Result<f32, WireError> {
    meta.get(field)
        .and_then(Value::as_f64)
        .map(|v| v as f32)
        .ok_or(WireError::MissingMeta(field))
}

impl TryFrom<WireEvent> for Event {
    type Error = WireError;

    fn try_from(wire: WireEvent) -> Result<Self, WireError> {
        let confidence = wire.confidence.unwrap_or(1.0);
        if !(0.0..=1.0).contains(&confidence) {
            return Err(WireError::BadConfidence(confidence));
        }

        let signal = match wire.kind.as_str() {
            "gesture" => {
                let gesture = match wire.name.as_str() {
                    "OPEN_PALM" => GestureSignal::OpenPalm,
                    "FIST" => GestureSignal::Fist {
                        dy: meta_f32(&wire.meta, "dy").unwrap_or(0.0),
                    },
                    "POINT" => GestureSignal::Point {
                        x: meta_f32(&wire.meta, "x_norm")?,
                        y: meta_f32(&wire.meta, "y_norm")?,
                    },
                    "PINCH" => GestureSignal::Pinch,
                    other => {
                        return Err(WireError::UnknownName {
                            channel: "gesture",
                            name: other.to_string(),
                        })
                    }
                };
                let handedness = match wire.meta.get("handedness").and_then(Value::as_str) {
                    Some("Left") | Some("left") => Some(Handedness::Left),
                    Some("Right") | Some("right") => Some(Handedness::Right),
                    _ => None,
                };
                Signal::Gesture {
                    gesture,
                    handedness,
                }
            }
            "gaze" => {
                let dir = match wire.name.as_str() {
                    "LEFT" => GazeDirection::Left,
                    "CENTER" => GazeDirection::Center,
                    "RIGHT" => GazeDirection::Right,
                    "NONE" => GazeDirection::None,
                    other => {
                        return Err(WireError::UnknownName {
                            channel: "gaze",
                            name: other.to_string(),
                        })
                    }
                };
                Signal::Gaze(dir)
            }
            "voice" => Signal::Voice(match wire.name.as_str() {
                "click" => VoiceCommand::Click,
                "stop" => VoiceCommand::Stop,
                other => VoiceCommand::Other(other.to_string()),
            }),
            "control" => Signal::Control(match wire.name.as_str() {
                "ARM" => ControlSignal::Arm,
                "DISARM" => ControlSignal::Disarm,
                "EMERGENCY_STOP" => ControlSignal::EmergencyStop,
                other => {
                    return Err(WireError::UnknownName {
                        channel: "control",
                        name: other.to_string(),
                    })
                }
            }),
            other => return Err(WireError::UnknownChannel(other.to_string())),
        };

        Ok(Event {
            ts: wire.ts,
            confidence: confidence as f32,
            signal,
        })
    }
}

impl From<Event> for WireEvent {
    fn from(event: Event) -> Self {
        let (name, meta) = match &event.signal {
            Signal::Gesture {
                gesture,
                handedness,
            } => {
                let mut meta = serde_json::Map::new();
                match gesture {
                    GestureSignal::Fist { dy } => {
                        meta.insert("dy".into(), (*dy as f64).into());
                    }
                    GestureSignal::Point { x, y } => {
                        meta.insert("x_norm".into(), (*x as f64).into());
                        meta.insert("y_norm".into(), (*y as f64).into());
                    }
                    _ => {}
                }
                if let Some(hand) = handedness {
                    let tag = match hand {
                        Handedness::Left => "Left",
                        Handedness::Right => "Right",
                    };
                    meta.insert("handedness".into(), tag.into());
                }
                (gesture.name().to_string(), Value::Object(meta))
            }
            Signal::Gaze(dir) => (dir.name().to_string(), Value::Object(Default::default())),
            Signal::Voice(cmd) => (cmd.name().to_string(), Value::Object(Default::default())),
            Signal::Control(sig) => (sig.name().to_string(), Value::Object(Default::default())),
        };

        WireEvent {
            ts: event.ts,
            kind: event.channel().label().to_string(),
            name,
            confidence: Some(event.confidence as f64),
            meta,
        }
    }
}
