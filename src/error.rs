use thiserror::Error;

/// Failures that can unwind out of the core. Everything a noisy or stale
/// signal can cause is a normal `Decision`/absence value, not an error; this
/// taxonomy is only for the boundaries (wire, config, dispatcher).
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("malformed wire event: {0}")]
    Wire(#[from] WireError),

    #[error("config error: {0}")]
    Config(String),

    #[error("dispatcher channel closed")]
    ChannelClosed,
}

/// Inbound JSON that does not map onto the typed event model.
/// Logged and skipped by the driver, never fatal.
#[derive(Debug, Error)]
pub enum WireError {
    #[error("unknown channel type '{0}'")]
    UnknownChannel(String),

    #[error("unknown {channel} name '{name}'")]
    UnknownName { channel: &'static str, name: String },

    #[error("missing meta field '{0}'")]
    MissingMeta(&'static str),

    #[error("confidence {0} outside [0,1]")]
    BadConfidence(f64),
}
