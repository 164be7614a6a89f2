pub mod engine;
pub mod filters;
pub mod intent;
pub mod mode;
pub mod pinch;

pub use engine::{IntentEngine, TickOutput};
pub use intent::{Intent, IntentKind, ScrollDirection};
pub use mode::Mode;
