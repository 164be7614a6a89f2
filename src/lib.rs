pub mod bus;
pub mod config;
pub mod error;
pub mod kernel;
pub mod runtime;
pub mod safety;
pub mod telemetry;
pub mod time;

pub use bus::EventBus;
pub use config::AppConfig;
pub use kernel::engine::IntentEngine;
pub use runtime::ControlLoop;
pub use safety::SafetyGuard;
