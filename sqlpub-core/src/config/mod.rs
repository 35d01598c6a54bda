//! Configuration types for the connector.
//!
//! - `Settings`: caller-supplied connection settings (connection string,
//!   password, pre/post publish queries)
//! - `EngineConfig`: pool sizing and time budgets for the engine itself

mod engine;
mod settings;

pub use engine::EngineConfig;
pub use settings::{PASSWORD_PLACEHOLDER, Settings};
