//! Cadence Services Layer
//!
//! Startup configuration, persisted settings and input bindings.

pub mod config;
pub mod input;
pub mod settings;

pub use config::{Args, ConfigError, RuntimeConfig};
pub use input::{Action, BindingError, InputBindings};
pub use settings::{Settings, SettingsError};
