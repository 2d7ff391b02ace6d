//! Bootstrap configuration.
//!
//! This module is split into logical submodules:
//! - [`types`]: config struct definitions and loading
//! - [`defaults`]: serde default values
//! - [`validation`]: start-up checks collecting every problem found
//!
//! Runtime-tunable values live in the settings document, not here.

mod defaults;
mod types;
mod validation;

pub use types::{BotConfig, ChatConfig, Config, ConfigError, GameConfig, MetricsConfig, WorldConfig};
pub use validation::{ValidationError, validate};
