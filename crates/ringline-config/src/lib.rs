//! ringline configuration system.
//!
//! Provides TOML-based configuration for the relay server and call
//! clients. All config sections use sensible defaults so partial configs
//! work out of the box.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use ringline_config::load_config;
//!
//! let config = load_config(None).expect("failed to load config");
//! println!("ring timeout: {:?}", config.call.ring_timeout());
//! ```

pub mod schema;
pub mod toml_loader;
pub mod validation;

pub use schema::{
    CallConfig, ClientConfig, LogLevel, LoggingConfig, MediaConfig, RelayConfig, RinglineConfig,
    CONFIG_SCHEMA_VERSION,
};

use ringline_common::ConfigError;
use std::path::Path;

/// Load and validate config.
///
/// With an explicit `path` the file must exist; otherwise `config.toml` is
/// read from the OS config directory and created with defaults if missing.
pub fn load_config(path: Option<&Path>) -> Result<RinglineConfig, ConfigError> {
    let config = match path {
        Some(path) => toml_loader::load_from_path(path)?,
        None => toml_loader::load_default()?,
    };
    validation::validate(&config)?;
    Ok(config)
}
