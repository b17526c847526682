//! Full configuration validation.
//!
//! Each section has its own validator; this orchestrator calls them all
//! and collects errors into a single `ConfigError`.

mod helpers;
mod misc;
mod relay;


use crate::schema::RinglineConfig;
use ringline_common::ConfigError;

/// Run all validations on a config, collecting all errors.
pub fn validate(config: &RinglineConfig) -> Result<(), ConfigError> {
    let mut errors: Vec<String> = Vec::new();

    relay::validate_relay(&mut errors, config);
    misc::validate_client(&mut errors, config);
    misc::validate_call(&mut errors, config);
    misc::validate_media(&mut errors, config);

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::ValidationError(errors.join("; ")))
    }
}
