//! Validation for the relay server section.

use crate::schema::RinglineConfig;

use super::helpers::{validate_non_empty, validate_range};

pub(crate) fn validate_relay(errors: &mut Vec<String>, config: &RinglineConfig) {
    validate_non_empty(errors, "relay.bind", &config.relay.bind);
    if config.relay.port == 0 {
        errors.push("relay.port must not be 0".into());
    }
    validate_range(
        errors,
        "relay.register_timeout_secs",
        config.relay.register_timeout_secs,
        1,
        120,
    );
    validate_range(
        errors,
        "relay.outbound_buffer",
        config.relay.outbound_buffer,
        8,
        65536,
    );
}
