//! Validation for the client, call, and media sections.

use crate::schema::RinglineConfig;

use super::helpers::{validate_range, validate_scheme};

/// Validate client connection settings. Identity is checked by the client
/// binary itself, since the relay never needs one.
pub(crate) fn validate_client(errors: &mut Vec<String>, config: &RinglineConfig) {
    validate_scheme(
        errors,
        "client.relay_url",
        &config.client.relay_url,
        &["ws://", "wss://"],
    );
    validate_range(
        errors,
        "client.reconnect_delay_secs",
        config.client.reconnect_delay_secs,
        1,
        60,
    );
    validate_range(
        errors,
        "client.max_reconnect_delay_secs",
        config.client.max_reconnect_delay_secs,
        1,
        600,
    );
    if config.client.max_reconnect_delay_secs < config.client.reconnect_delay_secs {
        errors.push(
            "client.max_reconnect_delay_secs must be >= client.reconnect_delay_secs".into(),
        );
    }
}

pub(crate) fn validate_call(errors: &mut Vec<String>, config: &RinglineConfig) {
    validate_range(
        errors,
        "call.ring_timeout_secs",
        config.call.ring_timeout_secs,
        5,
        300,
    );
}

pub(crate) fn validate_media(errors: &mut Vec<String>, config: &RinglineConfig) {
    validate_scheme(
        errors,
        "media.credential_url",
        &config.media.credential_url,
        &["http://", "https://"],
    );
    validate_range(
        errors,
        "media.credential_attempts",
        config.media.credential_attempts,
        1,
        10,
    );
    validate_range(
        errors,
        "media.credential_base_delay_ms",
        config.media.credential_base_delay_ms,
        10,
        10_000,
    );
    validate_range(
        errors,
        "media.credential_max_delay_ms",
        config.media.credential_max_delay_ms,
        10,
        60_000,
    );
    if config.media.credential_max_delay_ms < config.media.credential_base_delay_ms {
        errors.push(
            "media.credential_max_delay_ms must be >= media.credential_base_delay_ms".into(),
        );
    }
    validate_range(
        errors,
        "media.request_timeout_secs",
        config.media.request_timeout_secs,
        1,
        60,
    );
}
