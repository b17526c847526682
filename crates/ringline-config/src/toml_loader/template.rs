//! Default TOML config template with inline documentation comments.

/// Generate the default TOML config content with comments.
pub(crate) fn default_config_toml() -> String {
    r##"# ringline configuration
# Schema version 1
# Only override what you want to change -- missing fields use defaults.

[relay]
# bind = "0.0.0.0"
# port = 8080
# register_timeout_secs = 10   # 1-120
# outbound_buffer = 256        # 8-65536

[client]
# relay_url = "ws://127.0.0.1:8080"
# identity = "+100"
# display_name = "Alice"
# reconnect_delay_secs = 1      # 1-60
# max_reconnect_delay_secs = 30 # 1-600

[call]
# ring_timeout_secs = 45       # 5-300

[media]
# app_id = ""
# credential_url = "http://127.0.0.1:8081/token"
# credential_attempts = 4      # 1-10
# credential_base_delay_ms = 250
# credential_max_delay_ms = 4000
# request_timeout_secs = 10    # 1-60

[logging]
# level = "info"               # trace, debug, info, warn, error
"##
    .to_string()
}
