mod cli;
mod commands;
mod softphone;

use ringline_common::Identity;
use tracing_subscriber::EnvFilter;

use crate::softphone::Profile;

#[tokio::main]
async fn main() {
    let args = cli::parse();

    let (mut config, config_error) = match ringline_config::load_config(args.config.as_deref()) {
        Ok(config) => (config, None),
        Err(e) => (ringline_config::RinglineConfig::default(), Some(e)),
    };

    // Logs go to stderr so they do not interleave with the prompt output.
    let default_directive = format!(
        "{},{}",
        config.logging.directive("ringline"),
        config.logging.directive("ringline_call")
    );
    let directive = args.log_level.as_deref().map_or(default_directive, |level| {
        format!("ringline={level},ringline_call={level}")
    });
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive)),
        )
        .init();

    tracing::info!("ringline v{} starting...", env!("CARGO_PKG_VERSION"));
    if let Some(e) = config_error {
        tracing::warn!("Config load failed, using defaults: {e}");
    }

    if let Some(relay) = args.relay {
        config.client.relay_url = relay;
    }
    if let Some(identity) = args.identity {
        config.client.identity = identity;
    }
    if let Some(name) = args.display_name {
        config.client.display_name = name;
    }

    let identity = Identity::new(config.client.identity.trim());
    if identity.as_str().is_empty() {
        eprintln!("no identity configured: pass --identity or set client.identity");
        std::process::exit(1);
    }
    let display_name = if config.client.display_name.trim().is_empty() {
        identity.to_string()
    } else {
        config.client.display_name.clone()
    };

    let profile = Profile {
        identity,
        display_name,
    };
    if let Err(e) = softphone::run(config, profile).await {
        tracing::error!(error = %e, "Softphone exited with error");
        std::process::exit(1);
    }
    tracing::info!("Shutdown complete");
}
