//! ringline-relay binary: WebSocket signaling relay for voice calls.

use std::path::PathBuf;

use clap::Parser;
use ringline_relay::{serve, ConnectionSettings, PresenceRegistry, SignalingRelay};
use tokio::net::TcpListener;

#[derive(Parser)]
#[command(name = "ringline-relay", version, about = "Signaling relay for ringline voice calls")]
struct Args {
    /// Config file path (defaults to the platform config dir).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Address to bind (overrides config).
    #[arg(long)]
    bind: Option<String>,

    /// Port to listen on (overrides config).
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let config = ringline_config::load_config(args.config.as_deref()).unwrap_or_else(|e| {
        eprintln!("config load failed, using defaults: {e}");
        ringline_config::RinglineConfig::default()
    });

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.directive("ringline_relay").into()),
        )
        .init();

    let mut relay_config = config.relay.clone();
    if let Some(bind) = args.bind {
        relay_config.bind = bind;
    }
    if let Some(port) = args.port {
        relay_config.port = port;
    }

    let addr = relay_config.listen_addr();
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(addr = %addr, error = %e, "Failed to bind TCP listener");
            std::process::exit(1);
        }
    };

    tracing::info!("ringline-relay listening on {}", addr);

    let settings = ConnectionSettings {
        register_timeout: relay_config.register_timeout(),
        outbound_buffer: relay_config.outbound_buffer as usize,
    };
    let relay = SignalingRelay::new(PresenceRegistry::new());
    serve(listener, relay, settings).await;
}
