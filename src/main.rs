use anyhow::anyhow;
use clap::Parser;
use tracing::info;

use voicebridge::{AppState, ServerConfig, server};

/// Voicebridge - real-time voice-agent bridge
#[derive(Parser, Debug)]
#[command(name = "voicebridge")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Bind host (overrides BRIDGE_HOST)
    #[arg(long = "host")]
    host: Option<String>,

    /// Bind port (overrides BRIDGE_PORT)
    #[arg(long = "port")]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if it exists (must be done before config loading)
    let _ = dotenvy::dotenv();

    // Initialize tracing
    tracing_subscriber::fmt::init();

    // Initialize crypto provider for TLS connections
    // This must be done before any TLS connections are attempted
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow!("Failed to install default crypto provider"))?;

    let cli = Cli::parse();

    let mut config = ServerConfig::from_env();
    if let Some(host) = cli.host {
        config.host = host;
    }
    if let Some(port) = cli.port {
        config.port = port;
    }

    if config.upstream_config().is_none() {
        info!("AGENT_ID / ELEVENLABS_API_KEY not set; sessions will be refused");
    }

    let state = AppState::new(config);
    server::run(state).await
}
