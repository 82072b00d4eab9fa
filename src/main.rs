use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use aura_gateway::{ApiServer, Config};

/// Aura - emotion-aware conversational gateway
#[derive(Parser)]
#[command(name = "aura", version, about)]
struct Cli {
    /// Port to listen on
    #[arg(long, env = "AURA_PORT", default_value = "8000")]
    port: u16,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "info,aura_gateway=info",
        1 => "info,aura_gateway=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = Config::from_env();
    config.api_server.port = cli.port;
    tracing::debug!(port = config.api_server.port, "loaded configuration");

    tracing::info!(
        port = config.api_server.port,
        responder_model = %config.responder.model,
        stt_model = %config.voice.stt_model,
        "starting aura gateway"
    );

    let server = ApiServer::build(config);
    server.serve().await?;

    Ok(())
}
