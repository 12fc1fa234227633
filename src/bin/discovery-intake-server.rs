use clap::Parser;
use discovery_intake::{serve, Config, TracingService};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "discovery-intake-server")]
#[command(about = "Serves the discovery intake CloudEvent function over HTTP")]
struct Args {
    /// Configuration file (defaults to configs/default.toml when present)
    #[arg(long, env = "INTAKE_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = Config::load(args.config.as_deref())?;
    TracingService::init(&config.logging)?;
    config.validate()?;

    info!(
        port = config.server.port,
        function_target = %config.function.target,
        "Starting discovery intake server"
    );
    serve(config).await
}
