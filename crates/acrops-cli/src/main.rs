//! acrops CLI - runs the AcrDeployment controller and its diagnostics.

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

use commands::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "acrops=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run(args) => commands::run::execute(args).await,
        Commands::Crd(args) => commands::crd::run(&args),
        Commands::Catalog(args) => commands::catalog::execute(args).await,
        Commands::Version => {
            println!("acrops {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}
