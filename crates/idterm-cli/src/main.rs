mod cli;
mod commands;
mod output;

use anyhow::Result;
use cli::{Cli, Command};
use clap::Parser;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let overrides = commands::Overrides {
        config:          cli.config,
        tenant_id:       cli.tenant_id,
        subscription_id: cli.subscription_id,
    };

    match cli.command {
        Command::Provision { display_name, duration, resource_group, tags, output } => {
            commands::provision(&overrides, display_name, duration, resource_group, tags, output).await
        }
        Command::Deprovision { state } => commands::deprovision(&overrides, state).await,
        Command::Secret => commands::secret(),
    }
}
