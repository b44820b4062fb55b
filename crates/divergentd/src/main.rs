mod app;
mod config;
mod filter;
mod ingest;
mod output;
mod pipeline;

use anyhow::Context;
use anyhow::Result;
use clap::Parser;
use tracing::level_filters::LevelFilter;
use utils::version;

use crate::app::ApplicationBuilder;
use crate::config::AggregatorConfig;
use crate::config::Cli;
use crate::config::Commands;
use crate::config::DaemonArgs;

/// Sets up global panic hooks.
fn setup_global_hooks() {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        default_hook(panic_info);
        tracing::error!("Thread panicked: {}", panic_info);
    }));
}

#[tokio::main]
async fn main() -> Result<()> {
    setup_global_hooks();

    let cli = Cli::parse();

    match cli.command {
        Commands::Daemon(daemon_args) => run_daemon(*daemon_args).await,
        Commands::ShowConfig(daemon_args) => show_config(&daemon_args),
    }
}

async fn run_daemon(daemon_args: DaemonArgs) -> Result<()> {
    utils::logging::init(LevelFilter::INFO);

    tracing::info!("Starting divergent aggregator {}", &**version::VERSION);

    let config = AggregatorConfig::resolve(&daemon_args).context("invalid configuration")?;
    tracing::info!(
        period = ?config.period,
        drop_original = config.drop_original,
        reset_mode = %config.reset_mode,
        "Resolved configuration"
    );

    let app = ApplicationBuilder::new(config).build()?;
    app.run().await?;

    Ok(())
}

fn show_config(daemon_args: &DaemonArgs) -> Result<()> {
    let config = AggregatorConfig::resolve(daemon_args).context("invalid configuration")?;
    print!("{}", serde_yaml::to_string(&config)?);
    Ok(())
}
