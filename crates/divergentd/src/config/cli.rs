use clap::{Parser, Subcommand};
use utils::version;

use crate::config::daemon::DaemonArgs;

#[derive(Parser)]
#[command(about, long_about, version = &**version::VERSION)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Aggregate line protocol input and emit divergence rates
    Daemon(Box<DaemonArgs>),
    /// Print the resolved configuration as YAML and exit
    #[command(name = "show-config")]
    ShowConfig(Box<DaemonArgs>),
}
