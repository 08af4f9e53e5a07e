pub use clap::Parser;

use std::path::PathBuf;
use url::Url;

#[derive(Parser, Debug)]
#[command(name = "dfs")]
#[command(about = "Maintenance commands for decomposed filesystem storage")]
pub struct Args {
    /// Path to the dfs config directory (defaults to ~/.dfs)
    #[arg(long, global = true)]
    pub config_path: Option<PathBuf>,

    /// Storage gateway URL (overrides gateway_url from the config)
    #[arg(long, global = true)]
    pub gateway_url: Option<Url>,

    /// Event bus URL (overrides events_url from the config)
    #[arg(long, global = true)]
    pub events_url: Option<Url>,

    /// Log every decision instead of only warnings
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: crate::Command,
}
