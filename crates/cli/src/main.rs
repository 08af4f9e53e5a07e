// CLI modules
mod cli;

use clap::{Parser, Subcommand};
use cli::{
    args::Args, op::Op, Decomposedfs, Init, Postprocessing, Revisions, Trash, TrashBin, Version,
};
use dfs_cli::{init_logging, LogConfig};

command_enum! {
    (Decomposedfs, Decomposedfs),
    (Init, Init),
    (Postprocessing, Postprocessing),
    (Revisions, Revisions),
    (Trash, Trash),
    (TrashBin, TrashBin),
    (Version, Version),
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let cancel = match dfs_cli::process::cancel_on_shutdown() {
        Ok(token) => token,
        Err(e) => {
            eprintln!("Error: Failed to install signal handlers: {}", e);
            std::process::exit(1);
        }
    };

    // Build context - falls back to the default config when not initialized
    let ctx = match cli::op::OpContext::new(
        args.config_path,
        args.gateway_url,
        args.events_url,
        args.verbose,
        cancel,
    ) {
        Ok(ctx) => ctx,
        Err(e) => {
            eprintln!("Error: Failed to load config: {}", e);
            std::process::exit(1);
        }
    };

    // Keep the guards alive so buffered log lines get flushed on exit
    let guards = init_logging(&LogConfig::new(ctx.verbose, ctx.config.log_dir.clone()));

    let code = match args.command.execute(&ctx).await {
        Ok(output) => {
            println!("{}", output);
            0
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    };

    drop(guards);
    std::process::exit(code);
}
