use std::path::PathBuf;

use clap::Args;

use dfs_cli::state::{AppConfig, AppState, StateError};

#[derive(Args, Debug, Clone)]
pub struct Init {
    /// Root of the decomposed storage
    #[arg(long)]
    pub storage_root: Option<PathBuf>,

    /// Directory for log files
    #[arg(long)]
    pub log_dir: Option<PathBuf>,
}

#[derive(Debug, thiserror::Error)]
pub enum InitError {
    #[error("init failed: {0}")]
    State(#[from] StateError),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Init {
    type Error = InitError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let config = AppConfig {
            storage_root: self.storage_root.clone(),
            // Taken from the global --gateway-url / --events-url flags
            gateway_url: ctx.gateway_url.clone(),
            events_url: ctx.events_url.clone(),
            log_dir: self.log_dir.clone(),
            ..Default::default()
        };

        let state = AppState::init(ctx.config_path.clone(), Some(config))?;
        Ok(format!(
            "Initialized dfs config at {}",
            state.config_path.display()
        ))
    }
}
