use std::path::PathBuf;

use clap::{ArgAction, Args, Subcommand};

use common::trash::purge_empty_dirs;

use crate::cli::op::{ContextError, Op, OpContext};

crate::command_enum! {
    (PurgeEmptyDirs, PurgeEmptyDirs),
}

// Rename the generated Command to TrashCommand for clarity
pub type TrashCommand = Command;

/// Maintain the on-disk trash of a decomposed storage
#[derive(Args, Debug, Clone)]
pub struct Trash {
    #[command(subcommand)]
    pub command: TrashCommand,
}

#[async_trait::async_trait]
impl Op for Trash {
    type Error = OpError;
    type Output = OpOutput;

    async fn execute(&self, ctx: &OpContext) -> Result<Self::Output, Self::Error> {
        self.command.execute(ctx).await
    }
}

/// Remove empty directories left behind in the trash of every space
#[derive(Args, Debug, Clone)]
pub struct PurgeEmptyDirs {
    /// Storage root (defaults to storage_root from the config)
    #[arg(short = 'p', long)]
    pub basepath: Option<PathBuf>,

    /// Only list what would be removed
    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    pub dry_run: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum PurgeEmptyDirsError {
    #[error(transparent)]
    Context(#[from] ContextError),
    #[error("invalid trash pattern: {0}")]
    Pattern(#[from] glob::PatternError),
    #[error("trash scan task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

#[async_trait::async_trait]
impl Op for PurgeEmptyDirs {
    type Error = PurgeEmptyDirsError;
    type Output = String;

    async fn execute(&self, ctx: &OpContext) -> Result<Self::Output, Self::Error> {
        let root = ctx.storage_root(self.basepath.as_ref())?;
        let dry_run = self.dry_run;
        let report = tokio::task::spawn_blocking(move || purge_empty_dirs(&root, dry_run)).await??;

        let verb = if dry_run { "Would remove" } else { "Removed" };
        let mut lines: Vec<String> = report
            .removed
            .iter()
            .map(|dir| format!("{} {}", verb, dir.display()))
            .collect();
        if report.removed.is_empty() {
            lines.push("No empty directories found in the trash".to_string());
        } else {
            lines.push(format!("{} {} empty directories", verb, report.removed.len()));
        }
        if report.failed > 0 {
            lines.push(format!(
                "{} entries could not be inspected, see the log for details",
                report.failed
            ));
        }
        Ok(lines.join("\n"))
    }
}
