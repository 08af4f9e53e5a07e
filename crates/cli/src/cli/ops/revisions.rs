use std::path::PathBuf;
use std::sync::Arc;

use clap::{ArgAction, Args, Subcommand};

use common::blobstore::{Blobstore, BlobstoreConfig, BlobstoreDeleter, BlobstoreError};
use common::discovery::{Discovery, DiscoveryError, Strategy};
use common::layout::{Layout, Scope};
use common::metadata::MessagePackBackend;
use common::reference::ResourceId;
use common::revisions::RevisionPurger;
use dfs_cli::state::{AppConfig, BlobStoreConfig};

use crate::cli::op::{ContextError, Op, OpContext};

crate::command_enum! {
    (Purge, Purge),
}

// Rename the generated Command to RevisionsCommand for clarity
pub type RevisionsCommand = Command;

/// Manage file revisions
#[derive(Args, Debug, Clone)]
pub struct Revisions {
    #[command(subcommand)]
    pub command: RevisionsCommand,
}

#[async_trait::async_trait]
impl Op for Revisions {
    type Error = OpError;
    type Output = OpOutput;

    async fn execute(&self, ctx: &OpContext) -> Result<Self::Output, Self::Error> {
        self.command.execute(ctx).await
    }
}

/// Delete old file revisions and their blobs
#[derive(Args, Debug, Clone)]
pub struct Purge {
    /// Storage root (defaults to storage_root from the config)
    #[arg(short = 'p', long)]
    pub basepath: Option<PathBuf>,

    /// Blobstore holding revision payloads: none, decomposed or s3
    ///  (defaults to blob_store from the config)
    #[arg(short, long, value_parser = ["none", "decomposed", "s3"])]
    pub blobstore: Option<String>,

    /// Only count what would be deleted
    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    pub dry_run: bool,

    /// Purge a single space or resource instead of the whole tree
    #[arg(short, long)]
    pub resource_id: Option<String>,

    /// How to find revisions: glob, workers or list
    #[arg(long, default_value = "glob")]
    pub glob_mechanism: Strategy,
}

#[derive(Debug, thiserror::Error)]
pub enum PurgeError {
    #[error(transparent)]
    Context(#[from] ContextError),
    #[error("discovery failed: {0}")]
    Discovery(#[from] DiscoveryError),
    #[error("blobstore setup failed: {0}")]
    Blobstore(#[from] BlobstoreError),
    #[error("--blobstore s3 needs an s3 blob_store section in the config")]
    MissingS3Config,
}

impl Purge {
    /// Scope selected by `--resource-id`; anything unusable means the
    ///  whole tree
    fn scope(&self) -> Scope {
        let Some(raw) = self.resource_id.as_deref().filter(|id| !id.trim().is_empty()) else {
            return Scope::Tree;
        };
        match raw.parse::<ResourceId>() {
            Ok(id) => Scope::from_resource_id(Some(&id)),
            Err(e) => {
                tracing::warn!(resource_id = raw, error = %e, "ignoring resource id, purging the whole tree");
                Scope::Tree
            }
        }
    }

    fn blobstore_config(&self, config: &AppConfig, root: &std::path::Path) -> Result<BlobstoreConfig, PurgeError> {
        let selected = match self.blobstore.as_deref() {
            None => config.blob_store.clone(),
            Some("none") => BlobStoreConfig::None,
            Some("s3") => match &config.blob_store {
                s3 @ BlobStoreConfig::S3 { .. } => s3.clone(),
                _ => return Err(PurgeError::MissingS3Config),
            },
            Some(_) => BlobStoreConfig::Decomposed,
        };
        Ok(selected.resolve(root))
    }

    fn workers(&self, config: &AppConfig) -> usize {
        match self.glob_mechanism {
            Strategy::List => config.list_workers,
            _ => config.glob_workers,
        }
    }
}

#[async_trait::async_trait]
impl Op for Purge {
    type Error = PurgeError;
    type Output = String;

    async fn execute(&self, ctx: &OpContext) -> Result<Self::Output, Self::Error> {
        let root = ctx.storage_root(self.basepath.as_ref())?;
        let scope = self.scope();

        let blobstore = Blobstore::new(&self.blobstore_config(&ctx.config, &root)?)
            .await?
            .map(|store| Arc::new(store) as Arc<dyn BlobstoreDeleter>);

        let paths = Discovery::new(Layout::new(&root))
            .with_workers(self.workers(&ctx.config))
            .with_cancellation(ctx.cancel.clone())
            .discover(&scope, self.glob_mechanism)?;

        let tally = RevisionPurger::new(Arc::new(MessagePackBackend::new()))
            .with_blobstore(blobstore)
            .with_dry_run(self.dry_run)
            .with_verbose(ctx.verbose)
            .with_cancellation(ctx.cancel.clone())
            .purge(paths)
            .await;

        let mut lines = vec![tally.summary(self.dry_run)];
        if tally.failed > 0 {
            lines.push(format!("{} deletions failed, see the log for details", tally.failed));
        }
        if ctx.cancel.is_cancelled() {
            lines.push("Interrupted; the counts cover what was handled so far".to_string());
        }
        Ok(lines.join("\n"))
    }
}
