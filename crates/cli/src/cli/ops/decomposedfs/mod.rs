use clap::{Args, Subcommand};

pub mod check_treesize;
pub mod metadata;

use std::path::PathBuf;

use common::reference::{ReferenceError, ResourceId};

use crate::cli::op::Op;

crate::command_enum! {
    (CheckTreesize, check_treesize::CheckTreesize),
    (Metadata, metadata::Metadata),
}

// Rename the generated Command to DecomposedfsCommand for clarity
pub type DecomposedfsCommand = Command;

/// Inspect and repair a decomposed storage root directly on disk
#[derive(Args, Debug, Clone)]
pub struct Decomposedfs {
    #[command(subcommand)]
    pub command: DecomposedfsCommand,
}

#[async_trait::async_trait]
impl Op for Decomposedfs {
    type Error = OpError;
    type Output = OpOutput;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        self.command.execute(ctx).await
    }
}

/// The storage root and node a command works on
#[derive(Args, Debug, Clone)]
pub struct NodeTarget {
    /// Storage root (defaults to storage_root from the config)
    #[arg(long)]
    pub root: Option<PathBuf>,

    /// Node to work on, as a storage space id (`<storage>$<space>!<node>`).
    ///  Without a node part the space root is used.
    #[arg(short, long)]
    pub node: String,
}

impl NodeTarget {
    /// Space and node id addressed by `--node`
    pub fn ids(&self) -> Result<(String, String), ReferenceError> {
        let id: ResourceId = self.node.parse()?;
        let node_id = id
            .opaque_id()
            .map(str::to_string)
            .unwrap_or_else(|| id.space_id.clone());
        Ok((id.space_id, node_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target(node: &str) -> NodeTarget {
        NodeTarget {
            root: None,
            node: node.to_string(),
        }
    }

    #[test]
    fn test_space_id_means_space_root() {
        assert_eq!(
            target("storage$space-1").ids().unwrap(),
            ("space-1".to_string(), "space-1".to_string())
        );
        assert_eq!(
            target("storage$space-1!node-7").ids().unwrap(),
            ("space-1".to_string(), "node-7".to_string())
        );
        assert!(target("").ids().is_err());
    }
}
