use std::sync::Arc;

use clap::Args;

use common::layout::Layout;
use common::metadata::MessagePackBackend;
use common::reference::ReferenceError;
use common::tree::{AuditError, AuditReport, DecomposedTree, TreeError, TreeSizeAuditor};

use super::NodeTarget;
use crate::cli::op::{prompt, ContextError};

const REPAIR_WARNING: &str = "IMPORTANT: Only use '--repair' when the storage is not in use. \
Repairing tree sizes while users write can store wrong values.\n\
Do you want to continue? [yes | no = default] ";

/// Recompute container tree sizes and compare them to the stored ones
#[derive(Args, Debug, Clone)]
pub struct CheckTreesize {
    #[command(flatten)]
    pub target: NodeTarget,

    /// Write the computed size to every container that disagrees
    #[arg(long)]
    pub repair: bool,

    /// Don't ask for confirmation before repairing
    #[arg(short, long)]
    pub force: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum CheckTreesizeError {
    #[error(transparent)]
    Context(#[from] ContextError),
    #[error("invalid node: {0}")]
    Reference(#[from] ReferenceError),
    #[error("failed to load node: {0}")]
    Tree(#[from] TreeError),
    #[error("audit failed: {0}")]
    Audit(#[from] AuditError<TreeError>),
    #[error("failed to read confirmation: {0}")]
    Prompt(#[from] std::io::Error),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for CheckTreesize {
    type Error = CheckTreesizeError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let root = ctx.storage_root(self.target.root.as_ref())?;
        let (space_id, node_id) = self.target.ids()?;

        if self.repair && !self.force {
            let answer = prompt(REPAIR_WARNING).await?;
            if answer != "yes" && answer != "y" {
                return Ok("Aborted".to_string());
            }
        }

        if !MessagePackBackend::detect(&root) {
            tracing::warn!(root = %root.display(), "no messagepack metadata found below root");
        }
        let tree = DecomposedTree::new(Layout::new(&root), Arc::new(MessagePackBackend::new()));
        let node = tree.node(&space_id, &node_id).await?;

        let report = TreeSizeAuditor::new(tree)
            .with_repair(self.repair)
            .with_cancellation(ctx.cancel.clone())
            .audit(&node)
            .await?;

        Ok(render(&node.name, &report))
    }
}

fn render(name: &str, report: &AuditReport) -> String {
    let mut lines: Vec<String> = report
        .mismatches
        .iter()
        .map(|m| {
            let stored = m
                .stored
                .map(|size| size.to_string())
                .unwrap_or_else(|| "unreadable".to_string());
            format!(
                "{} ({}): stored {}, computed {}{}",
                m.path,
                m.node_id,
                stored,
                m.computed,
                if m.repaired { " [repaired]" } else { "" }
            )
        })
        .collect();

    if report.is_consistent() {
        lines.push(format!(
            "Tree size of '{}' is consistent: {} bytes",
            name, report.computed
        ));
    } else {
        lines.push(format!(
            "Found {} mismatches below '{}' ({} repaired)",
            report.mismatches.len(),
            name,
            report.repaired()
        ));
    }
    if report.write_failures > 0 {
        lines.push(format!("{} repairs failed to write", report.write_failures));
    }
    if report.skipped > 0 {
        lines.push(format!("{} nodes of unknown type skipped", report.skipped));
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::tree::Mismatch;

    #[test]
    fn test_render_mismatches() {
        let report = AuditReport {
            computed: 47,
            stored: Some(47),
            mismatches: vec![Mismatch {
                node_id: "docs".to_string(),
                path: "/docs".to_string(),
                computed: 17,
                stored: None,
                repaired: true,
            }],
            ..Default::default()
        };
        assert_eq!(
            render("Personal", &report),
            "/docs (docs): stored unreadable, computed 17 [repaired]\n\
             Found 1 mismatches below 'Personal' (1 repaired)"
        );
    }
}
