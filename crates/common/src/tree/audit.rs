//! Aggregate size verification
//!
//! Every container records the sum of the blob sizes below it. A crash
//!  between a content write and the size propagation leaves that number
//!  stale; the auditor recomputes it bottom-up, reports every difference
//!  and optionally writes the computed value back.

use futures::future::BoxFuture;
use tokio_util::sync::CancellationToken;

use super::{Node, NodeKind, TreeAccess};

#[derive(Debug, thiserror::Error)]
pub enum AuditError<E> {
    /// Audits start at a container
    #[error("node {0} is not a container")]
    NotAContainer(String),
    /// Listing a container failed; the subtree can't be trusted
    #[error("failed to list children of {node_id}: {source}")]
    ContainerRead {
        node_id: String,
        #[source]
        source: E,
    },
    #[error("failed to read size metadata of {node_id}: {source}")]
    MetadataRead {
        node_id: String,
        #[source]
        source: E,
    },
    #[error("audit cancelled")]
    Cancelled,
}

/// A container whose stored size differs from the computed one
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mismatch {
    pub node_id: String,
    pub path: String,
    pub computed: u64,
    /// `None` if the stored value could not be read
    pub stored: Option<u64>,
    pub repaired: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuditReport {
    /// Computed aggregate size of the audited root
    pub computed: u64,
    /// Size recorded on the root before the audit
    pub stored: Option<u64>,
    pub mismatches: Vec<Mismatch>,
    /// Containers whose stored size could not be read
    pub read_failures: usize,
    /// Repairs that failed to write
    pub write_failures: usize,
    /// Children of unsupported types
    pub skipped: usize,
}

impl AuditReport {
    pub fn is_consistent(&self) -> bool {
        self.mismatches.is_empty()
    }

    pub fn repaired(&self) -> usize {
        self.mismatches.iter().filter(|m| m.repaired).count()
    }
}

/// Recomputes container sizes and compares them to stored metadata
#[derive(Debug)]
pub struct TreeSizeAuditor<T> {
    tree: T,
    repair: bool,
    cancel: CancellationToken,
}

impl<T: TreeAccess> TreeSizeAuditor<T> {
    pub fn new(tree: T) -> Self {
        Self {
            tree,
            repair: false,
            cancel: CancellationToken::new(),
        }
    }

    /// Overwrite mismatched sizes with the computed value
    pub fn with_repair(mut self, repair: bool) -> Self {
        self.repair = repair;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn tree(&self) -> &T {
        &self.tree
    }

    /// Audit the subtree below `root`, including `root` itself.
    ///
    /// Returns the computed size with every mismatch found. Listing
    ///  failures abort the audit; unreadable or unwritable size
    ///  records are counted and the audit carries on.
    pub async fn audit(&self, root: &Node) -> Result<AuditReport, AuditError<T::Error>> {
        if !root.is_container() {
            return Err(AuditError::NotAContainer(root.id.clone()));
        }

        let mut report = AuditReport::default();
        let computed = self.walk(root, &mut report).await?;
        report.computed = computed;
        report.stored = self.verify(root, computed, &mut report).await;

        tracing::info!(
            node_id = %root.id,
            computed,
            mismatches = report.mismatches.len(),
            "tree size audit finished"
        );
        Ok(report)
    }

    fn walk<'a>(
        &'a self,
        container: &'a Node,
        report: &'a mut AuditReport,
    ) -> BoxFuture<'a, Result<u64, AuditError<T::Error>>> {
        Box::pin(async move {
            if self.cancel.is_cancelled() {
                return Err(AuditError::Cancelled);
            }

            let children = self
                .tree
                .list_children(container)
                .await
                .map_err(|source| AuditError::ContainerRead {
                    node_id: container.id.clone(),
                    source,
                })?;

            let mut total: u64 = 0;
            for child in &children {
                if self.cancel.is_cancelled() {
                    return Err(AuditError::Cancelled);
                }

                match &child.kind {
                    NodeKind::Container => {
                        let size = self.walk(child, report).await?;
                        self.verify(child, size, report).await;
                        total = total.saturating_add(size);
                    }
                    NodeKind::File => {
                        let size = self.tree.blob_size(child).await.map_err(|source| {
                            AuditError::MetadataRead {
                                node_id: child.id.clone(),
                                source,
                            }
                        })?;
                        total = total.saturating_add(size);
                    }
                    NodeKind::Other(kind) => {
                        tracing::warn!(
                            node_id = %child.id,
                            name = %child.name,
                            kind = %kind,
                            "ignoring node of unsupported type"
                        );
                        report.skipped += 1;
                    }
                }
            }

            Ok(total)
        })
    }

    /// Compare a container's stored size with the computed one,
    ///  repairing it if asked to. Returns the stored size if readable.
    async fn verify(&self, node: &Node, computed: u64, report: &mut AuditReport) -> Option<u64> {
        let stored = match self.tree.tree_size(node).await {
            Ok(stored) if stored == computed => {
                tracing::debug!(node_id = %node.id, size = computed, "tree size ok");
                return Some(stored);
            }
            Ok(stored) => Some(stored),
            Err(e) => {
                tracing::warn!(node_id = %node.id, error = %e, "failed to read tree size");
                report.read_failures += 1;
                None
            }
        };

        let path = match self.tree.path(node).await {
            Ok(path) => path,
            Err(e) => {
                tracing::debug!(node_id = %node.id, error = %e, "failed to resolve path");
                node.name.clone()
            }
        };
        tracing::warn!(
            node_id = %node.id,
            path = %path,
            computed,
            stored = ?stored,
            "tree size mismatch"
        );

        let mut repaired = false;
        if self.repair {
            match self.tree.set_tree_size(node, computed).await {
                Ok(()) => {
                    tracing::info!(node_id = %node.id, size = computed, "repaired tree size");
                    repaired = true;
                }
                Err(e) => {
                    tracing::warn!(node_id = %node.id, error = %e, "failed to repair tree size");
                    report.write_failures += 1;
                }
            }
        }

        report.mismatches.push(Mismatch {
            node_id: node.id.clone(),
            path,
            computed,
            stored,
            repaired,
        });
        stored
    }
}
