use std::fmt;

use async_trait::async_trait;

mod audit;
mod decomposed;

pub use audit::{AuditError, AuditReport, Mismatch, TreeSizeAuditor};
pub use decomposed::{DecomposedTree, TreeError};

/// Resource types as stored in the `user.oc.type` attribute
pub const TYPE_FILE: &str = "1";
pub const TYPE_CONTAINER: &str = "2";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    /// A directory; its size is the sum of its children
    Container,
    /// A file backed by a blob
    File,
    /// Anything else (references, symlinks, unknown types)
    Other(String),
}

impl NodeKind {
    pub fn from_type_attribute(value: &str) -> Self {
        match value.trim() {
            TYPE_FILE => NodeKind::File,
            TYPE_CONTAINER => NodeKind::Container,
            other => NodeKind::Other(other.to_string()),
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeKind::Container => write!(f, "container"),
            NodeKind::File => write!(f, "file"),
            NodeKind::Other(kind) => write!(f, "type {}", kind),
        }
    }
}

/// A storage node, addressed by its id within a space
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub id: String,
    pub space_id: String,
    pub parent_id: Option<String>,
    pub name: String,
    pub kind: NodeKind,
}

impl Node {
    pub fn container(space_id: impl Into<String>, id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            space_id: space_id.into(),
            parent_id: None,
            name: name.into(),
            kind: NodeKind::Container,
        }
    }

    pub fn file(space_id: impl Into<String>, id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind: NodeKind::File,
            ..Self::container(space_id, id, name)
        }
    }

    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    pub fn is_container(&self) -> bool {
        self.kind == NodeKind::Container
    }

    /// The root node of a space shares the space's id
    pub fn is_space_root(&self) -> bool {
        self.id == self.space_id
    }
}

/// Read and write access to a tree of nodes and their size metadata
#[async_trait]
pub trait TreeAccess: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Immediate children of a container
    async fn list_children(&self, container: &Node) -> Result<Vec<Node>, Self::Error>;

    /// The aggregate size recorded for a container
    async fn tree_size(&self, node: &Node) -> Result<u64, Self::Error>;

    async fn set_tree_size(&self, node: &Node, size: u64) -> Result<(), Self::Error>;

    /// Size of the blob backing a file
    async fn blob_size(&self, node: &Node) -> Result<u64, Self::Error>;

    /// Human readable location of a node, used in reports
    async fn path(&self, node: &Node) -> Result<String, Self::Error> {
        Ok(node.name.clone())
    }
}
