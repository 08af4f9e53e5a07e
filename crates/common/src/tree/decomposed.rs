//! Tree access over a decomposed storage root
//!
//! Node attributes live in the metadata backend; a container is a
//!  directory holding one symlink per child, named after the child and
//!  pointing at the child's node directory.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;

use super::{Node, NodeKind, TreeAccess};
use crate::layout::{ids_from_path, Layout};
use crate::metadata::{self, attr, MetadataBackend, MetadataError};

/// Upper bound on parent hops when resolving a node's path
const MAX_PATH_DEPTH: usize = 512;

#[derive(Debug, thiserror::Error)]
pub enum TreeError {
    #[error("node {node_id} not found in space {space_id}")]
    NotFound { space_id: String, node_id: String },
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Metadata(#[from] MetadataError),
}

#[derive(Debug, Clone)]
pub struct DecomposedTree {
    layout: Layout,
    backend: Arc<dyn MetadataBackend>,
}

impl DecomposedTree {
    pub fn new(layout: Layout, backend: Arc<dyn MetadataBackend>) -> Self {
        Self { layout, backend }
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn backend(&self) -> &Arc<dyn MetadataBackend> {
        &self.backend
    }

    /// On-disk location of a node
    pub fn node_path(&self, node: &Node) -> PathBuf {
        self.layout.node_path(&node.space_id, &node.id)
    }

    /// Load a node by id
    pub async fn node(&self, space_id: &str, node_id: &str) -> Result<Node, TreeError> {
        let path = self.layout.node_path(space_id, node_id);
        match tokio::fs::symlink_metadata(&path).await {
            Ok(_) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(TreeError::NotFound {
                    space_id: space_id.to_string(),
                    node_id: node_id.to_string(),
                })
            }
            Err(source) => return Err(TreeError::Io { path, source }),
        }

        let attributes = self.backend.all(&path).await?;
        let text = |name: &str| {
            attributes
                .get(name)
                .map(|value| String::from_utf8_lossy(value).to_string())
        };

        let kind = match text(attr::TYPE) {
            Some(value) => NodeKind::from_type_attribute(&value),
            None => {
                return Err(MetadataError::MissingAttribute {
                    path,
                    name: attr::TYPE.to_string(),
                }
                .into())
            }
        };

        Ok(Node {
            id: node_id.to_string(),
            space_id: space_id.to_string(),
            parent_id: text(attr::PARENT_ID).filter(|id| !id.is_empty()),
            name: text(attr::NAME).unwrap_or_default(),
            kind,
        })
    }

    /// The root node of a space
    pub async fn space_root(&self, space_id: &str) -> Result<Node, TreeError> {
        self.node(space_id, space_id).await
    }

    async fn child_from_link(&self, link: &Path) -> Result<Option<Node>, TreeError> {
        let target = match tokio::fs::canonicalize(link).await {
            Ok(target) => target,
            Err(e) => {
                tracing::warn!(link = %link.display(), error = %e, "skipping dangling child link");
                return Ok(None);
            }
        };
        match ids_from_path(&target) {
            Some((space_id, node_id)) => self.node(&space_id, &node_id).await.map(Some),
            None => {
                tracing::warn!(
                    link = %link.display(),
                    target = %target.display(),
                    "child link points outside the node tree"
                );
                Ok(None)
            }
        }
    }
}

#[async_trait]
impl TreeAccess for DecomposedTree {
    type Error = TreeError;

    async fn list_children(&self, container: &Node) -> Result<Vec<Node>, TreeError> {
        let dir = self.node_path(container);
        let io_err = |source| TreeError::Io {
            path: dir.clone(),
            source,
        };

        let mut entries = tokio::fs::read_dir(&dir).await.map_err(io_err)?;
        let mut links = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(io_err)? {
            links.push(entry.path());
        }
        links.sort();

        let mut children = Vec::with_capacity(links.len());
        for link in links {
            if let Some(child) = self.child_from_link(&link).await? {
                children.push(child);
            }
        }
        Ok(children)
    }

    async fn tree_size(&self, node: &Node) -> Result<u64, TreeError> {
        Ok(metadata::get_u64(self.backend.as_ref(), &self.node_path(node), attr::TREE_SIZE).await?)
    }

    async fn set_tree_size(&self, node: &Node, size: u64) -> Result<(), TreeError> {
        self.backend
            .set(&self.node_path(node), attr::TREE_SIZE, size.to_string().as_bytes())
            .await?;
        Ok(())
    }

    async fn blob_size(&self, node: &Node) -> Result<u64, TreeError> {
        Ok(metadata::get_u64(self.backend.as_ref(), &self.node_path(node), attr::BLOB_SIZE).await?)
    }

    async fn path(&self, node: &Node) -> Result<String, TreeError> {
        let mut names = Vec::new();
        let mut current = node.clone();
        for _ in 0..MAX_PATH_DEPTH {
            if current.is_space_root() {
                break;
            }
            names.push(current.name.clone());
            match current.parent_id.clone() {
                Some(parent_id) => current = self.node(&current.space_id, &parent_id).await?,
                None => break,
            }
        }
        names.reverse();
        Ok(format!("/{}", names.join("/")))
    }
}
