use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::tree::{Node, NodeKind, TreeAccess};

/// In-memory tree with injectable failures
#[derive(Debug, Clone)]
pub struct MemoryTree {
    inner: Arc<RwLock<MemoryTreeInner>>,
}

#[derive(Debug, Default)]
struct MemoryTreeInner {
    space_id: String,
    nodes: HashMap<String, Node>,
    /// Child ids in insertion order
    children: HashMap<String, Vec<String>>,
    blob_sizes: HashMap<String, u64>,
    tree_sizes: HashMap<String, u64>,
    failing_listings: HashSet<String>,
    fail_writes: bool,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum MemoryTreeError {
    #[error("node {0} not found")]
    NotFound(String),
    #[error("no tree size recorded for {0}")]
    MissingTreeSize(String),
    #[error("injected failure on {0}")]
    Injected(String),
}

impl MemoryTree {
    /// A tree holding only the root container of `space_id`
    pub fn new(space_id: impl Into<String>) -> Self {
        let space_id = space_id.into();
        let root = Node::container(space_id.clone(), space_id.clone(), "");
        let mut inner = MemoryTreeInner {
            space_id: space_id.clone(),
            ..Default::default()
        };
        inner.nodes.insert(space_id.clone(), root);
        inner.tree_sizes.insert(space_id, 0);
        Self {
            inner: Arc::new(RwLock::new(inner)),
        }
    }

    pub fn root(&self) -> Node {
        let inner = self.inner.read();
        inner.nodes[&inner.space_id].clone()
    }

    fn insert(&self, parent_id: &str, node: Node) -> Node {
        let node = node.with_parent(parent_id);
        let mut inner = self.inner.write();
        inner
            .children
            .entry(parent_id.to_string())
            .or_default()
            .push(node.id.clone());
        inner.nodes.insert(node.id.clone(), node.clone());
        node
    }

    pub fn add_container(&self, parent_id: &str, id: &str, name: &str) -> Node {
        let space_id = self.inner.read().space_id.clone();
        let node = self.insert(parent_id, Node::container(space_id, id, name));
        self.inner.write().tree_sizes.insert(id.to_string(), 0);
        node
    }

    pub fn add_file(&self, parent_id: &str, id: &str, name: &str, size: u64) -> Node {
        let space_id = self.inner.read().space_id.clone();
        let node = self.insert(parent_id, Node::file(space_id, id, name));
        self.inner.write().blob_sizes.insert(id.to_string(), size);
        node
    }

    pub fn add_other(&self, parent_id: &str, id: &str, name: &str, kind: &str) -> Node {
        let space_id = self.inner.read().space_id.clone();
        let mut node = Node::file(space_id, id, name);
        node.kind = NodeKind::Other(kind.to_string());
        self.insert(parent_id, node)
    }

    /// Store the correct aggregate size on every container
    pub fn fix_sizes(&self) {
        let root = self.inner.read().space_id.clone();
        let mut inner = self.inner.write();
        inner.recompute(&root);
    }

    pub fn set_stored_size(&self, id: &str, size: u64) {
        self.inner.write().tree_sizes.insert(id.to_string(), size);
    }

    pub fn clear_stored_size(&self, id: &str) {
        self.inner.write().tree_sizes.remove(id);
    }

    pub fn stored_size(&self, id: &str) -> Option<u64> {
        self.inner.read().tree_sizes.get(id).copied()
    }

    /// Make listing this container fail
    pub fn fail_listing(&self, id: &str) {
        self.inner.write().failing_listings.insert(id.to_string());
    }

    /// Make every tree size write fail
    pub fn fail_writes(&self, fail: bool) {
        self.inner.write().fail_writes = fail;
    }
}

impl MemoryTreeInner {
    fn recompute(&mut self, id: &str) -> u64 {
        let node = match self.nodes.get(id) {
            Some(node) => node.clone(),
            None => return 0,
        };
        match node.kind {
            NodeKind::File => self.blob_sizes.get(id).copied().unwrap_or(0),
            NodeKind::Other(_) => 0,
            NodeKind::Container => {
                let children = self.children.get(id).cloned().unwrap_or_default();
                let total: u64 = children.iter().map(|child| self.recompute(child)).sum();
                self.tree_sizes.insert(id.to_string(), total);
                total
            }
        }
    }
}

#[async_trait]
impl TreeAccess for MemoryTree {
    type Error = MemoryTreeError;

    async fn list_children(&self, container: &Node) -> Result<Vec<Node>, Self::Error> {
        let inner = self.inner.read();
        if inner.failing_listings.contains(&container.id) {
            return Err(MemoryTreeError::Injected(container.id.clone()));
        }
        if !inner.nodes.contains_key(&container.id) {
            return Err(MemoryTreeError::NotFound(container.id.clone()));
        }
        Ok(inner
            .children
            .get(&container.id)
            .map(|ids| ids.iter().filter_map(|id| inner.nodes.get(id).cloned()).collect())
            .unwrap_or_default())
    }

    async fn tree_size(&self, node: &Node) -> Result<u64, Self::Error> {
        self.inner
            .read()
            .tree_sizes
            .get(&node.id)
            .copied()
            .ok_or_else(|| MemoryTreeError::MissingTreeSize(node.id.clone()))
    }

    async fn set_tree_size(&self, node: &Node, size: u64) -> Result<(), Self::Error> {
        let mut inner = self.inner.write();
        if inner.fail_writes {
            return Err(MemoryTreeError::Injected(node.id.clone()));
        }
        inner.tree_sizes.insert(node.id.clone(), size);
        Ok(())
    }

    async fn blob_size(&self, node: &Node) -> Result<u64, Self::Error> {
        self.inner
            .read()
            .blob_sizes
            .get(&node.id)
            .copied()
            .ok_or_else(|| MemoryTreeError::NotFound(node.id.clone()))
    }

    async fn path(&self, node: &Node) -> Result<String, Self::Error> {
        let inner = self.inner.read();
        let mut names = Vec::new();
        let mut current = inner.nodes.get(&node.id);
        while let Some(n) = current {
            if n.is_space_root() {
                break;
            }
            names.push(n.name.clone());
            current = n.parent_id.as_ref().and_then(|p| inner.nodes.get(p));
        }
        names.reverse();
        Ok(format!("/{}", names.join("/")))
    }
}
