//! On-disk layout of a decomposed storage root
//!
//! ```text
//! <root>/spaces/<space[0..2]>/<space[2..]>/
//!     nodes/<node[0..2]>/<node[2..4]>/<node[4..6]>/<node[6..8]>/<node[8..]>
//!     nodes/.../<node[8..]>.mpk                      metadata sidecar
//!     nodes/.../<node[8..]>.REV.<timestamp>          revision
//!     nodes/.../<node[8..]>.REV.<timestamp>.mpk      revision metadata
//!     blobs/<blob[0..2]>/<blob[2..4]>/<blob[4..6]>/<blob[6..8]>/<blob[8..]>
//!     trash/...
//! ```
//!
//! Ids are split into fixed-width prefix directories ("sharded") so no
//!  single directory grows unbounded.

use std::path::{Component, Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};

use crate::reference::ResourceId;

pub const SPACES_DIR: &str = "spaces";
pub const NODES_DIR: &str = "nodes";
pub const BLOBS_DIR: &str = "blobs";
pub const TRASH_DIR: &str = "trash";
/// Separates a node's path from a revision timestamp
pub const REVISION_DELIMITER: &str = ".REV.";
/// Extensions of files that live next to a node but are not nodes themselves
pub const SIDECAR_EXTENSIONS: [&str; 2] = ["mpk", "mlock"];

/// Number of shard levels for space ids
pub const SPACE_SHARD_DEPTH: usize = 1;
/// Number of shard levels for node and blob ids
pub const NODE_SHARD_DEPTH: usize = 4;
pub const SHARD_WIDTH: usize = 2;

/// Split an id into `depth` directories of `width` characters
///  followed by the remainder, e.g. `pathify("abcdefgh", 2, 2)`
///  is `ab/cd/efgh`.
///
/// Ids too short to fill every level keep their remainder as the
///  last component.
pub fn pathify(id: &str, depth: usize, width: usize) -> String {
    let chars: Vec<char> = id.chars().collect();
    let mut out = String::with_capacity(id.len() + depth);
    let mut i = 0;
    while i < depth {
        let end = i * width + width;
        if chars.len() <= end {
            break;
        }
        out.extend(&chars[i * width..end]);
        out.push('/');
        i += 1;
    }
    out.extend(&chars[(i * width).min(chars.len())..]);
    out
}

/// Format a revision timestamp the way revisions are named on disk
pub fn revision_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

/// Split a file name into the node part and the revision suffix,
///  if it names a revision (or one of its sidecars)
pub fn split_revision(name: &str) -> Option<(&str, &str)> {
    name.split_once(REVISION_DELIMITER)
}

/// Whether the file name carries a sidecar extension (`.mpk`, `.mlock`)
pub fn is_sidecar(name: &str) -> bool {
    match name.rsplit_once('.') {
        Some((_, ext)) => SIDECAR_EXTENSIONS.contains(&ext),
        None => false,
    }
}

/// Recover the space and node ids from a path below `spaces/`.
///
/// Revision suffixes and sidecar extensions are stripped, so every
///  artifact of a node maps to the same pair of ids.
pub fn ids_from_path(path: &Path) -> Option<(String, String)> {
    let parts: Vec<&str> = path
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => part.to_str(),
            _ => None,
        })
        .collect();

    let start = (0..parts.len())
        .rev()
        .find(|&i| parts[i] == SPACES_DIR && parts.get(i + 3) == Some(&NODES_DIR))?;

    let space_id = format!("{}{}", parts[start + 1], parts[start + 2]);
    let node_parts = &parts[start + 4..];
    if node_parts.is_empty() {
        return None;
    }

    let mut node_id = node_parts.concat();
    if let Some((node, _)) = split_revision(&node_id) {
        node_id = node.to_string();
    } else if is_sidecar(&node_id) {
        if let Some((node, _)) = node_id.rsplit_once('.') {
            node_id = node.to_string();
        }
    }

    Some((space_id, node_id))
}

/// What a maintenance operation should cover
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    /// Every space below the storage root
    Tree,
    /// Every node of a single space
    Space { space_id: String },
    /// A single node (and its revisions) of a space
    Resource { space_id: String, node_id: String },
}

impl Scope {
    /// Build a scope from an optional resource id; no id means
    ///  the whole tree
    pub fn from_resource_id(id: Option<&ResourceId>) -> Self {
        match id {
            None => Scope::Tree,
            Some(id) => match id.opaque_id() {
                Some(node_id) => Scope::Resource {
                    space_id: id.space_id.clone(),
                    node_id: node_id.to_string(),
                },
                None => Scope::Space {
                    space_id: id.space_id.clone(),
                },
            },
        }
    }

    pub fn is_resource(&self) -> bool {
        matches!(self, Scope::Resource { .. })
    }
}

/// One directory level below a scope's base directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Any entry
    Any,
    /// Exactly this name
    Exact(String),
    /// Any name starting with this prefix
    Prefix(String),
}

impl Segment {
    pub fn matches(&self, name: &str) -> bool {
        match self {
            Segment::Any => true,
            Segment::Exact(exact) => name == exact,
            Segment::Prefix(prefix) => name.starts_with(prefix.as_str()),
        }
    }

    /// Render as a shell-style pattern component
    pub fn to_pattern(&self) -> String {
        match self {
            Segment::Any => "*".to_string(),
            Segment::Exact(exact) => glob::Pattern::escape(exact),
            Segment::Prefix(prefix) => format!("{}*", glob::Pattern::escape(prefix)),
        }
    }
}

/// Where a scope lives on disk: a base directory plus the levels
///  below it, the last of which names the node entries
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopePlan {
    pub base: PathBuf,
    pub segments: Vec<Segment>,
}

impl ScopePlan {
    /// The full glob pattern for this plan
    pub fn pattern(&self) -> String {
        pattern_below(&self.base, &self.segments)
    }
}

/// Glob pattern for `segments` below `dir`
pub fn pattern_below(dir: &Path, segments: &[Segment]) -> String {
    let mut pattern = glob::Pattern::escape(&dir.to_string_lossy());
    for segment in segments {
        if !pattern.ends_with('/') {
            pattern.push('/');
        }
        pattern.push_str(&segment.to_pattern());
    }
    pattern
}

/// Path builder for a decomposed storage root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    root: PathBuf,
}

impl Layout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn spaces_dir(&self) -> PathBuf {
        self.root.join(SPACES_DIR)
    }

    pub fn space_dir(&self, space_id: &str) -> PathBuf {
        self.spaces_dir()
            .join(pathify(space_id, SPACE_SHARD_DEPTH, SHARD_WIDTH))
    }

    pub fn nodes_dir(&self, space_id: &str) -> PathBuf {
        self.space_dir(space_id).join(NODES_DIR)
    }

    pub fn trash_dir(&self, space_id: &str) -> PathBuf {
        self.space_dir(space_id).join(TRASH_DIR)
    }

    pub fn node_path(&self, space_id: &str, node_id: &str) -> PathBuf {
        self.nodes_dir(space_id)
            .join(pathify(node_id, NODE_SHARD_DEPTH, SHARD_WIDTH))
    }

    pub fn revision_path(&self, space_id: &str, node_id: &str, timestamp: &str) -> PathBuf {
        let mut path = self.node_path(space_id, node_id).into_os_string();
        path.push(REVISION_DELIMITER);
        path.push(timestamp);
        PathBuf::from(path)
    }

    /// Object key of a blob, relative to the storage root
    pub fn blob_key(space_id: &str, blob_id: &str) -> String {
        format!(
            "{}/{}/{}/{}",
            SPACES_DIR,
            pathify(space_id, SPACE_SHARD_DEPTH, SHARD_WIDTH),
            BLOBS_DIR,
            pathify(blob_id, NODE_SHARD_DEPTH, SHARD_WIDTH)
        )
    }

    /// Resolve the directories and levels a scope covers
    pub fn plan(&self, scope: &Scope) -> ScopePlan {
        match scope {
            Scope::Tree => {
                let mut segments = vec![
                    Segment::Any,
                    Segment::Any,
                    Segment::Exact(NODES_DIR.to_string()),
                ];
                segments.extend(node_segments());
                ScopePlan {
                    base: self.spaces_dir(),
                    segments,
                }
            }
            Scope::Space { space_id } => ScopePlan {
                base: self.nodes_dir(space_id),
                segments: node_segments(),
            },
            Scope::Resource { space_id, node_id } => {
                let node_path = self.node_path(space_id, node_id);
                let prefix = node_path
                    .file_name()
                    .map(|name| name.to_string_lossy().to_string())
                    .unwrap_or_default();
                let base = node_path
                    .parent()
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| self.nodes_dir(space_id));
                ScopePlan {
                    base,
                    segments: vec![Segment::Prefix(prefix)],
                }
            }
        }
    }
}

fn node_segments() -> Vec<Segment> {
    vec![Segment::Any; NODE_SHARD_DEPTH + 1]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pathify() {
        assert_eq!(pathify("abcdefghij", 4, 2), "ab/cd/ef/gh/ij");
        assert_eq!(pathify("abcdefgh", 2, 2), "ab/cd/efgh");
        assert_eq!(pathify("space-id", 1, 2), "sp/ace-id");
        // Too short to fill every level
        assert_eq!(pathify("abcd", 4, 2), "ab/cd");
        assert_eq!(pathify("ab", 1, 2), "ab");
        assert_eq!(pathify("", 4, 2), "");
    }

    #[test]
    fn test_node_path() {
        let layout = Layout::new("/data");
        assert_eq!(
            layout.node_path("ssss1111", "abcdefghij"),
            PathBuf::from("/data/spaces/ss/ss1111/nodes/ab/cd/ef/gh/ij")
        );
        assert_eq!(
            layout.revision_path("ssss1111", "abcdefghij", "2024-01-02T03:04:05.000000006Z"),
            PathBuf::from(
                "/data/spaces/ss/ss1111/nodes/ab/cd/ef/gh/ij.REV.2024-01-02T03:04:05.000000006Z"
            )
        );
    }

    #[test]
    fn test_blob_key() {
        assert_eq!(
            Layout::blob_key("ssss1111", "0123456789"),
            "spaces/ss/ss1111/blobs/01/23/45/67/89"
        );
    }

    #[test]
    fn test_ids_from_path() {
        let layout = Layout::new("/data");
        let rev = layout.revision_path("ssss1111", "abcdefghij", "2024-01-02T03:04:05Z");
        assert_eq!(
            ids_from_path(&rev),
            Some(("ssss1111".to_string(), "abcdefghij".to_string()))
        );

        let mut sidecar = layout.node_path("ssss1111", "abcdefghij").into_os_string();
        sidecar.push(".mpk");
        assert_eq!(
            ids_from_path(Path::new(&sidecar)),
            Some(("ssss1111".to_string(), "abcdefghij".to_string()))
        );

        assert_eq!(ids_from_path(Path::new("/data/other/file")), None);
    }

    #[test]
    fn test_plan_patterns() {
        let layout = Layout::new("/data");
        assert_eq!(
            layout.plan(&Scope::Tree).pattern(),
            "/data/spaces/*/*/nodes/*/*/*/*/*"
        );
        assert_eq!(
            layout
                .plan(&Scope::Space {
                    space_id: "ssss1111".to_string()
                })
                .pattern(),
            "/data/spaces/ss/ss1111/nodes/*/*/*/*/*"
        );
        assert_eq!(
            layout
                .plan(&Scope::Resource {
                    space_id: "ssss1111".to_string(),
                    node_id: "abcdefghij".to_string()
                })
                .pattern(),
            "/data/spaces/ss/ss1111/nodes/ab/cd/ef/gh/ij*"
        );
    }

    #[test]
    fn test_scope_from_resource_id() {
        assert_eq!(Scope::from_resource_id(None), Scope::Tree);
        let space = ResourceId::space("s1");
        assert_eq!(
            Scope::from_resource_id(Some(&space)),
            Scope::Space {
                space_id: "s1".to_string()
            }
        );
        let node = ResourceId::node("s1", "n1");
        assert!(Scope::from_resource_id(Some(&node)).is_resource());
    }
}
