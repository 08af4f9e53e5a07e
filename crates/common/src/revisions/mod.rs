//! Revision garbage collection
//!
//! Every content change of a file leaves the previous version behind as
//!  `<node>.REV.<timestamp>` with its own metadata record pointing at the
//!  previous blob. The purger drains a discovery channel, picks out those
//!  revisions and deletes them together with (optionally) their blobs.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;

mod purge;

pub use crate::blobstore::BlobRef;
pub use purge::RevisionPurger;

use crate::layout::{ids_from_path, is_sidecar, split_revision};

fn timestamp_regex() -> &'static Regex {
    static TIMESTAMP: OnceLock<Regex> = OnceLock::new();
    TIMESTAMP.get_or_init(|| {
        // RFC 3339 in UTC, optional fractional seconds
        Regex::new(r"^[0-9]{4}-[0-9]{2}-[0-9]{2}T[0-9]{2}:[0-9]{2}:[0-9]{2}(\.[0-9]+)?Z$")
            .expect("static timestamp pattern")
    })
}

/// A historical version of a node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevisionArtifact {
    pub path: PathBuf,
    pub space_id: String,
    pub node_id: String,
    pub timestamp: String,
}

impl RevisionArtifact {
    /// Recognize a revision by its path. Nodes, sidecars and anything
    ///  outside the node tree are not revisions.
    pub fn from_path(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_str()?;
        if is_sidecar(name) {
            return None;
        }
        let (_, timestamp) = split_revision(name)?;
        if !timestamp_regex().is_match(timestamp) {
            return None;
        }
        let (space_id, node_id) = ids_from_path(path)?;
        Some(Self {
            path: path.to_path_buf(),
            space_id,
            node_id,
            timestamp: timestamp.to_string(),
        })
    }
}

/// Counts produced by a purge run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PurgeTally {
    /// Distinct files that lost at least one revision
    pub files: usize,
    /// Blobs deleted, each counted once
    pub blobs: usize,
    pub revisions: usize,
    /// Revisions or blobs that failed to delete
    pub failed: usize,
}

impl PurgeTally {
    pub fn is_empty(&self) -> bool {
        self.files == 0 && self.blobs == 0 && self.revisions == 0
    }

    /// One line summary of a run
    pub fn summary(&self, dry_run: bool) -> String {
        if self.is_empty() {
            "No revisions found. Storage provider is clean.".to_string()
        } else if dry_run {
            format!(
                "Would delete {} revisions ({} files / {} blobs)",
                self.revisions, self.files, self.blobs
            )
        } else {
            format!(
                "Deleted {} revisions ({} files / {} blobs)",
                self.revisions, self.files, self.blobs
            )
        }
    }
}
