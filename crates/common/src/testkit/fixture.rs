use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::layout::{pathify, Layout, NODE_SHARD_DEPTH, SHARD_WIDTH};
use crate::metadata::{attr, messagepack, Attributes, MessagePackBackend};
use crate::tree::{TYPE_CONTAINER, TYPE_FILE};

/// A decomposed storage root in a temporary directory
///
/// Writes are synchronous and panic on failure; the fixture only exists
///  to lay out trees for tests.
#[derive(Debug)]
pub struct LayoutFixture {
    dir: TempDir,
}

impl LayoutFixture {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap_or_else(|e| panic!("failed to create temp dir: {}", e));
        Self { dir }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn layout(&self) -> Layout {
        Layout::new(self.root())
    }

    /// Create the root container of a space
    pub fn space(&self, space_id: &str, name: &str) {
        let path = self.layout().node_path(space_id, space_id);
        must(fs::create_dir_all(&path), &path);
        self.write_attributes(
            &path,
            &[
                (attr::ID, space_id),
                (attr::TYPE, TYPE_CONTAINER),
                (attr::NAME, name),
                (attr::SPACE_NAME, name),
                (attr::TREE_SIZE, "0"),
            ],
        );
    }

    /// Create a container below `parent_id`, returning its id
    pub fn container(&self, space_id: &str, parent_id: &str, id: &str, name: &str) -> String {
        let path = self.layout().node_path(space_id, id);
        must(fs::create_dir_all(&path), &path);
        self.write_attributes(
            &path,
            &[
                (attr::ID, id),
                (attr::TYPE, TYPE_CONTAINER),
                (attr::NAME, name),
                (attr::PARENT_ID, parent_id),
                (attr::TREE_SIZE, "0"),
            ],
        );
        self.link(space_id, parent_id, id, name);
        id.to_string()
    }

    /// Create a file below `parent_id` whose blob is `size` bytes,
    ///  returning its id
    pub fn file(&self, space_id: &str, parent_id: &str, id: &str, name: &str, size: u64) -> String {
        let path = self.layout().node_path(space_id, id);
        create_parent(&path);
        must(fs::write(&path, b""), &path);
        let blob_id = format!("{}-blob", id);
        let size = size.to_string();
        self.write_attributes(
            &path,
            &[
                (attr::ID, id),
                (attr::TYPE, TYPE_FILE),
                (attr::NAME, name),
                (attr::PARENT_ID, parent_id),
                (attr::BLOB_ID, &blob_id),
                (attr::BLOB_SIZE, &size),
            ],
        );
        self.link(space_id, parent_id, id, name);
        id.to_string()
    }

    /// Overwrite the stored tree size of a container
    pub fn set_tree_size(&self, space_id: &str, id: &str, size: u64) {
        let path = self.layout().node_path(space_id, id);
        let mut attributes = self.attributes(&path);
        attributes.insert(attr::TREE_SIZE.to_string(), size.to_string().into_bytes());
        self.store(&path, &attributes);
    }

    /// Add a revision of a node, returning the revision's path
    pub fn revision(
        &self,
        space_id: &str,
        node_id: &str,
        timestamp: &str,
        blob_id: &str,
        size: u64,
    ) -> PathBuf {
        let path = self.layout().revision_path(space_id, node_id, timestamp);
        create_parent(&path);
        must(fs::write(&path, b""), &path);
        self.write_attributes(
            &path,
            &[
                (attr::BLOB_ID, blob_id),
                (attr::BLOB_SIZE, &size.to_string()),
            ],
        );
        path
    }

    /// Store a blob payload the way the decomposed blobstore lays it out
    pub fn blob(&self, space_id: &str, blob_id: &str, data: &[u8]) -> PathBuf {
        let path = self.root().join(Layout::blob_key(space_id, blob_id));
        create_parent(&path);
        must(fs::write(&path, data), &path);
        path
    }

    /// Create a directory (and its parents) below a space's trash root
    pub fn trash_dir(&self, space_id: &str, relative: &str) -> PathBuf {
        let path = self.layout().trash_dir(space_id).join(relative);
        must(fs::create_dir_all(&path), &path);
        path
    }

    /// Decoded attributes of a node or revision
    pub fn attributes(&self, path: &Path) -> Attributes {
        let record = metadata_path(path);
        match fs::read(&record) {
            Ok(bytes) => MessagePackBackend::decode(&record, &bytes)
                .unwrap_or_else(|e| panic!("bad record: {}", e)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Attributes::new(),
            Err(e) => panic!("failed to read {}: {}", record.display(), e),
        }
    }

    /// Named child link from `parent_id` to `id`
    fn link(&self, space_id: &str, parent_id: &str, id: &str, name: &str) {
        let parent = self.layout().node_path(space_id, parent_id);
        must(fs::create_dir_all(&parent), &parent);
        // The link lives in the parent's leaf directory, five levels
        //  below `nodes/`
        let target = format!("../../../../../{}", pathify(id, NODE_SHARD_DEPTH, SHARD_WIDTH));
        let link = parent.join(name);
        must(std::os::unix::fs::symlink(&target, &link), &link);
    }

    fn write_attributes(&self, path: &Path, pairs: &[(&str, &str)]) {
        let mut attributes = self.attributes(path);
        for (name, value) in pairs {
            attributes.insert(name.to_string(), value.as_bytes().to_vec());
        }
        self.store(path, &attributes);
    }

    fn store(&self, path: &Path, attributes: &Attributes) {
        let record = metadata_path(path);
        let bytes = messagepack::encode(attributes)
            .unwrap_or_else(|e| panic!("failed to encode {}: {}", record.display(), e));
        must(fs::write(&record, bytes), &record);
    }
}

impl Default for LayoutFixture {
    fn default() -> Self {
        Self::new()
    }
}

fn metadata_path(path: &Path) -> PathBuf {
    let mut out = path.as_os_str().to_owned();
    out.push(".mpk");
    PathBuf::from(out)
}

fn create_parent(path: &Path) {
    if let Some(parent) = path.parent() {
        must(fs::create_dir_all(parent), parent);
    }
}

fn must(result: std::io::Result<()>, path: &Path) {
    if let Err(e) = result {
        panic!("fixture write to {} failed: {}", path.display(), e);
    }
}
