use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::reference::Reference;
use crate::trash::{Gateway, GatewayError, ItemKind, RecycleItem, ResourceInfo, StatusCode};

/// In-memory gateway holding one space's files and trash
///
/// Paths are keyed the way references carry them (`./docs/a.txt`).
///  Folders exist implicitly whenever a file lives below them. Restores
///  overwrite whatever sits at their destination.
#[derive(Debug, Clone, Default)]
pub struct MemoryGateway {
    inner: Arc<Mutex<MemoryGatewayInner>>,
}

#[derive(Debug, Default)]
struct MemoryGatewayInner {
    files: BTreeMap<String, Vec<u8>>,
    trash: BTreeMap<String, (RecycleItem, Vec<u8>)>,
    stats: usize,
    deletes: usize,
    restores: usize,
    stat_failure: Option<StatusCode>,
    delete_failure: Option<StatusCode>,
    restore_failure: Option<StatusCode>,
}

impl MemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Place a file at `path`
    pub fn put(&self, path: &str, data: &[u8]) {
        self.inner.lock().files.insert(path.to_string(), data.to_vec());
    }

    /// Add an item to the trash
    pub fn trash(&self, item: RecycleItem, data: &[u8]) {
        self.inner
            .lock()
            .trash
            .insert(item.key.clone(), (item, data.to_vec()));
    }

    pub fn content(&self, path: &str) -> Option<Vec<u8>> {
        self.inner.lock().files.get(path).cloned()
    }

    /// Paths of every file, sorted
    pub fn paths(&self) -> Vec<String> {
        self.inner.lock().files.keys().cloned().collect()
    }

    pub fn trashed(&self) -> usize {
        self.inner.lock().trash.len()
    }

    pub fn stats(&self) -> usize {
        self.inner.lock().stats
    }

    pub fn deletes(&self) -> usize {
        self.inner.lock().deletes
    }

    pub fn restores(&self) -> usize {
        self.inner.lock().restores
    }

    /// Answer every stat with `code`
    pub fn fail_stat(&self, code: StatusCode) {
        self.inner.lock().stat_failure = Some(code);
    }

    /// Answer every delete with `code`
    pub fn fail_delete(&self, code: StatusCode) {
        self.inner.lock().delete_failure = Some(code);
    }

    /// Answer every restore with `code`
    pub fn fail_restore(&self, code: StatusCode) {
        self.inner.lock().restore_failure = Some(code);
    }
}

impl MemoryGatewayInner {
    fn lookup(&self, path: &str) -> Option<ResourceInfo> {
        if let Some(data) = self.files.get(path) {
            return Some(ResourceInfo {
                path: path.to_string(),
                kind: ItemKind::File,
                size: data.len() as u64,
            });
        }
        let prefix = format!("{}/", path);
        let size: u64 = self
            .files
            .iter()
            .filter(|(p, _)| p.starts_with(&prefix))
            .map(|(_, data)| data.len() as u64)
            .sum();
        self.files
            .keys()
            .any(|p| p.starts_with(&prefix))
            .then(|| ResourceInfo {
                path: path.to_string(),
                kind: ItemKind::Folder,
                size,
            })
    }
}

#[async_trait]
impl Gateway for MemoryGateway {
    async fn stat(&self, reference: &Reference) -> Result<Option<ResourceInfo>, GatewayError> {
        let mut inner = self.inner.lock();
        inner.stats += 1;
        if let Some(code) = inner.stat_failure {
            return Err(GatewayError::status(code, "injected stat failure"));
        }
        Ok(inner.lookup(&reference.path))
    }

    async fn delete(&self, reference: &Reference) -> Result<(), GatewayError> {
        let mut inner = self.inner.lock();
        inner.deletes += 1;
        if let Some(code) = inner.delete_failure {
            return Err(GatewayError::status(code, "injected delete failure"));
        }
        let prefix = format!("{}/", reference.path);
        let before = inner.files.len();
        inner
            .files
            .retain(|p, _| p != &reference.path && !p.starts_with(&prefix));
        if inner.files.len() == before {
            return Err(GatewayError::status(StatusCode::NotFound, reference.path.clone()));
        }
        Ok(())
    }

    async fn list_recycle(&self, _reference: &Reference) -> Result<Vec<RecycleItem>, GatewayError> {
        Ok(self
            .inner
            .lock()
            .trash
            .values()
            .map(|(item, _)| item.clone())
            .collect())
    }

    async fn restore(
        &self,
        _space: &Reference,
        key: &str,
        destination: &Reference,
    ) -> Result<Reference, GatewayError> {
        let mut inner = self.inner.lock();
        inner.restores += 1;
        if let Some(code) = inner.restore_failure {
            return Err(GatewayError::status(code, "injected restore failure"));
        }
        let (_, data) = inner
            .trash
            .remove(key)
            .ok_or_else(|| GatewayError::status(StatusCode::NotFound, key.to_string()))?;
        inner.files.insert(destination.path.clone(), data);
        Ok(destination.clone())
    }
}
