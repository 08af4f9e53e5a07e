use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use super::{PurgeTally, RevisionArtifact};
use crate::blobstore::{BlobDeletion, BlobRef, BlobstoreDeleter};
use crate::metadata::{self, attr, MetadataBackend, MetadataError};

/// Deletes the revisions found on a stream of paths
#[derive(Debug, Clone)]
pub struct RevisionPurger {
    backend: Arc<dyn MetadataBackend>,
    blobstore: Option<Arc<dyn BlobstoreDeleter>>,
    dry_run: bool,
    verbose: bool,
    cancel: CancellationToken,
}

impl RevisionPurger {
    /// A purger in dry-run mode that leaves blobs alone
    pub fn new(backend: Arc<dyn MetadataBackend>) -> Self {
        Self {
            backend,
            blobstore: None,
            dry_run: true,
            verbose: false,
            cancel: CancellationToken::new(),
        }
    }

    /// Also delete the blobs of purged revisions. `None` leaves
    ///  blobs to whatever else manages them.
    pub fn with_blobstore(mut self, blobstore: Option<Arc<dyn BlobstoreDeleter>>) -> Self {
        self.blobstore = blobstore;
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Drain `paths` and purge every revision among them.
    ///
    /// Failures are logged and counted, never fatal. Blobs are only
    ///  deleted after their revision's metadata is gone, and a blob
    ///  shared by several revisions is handled once. On cancellation the
    ///  tally covers what was deleted up to that point.
    pub async fn purge(&self, paths: flume::Receiver<PathBuf>) -> PurgeTally {
        let mut tally = PurgeTally::default();
        let mut files: HashSet<(String, String)> = HashSet::new();
        let mut blobs: HashSet<(String, String)> = HashSet::new();

        loop {
            let path = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    tracing::info!("revision purge cancelled");
                    break;
                }
                next = paths.recv_async() => match next {
                    Ok(path) => path,
                    Err(_) => break,
                },
            };

            let Some(revision) = RevisionArtifact::from_path(&path) else {
                continue;
            };

            let blob = match &self.blobstore {
                Some(_) => match self.blob_of(&revision).await {
                    Ok(blob) => blob,
                    Err(e) => {
                        // Without the blob pointer the blob would leak
                        //  once the metadata is gone
                        tracing::warn!(path = %revision.path.display(), error = %e, "failed to read revision metadata");
                        tally.failed += 1;
                        continue;
                    }
                },
                None => None,
            };

            if self.dry_run {
                if self.verbose {
                    tracing::info!(path = %revision.path.display(), blob = ?blob.as_ref().map(|b| &b.blob_id), "would delete revision");
                }
                tally.revisions += 1;
                files.insert((revision.space_id.clone(), revision.node_id.clone()));
                if let Some(blob) = blob {
                    if blobs.insert((blob.space_id, blob.blob_id)) {
                        tally.blobs += 1;
                    }
                }
                continue;
            }

            match self.backend.purge(&revision.path).await {
                Ok(()) => {
                    if self.verbose {
                        tracing::info!(path = %revision.path.display(), "deleted revision");
                    }
                    tally.revisions += 1;
                    files.insert((revision.space_id.clone(), revision.node_id.clone()));
                }
                Err(MetadataError::NotFound(_)) => {
                    tracing::debug!(path = %revision.path.display(), "revision already gone");
                    continue;
                }
                Err(e) => {
                    tracing::warn!(path = %revision.path.display(), error = %e, "failed to delete revision");
                    tally.failed += 1;
                    continue;
                }
            }

            let (Some(deleter), Some(blob)) = (&self.blobstore, blob) else {
                continue;
            };
            if !blobs.insert((blob.space_id.clone(), blob.blob_id.clone())) {
                continue;
            }
            match deleter.delete(&blob).await {
                Ok(BlobDeletion::Deleted) => {
                    if self.verbose {
                        tracing::info!(blob_id = %blob.blob_id, space_id = %blob.space_id, "deleted blob");
                    }
                    tally.blobs += 1;
                }
                Ok(BlobDeletion::Missing) => {
                    tracing::debug!(blob_id = %blob.blob_id, "blob already gone");
                }
                Err(e) => {
                    tracing::warn!(blob_id = %blob.blob_id, error = %e, "failed to delete blob");
                    tally.failed += 1;
                }
            }
        }

        tally.files = files.len();
        tally
    }

    async fn blob_of(&self, revision: &RevisionArtifact) -> Result<Option<BlobRef>, MetadataError> {
        let attributes = self.backend.all(&revision.path).await?;
        let blob_id = match attributes.get(attr::BLOB_ID) {
            Some(id) if !id.is_empty() => String::from_utf8_lossy(id).to_string(),
            _ => return Ok(None),
        };
        let size = match attributes.get(attr::BLOB_SIZE) {
            Some(size) => metadata::parse_u64(&revision.path, attr::BLOB_SIZE, size)?,
            None => 0,
        };
        Ok(Some(BlobRef::new(revision.space_id.clone(), blob_id, size)))
    }
}
