//! Revision purges over a discovered storage root

mod common;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tokio_util::sync::CancellationToken;

use ::common::blobstore::{BlobRef, Blobstore, BlobstoreConfig, BlobstoreDeleter};
use ::common::discovery::{Discovery, Strategy};
use ::common::layout::Scope;
use ::common::metadata::{Attributes, MessagePackBackend, MetadataBackend, MetadataError};
use ::common::revisions::{PurgeTally, RevisionPurger};
use ::common::testkit::LayoutFixture;

use crate::common::{populated, SPACE_A, SPACE_B};

fn blobs() -> Vec<BlobRef> {
    vec![
        BlobRef::new(SPACE_A, "blobshared-01", 10),
        BlobRef::new(SPACE_A, "blobb000-0001", 30),
        BlobRef::new(SPACE_B, "blobn000-0001", 6),
    ]
}

async fn memory_blobstore() -> Blobstore {
    let store = Blobstore::memory();
    for blob in blobs() {
        store.put(&blob, Bytes::from("payload")).await.unwrap();
    }
    store
}

async fn run(fixture: &LayoutFixture, purger: &RevisionPurger, scope: &Scope) -> PurgeTally {
    let rx = Discovery::new(fixture.layout())
        .discover(scope, Strategy::List)
        .unwrap();
    purger.purge(rx).await
}

#[tokio::test]
async fn test_dry_run_matches_real_run() {
    let fixture = populated();
    let store = Arc::new(memory_blobstore().await);
    let purger = RevisionPurger::new(Arc::new(MessagePackBackend::new()))
        .with_blobstore(Some(store.clone() as Arc<dyn BlobstoreDeleter>));

    let planned = run(&fixture, &purger, &Scope::Tree).await;
    assert_eq!(
        planned,
        PurgeTally {
            files: 3,
            blobs: 3,
            revisions: 4,
            failed: 0
        }
    );
    assert_eq!(planned.summary(true), "Would delete 4 revisions (3 files / 3 blobs)");
    for blob in blobs() {
        assert!(store.exists(&blob).await.unwrap());
    }

    let purger = purger.with_dry_run(false);
    let done = run(&fixture, &purger, &Scope::Tree).await;
    assert_eq!(done, planned);
    assert_eq!(done.summary(false), "Deleted 4 revisions (3 files / 3 blobs)");
    for blob in blobs() {
        assert!(!store.exists(&blob).await.unwrap());
    }

    // Nodes survive, revisions are gone
    let layout = fixture.layout();
    assert!(layout.node_path(SPACE_A, "filea000-0003").exists());
    assert!(!layout
        .revision_path(SPACE_A, "filea000-0003", "2024-03-01T10:00:00.000000001Z")
        .exists());

    let again = run(&fixture, &purger, &Scope::Tree).await;
    assert!(again.is_empty());
    assert_eq!(again.summary(false), "No revisions found. Storage provider is clean.");
}

#[tokio::test]
async fn test_space_scope_leaves_other_spaces() {
    let fixture = populated();
    let purger = RevisionPurger::new(Arc::new(MessagePackBackend::new())).with_dry_run(false);

    let scope = Scope::Space {
        space_id: SPACE_B.to_string(),
    };
    let tally = run(&fixture, &purger, &scope).await;
    assert_eq!(tally.revisions, 1);
    assert_eq!(tally.files, 1);
    assert_eq!(tally.blobs, 0);

    let layout = fixture.layout();
    assert!(layout
        .revision_path(SPACE_A, "fileb000-0005", "2024-03-03T10:00:00Z")
        .exists());
}

#[tokio::test]
async fn test_decomposed_blobs_on_disk() {
    let fixture = populated();
    let shared = fixture.blob(SPACE_A, "blobshared-01", b"0123456789");
    let config = BlobstoreConfig::Decomposed {
        root: fixture.root().to_path_buf(),
    };
    let store = Blobstore::new(&config).await.unwrap().unwrap();

    let purger = RevisionPurger::new(Arc::new(MessagePackBackend::new()))
        .with_blobstore(Some(Arc::new(store)))
        .with_dry_run(false);
    let scope = Scope::Resource {
        space_id: SPACE_A.to_string(),
        node_id: "filea000-0003".to_string(),
    };
    let tally = run(&fixture, &purger, &scope).await;

    // Two revisions pointing at one blob
    assert_eq!(tally.revisions, 2);
    assert_eq!(tally.files, 1);
    assert_eq!(tally.blobs, 1);
    assert!(!shared.exists());
}

#[tokio::test]
async fn test_cancelled_purge_deletes_nothing() {
    let fixture = populated();
    let cancel = CancellationToken::new();
    cancel.cancel();
    let purger = RevisionPurger::new(Arc::new(MessagePackBackend::new()))
        .with_dry_run(false)
        .with_cancellation(cancel);

    let tally = run(&fixture, &purger, &Scope::Tree).await;
    assert!(tally.is_empty());
    assert!(fixture
        .layout()
        .revision_path(SPACE_B, "notes000-0001", "2024-04-01T08:30:00.5Z")
        .exists());
}

/// Backend that trips the cancellation token right after its first purge
#[derive(Debug)]
struct CancelAfterFirstPurge {
    inner: MessagePackBackend,
    cancel: CancellationToken,
}

#[async_trait]
impl MetadataBackend for CancelAfterFirstPurge {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    fn metadata_path(&self, path: &Path) -> PathBuf {
        self.inner.metadata_path(path)
    }

    async fn all(&self, path: &Path) -> Result<Attributes, MetadataError> {
        self.inner.all(path).await
    }

    async fn set(&self, path: &Path, name: &str, value: &[u8]) -> Result<(), MetadataError> {
        self.inner.set(path, name, value).await
    }

    async fn purge(&self, path: &Path) -> Result<(), MetadataError> {
        let result = self.inner.purge(path).await;
        self.cancel.cancel();
        result
    }
}

#[tokio::test]
async fn test_cancel_mid_run_counts_completed_deletions() {
    let fixture = populated();
    let cancel = CancellationToken::new();
    let backend = CancelAfterFirstPurge {
        inner: MessagePackBackend::new(),
        cancel: cancel.clone(),
    };
    let purger = RevisionPurger::new(Arc::new(backend))
        .with_dry_run(false)
        .with_cancellation(cancel);

    let tally = run(&fixture, &purger, &Scope::Tree).await;
    assert_eq!(tally.revisions, 1);
    assert_eq!(tally.files, 1);
    assert_eq!(tally.failed, 0);

    let layout = fixture.layout();
    let remaining = [
        layout.revision_path(SPACE_A, "filea000-0003", "2024-03-01T10:00:00.000000001Z"),
        layout.revision_path(SPACE_A, "filea000-0003", "2024-03-02T10:00:00.000000001Z"),
        layout.revision_path(SPACE_A, "fileb000-0005", "2024-03-03T10:00:00Z"),
        layout.revision_path(SPACE_B, "notes000-0001", "2024-04-01T08:30:00.5Z"),
    ]
    .iter()
    .filter(|path| path.exists())
    .count();
    assert_eq!(remaining, 3);
}
