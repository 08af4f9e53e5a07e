//! Shared setup for maintenance integration tests
#![allow(dead_code)]

use std::collections::BTreeSet;
use std::path::PathBuf;

use common::testkit::LayoutFixture;

pub const SPACE_A: &str = "spacea00-0001";
pub const SPACE_B: &str = "spaceb00-0002";

/// Two spaces with nested containers, files and a few revisions
///
/// Space A: `/docs/a.txt` (12), `/docs/deep/c.txt` (5), `/b.txt` (30).
///  `a.txt` has two revisions sharing one blob, `b.txt` has one.
/// Space B: `/notes.md` (7) with one revision.
pub fn populated() -> LayoutFixture {
    let fixture = LayoutFixture::new();

    fixture.space(SPACE_A, "Project A");
    let docs = fixture.container(SPACE_A, SPACE_A, "docs0000-0001", "docs");
    let deep = fixture.container(SPACE_A, &docs, "deep0000-0002", "deep");
    let a = fixture.file(SPACE_A, &docs, "filea000-0003", "a.txt", 12);
    fixture.file(SPACE_A, &deep, "filec000-0004", "c.txt", 5);
    let b = fixture.file(SPACE_A, SPACE_A, "fileb000-0005", "b.txt", 30);
    fixture.set_tree_size(SPACE_A, &deep, 5);
    fixture.set_tree_size(SPACE_A, &docs, 17);
    fixture.set_tree_size(SPACE_A, SPACE_A, 47);

    fixture.revision(SPACE_A, &a, "2024-03-01T10:00:00.000000001Z", "blobshared-01", 10);
    fixture.revision(SPACE_A, &a, "2024-03-02T10:00:00.000000001Z", "blobshared-01", 10);
    fixture.revision(SPACE_A, &b, "2024-03-03T10:00:00Z", "blobb000-0001", 30);

    fixture.space(SPACE_B, "Project B");
    let notes = fixture.file(SPACE_B, SPACE_B, "notes000-0001", "notes.md", 7);
    fixture.set_tree_size(SPACE_B, SPACE_B, 7);
    fixture.revision(SPACE_B, &notes, "2024-04-01T08:30:00.5Z", "blobn000-0001", 6);

    fixture
}

/// Drain a discovery channel into a sorted set
pub async fn collect(rx: flume::Receiver<PathBuf>) -> BTreeSet<PathBuf> {
    let mut out = BTreeSet::new();
    while let Ok(path) = rx.recv_async().await {
        out.insert(path);
    }
    out
}
