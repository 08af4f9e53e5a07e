//! Tree size audits against an on-disk storage root

mod common;

use std::sync::Arc;

use ::common::metadata::MessagePackBackend;
use ::common::tree::{DecomposedTree, TreeAccess, TreeSizeAuditor};

use crate::common::{populated, SPACE_A, SPACE_B};

fn tree(fixture: &::common::testkit::LayoutFixture) -> DecomposedTree {
    DecomposedTree::new(fixture.layout(), Arc::new(MessagePackBackend::new()))
}

#[tokio::test]
async fn test_consistent_spaces() {
    let fixture = populated();
    let tree = tree(&fixture);
    let auditor = TreeSizeAuditor::new(tree.clone());

    for (space, size) in [(SPACE_A, 47), (SPACE_B, 7)] {
        let root = tree.space_root(space).await.unwrap();
        let report = auditor.audit(&root).await.unwrap();
        assert!(report.is_consistent(), "{:?}", report);
        assert_eq!(report.computed, size);
        assert_eq!(report.stored, Some(size));
    }
}

#[tokio::test]
async fn test_repair_converges() {
    let fixture = populated();
    fixture.set_tree_size(SPACE_A, "docs0000-0001", 99);
    fixture.set_tree_size(SPACE_A, "deep0000-0002", 0);
    let tree = tree(&fixture);
    let root = tree.space_root(SPACE_A).await.unwrap();

    let report = TreeSizeAuditor::new(tree.clone()).audit(&root).await.unwrap();
    let mut paths: Vec<&str> = report.mismatches.iter().map(|m| m.path.as_str()).collect();
    paths.sort();
    assert_eq!(paths, vec!["/docs", "/docs/deep"]);
    assert_eq!(report.repaired(), 0);

    let docs = tree.node(SPACE_A, "docs0000-0001").await.unwrap();
    assert_eq!(tree.tree_size(&docs).await.unwrap(), 99);

    let report = TreeSizeAuditor::new(tree.clone())
        .with_repair(true)
        .audit(&root)
        .await
        .unwrap();
    assert_eq!(report.repaired(), 2);
    assert_eq!(tree.tree_size(&docs).await.unwrap(), 17);

    let report = TreeSizeAuditor::new(tree.clone()).audit(&root).await.unwrap();
    assert!(report.is_consistent());
}

#[tokio::test]
async fn test_root_mismatch_is_reported() {
    let fixture = populated();
    fixture.set_tree_size(SPACE_B, SPACE_B, 1);
    let tree = tree(&fixture);
    let root = tree.space_root(SPACE_B).await.unwrap();

    let report = TreeSizeAuditor::new(tree).audit(&root).await.unwrap();
    assert_eq!(report.mismatches.len(), 1);
    assert_eq!(report.mismatches[0].node_id, SPACE_B);
    assert_eq!(report.mismatches[0].computed, 7);
    assert_eq!(report.mismatches[0].stored, Some(1));
}
