//! Restoring trash items with each collision policy

use chrono::{TimeZone, Utc};

use common::reference::{Reference, ResourceId};
use common::testkit::MemoryGateway;
use common::trash::{ItemKind, RecycleItem, RestoreOutcome, RestorePolicy, TrashRestoreResolver};

fn space() -> Reference {
    Reference::space_root(ResourceId::space("space-1"))
}

fn item(key: &str, path: &str) -> RecycleItem {
    RecycleItem {
        key: key.to_string(),
        path: path.to_string(),
        kind: ItemKind::File,
        deleted_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
    }
}

#[tokio::test]
async fn test_keep_both_numbers_copies() {
    let gateway = MemoryGateway::new();
    gateway.put("./report.pdf", b"current");
    gateway.put("./report (1).pdf", b"first copy");
    gateway.put("./data.tar.gz", b"current");
    gateway.put("./data (1).tar.gz", b"first copy");
    gateway.trash(item("k1", "/report.pdf"), b"old report");
    gateway.trash(item("k2", "/data.tar.gz"), b"old data");

    let resolver = TrashRestoreResolver::new(gateway).with_policy(RestorePolicy::KeepBoth);
    let items = resolver.list(&space()).await.unwrap();
    let report = resolver.restore_all(&space(), items).await;

    assert!(report.is_success());
    assert_eq!(report.restored.len(), 2);
    let gateway = resolver.gateway();
    assert_eq!(gateway.content("./report (2).pdf"), Some(b"old report".to_vec()));
    let (_, data) = report
        .restored
        .iter()
        .find(|(item, _)| item.key == "k2")
        .unwrap();
    assert_eq!(data, &space().with_path("./data (2).tar.gz"));
    assert_eq!(gateway.content("./data (2).tar.gz"), Some(b"old data".to_vec()));
    assert_eq!(gateway.content("./data (1).tar.gz"), Some(b"first copy".to_vec()));
    assert_eq!(gateway.content("./data.tar (2).gz"), None);
    assert_eq!(gateway.content("./report.pdf"), Some(b"current".to_vec()));
    assert_eq!(gateway.deletes(), 0);
}

#[tokio::test]
async fn test_replace_leaves_one_file_with_restored_content() {
    let gateway = MemoryGateway::new();
    gateway.put("./report.pdf", b"current");
    gateway.trash(item("k1", "/report.pdf"), b"restored");

    let resolver = TrashRestoreResolver::new(gateway).with_policy(RestorePolicy::Replace);
    let (_, outcome) = resolver.restore_by_key(&space(), "k1").await.unwrap();

    assert_eq!(outcome, RestoreOutcome::Restored(space().with_path("./report.pdf")));
    let gateway = resolver.gateway();
    assert_eq!(gateway.paths(), vec!["./report.pdf".to_string()]);
    assert_eq!(gateway.content("./report.pdf"), Some(b"restored".to_vec()));
    assert_eq!(gateway.trashed(), 0);
}

#[tokio::test]
async fn test_replace_overwrites_folder() {
    let gateway = MemoryGateway::new();
    gateway.put("./photos/a.jpg", b"a");
    gateway.put("./photos/b.jpg", b"b");
    gateway.trash(item("k1", "/photos"), b"old folder");

    let resolver = TrashRestoreResolver::new(gateway).with_policy(RestorePolicy::Replace);
    let (_, outcome) = resolver.restore_by_key(&space(), "k1").await.unwrap();

    assert_eq!(outcome, RestoreOutcome::Restored(space().with_path("./photos")));
    let gateway = resolver.gateway();
    assert_eq!(gateway.deletes(), 1);
    assert_eq!(gateway.paths(), vec!["./photos".to_string()]);
}

#[tokio::test]
async fn test_skip_leaves_trash_untouched() {
    let gateway = MemoryGateway::new();
    gateway.put("./notes.md", b"current");
    gateway.trash(item("k1", "/notes.md"), b"old");
    gateway.trash(item("k2", "/todo.md"), b"todo");

    let resolver = TrashRestoreResolver::new(gateway);
    let items = resolver.list(&space()).await.unwrap();
    let report = resolver.restore_all(&space(), items).await;

    assert_eq!(report.restored.len(), 1);
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].0.key, "k1");
    let gateway = resolver.gateway();
    assert_eq!(gateway.trashed(), 1);
    assert_eq!(gateway.content("./notes.md"), Some(b"current".to_vec()));
    assert_eq!(gateway.content("./todo.md"), Some(b"todo".to_vec()));
}

#[tokio::test]
async fn test_failed_item_does_not_stop_batch() {
    let gateway = MemoryGateway::new();
    gateway.trash(item("k2", "/b.txt"), b"b");

    let resolver = TrashRestoreResolver::new(gateway);
    // k1 is no longer in the trash
    let items = vec![item("k1", "/a.txt"), item("k2", "/b.txt")];
    let report = resolver.restore_all(&space(), items).await;

    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].0.key, "k1");
    assert_eq!(report.restored.len(), 1);
    assert!(!report.is_success());
    assert_eq!(report.total(), 2);
}
