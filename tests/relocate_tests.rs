use dupestash::actions::{
    restore, ActionExecutor, ActionJournal, ActionMode, JournalAction, JournalPhase, StoreError,
    StoreLayout, STORE_DIR_NAME,
};
use dupestash::duplicates::{DuplicateFinder, RunSummary};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::tempdir;

fn write(dir: &Path, name: &str, content: &[u8]) -> PathBuf {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, content).unwrap();
    path
}

fn relocate_run(root: &Path) -> (RunSummary, ActionExecutor) {
    let finder = DuplicateFinder::with_defaults();
    let mut executor = ActionExecutor::new(ActionMode::Relocate(StoreLayout::new(root)));
    let summary = finder.run(&[root.to_path_buf()], &mut executor).unwrap();
    (summary, executor)
}

#[test]
fn test_relocate_then_restore_round_trip() {
    let dir = tempdir().unwrap();
    let root = dir.path().canonicalize().unwrap();
    write(&root, "docs/a.txt", b"alpha content");
    write(&root, "docs/copy/a.txt", b"alpha content");
    write(&root, "more/b.bin", b"alpha content");
    write(&root, "unique.txt", b"nothing like it");

    let (summary, _) = relocate_run(&root);

    assert_eq!(summary.duplicates, 2);
    assert_eq!(summary.actions.relocated, 2);
    assert_eq!(summary.actions.objects_stored, 1);
    assert!(root.join("docs/a.txt").exists());
    assert!(!root.join("docs/copy/a.txt").exists());
    assert!(!root.join("more/b.bin").exists());

    let layout = StoreLayout::new(&root);
    assert!(layout.exists());
    let manifest = layout.read_manifest().unwrap();
    assert_eq!(manifest.len(), 2);
    assert_eq!(manifest[0].path, "docs/copy/a.txt");
    assert_eq!(manifest[0].digest, manifest[1].digest);
    assert!(layout.object_path(&manifest[0].digest).is_file());

    let restored = restore(&root).unwrap();

    assert_eq!(restored.files_restored, 2);
    assert_eq!(restored.objects_removed, 1);
    assert!(restored.store_removed);
    assert!(restored.is_complete());
    assert!(!root.join(STORE_DIR_NAME).exists());
    assert_eq!(fs::read(root.join("docs/copy/a.txt")).unwrap(), b"alpha content");
    assert_eq!(fs::read(root.join("more/b.bin")).unwrap(), b"alpha content");
    assert_eq!(fs::read(root.join("unique.txt")).unwrap(), b"nothing like it");
}

#[test]
fn test_existing_object_is_not_copied_again() {
    let dir = tempdir().unwrap();
    let root = dir.path().canonicalize().unwrap();
    write(&root, "a.txt", b"shared");
    write(&root, "b.txt", b"shared");

    let (first, _) = relocate_run(&root);
    assert_eq!(first.actions.objects_stored, 1);

    write(&root, "c.txt", b"shared");
    let (second, _) = relocate_run(&root);

    assert_eq!(second.actions.relocated, 1);
    assert_eq!(second.actions.objects_stored, 0);
    assert_eq!(StoreLayout::new(&root).read_manifest().unwrap().len(), 2);
    assert_eq!(
        fs::read_dir(StoreLayout::new(&root).objects_dir())
            .unwrap()
            .count(),
        1
    );
}

#[test]
fn test_store_is_not_scanned() {
    let dir = tempdir().unwrap();
    let root = dir.path().canonicalize().unwrap();
    write(&root, "one.txt", b"stash me");
    write(&root, "two.txt", b"stash me");

    relocate_run(&root);
    let (summary, _) = relocate_run(&root);

    assert_eq!(summary.files_seen, 1);
    assert_eq!(summary.duplicates, 0);
}

#[test]
fn test_relocate_writes_journal() {
    let dir = tempdir().unwrap();
    let root = dir.path().join("tree");
    write(&root, "a.txt", b"journaled");
    write(&root, "b.txt", b"journaled");
    let root = root.canonicalize().unwrap();
    let journal_path = dir.path().join("journal.jsonl");

    let finder = DuplicateFinder::with_defaults();
    let mut executor = ActionExecutor::new(ActionMode::Relocate(StoreLayout::new(&root)))
        .with_journal(ActionJournal::open(&journal_path).unwrap());
    finder.run(&[root.clone()], &mut executor).unwrap();

    let entries = ActionJournal::read_entries(&journal_path).unwrap();
    assert_eq!(entries.len(), 2);
    assert!(entries.iter().all(|e| e.action == JournalAction::Relocate));
    assert_eq!(entries[0].phase, JournalPhase::Begin);
    assert_eq!(entries[1].phase, JournalPhase::Done);
    assert_eq!(entries[0].source, root.join("b.txt"));
}

#[test]
fn test_restore_keeps_conflicting_entries() {
    let dir = tempdir().unwrap();
    let root = dir.path().canonicalize().unwrap();
    write(&root, "a.txt", b"original bytes");
    write(&root, "b.txt", b"original bytes");
    relocate_run(&root);

    fs::write(root.join("b.txt"), b"someone else's file").unwrap();
    let summary = restore(&root).unwrap();

    assert_eq!(summary.files_restored, 0);
    assert_eq!(summary.failures.len(), 1);
    assert!(!summary.store_removed);
    assert!(!summary.is_complete());
    assert_eq!(fs::read(root.join("b.txt")).unwrap(), b"someone else's file");
    assert_eq!(StoreLayout::new(&root).read_manifest().unwrap().len(), 1);

    fs::remove_file(root.join("b.txt")).unwrap();
    let retry = restore(&root).unwrap();

    assert_eq!(retry.files_restored, 1);
    assert!(retry.store_removed);
    assert_eq!(fs::read(root.join("b.txt")).unwrap(), b"original bytes");
}

#[test]
fn test_restore_counts_already_present() {
    let dir = tempdir().unwrap();
    let root = dir.path().canonicalize().unwrap();
    write(&root, "a.txt", b"back again");
    write(&root, "b.txt", b"back again");
    relocate_run(&root);

    fs::copy(root.join("a.txt"), root.join("b.txt")).unwrap();
    let summary = restore(&root).unwrap();

    assert_eq!(summary.files_restored, 0);
    assert_eq!(summary.already_present, 1);
    assert!(summary.store_removed);
}

#[test]
fn test_restore_reports_missing_object() {
    let dir = tempdir().unwrap();
    let root = dir.path().canonicalize().unwrap();
    write(&root, "a.txt", b"gone soon");
    write(&root, "b.txt", b"gone soon");
    relocate_run(&root);

    let layout = StoreLayout::new(&root);
    let digest = layout.read_manifest().unwrap()[0].digest.clone();
    fs::remove_file(layout.object_path(&digest)).unwrap();

    let summary = restore(&root).unwrap();

    assert_eq!(summary.missing_objects, vec![digest]);
    assert!(!summary.store_removed);
    assert_eq!(layout.read_manifest().unwrap().len(), 1);
}

#[test]
fn test_restore_without_store() {
    let dir = tempdir().unwrap();
    let err = restore(dir.path()).unwrap_err();
    assert!(matches!(err, StoreError::NotFound(_)));
}

#[cfg(target_os = "linux")]
#[test]
fn test_non_utf8_name_is_left_in_place() {
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;

    let dir = tempdir().unwrap();
    let root = dir.path().canonicalize().unwrap();
    write(&root, "a.bin", b"same bytes");
    let odd = root.join(OsStr::from_bytes(b"b\xff.bin"));
    fs::write(&odd, b"same bytes").unwrap();

    let (summary, _) = relocate_run(&root);

    assert_eq!(summary.duplicates, 1);
    assert_eq!(summary.actions.relocated, 0);
    assert_eq!(summary.actions.failures, 1);
    assert!(odd.exists());

    if StoreLayout::new(&root).exists() {
        assert!(restore(&root).unwrap().is_complete());
    }
    assert_eq!(fs::read(&odd).unwrap(), b"same bytes");
    assert!(root.join("a.bin").exists());
}
