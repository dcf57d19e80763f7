use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use configbump_core::{
    LabelSelector, MemoryStore, Resource, ResourceId, Selector, Snapshot,
};
use configbump_sync::{fingerprint, FileChange, PassKind, SyncEngine, SyncError};
use filetime::{set_file_mtime, FileTime};
use tempfile::TempDir;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn r1() -> ResourceId {
    ResourceId::new("che", "r1")
}

fn r2() -> ResourceId {
    ResourceId::new("che", "r2")
}

fn snapshot(pairs: &[(&str, &str)]) -> Snapshot {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.as_bytes().to_vec()))
        .collect()
}

fn two_resource_store() -> MemoryStore {
    let mut store = MemoryStore::new();
    store.upsert(Resource::new(r1()).with_file("x.txt", "1"));
    store.upsert(Resource::new(r2()).with_file("y.txt", "2"));
    store
}

fn engine(dir: &TempDir, store: MemoryStore) -> SyncEngine<MemoryStore> {
    init_logging();
    SyncEngine::new(store, Selector::default(), dir.path())
}

fn dir_files(dir: &Path) -> BTreeSet<String> {
    fs::read_dir(dir)
        .expect("read target dir")
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().map(|t| t.is_file()).unwrap_or(false))
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect()
}

fn read(dir: &TempDir, name: &str) -> String {
    fs::read_to_string(dir.path().join(name)).expect("read synced file")
}

fn age(path: &Path) -> FileTime {
    let old = FileTime::from_system_time(SystemTime::now() - Duration::from_secs(24 * 60 * 60));
    set_file_mtime(path, old).expect("set old mtime");
    old
}

fn mtime(path: &Path) -> FileTime {
    FileTime::from_last_modification_time(&fs::metadata(path).expect("metadata"))
}

fn mutated(report: &configbump_sync::SyncReport) -> BTreeSet<PathBuf> {
    report
        .mutated_paths()
        .into_iter()
        .map(Path::to_path_buf)
        .collect()
}

// ---------------------------------------------------------------------------
// Full sync
// ---------------------------------------------------------------------------

#[test]
fn full_sync_produces_exactly_the_resource_files() {
    let dir = TempDir::new().expect("target");
    let mut engine = engine(&dir, two_resource_store());

    let report = engine.full_sync().expect("full sync");

    assert_eq!(report.pass, PassKind::Full);
    assert_eq!(
        dir_files(dir.path()),
        BTreeSet::from(["x.txt".to_string(), "y.txt".to_string()])
    );
    assert_eq!(read(&dir, "x.txt"), "1");
    assert_eq!(read(&dir, "y.txt"), "2");
    assert_eq!(
        engine.current_files(&r1()).and_then(|f| f.get("x.txt")),
        Some(&fingerprint(b"1"))
    );
}

#[test]
fn second_full_sync_writes_nothing() {
    let dir = TempDir::new().expect("target");
    let mut engine = engine(&dir, two_resource_store());
    engine.full_sync().expect("first sync");

    let x = dir.path().join("x.txt");
    let old = age(&x);

    let report = engine.full_sync().expect("second sync");
    assert!(!report.has_mutations(), "unexpected changes: {:?}", report.changes);
    assert_eq!(report.unchanged(), 2);
    assert_eq!(mtime(&x), old, "x.txt was rewritten");
}

#[test]
fn restart_with_matching_files_writes_nothing() {
    let dir = TempDir::new().expect("target");
    fs::write(dir.path().join("x.txt"), "1").expect("seed x");
    fs::write(dir.path().join("y.txt"), "2").expect("seed y");
    let old = age(&dir.path().join("y.txt"));

    let mut engine = engine(&dir, two_resource_store());
    let report = engine.full_sync().expect("sync");

    assert_eq!(report.written(), 0);
    assert_eq!(mtime(&dir.path().join("y.txt")), old);
}

#[test]
fn full_sync_converges_from_a_dirty_directory() {
    let dir = TempDir::new().expect("target");
    fs::write(dir.path().join("x.txt"), "stale").expect("seed stale");
    fs::write(dir.path().join("orphan.conf"), "left over").expect("seed orphan");
    fs::create_dir(dir.path().join("plugins")).expect("seed sub-directory");
    fs::write(dir.path().join("plugins").join("inner"), "kept").expect("seed inner");

    let mut engine = engine(&dir, two_resource_store());
    let report = engine.full_sync().expect("sync");

    assert_eq!(
        dir_files(dir.path()),
        BTreeSet::from(["x.txt".to_string(), "y.txt".to_string()])
    );
    assert_eq!(read(&dir, "x.txt"), "1");
    assert!(dir.path().join("plugins").join("inner").exists(), "sub-directories are preserved");
    assert!(report
        .changes
        .contains(&FileChange::Updated { path: dir.path().join("x.txt") }));
    assert!(report
        .changes
        .contains(&FileChange::Removed { path: dir.path().join("orphan.conf") }));
}

#[test]
fn full_sync_respects_label_selector() {
    let dir = TempDir::new().expect("target");
    let mut store = MemoryStore::new();
    store.upsert(
        Resource::new(r1())
            .with_label("app", "che")
            .with_file("x.txt", "1"),
    );
    store.upsert(
        Resource::new(r2())
            .with_label("app", "other")
            .with_file("y.txt", "2"),
    );
    let selector = Selector::new(Some("che".into()), LabelSelector::parse("app=che").unwrap());
    let mut engine = SyncEngine::new(store, selector, dir.path());

    engine.full_sync().expect("sync");
    assert_eq!(dir_files(dir.path()), BTreeSet::from(["x.txt".to_string()]));
    assert!(engine.current_files(&r2()).is_none());
}

#[test]
fn failed_full_sync_keeps_previous_cache() {
    let dir = TempDir::new().expect("target");
    let mut engine = engine(&dir, two_resource_store());
    engine.full_sync().expect("baseline");
    let before = engine.cache().clone();

    engine
        .store_mut()
        .upsert(Resource::new(ResourceId::new("che", "r3")).with_file("blocked", "z"));
    fs::create_dir(dir.path().join("blocked")).expect("blocking directory");

    let err = engine.full_sync().expect_err("write onto a directory must fail");
    assert!(matches!(err, SyncError::Io { .. }), "{err}");
    assert_eq!(engine.cache(), &before);
}

#[test]
fn invalid_file_names_do_not_block_other_files() {
    let dir = TempDir::new().expect("target");
    let mut store = MemoryStore::new();
    store.upsert(
        Resource::new(r1())
            .with_file("good.conf", "ok")
            .with_file("../../etc/evil", "nope"),
    );
    let mut engine = engine(&dir, store);

    let report = engine.full_sync().expect("sync");
    assert_eq!(dir_files(dir.path()), BTreeSet::from(["good.conf".to_string()]));
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].name, "../../etc/evil");

    let cached = engine.current_files(&r1()).expect("cached");
    assert_eq!(cached.keys().collect::<Vec<_>>(), vec!["good.conf"]);
}

// ---------------------------------------------------------------------------
// Incremental reconciliation
// ---------------------------------------------------------------------------

#[test]
fn update_rewrites_only_the_changed_file() {
    let dir = TempDir::new().expect("target");
    let mut engine = engine(&dir, two_resource_store());
    engine.full_sync().expect("baseline");
    let y = dir.path().join("y.txt");
    let old = age(&y);

    let report = engine
        .on_resource_event(r1(), Some(snapshot(&[("x.txt", "3")])))
        .expect("event");

    assert_eq!(report.pass, PassKind::Incremental);
    assert_eq!(read(&dir, "x.txt"), "3");
    assert_eq!(read(&dir, "y.txt"), "2");
    assert_eq!(mtime(&y), old, "y.txt must not be touched");
    assert_eq!(
        report.changes,
        vec![FileChange::Updated { path: dir.path().join("x.txt") }]
    );
}

#[test]
fn event_touches_exactly_the_fingerprint_difference() {
    let dir = TempDir::new().expect("target");
    let mut store = MemoryStore::new();
    store.upsert(
        Resource::new(r1())
            .with_file("keep", "same")
            .with_file("change", "old")
            .with_file("drop", "gone"),
    );
    let mut engine = engine(&dir, store);
    engine.full_sync().expect("baseline");
    let keep = dir.path().join("keep");
    let old = age(&keep);

    let report = engine
        .on_resource_event(
            r1(),
            Some(snapshot(&[("keep", "same"), ("change", "new"), ("add", "fresh")])),
        )
        .expect("event");

    assert_eq!(
        mutated(&report),
        BTreeSet::from([
            dir.path().join("add"),
            dir.path().join("change"),
            dir.path().join("drop"),
        ])
    );
    assert_eq!(mtime(&keep), old);
    assert_eq!(
        dir_files(dir.path()),
        BTreeSet::from(["add".to_string(), "change".to_string(), "keep".to_string()])
    );
    let cached = engine.current_files(&r1()).expect("cached");
    assert_eq!(cached.get("change"), Some(&fingerprint(b"new")));
    assert!(cached.get("drop").is_none());
}

#[test]
fn operations_apply_deletes_then_creates_then_updates() {
    let dir = TempDir::new().expect("target");
    let mut store = MemoryStore::new();
    store.upsert(Resource::new(r1()).with_file("b", "1").with_file("c", "1"));
    let mut engine = engine(&dir, store);
    engine.full_sync().expect("baseline");

    let report = engine
        .on_resource_event(r1(), Some(snapshot(&[("a", "new"), ("b", "2")])))
        .expect("event");

    assert_eq!(
        report.changes,
        vec![
            FileChange::Removed { path: dir.path().join("c") },
            FileChange::Created { path: dir.path().join("a") },
            FileChange::Updated { path: dir.path().join("b") },
        ]
    );
}

#[test]
fn replaying_an_applied_event_is_a_noop() {
    let dir = TempDir::new().expect("target");
    let mut engine = engine(&dir, two_resource_store());
    engine.full_sync().expect("baseline");

    let event = snapshot(&[("x.txt", "3")]);
    engine
        .on_resource_event(r1(), Some(event.clone()))
        .expect("first delivery");
    let x = dir.path().join("x.txt");
    let old = age(&x);

    let report = engine
        .on_resource_event(r1(), Some(event))
        .expect("second delivery");
    assert!(!report.has_mutations());
    assert_eq!(mtime(&x), old);
}

#[test]
fn new_resource_event_creates_its_files() {
    let dir = TempDir::new().expect("target");
    let mut engine = engine(&dir, two_resource_store());
    engine.full_sync().expect("baseline");

    let r3 = ResourceId::new("che", "r3");
    let report = engine
        .on_resource_event(r3.clone(), Some(snapshot(&[("z.txt", "9")])))
        .expect("event");

    assert_eq!(report.written(), 1);
    assert_eq!(read(&dir, "z.txt"), "9");
    assert!(engine.current_files(&r3).is_some());
}

#[test]
fn deletion_removes_every_cached_file_and_clears_entry() {
    let dir = TempDir::new().expect("target");
    let mut store = MemoryStore::new();
    store.upsert(Resource::new(r1()).with_file("a", "1").with_file("b", "2"));
    store.upsert(Resource::new(r2()).with_file("y.txt", "2"));
    let mut engine = engine(&dir, store);
    engine.full_sync().expect("baseline");

    let report = engine.on_resource_event(r1(), None).expect("delete event");

    assert_eq!(report.removed(), 2);
    assert_eq!(dir_files(dir.path()), BTreeSet::from(["y.txt".to_string()]));
    assert!(engine.current_files(&r1()).is_none());
}

#[test]
fn deletion_of_unknown_resource_runs_full_sync() {
    let dir = TempDir::new().expect("target");
    let mut engine = engine(&dir, two_resource_store());
    engine.full_sync().expect("baseline");

    // The store lost r2 and a stray file appeared; the cache knows nothing
    // about "ghost", so only a full pass can restore ground truth.
    engine.store_mut().remove(&r2());
    fs::write(dir.path().join("stray.txt"), "?").expect("stray");

    let report = engine
        .on_resource_event(ResourceId::new("che", "ghost"), None)
        .expect("fallback");

    assert_eq!(report.pass, PassKind::Full);
    assert_eq!(dir_files(dir.path()), BTreeSet::from(["x.txt".to_string()]));
    assert!(engine.current_files(&r2()).is_none());
}

#[test]
fn failed_write_leaves_cache_entry_and_replay_converges() {
    let dir = TempDir::new().expect("target");
    let mut engine = engine(&dir, two_resource_store());
    engine.full_sync().expect("baseline");
    let before = engine.current_files(&r1()).cloned();

    // A directory squatting on the target name makes the rename fail.
    let blocker = dir.path().join("b.txt");
    fs::create_dir(&blocker).expect("blocker");

    let event = snapshot(&[("a.txt", "A"), ("b.txt", "B"), ("x.txt", "1")]);
    let err = engine
        .on_resource_event(r1(), Some(event.clone()))
        .expect_err("write must fail");
    assert!(matches!(err, SyncError::Io { .. }), "{err}");
    assert_eq!(engine.current_files(&r1()).cloned(), before, "cache entry must be unchanged");

    fs::remove_dir(&blocker).expect("clear blocker");
    let report = engine
        .on_resource_event(r1(), Some(event))
        .expect("replay");

    assert_eq!(read(&dir, "a.txt"), "A");
    assert_eq!(read(&dir, "b.txt"), "B");
    assert_eq!(read(&dir, "x.txt"), "1");
    assert_eq!(report.written(), 2);
    let cached = engine.current_files(&r1()).expect("cached");
    assert_eq!(
        cached.keys().collect::<Vec<_>>(),
        vec!["a.txt", "b.txt", "x.txt"]
    );
}

#[test]
fn delete_of_already_missing_file_is_not_an_error() {
    let dir = TempDir::new().expect("target");
    let mut engine = engine(&dir, two_resource_store());
    engine.full_sync().expect("baseline");
    fs::remove_file(dir.path().join("x.txt")).expect("external delete");

    engine.on_resource_event(r1(), None).expect("delete event");
    assert!(engine.current_files(&r1()).is_none());
}

#[test]
fn apply_event_matches_on_resource_event() {
    let dir = TempDir::new().expect("target");
    let mut engine = engine(&dir, two_resource_store());
    engine.full_sync().expect("baseline");

    let report = engine
        .apply_event(configbump_core::ResourceEvent::gone(r2()))
        .expect("event");
    assert_eq!(report.removed(), 1);
    assert!(!dir.path().join("y.txt").exists());
}

// ---------------------------------------------------------------------------
// Long names and shared names
// ---------------------------------------------------------------------------

#[test]
fn full_sync_writes_keys_near_the_file_name_limit() {
    let dir = TempDir::new().unwrap();
    let long = "k".repeat(250);
    let mut store = MemoryStore::new();
    store.upsert(
        Resource::new(r1())
            .with_file(long.as_str(), "long")
            .with_file("ok.txt", "ok"),
    );
    let mut engine = engine(&dir, store);

    let report = engine.full_sync().expect("full sync");

    assert_eq!(report.written(), 2);
    assert_eq!(read(&dir, &long), "long");
    assert_eq!(read(&dir, "ok.txt"), "ok");
    assert_eq!(dir_files(dir.path()), BTreeSet::from([long, "ok.txt".to_string()]));
}

fn shared_name_store() -> MemoryStore {
    let mut store = MemoryStore::new();
    store.upsert(
        Resource::new(r1())
            .with_file("shared", "from r1")
            .with_file("x.txt", "1"),
    );
    store.upsert(Resource::new(r2()).with_file("shared", "from r2"));
    store
}

#[test]
fn deleting_the_shadowed_provider_keeps_the_shared_file() {
    let dir = TempDir::new().unwrap();
    let mut engine = engine(&dir, shared_name_store());
    engine.full_sync().expect("full sync");
    assert_eq!(read(&dir, "shared"), "from r2");
    assert!(!engine.current_files(&r1()).unwrap().contains_key("shared"));

    engine.store_mut().remove(&r1());
    engine.on_resource_event(r1(), None).expect("delete event");

    assert_eq!(read(&dir, "shared"), "from r2");
    assert!(!dir.path().join("x.txt").exists());
    assert!(engine.current_files(&r1()).is_none());
}

#[test]
fn deleting_the_owner_hands_the_shared_file_to_the_other_provider() {
    let dir = TempDir::new().unwrap();
    let mut engine = engine(&dir, shared_name_store());
    engine.full_sync().expect("full sync");

    engine.store_mut().remove(&r2());
    engine.on_resource_event(r2(), None).expect("delete event");

    assert_eq!(read(&dir, "shared"), "from r1");
    assert_eq!(
        engine.current_files(&r1()).unwrap().get("shared"),
        Some(&fingerprint(b"from r1"))
    );
    assert!(engine.current_files(&r2()).is_none());
}

#[test]
fn updating_a_shadowed_provider_does_not_overwrite_the_owner() {
    let dir = TempDir::new().unwrap();
    let mut engine = engine(&dir, shared_name_store());
    engine.full_sync().expect("full sync");

    engine.store_mut().upsert(
        Resource::new(r1())
            .with_file("shared", "r1 again")
            .with_file("x.txt", "1"),
    );
    let update = snapshot(&[("shared", "r1 again"), ("x.txt", "1")]);
    engine.on_resource_event(r1(), Some(update)).expect("update event");

    assert_eq!(read(&dir, "shared"), "from r2");
}
