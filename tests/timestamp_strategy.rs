//! Timestamp Key Strategy Tests
//!
//! Versioned repositories over stores with native per-cell timestamps. The
//! version of a cell is found by stepping back from the latest write one
//! millisecond per version; every version is written at least one
//! millisecond after the one before it.

use std::sync::Arc;

use vellum::meta::{millis_directive, KeyStrategy, ManualClock, VersionCutoff};
use vellum::{MetaHandler, PathRef, Policy, RepoConfig, Repository};

fn open(clock: &Arc<ManualClock>) -> Repository {
    RepoConfig::versioned("cells")
        .with_timestamps()
        .open_with_clock(None, clock.clone())
        .unwrap()
}

fn write_all(repo: &Repository, path: &str, contents: &[&str]) {
    for content in contents {
        repo.add_document(path, content, "u", "c", None).unwrap();
    }
}

// =============================================================================
// Layout Tests
// =============================================================================

/// The latest entry is the bare path; no separate latest key exists.
#[test]
fn test_layout_uses_bare_path() {
    let clock = Arc::new(ManualClock::ticking(1_000, 1));
    let repo = open(&clock);

    match repo.policy() {
        Policy::Versioned(handler) => assert_eq!(handler.strategy(), KeyStrategy::Timestamp),
        Policy::Unversioned(_) => panic!("expected versioned policy"),
    }
    assert_eq!(repo.handler().latest_key("a/b"), "a/b");

    write_all(&repo, "a/b", &["one", "two"]);
    let latest = repo.handler().get_latest_meta("a/b").unwrap().unwrap();
    assert_eq!(latest.version, 2);
}

// =============================================================================
// Version Lookup Tests
// =============================================================================

/// Versions one millisecond apart resolve exactly.
#[test]
fn test_versions_one_millisecond_apart() {
    let clock = Arc::new(ManualClock::ticking(1_000, 1));
    let repo = open(&clock);
    write_all(&repo, "p", &["a", "b", "c", "d"]);

    for (version, content) in [(1, "a"), (2, "b"), (3, "c"), (4, "d")] {
        let doc = repo.get_doc_and_meta(&PathRef::version("p", version)).unwrap();
        assert_eq!(doc.version(), Some(version));
        assert_eq!(doc.content.as_deref(), Some(content));
    }
}

/// Wider spacing takes more steps but still lands on the right version.
#[test]
fn test_versions_spaced_apart() {
    let clock = Arc::new(ManualClock::ticking(1_000, 50));
    let repo = open(&clock);
    write_all(&repo, "p", &["a", "b", "c", "d"]);

    let doc = repo.get_doc_and_meta(&PathRef::version("p", 1)).unwrap();
    assert_eq!(doc.version(), Some(1));
    assert_eq!(doc.content.as_deref(), Some("a"));
}

/// Versions written within one millisecond get cells of their own.
#[test]
fn test_same_millisecond_versions_stay_retrievable() {
    let clock = Arc::new(ManualClock::new(1_000));
    let repo = open(&clock);
    write_all(&repo, "p", &["a", "b", "c"]);
    assert!(repo.delete_document("u", "p", None).unwrap());

    let latest = repo.handler().get_latest_meta("p").unwrap().unwrap();
    assert_eq!(latest.version, 4);
    assert_eq!(latest.modified_timestamp, 1_003);
    for (version, content) in [(1, "a"), (2, "b"), (3, "c")] {
        let doc = repo.get_doc_and_meta(&PathRef::version("p", version)).unwrap();
        assert_eq!(doc.version(), Some(version));
        assert_eq!(doc.content.as_deref(), Some(content));
    }
}

/// A clock that steps back does not overwrite newer cells.
#[test]
fn test_clock_step_back_keeps_cells() {
    let clock = Arc::new(ManualClock::new(5_000));
    let repo = open(&clock);
    write_all(&repo, "p", &["a"]);
    clock.set(4_000);
    write_all(&repo, "p", &["b"]);

    let v2 = repo.get_doc_and_meta(&PathRef::version("p", 2)).unwrap();
    let meta = v2.metadata.unwrap();
    assert_eq!(meta.modified_timestamp, 5_001);
    assert!(meta.modified_timestamp > meta.created_timestamp);
    let v1 = repo.get_doc_and_meta(&PathRef::version("p", 1)).unwrap();
    assert_eq!(v1.content.as_deref(), Some("a"));
}

/// As-of reads walk back through the cells.
#[test]
fn test_as_of_resolution() {
    let clock = Arc::new(ManualClock::ticking(1_000, 1_000));
    let repo = open(&clock);
    write_all(&repo, "p", &["a", "b", "c"]);

    assert_eq!(
        repo.get_version_number_as_of_time("p", &millis_directive(2_500)).unwrap(),
        Some(2)
    );
    let doc = repo
        .get_doc_and_meta(&PathRef::as_of("p", millis_directive(1_999)))
        .unwrap();
    assert_eq!(doc.content.as_deref(), Some("a"));
    assert_eq!(
        repo.get_version_number_as_of_time("p", &millis_directive(999)).unwrap(),
        None
    );
}

// =============================================================================
// Delete and Retention Tests
// =============================================================================

/// Tombstone cells carry no content even though older content cells exist.
#[test]
fn test_tombstone_has_no_content() {
    let clock = Arc::new(ManualClock::ticking(1_000, 1));
    let repo = open(&clock);
    write_all(&repo, "p", &["a", "b"]);
    assert!(repo.delete_document("u", "p", None).unwrap());

    assert_eq!(repo.get_document("p").unwrap(), None);
    let tombstone = repo.get_doc_and_meta(&PathRef::version("p", 3)).unwrap();
    assert_eq!(tombstone.content, None);
    assert!(tombstone.metadata.unwrap().deleted);

    let before = repo.get_doc_and_meta(&PathRef::version("p", 2)).unwrap();
    assert_eq!(before.content.as_deref(), Some("b"));
}

/// Pruning by version drops every cell up to that version's timestamp.
#[test]
fn test_delete_old_versions_by_version() {
    let clock = Arc::new(ManualClock::ticking(1_000, 10));
    let repo = open(&clock);
    write_all(&repo, "p", &["a", "b", "c", "d"]);

    assert!(repo.delete_old_versions("p", VersionCutoff::Version(2)).unwrap());
    assert!(repo.get_doc_and_meta(&PathRef::version("p", 2)).unwrap().is_absent());
    let v3 = repo.get_doc_and_meta(&PathRef::version("p", 3)).unwrap();
    assert_eq!(v3.content.as_deref(), Some("c"));
    assert_eq!(repo.handler().get_latest_meta("p").unwrap().unwrap().version, 4);
}

/// A timestamp cutoff never removes the latest cell.
#[test]
fn test_delete_old_versions_keeps_latest_cell() {
    let clock = Arc::new(ManualClock::ticking(1_000, 10));
    let repo = open(&clock);
    write_all(&repo, "p", &["a", "b"]);

    assert!(repo
        .delete_old_versions("p", VersionCutoff::Timestamp(i64::MAX))
        .unwrap());
    let latest = repo.get_doc_and_meta(&PathRef::latest("p")).unwrap();
    assert_eq!(latest.content.as_deref(), Some("b"));
    assert_eq!(latest.version(), Some(2));
    let v2 = repo.get_doc_and_meta(&PathRef::version("p", 2)).unwrap();
    assert_eq!(v2.content.as_deref(), Some("b"));
}

// =============================================================================
// Batch Tests
// =============================================================================

/// Mixed batches come back in request order.
#[test]
fn test_mixed_batch() {
    let clock = Arc::new(ManualClock::ticking(1_000, 1_000));
    let repo = open(&clock);
    write_all(&repo, "p", &["a", "b"]);
    write_all(&repo, "q", &["x"]);

    let refs = [
        PathRef::as_of("p", millis_directive(1_500)),
        PathRef::latest("q"),
        PathRef::version("p", 2),
        PathRef::as_of("q", millis_directive(0)),
        PathRef::latest("p"),
    ];
    let results = repo.get_doc_and_metas(&refs).unwrap();
    let contents: Vec<Option<&str>> = results.iter().map(|d| d.content.as_deref()).collect();
    assert_eq!(contents, vec![Some("a"), Some("x"), Some("b"), None, Some("b")]);
    assert!(results[3].is_absent());
}
