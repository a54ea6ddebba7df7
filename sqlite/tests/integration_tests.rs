//! Integration tests for the metavault-sqlite crate.

use metavault_core::{AttributeMap, Subset, Value};
use metavault_sqlite::{Database, VaultError};
use tempfile::TempDir;

/// Builds an attribute map from string pairs.
fn row(pairs: &[(&str, &str)]) -> AttributeMap {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), Value::from(*v)))
        .collect()
}

/// Creates an in-memory database with a two-track "test" dataset.
fn setup_tracks() -> Database {
    let db = Database::open_in_memory().unwrap();
    let tracks = db.create_dataset("test", &["artist", "title"]).unwrap();
    tracks
        .set(
            "riddim.mp3",
            &row(&[("artist", "Bounty Killer"), ("title", "Riddim Killa")]),
        )
        .unwrap();
    tracks
        .set(
            "ambient.mp3",
            &row(&[("artist", "Dog The Bounty Hunter"), ("title", "Trashcore")]),
        )
        .unwrap();
    db
}

// =============================================================================
// Dictionary semantics
// =============================================================================

#[test]
fn test_set_get_round_trip() {
    let db = setup_tracks();
    let tracks = db.dataset("test").unwrap();

    let loaded = tracks.get("riddim.mp3").unwrap();
    assert_eq!(
        loaded,
        row(&[("artist", "Bounty Killer"), ("title", "Riddim Killa")])
    );
}

#[test]
fn test_get_missing_key_fails() {
    let db = setup_tracks();
    let tracks = db.dataset("test").unwrap();

    assert!(matches!(
        tracks.get("nope.mp3"),
        Err(VaultError::KeyNotFound { key, .. }) if key == "nope.mp3"
    ));
}

#[test]
fn test_set_merges_into_existing_row() {
    let db = setup_tracks();
    let tracks = db.dataset("test").unwrap();

    tracks
        .set("riddim.mp3", &row(&[("title", "Riddim Killa VIP")]))
        .unwrap();
    let loaded = tracks.get("riddim.mp3").unwrap();
    assert_eq!(
        loaded,
        row(&[("artist", "Bounty Killer"), ("title", "Riddim Killa VIP")])
    );
}

#[test]
fn test_set_auto_declares_new_attributes() {
    let db = setup_tracks();
    let tracks = db.dataset("test").unwrap();

    let mut map = AttributeMap::new();
    map.insert("bpm".into(), Value::from(174));
    tracks.set("riddim.mp3", &map).unwrap();

    assert_eq!(tracks.attributes().unwrap(), ["artist", "title", "bpm"]);
    assert_eq!(
        tracks.get("riddim.mp3").unwrap().get("bpm"),
        Some(&Value::from(174))
    );
    // Rows that never defined the new attribute read back without it.
    assert!(!tracks.get("ambient.mp3").unwrap().contains_key("bpm"));
}

#[test]
fn test_delete_then_get_fails() {
    let db = setup_tracks();
    let tracks = db.dataset("test").unwrap();

    tracks.delete("riddim.mp3").unwrap();
    assert!(matches!(
        tracks.get("riddim.mp3"),
        Err(VaultError::KeyNotFound { .. })
    ));
    assert!(matches!(
        tracks.delete("riddim.mp3"),
        Err(VaultError::KeyNotFound { .. })
    ));
    assert_eq!(tracks.keys().unwrap(), ["ambient.mp3"]);
}

#[test]
fn test_keys_in_insertion_order() {
    let db = setup_tracks();
    let tracks = db.dataset("test").unwrap();
    assert_eq!(tracks.keys().unwrap(), ["riddim.mp3", "ambient.mp3"]);
    assert_eq!(tracks.len().unwrap(), 2);
    assert!(tracks.contains("ambient.mp3").unwrap());
    assert!(!tracks.contains("nope.mp3").unwrap());
}

#[test]
fn test_iteration_is_restartable() {
    let db = setup_tracks();
    let tracks = db.dataset("test").unwrap();

    let first: Vec<String> = tracks.iter().unwrap().map(|(k, _)| k).collect();
    tracks.set("new.mp3", &AttributeMap::new()).unwrap();
    let second: Vec<String> = tracks.iter().unwrap().map(|(k, _)| k).collect();

    assert_eq!(first, ["riddim.mp3", "ambient.mp3"]);
    assert_eq!(second, ["riddim.mp3", "ambient.mp3", "new.mp3"]);
}

// =============================================================================
// Attribute lifecycle
// =============================================================================

#[test]
fn test_remove_then_add_attribute_leaves_no_residue() {
    let db = setup_tracks();
    let tracks = db.dataset("test").unwrap();

    tracks.delete("riddim.mp3").unwrap();
    tracks.remove_attribute("artist").unwrap();
    assert_eq!(
        tracks.get("ambient.mp3").unwrap(),
        row(&[("title", "Trashcore")])
    );

    tracks.add_attribute("artist").unwrap();
    assert_eq!(
        tracks.get("ambient.mp3").unwrap(),
        row(&[("title", "Trashcore")])
    );

    tracks
        .set("ambient.mp3", &row(&[("artist", "Dog The Bounty Hunter")]))
        .unwrap();
    assert_eq!(
        tracks.get("ambient.mp3").unwrap(),
        row(&[("title", "Trashcore"), ("artist", "Dog The Bounty Hunter")])
    );
}

#[test]
fn test_add_attribute_is_idempotent() {
    let db = setup_tracks();
    let tracks = db.dataset("test").unwrap();

    tracks.add_attribute("year").unwrap();
    tracks.add_attribute("year").unwrap();
    assert_eq!(tracks.attributes().unwrap(), ["artist", "title", "year"]);
}

#[test]
fn test_replace_in_attribute_counts_rows() {
    let db = setup_tracks();
    let tracks = db.dataset("test").unwrap();
    tracks
        .set("more.mp3", &row(&[("artist", "Bounty Killer")]))
        .unwrap();

    let changed = tracks
        .replace_in_attribute(
            "artist",
            &Value::from("Bounty Killer"),
            &Value::from("The General"),
        )
        .unwrap();
    assert_eq!(changed, 2);
    assert_eq!(
        tracks.get("more.mp3").unwrap().get("artist"),
        Some(&Value::from("The General"))
    );
    // Whole-value equality: the other artist is untouched.
    assert_eq!(
        tracks.get("ambient.mp3").unwrap().get("artist"),
        Some(&Value::from("Dog The Bounty Hunter"))
    );
}

#[test]
fn test_replace_in_unknown_attribute_fails() {
    let db = setup_tracks();
    let tracks = db.dataset("test").unwrap();
    assert!(matches!(
        tracks.replace_in_attribute("bpm", &Value::from(1), &Value::from(2)),
        Err(VaultError::UnknownAttribute { attribute, .. }) if attribute == "bpm"
    ));
}

// =============================================================================
// Search and subsets
// =============================================================================

#[test]
fn test_search_is_conjunctive() {
    let db = setup_tracks();
    let tracks = db.dataset("test").unwrap();
    tracks
        .set(
            "more.mp3",
            &row(&[("artist", "Bounty Killer"), ("title", "Warlord")]),
        )
        .unwrap();

    let hits = tracks
        .search(&[
            ("artist", Value::from("Bounty Killer")),
            ("title", Value::from("Warlord")),
        ])
        .unwrap();
    assert_eq!(hits.keys().collect::<Vec<_>>(), ["more.mp3"]);

    assert!(matches!(
        tracks.search(&[("bpm", Value::from(174))]),
        Err(VaultError::UnknownAttribute { .. })
    ));
}

#[test]
fn test_search_contains_escapes_wildcards() {
    let db = Database::open_in_memory().unwrap();
    let set = db.create_dataset("notes", &["text"]).unwrap();
    set.set("a", &row(&[("text", "50% done")])).unwrap();
    set.set("b", &row(&[("text", "fifty percent done")])).unwrap();

    let hits = set.search_contains("text", "50%").unwrap();
    assert_eq!(hits.keys().collect::<Vec<_>>(), ["a"]);

    let hits = set.search_contains("text", "done").unwrap();
    assert_eq!(hits.len(), 2);
}

#[test]
fn test_subset_by_key_preserves_request_order() {
    let db = setup_tracks();
    let tracks = db.dataset("test").unwrap();

    let subset = tracks
        .get_subset_by_key(&["ambient.mp3", "missing.mp3", "riddim.mp3"])
        .unwrap();
    assert_eq!(
        subset.keys().collect::<Vec<_>>(),
        ["ambient.mp3", "riddim.mp3"]
    );
}

#[test]
fn test_subset_by_amount_truncates_and_reverses() {
    let db = Database::open_in_memory().unwrap();
    let set = db.create_dataset("seq", &["n"]).unwrap();
    for i in 0..5 {
        let mut map = AttributeMap::new();
        map.insert("n".into(), Value::from(i));
        set.set(&format!("f{i}"), &map).unwrap();
    }

    let slice = set.get_subset_by_amount(2, 1, false).unwrap();
    assert_eq!(slice.keys().collect::<Vec<_>>(), ["f1", "f2"]);

    // Counted from the end, presented forward.
    let tail = set.get_subset_by_amount(2, 0, true).unwrap();
    assert_eq!(tail.keys().collect::<Vec<_>>(), ["f3", "f4"]);

    // Out of range truncates rather than fails.
    let all = set.get_subset_by_amount(100, 3, false).unwrap();
    assert_eq!(all.keys().collect::<Vec<_>>(), ["f3", "f4"]);
    assert!(set.get_subset_by_amount(2, 50, false).unwrap().is_empty());
}

#[test]
fn test_subset_by_random_bounds() {
    let db = setup_tracks();
    let tracks = db.dataset("test").unwrap();

    assert!(matches!(
        tracks.get_subset_by_random(3),
        Err(VaultError::InsufficientRows {
            requested: 3,
            available: 2
        })
    ));

    let sample = tracks.get_subset_by_random(2).unwrap();
    assert_eq!(sample.len(), 2);
    assert!(sample.contains("riddim.mp3"));
    assert!(sample.contains("ambient.mp3"));
}

#[test]
fn test_union_persisted_as_dataset() {
    let db = setup_tracks();
    let tracks = db.dataset("test").unwrap();

    let mut a = Subset::new();
    a.insert("x", row(&[("v", "1")]));
    let mut b = Subset::new();
    b.insert("x", row(&[("v", "2")]));
    b.insert("y", row(&[("v", "3")]));

    let merged = a + b;
    db.insert_dataset("merged", &merged).unwrap();

    let persisted = db.dataset("merged").unwrap();
    assert_eq!(persisted.get("x").unwrap(), row(&[("v", "2")]));
    assert_eq!(persisted.get("y").unwrap(), row(&[("v", "3")]));

    // Assigning a subset replaces any existing dataset of that name.
    db.insert_dataset("merged", &tracks.all().unwrap()).unwrap();
    assert_eq!(db.dataset("merged").unwrap().len().unwrap(), 2);
}

#[test]
fn test_batch_insert_replaces_rows_wholesale() {
    let db = setup_tracks();
    let tracks = db.dataset("test").unwrap();

    let mut batch = Subset::new();
    batch.insert("riddim.mp3", row(&[("title", "Replaced")]));
    batch.insert("fresh.mp3", row(&[("artist", "New")]));
    tracks.batch_insert(&batch).unwrap();

    // A replaced row loses attributes the batch did not carry.
    assert_eq!(
        tracks.get("riddim.mp3").unwrap(),
        row(&[("title", "Replaced")])
    );
    assert_eq!(tracks.get("fresh.mp3").unwrap(), row(&[("artist", "New")]));
    assert_eq!(tracks.len().unwrap(), 3);
}

// =============================================================================
// Import / export
// =============================================================================

#[test]
fn test_export_import_round_trip_all_formats() {
    for name in ["dump.csv", "dump.json", "dump.jsonl"] {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(name);

        let db = setup_tracks();
        let tracks = db.dataset("test").unwrap();
        tracks.export_data(&path).unwrap();

        let copy = db.create_dataset("copy", &["artist", "title"]).unwrap();
        let imported = copy.import_data(&path).unwrap();
        assert_eq!(imported, 2, "{name}");
        let original = tracks.all().unwrap();
        let restored = copy.all().unwrap();
        assert_eq!(
            restored.get("riddim.mp3"),
            original.get("riddim.mp3"),
            "{name}"
        );
        assert_eq!(
            restored.get("ambient.mp3"),
            original.get("ambient.mp3"),
            "{name}"
        );
    }
}

#[test]
fn test_import_auto_declares_attributes() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("incoming.csv");
    std::fs::write(&path, "filename,artist,year\nnew.mp3,Someone,2017\n").unwrap();

    let db = setup_tracks();
    let tracks = db.dataset("test").unwrap();
    tracks.import_data(&path).unwrap();

    assert_eq!(tracks.attributes().unwrap(), ["artist", "title", "year"]);
    let loaded = tracks.get("new.mp3").unwrap();
    assert_eq!(loaded.get("artist"), Some(&Value::from("Someone")));
    assert_eq!(loaded.get("year"), Some(&Value::from(2017)));
}

#[test]
fn test_import_replace_clears_first() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("incoming.jsonl");
    std::fs::write(&path, "{\"filename\":\"only.mp3\",\"title\":\"One\"}\n").unwrap();

    let db = setup_tracks();
    let tracks = db.dataset("test").unwrap();
    tracks.import_data_replace(&path).unwrap();

    assert_eq!(tracks.keys().unwrap(), ["only.mp3"]);
}

#[test]
fn test_export_unknown_extension_fails() {
    let db = setup_tracks();
    let tracks = db.dataset("test").unwrap();
    assert!(matches!(
        tracks.export_data("dump.yaml"),
        Err(VaultError::Core(
            metavault_core::CoreError::UnsupportedFormat(_)
        ))
    ));
}

// =============================================================================
// Transactions and durability
// =============================================================================

#[test]
fn test_manual_commit_flushes_on_close() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("vault.db");

    {
        let db = Database::open_with(&path, true).unwrap();
        let set = db.create_dataset("tracks", &["artist"]).unwrap();
        set.set("a.mp3", &row(&[("artist", "A")])).unwrap();
        db.commit().unwrap();
        set.set("b.mp3", &row(&[("artist", "B")])).unwrap();
        // Not committed explicitly; close flushes the open batch.
        db.close().unwrap();
    }

    let db = Database::open(&path).unwrap();
    assert_eq!(db.dataset("tracks").unwrap().len().unwrap(), 2);
}

#[test]
fn test_rollback_restores_checkpoint() {
    let db = setup_tracks();
    let tracks = db.dataset("test").unwrap();

    db.begin_transaction().unwrap();
    tracks.delete("riddim.mp3").unwrap();
    tracks.set("extra.mp3", &row(&[("artist", "X")])).unwrap();
    db.rollback().unwrap();

    assert_eq!(tracks.keys().unwrap(), ["riddim.mp3", "ambient.mp3"]);
    assert!(matches!(db.rollback(), Err(VaultError::NoCheckpoint)));
}

#[test]
fn test_commit_keeps_checkpointed_writes() {
    let db = setup_tracks();
    let tracks = db.dataset("test").unwrap();

    db.begin_transaction().unwrap();
    tracks.delete("riddim.mp3").unwrap();
    db.commit().unwrap();

    assert_eq!(tracks.keys().unwrap(), ["ambient.mp3"]);
}

#[test]
fn test_failed_import_rolls_back_savepoint() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("broken.jsonl");
    // The second record carries an attribute name that is not a valid
    // identifier, so the import fails after the first row is written.
    std::fs::write(
        &path,
        "{\"filename\":\"ok.mp3\",\"title\":\"One\"}\n\
         {\"filename\":\"bad.mp3\",\"bad name\":\"Two\"}\n",
    )
    .unwrap();

    let db = setup_tracks();
    let tracks = db.dataset("test").unwrap();
    assert!(tracks.import_data(&path).is_err());

    // Nothing from the failed import is visible.
    assert_eq!(tracks.keys().unwrap(), ["riddim.mp3", "ambient.mp3"]);
}

#[test]
fn test_typed_values_round_trip_storage() {
    let db = Database::open_in_memory().unwrap();
    let set = db
        .create_dataset("takes", &["bpm", "gain", "note"])
        .unwrap();

    let mut map = AttributeMap::new();
    map.insert("bpm".into(), Value::from(174));
    map.insert("gain".into(), Value::from(-3.5));
    map.insert("note".into(), Value::from("keeper"));
    set.set("take1.wav", &map).unwrap();

    assert_eq!(set.get("take1.wav").unwrap(), map);
}

// =============================================================================
// Database-level dataset management
// =============================================================================

#[test]
fn test_dataset_lifecycle() {
    let db = Database::open_in_memory().unwrap();

    db.create_dataset("one", &["a"]).unwrap();
    db.create_dataset("two", &[] as &[&str]).unwrap();
    assert_eq!(db.datasets().unwrap(), ["one", "two"]);
    assert!(db.contains_dataset("one").unwrap());

    assert!(matches!(
        db.create_dataset("one", &["a"]),
        Err(VaultError::DatasetExists(name)) if name == "one"
    ));
    assert!(matches!(
        db.dataset("missing"),
        Err(VaultError::DatasetNotFound(_))
    ));

    db.remove_dataset("one").unwrap();
    // Removal is idempotent.
    db.remove_dataset("one").unwrap();
    assert_eq!(db.datasets().unwrap(), ["two"]);
}

#[test]
fn test_declare_dataset_checks_schema() {
    let db = Database::open_in_memory().unwrap();

    db.declare_dataset("tracks", &["artist", "title"]).unwrap();
    // Same attribute set in any order is accepted.
    db.declare_dataset("tracks", &["title", "artist"]).unwrap();
    assert!(matches!(
        db.declare_dataset("tracks", &["artist", "bpm"]),
        Err(VaultError::Schema(_))
    ));
}

#[test]
fn test_invalid_names_are_rejected() {
    let db = Database::open_in_memory().unwrap();

    assert!(matches!(
        db.create_dataset("bad name", &[] as &[&str]),
        Err(VaultError::InvalidName(_))
    ));
    assert!(matches!(
        db.create_dataset("sqlite_master", &[] as &[&str]),
        Err(VaultError::InvalidName(_))
    ));

    let set = db.create_dataset("ok", &[] as &[&str]).unwrap();
    assert!(matches!(
        set.add_attribute("filename"),
        Err(VaultError::InvalidName(_))
    ));
    assert!(matches!(
        set.add_attribute("drop table"),
        Err(VaultError::InvalidName(_))
    ));
}
