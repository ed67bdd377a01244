use tagger_core::store::resolver::NameResolver;
use tagger_core::store::{Asymmetry, InitOutcome, MatchScope, RecoverOutcome, RelateOutcome};
use tagger_core::{
    ElemKind, PathCanonicalizer, RelateAction, RelationStore, SetList, StoreError, StoreLayout,
};

struct IdentityCanonicalizer;

impl PathCanonicalizer for IdentityCanonicalizer {
    fn canonicalize(&self, raw: &str) -> std::io::Result<String> {
        Ok(raw.to_string())
    }
}

fn open_store() -> (tempfile::TempDir, RelationStore) {
    let dir = tempfile::tempdir().unwrap();
    let layout = StoreLayout::new(dir.path());
    layout.ensure().unwrap();
    let store = RelationStore::with_parts(NameResolver::new(layout), Box::new(IdentityCanonicalizer));
    (dir, store)
}

fn colliding_store() -> (tempfile::TempDir, RelationStore) {
    fn collide(_: &str) -> String {
        "0000".to_string()
    }
    let dir = tempfile::tempdir().unwrap();
    let layout = StoreLayout::new(dir.path());
    layout.ensure().unwrap();
    let resolver = NameResolver::with_fingerprint(layout, collide);
    (dir, RelationStore::with_parts(resolver, Box::new(IdentityCanonicalizer)))
}

fn names(items: &[&str]) -> SetList {
    items.iter().copied().collect()
}

#[test]
fn init_reports_not_found_created_then_exists() {
    let (_dir, store) = open_store();

    assert_eq!(store.init(ElemKind::Tag, "mp3", false).unwrap(), InitOutcome::NotFound);
    assert!(matches!(
        store.init(ElemKind::Tag, "mp3", true).unwrap(),
        InitOutcome::Created(_)
    ));
    assert!(matches!(
        store.init(ElemKind::Tag, "mp3", true).unwrap(),
        InitOutcome::Exists(_)
    ));
}

#[test]
fn init_without_store_directories_is_an_io_failure() {
    let dir = tempfile::tempdir().unwrap();
    let store = RelationStore::new(StoreLayout::new(dir.path().join("missing")));

    let err = store.init(ElemKind::Tag, "mp3", true).unwrap_err();
    assert!(matches!(err, StoreError::MissingDirectory(_)));
}

#[test]
fn relate_is_symmetric_and_idempotent() {
    let (_dir, store) = open_store();
    let tag = store.init(ElemKind::Tag, "mp3", true).unwrap().into_elem().unwrap();
    let file = store.init(ElemKind::File, "/a", true).unwrap().into_elem().unwrap();

    assert_eq!(
        store.relate(RelateAction::Add, &tag, &file).unwrap(),
        RelateOutcome::Created
    );
    let once_tag = std::fs::read_to_string(&tag.path).unwrap();
    let once_file = std::fs::read_to_string(&file.path).unwrap();

    assert_eq!(
        store.relate(RelateAction::Add, &tag, &file).unwrap(),
        RelateOutcome::Updated
    );
    assert_eq!(std::fs::read_to_string(&tag.path).unwrap(), once_tag);
    assert_eq!(std::fs::read_to_string(&file.path).unwrap(), once_file);

    assert_eq!(store.list_related(&tag).unwrap(), names(&["/a"]));
    assert_eq!(store.list_related(&file).unwrap(), names(&["mp3"]));
}

#[test]
fn remove_then_add_restores_without_duplicate_line() {
    let (_dir, store) = open_store();
    let tag = store.init(ElemKind::Tag, "mp3", true).unwrap().into_elem().unwrap();
    let file = store.init(ElemKind::File, "/a", true).unwrap().into_elem().unwrap();

    store.relate(RelateAction::Add, &file, &tag).unwrap();
    store.relate(RelateAction::Remove, &file, &tag).unwrap();
    assert!(store.list_related(&file).unwrap().is_empty());
    assert_eq!(std::fs::read_to_string(&file.path).unwrap(), "/a\n-mp3\n");

    store.relate(RelateAction::Add, &file, &tag).unwrap();
    assert_eq!(std::fs::read_to_string(&file.path).unwrap(), "/a\n+mp3\n");
    assert_eq!(std::fs::read_to_string(&tag.path).unwrap(), "mp3\n+/a\n");
}

#[test]
fn remove_without_line_is_noop() {
    let (_dir, store) = open_store();
    let tag = store.init(ElemKind::Tag, "mp3", true).unwrap().into_elem().unwrap();
    let file = store.init(ElemKind::File, "/a", true).unwrap().into_elem().unwrap();

    assert_eq!(
        store.relate(RelateAction::Remove, &tag, &file).unwrap(),
        RelateOutcome::NoOp
    );
}

#[test]
fn same_kind_relation_is_rejected_before_writing() {
    let (_dir, store) = open_store();
    let a = store.init(ElemKind::Tag, "a", true).unwrap().into_elem().unwrap();
    let b = store.init(ElemKind::Tag, "b", true).unwrap().into_elem().unwrap();

    let err = store.relate(RelateAction::Add, &a, &b).unwrap_err();
    assert!(matches!(err, StoreError::SameKindRelation { .. }));
    assert_eq!(std::fs::read_to_string(&a.path).unwrap(), "a\n");
}

#[test]
fn colliding_names_keep_distinct_records() {
    let (_dir, store) = colliding_store();
    let a = store.init(ElemKind::Tag, "alpha", true).unwrap().into_elem().unwrap();
    let b = store.init(ElemKind::Tag, "beta", true).unwrap().into_elem().unwrap();
    assert_ne!(a.path, b.path);

    let again = store.find(ElemKind::Tag, "beta").unwrap().unwrap();
    assert_eq!(again.path, b.path);
    assert_eq!(store.list_all(ElemKind::Tag).unwrap(), names(&["alpha", "beta"]));
}

#[test]
fn soft_delete_then_recover_round_trips() {
    let (_dir, store) = open_store();
    let tag = store.init(ElemKind::Tag, "mp3", true).unwrap().into_elem().unwrap();
    for path in ["/a", "/b"] {
        let file = store.init(ElemKind::File, path, true).unwrap().into_elem().unwrap();
        store.relate(RelateAction::Add, &file, &tag).unwrap();
    }
    let before = store.list_related(&tag).unwrap();

    store.soft_delete(&tag).unwrap();
    assert!(store.find(ElemKind::Tag, "mp3").unwrap().is_none());
    assert!(store.list_all(ElemKind::Tag).unwrap().is_empty());
    assert_eq!(store.list_trashed(ElemKind::Tag).unwrap(), names(&["mp3"]));
    let a = store.find(ElemKind::File, "/a").unwrap().unwrap();
    assert!(store.list_related(&a).unwrap().is_empty());

    let recovered = match store.recover(ElemKind::Tag, "mp3").unwrap() {
        RecoverOutcome::Recovered(elem) => elem,
        RecoverOutcome::NotFound => panic!("trashed tag should be recoverable"),
    };
    assert_eq!(store.list_related(&recovered).unwrap(), before);
    assert_eq!(store.list_related(&a).unwrap(), names(&["mp3"]));
    assert!(store.check_consistency().unwrap().is_empty());
}

#[test]
fn recover_unknown_name_is_not_found() {
    let (_dir, store) = open_store();
    assert_eq!(
        store.recover(ElemKind::Tag, "never").unwrap(),
        RecoverOutcome::NotFound
    );
}

#[test]
fn recover_over_recreated_entity_conflicts() {
    let (_dir, store) = open_store();
    let tag = store.init(ElemKind::Tag, "mp3", true).unwrap().into_elem().unwrap();
    store.soft_delete(&tag).unwrap();
    store.init(ElemKind::Tag, "mp3", true).unwrap();

    let err = store.recover(ElemKind::Tag, "mp3").unwrap_err();
    assert!(matches!(err, StoreError::RecoverConflict { .. }));
}

#[test]
fn list_matching_uses_shell_wildcards_per_scope() {
    let (_dir, store) = open_store();
    for name in ["rock", "rap", "jazz"] {
        store.init(ElemKind::Tag, name, true).unwrap();
    }
    assert_eq!(
        store.list_matching(MatchScope::Database, ElemKind::Tag, "r*").unwrap(),
        names(&["rap", "rock"])
    );

    let jazz = store.find(ElemKind::Tag, "jazz").unwrap().unwrap();
    store.soft_delete(&jazz).unwrap();
    assert_eq!(
        store.list_matching(MatchScope::Trash, ElemKind::Tag, "*z*").unwrap(),
        names(&["jazz"])
    );
    assert!(store
        .list_matching(MatchScope::Database, ElemKind::Tag, "*z*")
        .unwrap()
        .is_empty());
}

#[test]
fn filesystem_scope_globs_on_disk() {
    let (dir, store) = open_store();
    let music = dir.path().join("music");
    std::fs::create_dir(&music).unwrap();
    std::fs::write(music.join("one.mp3"), b"").unwrap();
    std::fs::write(music.join("two.ogg"), b"").unwrap();

    let pattern = format!("{}/*.mp3", music.display());
    let found = store
        .list_matching(MatchScope::Filesystem, ElemKind::File, &pattern)
        .unwrap();
    assert_eq!(found.len(), 1);
    assert!(found.iter().all(|name| name.ends_with("one.mp3")));
}

#[test]
fn consistency_check_reports_one_sided_relation() {
    let (_dir, store) = open_store();
    let tag = store.init(ElemKind::Tag, "mp3", true).unwrap().into_elem().unwrap();
    let file = store.init(ElemKind::File, "/a", true).unwrap().into_elem().unwrap();
    store.relate(RelateAction::Add, &tag, &file).unwrap();
    std::fs::write(&file.path, "/a\n").unwrap();

    let warnings = store.check_consistency().unwrap();
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].kind, ElemKind::Tag);
    assert_eq!(warnings[0].counterpart, "/a");
}

#[test]
fn wildcards_follow_shell_rules_for_stars_and_brackets() {
    let (_dir, store) = open_store();
    for name in ["rock", "r[o", "rap"] {
        store.init(ElemKind::Tag, name, true).unwrap();
    }

    assert_eq!(
        store.list_matching(MatchScope::Database, ElemKind::Tag, "ro**").unwrap(),
        names(&["rock"])
    );
    assert_eq!(
        store.list_matching(MatchScope::Database, ElemKind::Tag, "r[o").unwrap(),
        names(&["r[o"])
    );
    assert_eq!(
        store.list_matching(MatchScope::Database, ElemKind::Tag, "r[ao]*").unwrap(),
        names(&["rap", "rock"])
    );

    let bracket = store.find(ElemKind::Tag, "r[o").unwrap().unwrap();
    store.soft_delete(&bracket).unwrap();
    assert_eq!(
        store.list_matching(MatchScope::Trash, ElemKind::Tag, "r[o**").unwrap(),
        names(&["r[o"])
    );
}

#[test]
fn duplicate_and_inactive_lines_read_as_one_active_set() {
    let (_dir, store) = open_store();
    let tag = store.init(ElemKind::Tag, "mp3", true).unwrap().into_elem().unwrap();
    std::fs::write(&tag.path, "mp3\n+/a\n+/a\n-/b\n").unwrap();

    assert_eq!(store.list_related(&tag).unwrap(), names(&["/a"]));
}

#[test]
fn relate_keeps_unmarked_lines_of_hand_edited_records() {
    let (_dir, store) = open_store();
    let tag = store.init(ElemKind::Tag, "mp3", true).unwrap().into_elem().unwrap();
    let file = store.init(ElemKind::File, "/a", true).unwrap().into_elem().unwrap();
    std::fs::write(&tag.path, "mp3\n\n#note\n+/x\n").unwrap();

    store.relate(RelateAction::Add, &tag, &file).unwrap();
    assert_eq!(
        std::fs::read_to_string(&tag.path).unwrap(),
        "mp3\n\n#note\n+/x\n+/a\n"
    );
    assert_eq!(store.list_related(&tag).unwrap(), names(&["/a", "/x"]));
}

#[test]
fn empty_active_line_is_reported_and_skipped_on_delete() {
    let (_dir, store) = open_store();
    let tag = store.init(ElemKind::Tag, "mp3", true).unwrap().into_elem().unwrap();
    let file = store.init(ElemKind::File, "/a", true).unwrap().into_elem().unwrap();
    store.relate(RelateAction::Add, &tag, &file).unwrap();
    std::fs::write(&tag.path, "mp3\n+\n+/a\n").unwrap();

    let warnings = store.check_consistency().unwrap();
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].name, "mp3");
    assert_eq!(warnings[0].counterpart, "");
    assert_eq!(warnings[0].asymmetry, Asymmetry::CounterpartMissing);

    store.soft_delete(&tag).unwrap();
    assert!(store.find(ElemKind::Tag, "mp3").unwrap().is_none());
    assert!(store.list_related(&file).unwrap().is_empty());
}
