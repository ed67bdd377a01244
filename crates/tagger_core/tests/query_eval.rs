use tagger_core::query::{compile, compile_to_postfix, evaluate, evaluate_text, PostfixToken};
use tagger_core::store::resolver::NameResolver;
use tagger_core::{
    ElemKind, ParseError, PathCanonicalizer, QueryError, RelateAction, RelationStore, SetList,
    StoreLayout,
};

struct IdentityCanonicalizer;

impl PathCanonicalizer for IdentityCanonicalizer {
    fn canonicalize(&self, raw: &str) -> std::io::Result<String> {
        Ok(raw.to_string())
    }
}

/// Tags `mp3`, `music`; file `a` has `mp3`; file `b` has both; file `c` none.
fn music_store() -> (tempfile::TempDir, RelationStore) {
    let dir = tempfile::tempdir().unwrap();
    let layout = StoreLayout::new(dir.path());
    layout.ensure().unwrap();
    let store = RelationStore::with_parts(NameResolver::new(layout), Box::new(IdentityCanonicalizer));

    let mp3 = store.init(ElemKind::Tag, "mp3", true).unwrap().into_elem().unwrap();
    let music = store.init(ElemKind::Tag, "music", true).unwrap().into_elem().unwrap();
    let a = store.init(ElemKind::File, "a", true).unwrap().into_elem().unwrap();
    let b = store.init(ElemKind::File, "b", true).unwrap().into_elem().unwrap();
    store.init(ElemKind::File, "c", true).unwrap();

    store.relate(RelateAction::Add, &a, &mp3).unwrap();
    store.relate(RelateAction::Add, &b, &mp3).unwrap();
    store.relate(RelateAction::Add, &b, &music).unwrap();
    (dir, store)
}

fn run(store: &RelationStore, text: &str) -> SetList {
    evaluate_text(store, text).unwrap()
}

fn names(items: &[&str]) -> SetList {
    items.iter().copied().collect()
}

#[test]
fn conjunction_keeps_files_with_both_tags() {
    let (_dir, store) = music_store();
    assert_eq!(run(&store, "mp3 & music"), names(&["b"]));
}

#[test]
fn negation_complements_against_all_files() {
    let (_dir, store) = music_store();
    assert_eq!(run(&store, "mp3 & !music"), names(&["a"]));
    assert_eq!(run(&store, "!music"), names(&["a", "c"]));
    assert_eq!(run(&store, "!!music"), names(&["b"]));
}

#[test]
fn disjunction_unions_related_files() {
    let (_dir, store) = music_store();
    assert_eq!(run(&store, "mp3 | music"), names(&["a", "b"]));
    assert_eq!(run(&store, "music | !mp3"), names(&["b", "c"]));
}

#[test]
fn parentheses_change_the_result() {
    let (_dir, store) = music_store();
    assert_eq!(run(&store, "!(mp3 & music)"), names(&["a", "c"]));
    assert_eq!(run(&store, "!mp3 & music"), SetList::new());
}

#[test]
fn tags_with_spaces_and_reserved_characters_resolve() {
    let (_dir, store) = music_store();
    let tag = store
        .init(ElemKind::Tag, "rock&roll", true)
        .unwrap()
        .into_elem()
        .unwrap();
    let spaced = store
        .init(ElemKind::Tag, "live set", true)
        .unwrap()
        .into_elem()
        .unwrap();
    let c = store.find(ElemKind::File, "c").unwrap().unwrap();
    store.relate(RelateAction::Add, &c, &tag).unwrap();
    store.relate(RelateAction::Add, &c, &spaced).unwrap();

    assert_eq!(run(&store, "{rock&roll} | music"), names(&["b", "c"]));
    assert_eq!(run(&store, "live set & !mp3"), names(&["c"]));
}

#[test]
fn operands_are_tags_and_negation_stays_within_files() {
    let (_dir, store) = music_store();
    let err = evaluate_text(&store, "a | b").unwrap_err();
    assert!(matches!(
        err,
        QueryError::UnknownEntity { kind: ElemKind::Tag, ref name } if name == "a"
    ));

    let result = run(&store, "!mp3");
    assert_eq!(result, names(&["c"]));
    assert!(result.iter().all(|name| store.find(ElemKind::Tag, name).unwrap().is_none()));
}

#[test]
fn missing_tag_is_a_usage_error() {
    let (_dir, store) = music_store();
    let err = evaluate_text(&store, "mp3 & video").unwrap_err();
    assert!(matches!(err, QueryError::UnknownEntity { .. }));
    assert!(err.to_string().contains("video"));
}

#[test]
fn malformed_query_is_distinct_from_empty_result() {
    let (_dir, store) = music_store();
    let err = evaluate_text(&store, "mp3 & (music").unwrap_err();
    assert!(matches!(err, QueryError::Parse(ParseError::UnclosedOpen)));

    let empty = evaluate_text(&store, "mp3 & !mp3").unwrap();
    assert!(empty.is_empty());
}

#[test]
fn grouped_operands_are_emitted_before_outer_operator() {
    let postfix = compile_to_postfix("a & (b | c)").unwrap();
    assert_eq!(
        postfix,
        vec![
            PostfixToken::Operand,
            PostfixToken::Operand,
            PostfixToken::Operand,
            PostfixToken::Or,
            PostfixToken::And,
        ]
    );
    assert!(compile_to_postfix("a & (b").is_err());
}

#[test]
fn compiled_query_can_be_reused() {
    let (_dir, store) = music_store();
    let query = compile("mp3 & !music").unwrap();
    assert_eq!(evaluate(&store, &query).unwrap(), names(&["a"]));
    assert_eq!(evaluate(&store, &query).unwrap(), names(&["a"]));
}
