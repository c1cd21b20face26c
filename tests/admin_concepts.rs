use awadiko::concepts::{create_concept, delete_concept, list_concepts, update_concept};
use awadiko::schema::concepts;
use diesel::prelude::*;

mod common;
use common as h;

#[test]
fn create_rejects_case_insensitive_duplicates() {
    let mut conn = h::test_conn();

    let outcome = create_concept(&mut conn, "body of water").expect("create");
    assert!(outcome.success);

    let outcome = create_concept(&mut conn, "Body Of Water").expect("create duplicate");
    assert!(!outcome.success);

    let body = serde_json::to_value(&outcome).expect("serialize");
    assert_eq!(
        body["error"]["gloss"][0],
        "A concept with this gloss already exists."
    );

    let total: i64 = concepts::table.count().get_result(&mut conn).expect("count");
    assert_eq!(total, 1);
}

#[test]
fn update_checks_duplicates_excluding_self() {
    let mut conn = h::test_conn();

    let water = h::add_concept(&mut conn, "water");
    let fire = h::add_concept(&mut conn, "fire");

    // Renaming onto another concept's gloss is refused.
    let outcome = update_concept(&mut conn, fire, "Water").expect("update");
    assert!(!outcome.success);

    // Re-saving a concept under its own gloss is fine.
    let outcome = update_concept(&mut conn, water, "water").expect("update self");
    assert!(outcome.success);

    let outcome = update_concept(&mut conn, fire, "flame").expect("rename");
    assert!(outcome.success);

    let gloss: String = concepts::table
        .find(fire)
        .select(concepts::gloss)
        .first(&mut conn)
        .expect("gloss");
    assert_eq!(gloss, "flame");
}

#[test]
fn delete_refused_while_terms_reference_the_concept() {
    let mut conn = h::test_conn();

    let eng = h::language_id(&mut conn, "eng");
    let noun = h::pos_id(&mut conn, "noun");
    let concept = h::add_concept(&mut conn, "large stream");
    h::add_term(&mut conn, "river", "large stream", eng, noun, concept);

    let outcome = delete_concept(&mut conn, concept).expect("delete");
    assert!(!outcome.success);

    let body = serde_json::to_value(&outcome).expect("serialize");
    let message = body["error"].as_str().expect("error string");
    assert!(message.contains("1 term(s) attached"), "got: {}", message);

    // Still there.
    let total: i64 = concepts::table.count().get_result(&mut conn).expect("count");
    assert_eq!(total, 1);
}

#[test]
fn delete_succeeds_for_unreferenced_concepts() {
    let mut conn = h::test_conn();

    let concept = h::add_concept(&mut conn, "orphan");
    let outcome = delete_concept(&mut conn, concept).expect("delete");
    assert!(outcome.success);

    let total: i64 = concepts::table.count().get_result(&mut conn).expect("count");
    assert_eq!(total, 0);
}

#[test]
fn delete_reports_missing_concepts() {
    let mut conn = h::test_conn();

    let outcome = delete_concept(&mut conn, 9999).expect("delete");
    assert!(!outcome.success);

    let body = serde_json::to_value(&outcome).expect("serialize");
    assert_eq!(body["error"], "Concept not found");
}

#[test]
fn list_filters_case_insensitively_and_paginates() {
    let mut conn = h::test_conn();

    h::add_concept(&mut conn, "Water body");
    h::add_concept(&mut conn, "freshwater fish");
    h::add_concept(&mut conn, "mountain");

    let (page, total) = list_concepts(&mut conn, 0, 50, "WATER").expect("list");
    assert_eq!(total, 2);
    assert_eq!(page.len(), 2);

    let (page, total) = list_concepts(&mut conn, 0, 1, "water").expect("list page");
    assert_eq!(total, 2);
    assert_eq!(page.len(), 1);

    let (page, total) = list_concepts(&mut conn, 0, 50, "").expect("list all");
    assert_eq!(total, 3);
    assert_eq!(page.len(), 3);
}

#[test]
fn list_carries_term_counts() {
    let mut conn = h::test_conn();

    let eng = h::language_id(&mut conn, "eng");
    let noun = h::pos_id(&mut conn, "noun");
    let concept = h::add_concept(&mut conn, "large stream");
    h::add_term(&mut conn, "river", "large stream", eng, noun, concept);
    h::add_term(&mut conn, "stream", "large stream", eng, noun, concept);
    h::add_concept(&mut conn, "mountain");

    let (page, _) = list_concepts(&mut conn, 0, 50, "").expect("list");
    let stream = page.iter().find(|c| c.gloss == "large stream").expect("row");
    assert_eq!(stream.term_count, 2);
    let mountain = page.iter().find(|c| c.gloss == "mountain").expect("row");
    assert_eq!(mountain.term_count, 0);
}
