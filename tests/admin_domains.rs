use awadiko::domains::{create_domain, delete_domain, list_domains, resolve_domain, update_domain};
use awadiko::schema::{domains, domains_terms};
use diesel::prelude::*;

mod common;
use common as h;

#[test]
fn create_rejects_case_insensitive_duplicates() {
    let mut conn = h::test_conn();

    assert!(create_domain(&mut conn, "Science").expect("create").success);
    let outcome = create_domain(&mut conn, "science").expect("duplicate");
    assert!(!outcome.success);

    let body = serde_json::to_value(&outcome).expect("serialize");
    assert_eq!(body["error"]["name"][0], "Domain with this name already exists.");
}

#[test]
fn resolve_domain_reuses_existing_names_whatever_the_case() {
    let mut conn = h::test_conn();

    let tech = resolve_domain(&mut conn, "Tech").expect("resolve");
    let tech_again = resolve_domain(&mut conn, "tech").expect("resolve again");
    assert_eq!(tech, tech_again);

    let total: i64 = domains::table.count().get_result(&mut conn).expect("count");
    assert_eq!(total, 1);

    let science = resolve_domain(&mut conn, "Science").expect("new domain");
    assert_ne!(tech, science);
}

#[test]
fn update_checks_duplicates_excluding_self() {
    let mut conn = h::test_conn();

    let tech = resolve_domain(&mut conn, "Tech").expect("tech");
    let science = resolve_domain(&mut conn, "Science").expect("science");

    let outcome = update_domain(&mut conn, science, "TECH").expect("update");
    assert!(!outcome.success);

    let outcome = update_domain(&mut conn, science, "Natural Science").expect("rename");
    assert!(outcome.success);

    let outcome = update_domain(&mut conn, tech, "Tech").expect("self rename");
    assert!(outcome.success);
}

#[test]
fn delete_refused_while_in_use() {
    let mut conn = h::test_conn();

    let eng = h::language_id(&mut conn, "eng");
    let noun = h::pos_id(&mut conn, "noun");
    let concept = h::add_concept(&mut conn, "machine");
    let term = h::add_term(&mut conn, "computer", "machine", eng, noun, concept);

    let tech = resolve_domain(&mut conn, "Tech").expect("tech");
    diesel::insert_into(domains_terms::table)
        .values((
            domains_terms::domain_id.eq(tech),
            domains_terms::term_id.eq(term),
        ))
        .execute(&mut conn)
        .expect("join");

    let outcome = delete_domain(&mut conn, tech).expect("delete");
    assert!(!outcome.success);

    let body = serde_json::to_value(&outcome).expect("serialize");
    let message = body["error"].as_str().expect("error string");
    assert!(
        message.contains("used in 1 term(s) and 0 request(s)"),
        "got: {}",
        message
    );
}

#[test]
fn delete_succeeds_for_unused_domains() {
    let mut conn = h::test_conn();

    let tech = resolve_domain(&mut conn, "Tech").expect("tech");
    let outcome = delete_domain(&mut conn, tech).expect("delete");
    assert!(outcome.success);

    let total: i64 = domains::table.count().get_result(&mut conn).expect("count");
    assert_eq!(total, 0);
}

#[test]
fn list_is_ordered_by_name_with_usage_counts() {
    let mut conn = h::test_conn();

    resolve_domain(&mut conn, "Science").expect("science");
    resolve_domain(&mut conn, "Agriculture").expect("agriculture");

    let (page, total) = list_domains(&mut conn, 0, 50, "").expect("list");
    assert_eq!(total, 2);
    assert_eq!(page[0].name, "Agriculture");
    assert_eq!(page[1].name, "Science");
    assert_eq!(page[0].term_count, 0);
    assert_eq!(page[0].request_count, 0);
}
