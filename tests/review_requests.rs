use awadiko::dictionary::{submit_request, RequestInput};
use awadiko::review::{
    all_requests, delete_request, pending_count, pending_requests, review_request,
    update_request, RequestStatus,
};
use awadiko::schema::{audit_log, concepts, domains_terms, terms, translation_requests};
use diesel::prelude::*;

mod common;
use common as h;

struct Fixture {
    request_id: i32,
    reviewer: i32,
    source_language: i32,
}

fn submit_fixture(conn: &mut diesel::SqliteConnection, domains: &[&str]) -> Fixture {
    let eng = h::language_id(conn, "eng");
    let yor = h::add_language(conn, "yor", "Yoruba");
    let noun = h::pos_id(conn, "noun");
    let submitter = h::add_user(conn, "asker@example.com", "CONTRIBUTOR");
    let reviewer = h::add_user(conn, "juror@example.com", "JUROR");

    let state = submit_request(
        conn,
        submitter,
        &RequestInput {
            word: "drone".to_string(),
            meaning: "remote aircraft".to_string(),
            source_language_id: eng,
            target_language_id: yor,
            part_of_speech_id: noun,
            domains: domains.iter().map(|d| d.to_string()).collect(),
        },
    )
    .expect("submit");
    assert!(state.success);

    let request_id: i32 = translation_requests::table
        .select(translation_requests::request_id)
        .first(conn)
        .expect("request id");

    Fixture { request_id, reviewer, source_language: eng }
}

#[test]
fn approval_promotes_the_request_into_a_concept_and_term() {
    let mut conn = h::test_conn();
    let fx = submit_fixture(&mut conn, &["Tech"]);

    let outcome = review_request(
        &mut conn,
        fx.reviewer,
        fx.request_id,
        RequestStatus::Approved,
        None,
    )
    .expect("review");
    assert!(outcome.success);

    // Exactly one concept, gloss taken from the request meaning.
    let glosses: Vec<String> = concepts::table
        .select(concepts::gloss)
        .load(&mut conn)
        .expect("concepts");
    assert_eq!(glosses, vec!["remote aircraft".to_string()]);

    // Exactly one term, in the request's source language, carrying its domains.
    let rows: Vec<(String, String, i32)> = terms::table
        .select((terms::text, terms::meaning, terms::language_id))
        .load(&mut conn)
        .expect("terms");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].0, "drone");
    assert_eq!(rows[0].1, "remote aircraft");
    assert_eq!(rows[0].2, fx.source_language);

    let join_count: i64 = domains_terms::table
        .count()
        .get_result(&mut conn)
        .expect("joins");
    assert_eq!(join_count, 1);

    let (status, reviewed_by): (String, Option<i32>) = translation_requests::table
        .find(fx.request_id)
        .select((
            translation_requests::status,
            translation_requests::reviewed_by_id,
        ))
        .first(&mut conn)
        .expect("request");
    assert_eq!(status, "APPROVED");
    assert_eq!(reviewed_by, Some(fx.reviewer));

    let action: String = audit_log::table
        .select(audit_log::action)
        .first(&mut conn)
        .expect("audit entry");
    assert_eq!(action, "review:request:approved");
}

#[test]
fn reviewing_a_missing_request_fails_without_side_effects() {
    let mut conn = h::test_conn();
    let reviewer = h::add_user(&mut conn, "juror@example.com", "JUROR");

    let outcome = review_request(&mut conn, reviewer, 9999, RequestStatus::Approved, None)
        .expect("review");
    assert!(!outcome.success);

    let concept_count: i64 = concepts::table.count().get_result(&mut conn).expect("concepts");
    assert_eq!(concept_count, 0);
    let term_count: i64 = terms::table.count().get_result(&mut conn).expect("terms");
    assert_eq!(term_count, 0);
}

#[test]
fn rejection_records_the_reason_and_reviewer() {
    let mut conn = h::test_conn();
    let fx = submit_fixture(&mut conn, &[]);

    let outcome = review_request(
        &mut conn,
        fx.reviewer,
        fx.request_id,
        RequestStatus::Rejected,
        Some("Not a real word"),
    )
    .expect("review");
    assert!(outcome.success);

    let (status, reason, reviewed_by): (String, Option<String>, Option<i32>) =
        translation_requests::table
            .find(fx.request_id)
            .select((
                translation_requests::status,
                translation_requests::rejection_reason,
                translation_requests::reviewed_by_id,
            ))
            .first(&mut conn)
            .expect("request");
    assert_eq!(status, "REJECTED");
    assert_eq!(reason.as_deref(), Some("Not a real word"));
    assert_eq!(reviewed_by, Some(fx.reviewer));

    // No promotion happened.
    let term_count: i64 = terms::table.count().get_result(&mut conn).expect("terms");
    assert_eq!(term_count, 0);

    let action: String = audit_log::table
        .select(audit_log::action)
        .first(&mut conn)
        .expect("audit entry");
    assert_eq!(action, "review:request:rejected");
}

#[test]
fn both_transitions_are_terminal() {
    let mut conn = h::test_conn();
    let fx = submit_fixture(&mut conn, &[]);

    review_request(
        &mut conn,
        fx.reviewer,
        fx.request_id,
        RequestStatus::Approved,
        None,
    )
    .expect("first review");

    let outcome = review_request(
        &mut conn,
        fx.reviewer,
        fx.request_id,
        RequestStatus::Rejected,
        Some("changed my mind"),
    )
    .expect("second review");
    assert!(!outcome.success);

    let status: String = translation_requests::table
        .find(fx.request_id)
        .select(translation_requests::status)
        .first(&mut conn)
        .expect("status");
    assert_eq!(status, "APPROVED");

    // A re-review never creates a second concept or term.
    let concept_count: i64 = concepts::table.count().get_result(&mut conn).expect("concepts");
    assert_eq!(concept_count, 1);
}

#[test]
fn pending_listings_shrink_as_requests_are_reviewed() {
    let mut conn = h::test_conn();
    let fx = submit_fixture(&mut conn, &[]);

    assert_eq!(pending_count(&mut conn).expect("count"), 1);
    let pending = pending_requests(&mut conn, 10, 0).expect("pending");
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].word, "drone");
    assert_eq!(pending[0].user.username, "asker");
    assert_eq!(pending[0].source_language.name, "English");

    review_request(
        &mut conn,
        fx.reviewer,
        fx.request_id,
        RequestStatus::Rejected,
        Some("duplicate"),
    )
    .expect("review");

    assert_eq!(pending_count(&mut conn).expect("count"), 0);
    assert!(pending_requests(&mut conn, 10, 0).expect("pending").is_empty());

    // The rejected request still shows up in the full history with its reviewer.
    let all = all_requests(&mut conn, 10, 0, "").expect("all");
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].status, "REJECTED");
    assert_eq!(all[0].reviewed_by.as_ref().expect("reviewer").username, "juror");
}

#[test]
fn history_search_covers_word_submitter_and_reason() {
    let mut conn = h::test_conn();
    let fx = submit_fixture(&mut conn, &[]);

    review_request(
        &mut conn,
        fx.reviewer,
        fx.request_id,
        RequestStatus::Rejected,
        Some("spelling mistake"),
    )
    .expect("review");

    assert_eq!(all_requests(&mut conn, 10, 0, "drone").expect("by word").len(), 1);
    assert_eq!(all_requests(&mut conn, 10, 0, "ASKER").expect("by submitter").len(), 1);
    assert_eq!(all_requests(&mut conn, 10, 0, "spelling").expect("by reason").len(), 1);
    assert!(all_requests(&mut conn, 10, 0, "zeppelin").expect("no match").is_empty());
}

#[test]
fn requests_can_be_edited_and_deleted_with_an_audit_trail() {
    let mut conn = h::test_conn();
    let fx = submit_fixture(&mut conn, &["Tech"]);
    let verb = h::pos_id(&mut conn, "verb");

    let outcome = update_request(
        &mut conn,
        fx.reviewer,
        fx.request_id,
        "to drone",
        Some("fly a remote aircraft"),
        verb,
    )
    .expect("edit");
    assert!(outcome.success);

    let (word, pos): (String, i32) = translation_requests::table
        .find(fx.request_id)
        .select((
            translation_requests::word,
            translation_requests::part_of_speech_id,
        ))
        .first(&mut conn)
        .expect("request");
    assert_eq!(word, "to drone");
    assert_eq!(pos, verb);

    let outcome = delete_request(&mut conn, fx.reviewer, fx.request_id).expect("delete");
    assert!(outcome.success);

    let remaining: i64 = translation_requests::table
        .count()
        .get_result(&mut conn)
        .expect("count");
    assert_eq!(remaining, 0);

    let actions: Vec<String> = audit_log::table
        .order(audit_log::audit_id.asc())
        .select(audit_log::action)
        .load(&mut conn)
        .expect("audit entries");
    assert_eq!(
        actions,
        vec![
            "review:request:edited".to_string(),
            "review:request:deleted".to_string()
        ]
    );
}
