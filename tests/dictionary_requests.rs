use awadiko::dictionary::{
    available_alphabets, dictionary_terms, english_language, submit_request, user_profile,
    RequestInput, TermsParams,
};
use awadiko::schema::{domains, request_domains, translation_requests, user_profiles};
use diesel::prelude::*;

mod common;
use common as h;

fn request_input(
    word: &str,
    meaning: &str,
    source: i32,
    target: i32,
    pos: i32,
    domains: &[&str],
) -> RequestInput {
    RequestInput {
        word: word.to_string(),
        meaning: meaning.to_string(),
        source_language_id: source,
        target_language_id: target,
        part_of_speech_id: pos,
        domains: domains.iter().map(|d| d.to_string()).collect(),
    }
}

#[test]
fn submit_creates_the_request_with_domain_joins() {
    let mut conn = h::test_conn();
    let eng = h::language_id(&mut conn, "eng");
    let yor = h::add_language(&mut conn, "yor", "Yoruba");
    let noun = h::pos_id(&mut conn, "noun");
    let user = h::add_user(&mut conn, "asker@example.com", "CONTRIBUTOR");

    let state = submit_request(
        &mut conn,
        user,
        &request_input("drone", "remote aircraft", eng, yor, noun, &["Tech", "Aviation"]),
    )
    .expect("submit");
    assert!(state.success);
    assert_eq!(
        state.message,
        "Request submitted successfully! It will be reviewed by an admin."
    );

    let (status, owner): (String, i32) = translation_requests::table
        .select((translation_requests::status, translation_requests::user_id))
        .first(&mut conn)
        .expect("request row");
    assert_eq!(status, "PENDING");
    assert_eq!(owner, user);

    let join_count: i64 = request_domains::table
        .count()
        .get_result(&mut conn)
        .expect("joins");
    assert_eq!(join_count, 2);
    let domain_count: i64 = domains::table.count().get_result(&mut conn).expect("domains");
    assert_eq!(domain_count, 2);
}

#[test]
fn submit_refuses_an_equivalent_open_request() {
    let mut conn = h::test_conn();
    let eng = h::language_id(&mut conn, "eng");
    let yor = h::add_language(&mut conn, "yor", "Yoruba");
    let noun = h::pos_id(&mut conn, "noun");
    let user = h::add_user(&mut conn, "asker@example.com", "CONTRIBUTOR");

    submit_request(
        &mut conn,
        user,
        &request_input("drone", "remote aircraft", eng, yor, noun, &[]),
    )
    .expect("first");

    let state = submit_request(
        &mut conn,
        user,
        &request_input("Drone", "Remote Aircraft", eng, yor, noun, &[]),
    )
    .expect("second");
    assert!(!state.success);
    let errors = state.errors.expect("errors");
    assert_eq!(
        errors["word"][0],
        "This word already has a pending translation request."
    );

    let total: i64 = translation_requests::table
        .count()
        .get_result(&mut conn)
        .expect("count");
    assert_eq!(total, 1);
}

#[test]
fn submit_refuses_words_already_in_the_dictionary() {
    let mut conn = h::test_conn();
    let eng = h::language_id(&mut conn, "eng");
    let yor = h::add_language(&mut conn, "yor", "Yoruba");
    let noun = h::pos_id(&mut conn, "noun");
    let user = h::add_user(&mut conn, "asker@example.com", "CONTRIBUTOR");

    let concept = h::add_concept(&mut conn, "remote aircraft");
    h::add_term(&mut conn, "drone", "remote aircraft", eng, noun, concept);

    let state = submit_request(
        &mut conn,
        user,
        &request_input("DRONE", "Remote aircraft", eng, yor, noun, &[]),
    )
    .expect("submit");
    assert!(!state.success);
    let errors = state.errors.expect("errors");
    assert_eq!(errors["word"][0], "This word already exists in the dictionary.");
}

#[test]
fn terms_resolve_translations_via_the_shared_concept() {
    let mut conn = h::test_conn();
    let eng = h::language_id(&mut conn, "eng");
    let yor = h::add_language(&mut conn, "yor", "Yoruba");
    let noun = h::pos_id(&mut conn, "noun");

    let water = h::add_concept(&mut conn, "clear liquid");
    h::add_term(&mut conn, "water", "clear liquid", eng, noun, water);
    h::add_term(&mut conn, "omi", "clear liquid", yor, noun, water);

    let rock = h::add_concept(&mut conn, "hard mineral");
    h::add_term(&mut conn, "rock", "hard mineral", eng, noun, rock);

    let params = TermsParams {
        language_id: eng,
        community_language_id: yor,
        skip: 0,
        take: 20,
        search: String::new(),
        alphabet: String::new(),
    };
    let (terms, has_more) = dictionary_terms(&mut conn, &params).expect("terms");
    assert!(!has_more);
    assert_eq!(terms.len(), 2);

    // Ordered by text: rock, water.
    assert_eq!(terms[0].text, "rock");
    assert_eq!(terms[0].translation, None);
    assert_eq!(terms[1].text, "water");
    assert_eq!(terms[1].translation.as_deref(), Some("omi"));
    assert_eq!(terms[1].part_of_speech, "noun");
}

#[test]
fn terms_paginate_and_filter_by_prefix() {
    let mut conn = h::test_conn();
    let eng = h::language_id(&mut conn, "eng");
    let noun = h::pos_id(&mut conn, "noun");

    for text in ["apple", "avocado", "banana"] {
        let concept = h::add_concept(&mut conn, text);
        h::add_term(&mut conn, text, text, eng, noun, concept);
    }

    let params = TermsParams {
        language_id: eng,
        community_language_id: eng,
        skip: 0,
        take: 2,
        search: String::new(),
        alphabet: String::new(),
    };
    let (terms, has_more) = dictionary_terms(&mut conn, &params).expect("page one");
    assert_eq!(terms.len(), 2);
    assert!(has_more);

    let params = TermsParams {
        language_id: eng,
        community_language_id: eng,
        skip: 2,
        take: 2,
        search: String::new(),
        alphabet: String::new(),
    };
    let (terms, has_more) = dictionary_terms(&mut conn, &params).expect("page two");
    assert_eq!(terms.len(), 1);
    assert!(!has_more);

    let params = TermsParams {
        language_id: eng,
        community_language_id: eng,
        skip: 0,
        take: 20,
        search: String::new(),
        alphabet: "A".to_string(),
    };
    let (terms, _) = dictionary_terms(&mut conn, &params).expect("prefix");
    assert_eq!(terms.len(), 2);
    assert!(terms.iter().all(|t| t.text.starts_with('a')));
}

#[test]
fn alphabets_are_distinct_uppercased_initials() {
    let mut conn = h::test_conn();
    let eng = h::language_id(&mut conn, "eng");
    let noun = h::pos_id(&mut conn, "noun");

    for text in ["apple", "Avocado", "banana"] {
        let concept = h::add_concept(&mut conn, text);
        h::add_term(&mut conn, text, text, eng, noun, concept);
    }

    let letters = available_alphabets(&mut conn, eng).expect("alphabets");
    assert_eq!(letters, vec!["A".to_string(), "B".to_string()]);
}

#[test]
fn english_language_is_seeded() {
    let mut conn = h::test_conn();

    let (id, name) = english_language(&mut conn).expect("query").expect("seeded");
    assert!(id > 0);
    assert_eq!(name, "English");
}

#[test]
fn profiles_carry_their_languages() {
    let mut conn = h::test_conn();
    let eng = h::language_id(&mut conn, "eng");
    let yor = h::add_language(&mut conn, "yor", "Yoruba");
    let user = h::add_user(&mut conn, "someone@example.com", "EXPLORER");

    assert!(user_profile(&mut conn, user).expect("absent").is_none());

    diesel::insert_into(user_profiles::table)
        .values((
            user_profiles::user_id.eq(user),
            user_profiles::ui_language_id.eq(eng),
            user_profiles::community_language_id.eq(yor),
        ))
        .execute(&mut conn)
        .expect("profile");

    let profile = user_profile(&mut conn, user).expect("query").expect("present");
    assert_eq!(profile.ui_language.expect("ui").code, "eng");
    assert_eq!(profile.community_language.expect("community").code, "yor");
    assert!(profile.target_languages.is_empty());
}
