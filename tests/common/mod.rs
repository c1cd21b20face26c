use awadiko::db::MIGRATIONS;
use awadiko::schema::{concepts, languages, neos, parts_of_speech, terms, users};
use diesel::prelude::*;
use diesel::sql_types::Integer;
use diesel_migrations::MigrationHarness;

/// Fresh in-memory database with the full schema and seed data applied.
pub fn test_conn() -> SqliteConnection {
    let mut conn = SqliteConnection::establish(":memory:").expect("in-memory database");
    conn.run_pending_migrations(MIGRATIONS).expect("migrations");
    conn
}

pub fn last_id(conn: &mut SqliteConnection) -> i32 {
    diesel::select(diesel::dsl::sql::<Integer>("last_insert_rowid()"))
        .get_result(conn)
        .expect("last_insert_rowid")
}

pub fn language_id(conn: &mut SqliteConnection, code: &str) -> i32 {
    languages::table
        .filter(languages::code.eq(code))
        .select(languages::language_id)
        .first(conn)
        .expect("language")
}

pub fn add_language(conn: &mut SqliteConnection, code: &str, name: &str) -> i32 {
    diesel::insert_into(languages::table)
        .values((languages::code.eq(code), languages::name.eq(name)))
        .execute(conn)
        .expect("insert language");
    last_id(conn)
}

pub fn pos_id(conn: &mut SqliteConnection, name: &str) -> i32 {
    parts_of_speech::table
        .filter(parts_of_speech::name.eq(name))
        .select(parts_of_speech::part_of_speech_id)
        .first(conn)
        .expect("part of speech")
}

pub fn add_user(conn: &mut SqliteConnection, email: &str, role: &str) -> i32 {
    diesel::insert_into(users::table)
        .values((
            users::email.eq(email),
            users::username.eq(email.split('@').next().unwrap_or(email)),
            users::password.eq("not-a-real-hash"),
            users::role.eq(role),
        ))
        .execute(conn)
        .expect("insert user");
    last_id(conn)
}

pub fn add_concept(conn: &mut SqliteConnection, gloss: &str) -> i32 {
    diesel::insert_into(concepts::table)
        .values(concepts::gloss.eq(gloss))
        .execute(conn)
        .expect("insert concept");
    last_id(conn)
}

pub fn add_term(
    conn: &mut SqliteConnection,
    text: &str,
    meaning: &str,
    language_id: i32,
    part_of_speech_id: i32,
    concept_id: i32,
) -> i32 {
    diesel::insert_into(terms::table)
        .values((
            terms::text.eq(text),
            terms::meaning.eq(meaning),
            terms::language_id.eq(language_id),
            terms::part_of_speech_id.eq(part_of_speech_id),
            terms::concept_id.eq(concept_id),
        ))
        .execute(conn)
        .expect("insert term");
    last_id(conn)
}

pub fn add_neo(
    conn: &mut SqliteConnection,
    term_id: i32,
    user_id: i32,
    text: &str,
    neo_type: &str,
) -> i32 {
    diesel::insert_into(neos::table)
        .values((
            neos::term_id.eq(term_id),
            neos::user_id.eq(user_id),
            neos::text.eq(text),
            neos::neo_type.eq(neo_type),
        ))
        .execute(conn)
        .expect("insert neo");
    last_id(conn)
}
