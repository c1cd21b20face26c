use chrono::NaiveDateTime;
use diesel::{Insertable, Queryable, Selectable};
use serde::Serialize;

use crate::schema::{
    concepts, domains, languages, neo_ratings, neos, parts_of_speech, terms,
    translation_requests, user_profiles, users,
};

#[derive(Queryable, Selectable, Serialize)]
#[diesel(table_name = users)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct User {
    pub user_id: i32,
    pub email: String,
    pub username: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub role: String,
    pub created_at: NaiveDateTime,
}

#[derive(Insertable)]
#[diesel(table_name = users)]
pub struct NewUser<'a> {
    pub email: &'a str,
    pub username: &'a str,
    pub password: &'a str,
    pub role: &'a str,
}

#[derive(Queryable, Selectable, Serialize)]
#[diesel(table_name = languages)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Language {
    pub language_id: i32,
    pub code: String,
    pub name: String,
}

#[derive(Queryable, Selectable, Serialize)]
#[diesel(table_name = parts_of_speech)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct PartOfSpeech {
    pub part_of_speech_id: i32,
    pub name: String,
}

#[derive(Queryable, Selectable, Serialize)]
#[diesel(table_name = concepts)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Concept {
    pub concept_id: i32,
    pub gloss: String,
    pub created_at: NaiveDateTime,
}

#[derive(Queryable, Selectable, Serialize)]
#[diesel(table_name = domains)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Domain {
    pub domain_id: i32,
    pub name: String,
}

#[derive(Queryable, Selectable, Serialize)]
#[diesel(table_name = terms)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Term {
    pub term_id: i32,
    pub text: String,
    pub meaning: String,
    pub phonics: Option<String>,
    pub language_id: i32,
    pub part_of_speech_id: i32,
    pub concept_id: i32,
    pub vote_score: i32,
    pub created_at: NaiveDateTime,
}

#[derive(Insertable)]
#[diesel(table_name = terms)]
pub struct NewTerm<'a> {
    pub text: &'a str,
    pub meaning: &'a str,
    pub phonics: Option<&'a str>,
    pub language_id: i32,
    pub part_of_speech_id: i32,
    pub concept_id: i32,
}

#[derive(Queryable, Selectable, Serialize)]
#[diesel(table_name = translation_requests)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct TranslationRequest {
    pub request_id: i32,
    pub word: String,
    pub meaning: Option<String>,
    pub source_language_id: i32,
    pub target_language_id: i32,
    pub part_of_speech_id: i32,
    pub user_id: i32,
    pub status: String,
    pub rejection_reason: Option<String>,
    pub reviewed_by_id: Option<i32>,
    pub created_at: NaiveDateTime,
}

#[derive(Insertable)]
#[diesel(table_name = translation_requests)]
pub struct NewTranslationRequest<'a> {
    pub word: &'a str,
    pub meaning: Option<&'a str>,
    pub source_language_id: i32,
    pub target_language_id: i32,
    pub part_of_speech_id: i32,
    pub user_id: i32,
}

#[derive(Queryable, Selectable, Serialize)]
#[diesel(table_name = neos)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Neo {
    pub neo_id: i32,
    pub term_id: i32,
    pub user_id: i32,
    pub text: String,
    pub neo_type: String,
    pub audio_url: Option<String>,
    pub rating_count: i32,
    pub rating_score: f64,
    pub reject_count: i32,
    pub created_at: NaiveDateTime,
}

#[derive(Insertable)]
#[diesel(table_name = neos)]
pub struct NewNeo<'a> {
    pub term_id: i32,
    pub user_id: i32,
    pub text: &'a str,
    pub neo_type: &'a str,
    pub audio_url: Option<&'a str>,
}

#[derive(Queryable, Selectable, Serialize)]
#[diesel(table_name = neo_ratings)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct NeoRating {
    pub neo_id: i32,
    pub user_id: i32,
    pub value: i32,
    pub rejection_reason: Option<String>,
    pub created_at: NaiveDateTime,
}

#[derive(Queryable, Selectable, Serialize)]
#[diesel(table_name = user_profiles)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct UserProfile {
    pub profile_id: i32,
    pub user_id: i32,
    pub ui_language_id: Option<i32>,
    pub community_language_id: Option<i32>,
}
