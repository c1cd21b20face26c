use std::collections::{BTreeSet, HashMap};

use axum::{
    extract::{Form, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use diesel::prelude::*;
use diesel::result::Error as DieselError;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tower_sessions::Session;
use validator::Validate;

use crate::{
    auth::{self, AuthError},
    db::{lower, lower_nullable, DbPool},
    domains::resolve_domain,
    model::Language,
    schema::{
        domains, domains_terms, languages, parts_of_speech, profile_target_languages,
        request_domains, terms, translation_requests, user_profiles,
    },
    utils::{flatten_validation_errors, parse_domain_list, FieldErrors},
};

#[derive(Debug, Serialize)]
pub struct SubmitState {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<FieldErrors>,
}

impl SubmitState {
    fn ok(message: &str) -> Self {
        SubmitState { success: true, message: message.to_string(), errors: None }
    }

    fn rejected(message: &str, field: &str, error: &str) -> Self {
        let mut errors = FieldErrors::new();
        errors.insert(field.to_string(), vec![error.to_string()]);
        SubmitState {
            success: false,
            message: message.to_string(),
            errors: Some(errors),
        }
    }

    fn failed(message: &str) -> Self {
        SubmitState { success: false, message: message.to_string(), errors: None }
    }
}

#[derive(Debug, Deserialize)]
pub struct RequestForm {
    pub word: Option<String>,
    pub meaning: Option<String>,
    pub source_language_id: Option<i32>,
    pub target_language_id: Option<i32>,
    pub part_of_speech_id: Option<i32>,
    pub domains: Option<String>,
}

#[derive(Debug, Validate)]
pub struct RequestInput {
    #[validate(length(min = 1, max = 100, message = "Word is required"))]
    pub word: String,
    #[validate(length(min = 1, message = "Meaning is required"))]
    pub meaning: String,
    #[validate(range(min = 1, message = "Source language is required"))]
    pub source_language_id: i32,
    #[validate(range(min = 1, message = "Target language is required"))]
    pub target_language_id: i32,
    #[validate(range(min = 1, message = "Part of Speech is required"))]
    pub part_of_speech_id: i32,
    pub domains: Vec<String>,
}

impl RequestInput {
    pub fn from_form(form: RequestForm) -> RequestInput {
        RequestInput {
            word: form.word.unwrap_or_default(),
            meaning: form.meaning.unwrap_or_default(),
            source_language_id: form.source_language_id.unwrap_or(0),
            target_language_id: form.target_language_id.unwrap_or(0),
            part_of_speech_id: form.part_of_speech_id.unwrap_or(0),
            domains: parse_domain_list(form.domains.as_deref()),
        }
    }
}

pub fn submit_request(
    conn: &mut SqliteConnection,
    user_id: i32,
    input: &RequestInput,
) -> QueryResult<SubmitState> {
    // An equivalent request, whatever its status, blocks resubmission.
    let existing_request: Option<i32> = translation_requests::table
        .filter(lower(translation_requests::word).eq(input.word.to_lowercase()))
        .filter(
            lower_nullable(translation_requests::meaning).eq(Some(input.meaning.to_lowercase())),
        )
        .filter(translation_requests::source_language_id.eq(input.source_language_id))
        .filter(translation_requests::target_language_id.eq(input.target_language_id))
        .filter(translation_requests::part_of_speech_id.eq(input.part_of_speech_id))
        .select(translation_requests::request_id)
        .first(conn)
        .optional()?;

    if existing_request.is_some() {
        return Ok(SubmitState::rejected(
            "This word with the same meaning has already been requested. Please be patient.",
            "word",
            "This word already has a pending translation request.",
        ));
    }

    let existing_term: Option<i32> = terms::table
        .filter(lower(terms::text).eq(input.word.to_lowercase()))
        .filter(lower(terms::meaning).eq(input.meaning.to_lowercase()))
        .filter(terms::language_id.eq(input.source_language_id))
        .select(terms::term_id)
        .first(conn)
        .optional()?;

    if existing_term.is_some() {
        return Ok(SubmitState::rejected(
            "This word with the same meaning already exists in the dictionary.",
            "word",
            "This word already exists in the dictionary.",
        ));
    }

    conn.transaction::<_, DieselError, _>(|conn| {
        let mut domain_ids = Vec::new();
        for name in &input.domains {
            domain_ids.push(resolve_domain(conn, name)?);
        }

        diesel::insert_into(translation_requests::table)
            .values((
                translation_requests::word.eq(&input.word),
                translation_requests::meaning.eq(&input.meaning),
                translation_requests::source_language_id.eq(input.source_language_id),
                translation_requests::target_language_id.eq(input.target_language_id),
                translation_requests::part_of_speech_id.eq(input.part_of_speech_id),
                translation_requests::user_id.eq(user_id),
            ))
            .execute(conn)?;
        let request_id: i32 = diesel::select(diesel::dsl::sql::<diesel::sql_types::Integer>(
            "last_insert_rowid()",
        ))
        .get_result(conn)?;

        for domain_id in domain_ids {
            diesel::insert_into(request_domains::table)
                .values((
                    request_domains::request_id.eq(request_id),
                    request_domains::domain_id.eq(domain_id),
                ))
                .execute(conn)?;
        }

        Ok(())
    })?;

    Ok(SubmitState::ok(
        "Request submitted successfully! It will be reviewed by an admin.",
    ))
}

#[derive(Serialize)]
pub struct DictionaryTerm {
    pub id: i32,
    pub text: String,
    pub meaning: String,
    pub phonics: Option<String>,
    pub part_of_speech: String,
    pub domains: Vec<String>,
    /// Sibling term text in the community language, resolved via the concept.
    pub translation: Option<String>,
}

#[derive(Deserialize)]
pub struct TermsParams {
    pub language_id: i32,
    pub community_language_id: i32,
    #[serde(default)]
    pub skip: i64,
    #[serde(default = "default_take")]
    pub take: i64,
    #[serde(default)]
    pub search: String,
    #[serde(default)]
    pub alphabet: String,
}

fn default_take() -> i64 {
    20
}

pub fn dictionary_terms(
    conn: &mut SqliteConnection,
    params: &TermsParams,
) -> QueryResult<(Vec<DictionaryTerm>, bool)> {
    let mut query = terms::table
        .select((
            terms::term_id,
            terms::text,
            terms::meaning,
            terms::phonics,
            terms::part_of_speech_id,
            terms::concept_id,
        ))
        .order(terms::text.asc())
        .filter(terms::language_id.eq(params.language_id))
        .into_boxed();
    let mut count_query = terms::table
        .count()
        .filter(terms::language_id.eq(params.language_id))
        .into_boxed();

    if !params.search.is_empty() {
        let pattern = format!("%{}%", params.search.to_lowercase());
        query = query.filter(
            lower(terms::text)
                .like(pattern.clone())
                .or(lower(terms::meaning).like(pattern.clone())),
        );
        count_query = count_query.filter(
            lower(terms::text)
                .like(pattern.clone())
                .or(lower(terms::meaning).like(pattern)),
        );
    }

    if !params.alphabet.is_empty() {
        let prefix = format!("{}%", params.alphabet.to_lowercase());
        query = query.filter(lower(terms::text).like(prefix.clone()));
        count_query = count_query.filter(lower(terms::text).like(prefix));
    }

    let rows: Vec<(i32, String, String, Option<String>, i32, i32)> = query
        .offset(params.skip)
        .limit(params.take)
        .load(conn)?;

    let total: i64 = count_query.get_result(conn)?;

    let term_ids: Vec<i32> = rows.iter().map(|r| r.0).collect();
    let pos_ids: Vec<i32> = rows.iter().map(|r| r.4).collect();
    let concept_ids: Vec<i32> = rows.iter().map(|r| r.5).collect();

    let pos_names: HashMap<i32, String> = parts_of_speech::table
        .filter(parts_of_speech::part_of_speech_id.eq_any(&pos_ids))
        .select((parts_of_speech::part_of_speech_id, parts_of_speech::name))
        .load::<(i32, String)>(conn)?
        .into_iter()
        .collect();

    let mut term_domains: HashMap<i32, Vec<String>> = HashMap::new();
    let joins: Vec<(i32, String)> = domains_terms::table
        .inner_join(domains::table)
        .filter(domains_terms::term_id.eq_any(&term_ids))
        .select((domains_terms::term_id, domains::name))
        .load(conn)?;
    for (term_id, name) in joins {
        term_domains.entry(term_id).or_default().push(name);
    }

    // One sibling term per concept in the community language.
    let mut translations: HashMap<i32, String> = HashMap::new();
    let siblings: Vec<(i32, String)> = terms::table
        .filter(terms::concept_id.eq_any(&concept_ids))
        .filter(terms::language_id.eq(params.community_language_id))
        .select((terms::concept_id, terms::text))
        .load(conn)?;
    for (concept_id, text) in siblings {
        translations.entry(concept_id).or_insert(text);
    }

    let terms = rows
        .into_iter()
        .map(|(id, text, meaning, phonics, pos_id, concept_id)| DictionaryTerm {
            id,
            text,
            meaning,
            phonics,
            part_of_speech: pos_names.get(&pos_id).cloned().unwrap_or_default(),
            domains: term_domains.remove(&id).unwrap_or_default(),
            translation: translations.get(&concept_id).cloned(),
        })
        .collect();

    let has_more = params.skip + params.take < total;
    Ok((terms, has_more))
}

pub fn available_alphabets(
    conn: &mut SqliteConnection,
    language_id: i32,
) -> QueryResult<Vec<String>> {
    let texts: Vec<String> = terms::table
        .filter(terms::language_id.eq(language_id))
        .select(terms::text)
        .load(conn)?;

    let letters: BTreeSet<String> = texts
        .iter()
        .filter_map(|t| t.chars().next())
        .map(|c| c.to_uppercase().to_string())
        .collect();

    Ok(letters.into_iter().collect())
}

#[derive(Serialize)]
pub struct ProfileView {
    pub id: i32,
    pub user_id: i32,
    pub ui_language: Option<Language>,
    pub community_language: Option<Language>,
    pub target_languages: Vec<Language>,
}

pub fn user_profile(
    conn: &mut SqliteConnection,
    user_id: i32,
) -> QueryResult<Option<ProfileView>> {
    let profile: Option<(i32, Option<i32>, Option<i32>)> = user_profiles::table
        .filter(user_profiles::user_id.eq(user_id))
        .select((
            user_profiles::profile_id,
            user_profiles::ui_language_id,
            user_profiles::community_language_id,
        ))
        .first(conn)
        .optional()?;

    let Some((profile_id, ui_language_id, community_language_id)) = profile else {
        return Ok(None);
    };

    let load_language = |conn: &mut SqliteConnection, id: Option<i32>| -> QueryResult<Option<Language>> {
        match id {
            Some(id) => languages::table
                .find(id)
                .select(Language::as_select())
                .first(conn)
                .optional(),
            None => Ok(None),
        }
    };

    let ui_language = load_language(conn, ui_language_id)?;
    let community_language = load_language(conn, community_language_id)?;

    let target_languages: Vec<Language> = profile_target_languages::table
        .inner_join(languages::table)
        .filter(profile_target_languages::profile_id.eq(profile_id))
        .select(Language::as_select())
        .load(conn)?;

    Ok(Some(ProfileView {
        id: profile_id,
        user_id,
        ui_language,
        community_language,
        target_languages,
    }))
}

pub fn english_language(conn: &mut SqliteConnection) -> QueryResult<Option<(i32, String)>> {
    languages::table
        .filter(languages::code.eq("eng"))
        .select((languages::language_id, languages::name))
        .first(conn)
        .optional()
}

pub async fn handle_submit_request(
    State(pool): State<DbPool>,
    session: Session,
    Form(form): Form<RequestForm>,
) -> Json<SubmitState> {
    let mut conn = match pool.get() {
        Ok(conn) => conn,
        Err(e) => {
            log::error!("Failed to get DB connection: {}", e);
            return Json(SubmitState::failed("Database Error: Failed to submit request."));
        }
    };

    let user = match auth::require_auth(&session, &mut conn).await {
        Ok(user) => user,
        Err(_) => {
            return Json(SubmitState::failed(
                "Unauthorized: Please sign in to submit a request",
            ));
        }
    };

    let input = RequestInput::from_form(form);
    if let Err(errors) = input.validate() {
        return Json(SubmitState {
            success: false,
            message: "Missing Fields. Failed to submit request.".to_string(),
            errors: Some(flatten_validation_errors(&errors)),
        });
    }

    match submit_request(&mut conn, user.user_id, &input) {
        Ok(state) => Json(state),
        Err(e) => {
            log::error!("Database Error: {}", e);
            Json(SubmitState::failed("Database Error: Failed to submit request."))
        }
    }
}

pub async fn get_dictionary_terms(
    State(pool): State<DbPool>,
    Query(params): Query<TermsParams>,
) -> Result<Json<Value>, (StatusCode, String)> {
    let mut conn = pool.get().map_err(|e| {
        (StatusCode::INTERNAL_SERVER_ERROR, format!("Database error: {}", e))
    })?;

    let (terms, has_more) = dictionary_terms(&mut conn, &params).map_err(|e| {
        (StatusCode::INTERNAL_SERVER_ERROR, format!("Database error: {}", e))
    })?;

    Ok(Json(json!({ "terms": terms, "has_more": has_more })))
}

#[derive(Deserialize)]
pub struct AlphabetParams {
    pub language_id: i32,
}

pub async fn get_available_alphabets(
    State(pool): State<DbPool>,
    Query(params): Query<AlphabetParams>,
) -> Result<Json<Vec<String>>, (StatusCode, String)> {
    let mut conn = pool.get().map_err(|e| {
        (StatusCode::INTERNAL_SERVER_ERROR, format!("Database error: {}", e))
    })?;

    let letters = available_alphabets(&mut conn, params.language_id).map_err(|e| {
        (StatusCode::INTERNAL_SERVER_ERROR, format!("Database error: {}", e))
    })?;

    Ok(Json(letters))
}

pub async fn get_user_profile(
    State(pool): State<DbPool>,
    session: Session,
) -> Result<Json<Option<ProfileView>>, AuthError> {
    let mut conn = pool
        .get()
        .map_err(|e| AuthError::SessionError(format!("Failed to get DB connection: {}", e)))?;
    let user = auth::require_auth(&session, &mut conn).await?;

    match user_profile(&mut conn, user.user_id) {
        Ok(profile) => Ok(Json(profile)),
        Err(e) => {
            log::error!("Failed to fetch user profile: {}", e);
            Ok(Json(None))
        }
    }
}

/// GET /api/language/english returns the seeded English language id, used
/// by the client to resolve the English languageId without hardcoding.
pub async fn get_english_language(
    State(pool): State<DbPool>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let mut conn = pool.get().map_err(|e| {
        log::error!("Failed to get DB connection: {}", e);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "Internal server error" })),
        )
    })?;

    match english_language(&mut conn) {
        Ok(Some((id, name))) => Ok(Json(json!({ "id": id, "name": name }))),
        Ok(None) => Err((
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "English language not found" })),
        )),
        Err(e) => {
            log::error!("Failed to fetch English language: {}", e);
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Internal server error" })),
            ))
        }
    }
}

pub fn dictionary_router(pool: DbPool) -> Router {
    Router::new()
        .route("/request", post(handle_submit_request))
        .route("/terms", get(get_dictionary_terms))
        .route("/alphabets", get(get_available_alphabets))
        .route("/profile", get(get_user_profile))
        .with_state(pool)
}
