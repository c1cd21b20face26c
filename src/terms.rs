use std::collections::HashMap;

use axum::{
    extract::{Form, Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use chrono::NaiveDateTime;
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use diesel::sql_types::Integer;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tower_sessions::Session;
use validator::Validate;

use crate::{
    auth::{self, AuthError},
    db::{lower, DbPool},
    domains::resolve_domain,
    schema::{concepts, domains, domains_terms, languages, neo_ratings, neos, parts_of_speech, terms},
    utils::{flatten_validation_errors, parse_domain_list, SaveOutcome},
};

#[derive(Serialize)]
pub struct IdName {
    pub id: i32,
    pub name: String,
}

#[derive(Serialize)]
pub struct ConceptRef {
    pub id: i32,
    pub gloss: String,
}

#[derive(Serialize)]
pub struct AdminTerm {
    pub id: i32,
    pub text: String,
    pub meaning: String,
    pub phonics: Option<String>,
    pub language: IdName,
    pub part_of_speech: IdName,
    pub domains: Vec<IdName>,
    pub concept: ConceptRef,
    pub vote_score: i32,
    pub created_at: NaiveDateTime,
}

#[derive(Deserialize)]
pub struct ListParams {
    #[serde(default)]
    pub skip: i64,
    #[serde(default = "default_take")]
    pub take: i64,
    #[serde(default)]
    pub search: String,
    pub language_id: Option<i32>,
}

fn default_take() -> i64 {
    50
}

/// Raw form fields as the term dialog posts them. The `domains` field is a
/// stringified JSON array of tag names.
#[derive(Debug, Deserialize)]
pub struct TermForm {
    pub text: Option<String>,
    pub meaning: Option<String>,
    pub phonics: Option<String>,
    pub concept_id: Option<i32>,
    pub language_id: Option<i32>,
    pub part_of_speech_id: Option<i32>,
    pub domains: Option<String>,
}

#[derive(Debug, Validate)]
pub struct TermInput {
    #[validate(length(min = 1, max = 100, message = "Word text is required"))]
    pub text: String,
    #[validate(length(min = 1, message = "Meaning is required"))]
    pub meaning: String,
    pub phonics: Option<String>,
    pub concept_id: Option<i32>,
    #[validate(range(min = 1, message = "Language is required"))]
    pub language_id: i32,
    #[validate(range(min = 1, message = "Part of Speech is required"))]
    pub part_of_speech_id: i32,
    pub domains: Vec<String>,
}

impl TermInput {
    pub fn from_form(form: TermForm) -> TermInput {
        TermInput {
            text: form.text.unwrap_or_default(),
            meaning: form.meaning.unwrap_or_default(),
            phonics: form.phonics.filter(|p| !p.is_empty()),
            concept_id: form.concept_id,
            language_id: form.language_id.unwrap_or(0),
            part_of_speech_id: form.part_of_speech_id.unwrap_or(0),
            domains: parse_domain_list(form.domains.as_deref()),
        }
    }
}

fn last_insert_rowid(conn: &mut SqliteConnection) -> QueryResult<i32> {
    diesel::select(diesel::dsl::sql::<Integer>("last_insert_rowid()")).get_result(conn)
}

fn duplicate_term_exists(
    conn: &mut SqliteConnection,
    text: &str,
    meaning: &str,
    language_id: i32,
    exclude_id: Option<i32>,
) -> QueryResult<bool> {
    let mut query = terms::table
        .select(terms::term_id)
        .filter(lower(terms::text).eq(text.to_lowercase()))
        .filter(lower(terms::meaning).eq(meaning.to_lowercase()))
        .filter(terms::language_id.eq(language_id))
        .into_boxed();

    if let Some(id) = exclude_id {
        query = query.filter(terms::term_id.ne(id));
    }

    let found: Option<i32> = query.first(conn).optional()?;
    Ok(found.is_some())
}

/// Uses the given concept when one was picked; otherwise anchors the term to
/// a fresh concept whose gloss is the term's meaning.
fn resolve_concept_id(
    conn: &mut SqliteConnection,
    concept_id: Option<i32>,
    meaning: &str,
) -> QueryResult<i32> {
    if let Some(id) = concept_id {
        return Ok(id);
    }

    diesel::insert_into(concepts::table)
        .values(concepts::gloss.eq(meaning))
        .execute(conn)?;
    last_insert_rowid(conn)
}

/// Find-or-create by gloss, exact match first, then case-insensitive.
/// Bulk import resolves concepts this way to group equal meanings.
fn resolve_concept_by_gloss(conn: &mut SqliteConnection, gloss: &str) -> QueryResult<i32> {
    let exact: Option<i32> = concepts::table
        .filter(concepts::gloss.eq(gloss))
        .select(concepts::concept_id)
        .first(conn)
        .optional()?;

    if let Some(id) = exact {
        return Ok(id);
    }

    let insensitive: Option<i32> = concepts::table
        .filter(lower(concepts::gloss).eq(gloss.to_lowercase()))
        .select(concepts::concept_id)
        .first(conn)
        .optional()?;

    if let Some(id) = insensitive {
        return Ok(id);
    }

    diesel::insert_into(concepts::table)
        .values(concepts::gloss.eq(gloss))
        .execute(conn)?;
    last_insert_rowid(conn)
}

pub fn list_terms(
    conn: &mut SqliteConnection,
    skip: i64,
    take: i64,
    search: &str,
    language_id: Option<i32>,
) -> QueryResult<(Vec<AdminTerm>, i64)> {
    let mut query = terms::table
        .select(crate::model::Term::as_select())
        .order(terms::created_at.desc())
        .into_boxed();
    let mut count_query = terms::table.count().into_boxed();

    if !search.is_empty() {
        let pattern = format!("%{}%", search.to_lowercase());
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

    if let Some(lang) = language_id {
        query = query.filter(terms::language_id.eq(lang));
        count_query = count_query.filter(terms::language_id.eq(lang));
    }

    let rows: Vec<crate::model::Term> = query.offset(skip).limit(take).load(conn)?;

    let total: i64 = count_query.get_result(conn)?;

    let term_ids: Vec<i32> = rows.iter().map(|t| t.term_id).collect();
    let language_ids: Vec<i32> = rows.iter().map(|t| t.language_id).collect();
    let pos_ids: Vec<i32> = rows.iter().map(|t| t.part_of_speech_id).collect();
    let concept_ids: Vec<i32> = rows.iter().map(|t| t.concept_id).collect();

    let language_names: HashMap<i32, String> = languages::table
        .filter(languages::language_id.eq_any(&language_ids))
        .select((languages::language_id, languages::name))
        .load::<(i32, String)>(conn)?
        .into_iter()
        .collect();
    let pos_names: HashMap<i32, String> = parts_of_speech::table
        .filter(parts_of_speech::part_of_speech_id.eq_any(&pos_ids))
        .select((parts_of_speech::part_of_speech_id, parts_of_speech::name))
        .load::<(i32, String)>(conn)?
        .into_iter()
        .collect();
    let glosses: HashMap<i32, String> = concepts::table
        .filter(concepts::concept_id.eq_any(&concept_ids))
        .select((concepts::concept_id, concepts::gloss))
        .load::<(i32, String)>(conn)?
        .into_iter()
        .collect();

    let mut term_domains: HashMap<i32, Vec<IdName>> = HashMap::new();
    let joins: Vec<(i32, i32, String)> = domains_terms::table
        .inner_join(domains::table)
        .filter(domains_terms::term_id.eq_any(&term_ids))
        .select((domains_terms::term_id, domains::domain_id, domains::name))
        .load(conn)?;
    for (term_id, domain_id, name) in joins {
        term_domains
            .entry(term_id)
            .or_default()
            .push(IdName { id: domain_id, name });
    }

    let terms = rows
        .into_iter()
        .map(|t| AdminTerm {
            id: t.term_id,
            text: t.text,
            meaning: t.meaning,
            phonics: t.phonics,
            language: IdName {
                id: t.language_id,
                name: language_names.get(&t.language_id).cloned().unwrap_or_default(),
            },
            part_of_speech: IdName {
                id: t.part_of_speech_id,
                name: pos_names.get(&t.part_of_speech_id).cloned().unwrap_or_default(),
            },
            domains: term_domains.remove(&t.term_id).unwrap_or_default(),
            concept: ConceptRef {
                id: t.concept_id,
                gloss: glosses.get(&t.concept_id).cloned().unwrap_or_default(),
            },
            vote_score: t.vote_score,
            created_at: t.created_at,
        })
        .collect();

    Ok((terms, total))
}

pub fn create_term(conn: &mut SqliteConnection, input: &TermInput) -> QueryResult<SaveOutcome> {
    if duplicate_term_exists(conn, &input.text, &input.meaning, input.language_id, None)? {
        return Ok(SaveOutcome::field_error(
            "text",
            "Term with this text and meaning already exists in this language.",
        ));
    }

    conn.transaction::<_, DieselError, _>(|conn| {
        let concept_id = resolve_concept_id(conn, input.concept_id, &input.meaning)?;

        let mut domain_ids = Vec::new();
        for name in &input.domains {
            domain_ids.push(resolve_domain(conn, name)?);
        }

        diesel::insert_into(terms::table)
            .values((
                terms::text.eq(&input.text),
                terms::meaning.eq(&input.meaning),
                terms::phonics.eq(input.phonics.as_deref()),
                terms::language_id.eq(input.language_id),
                terms::part_of_speech_id.eq(input.part_of_speech_id),
                terms::concept_id.eq(concept_id),
            ))
            .execute(conn)?;
        let term_id = last_insert_rowid(conn)?;

        for domain_id in domain_ids {
            diesel::insert_into(domains_terms::table)
                .values((
                    domains_terms::domain_id.eq(domain_id),
                    domains_terms::term_id.eq(term_id),
                ))
                .execute(conn)?;
        }

        Ok(())
    })?;

    Ok(SaveOutcome::ok())
}

pub fn update_term(
    conn: &mut SqliteConnection,
    id: i32,
    input: &TermInput,
) -> QueryResult<SaveOutcome> {
    if duplicate_term_exists(conn, &input.text, &input.meaning, input.language_id, Some(id))? {
        return Ok(SaveOutcome::field_error(
            "text",
            "Another term with this text and meaning already exists.",
        ));
    }

    conn.transaction::<_, DieselError, _>(|conn| {
        let mut domain_ids = Vec::new();
        for name in &input.domains {
            domain_ids.push(resolve_domain(conn, name)?);
        }

        // Clear old domain joins before re-adding the submitted set.
        diesel::delete(domains_terms::table.filter(domains_terms::term_id.eq(id)))
            .execute(conn)?;

        let concept_id = resolve_concept_id(conn, input.concept_id, &input.meaning)?;

        diesel::update(terms::table.find(id))
            .set((
                terms::text.eq(&input.text),
                terms::meaning.eq(&input.meaning),
                terms::phonics.eq(input.phonics.as_deref()),
                terms::language_id.eq(input.language_id),
                terms::part_of_speech_id.eq(input.part_of_speech_id),
                terms::concept_id.eq(concept_id),
            ))
            .execute(conn)?;

        for domain_id in domain_ids {
            diesel::insert_into(domains_terms::table)
                .values((
                    domains_terms::domain_id.eq(domain_id),
                    domains_terms::term_id.eq(id),
                ))
                .execute(conn)?;
        }

        Ok(())
    })?;

    Ok(SaveOutcome::ok())
}

pub fn delete_term(conn: &mut SqliteConnection, id: i32) -> QueryResult<SaveOutcome> {
    let found: Option<i32> = terms::table
        .find(id)
        .select(terms::term_id)
        .first(conn)
        .optional()?;

    if found.is_none() {
        return Ok(SaveOutcome::message("Term not found"));
    }

    conn.transaction::<_, DieselError, _>(|conn| {
        let neo_ids: Vec<i32> = neos::table
            .filter(neos::term_id.eq(id))
            .select(neos::neo_id)
            .load(conn)?;

        diesel::delete(neo_ratings::table.filter(neo_ratings::neo_id.eq_any(&neo_ids)))
            .execute(conn)?;
        diesel::delete(neos::table.filter(neos::term_id.eq(id))).execute(conn)?;
        diesel::delete(domains_terms::table.filter(domains_terms::term_id.eq(id)))
            .execute(conn)?;
        diesel::delete(terms::table.find(id)).execute(conn)?;

        Ok(())
    })?;

    Ok(SaveOutcome::ok())
}

#[derive(Debug, Deserialize)]
pub struct BulkTermInput {
    pub text: String,
    pub meaning: String,
    pub part_of_speech: String,
    pub phonics: Option<String>,
    #[serde(default)]
    pub domains: Vec<String>,
    pub language_id: i32,
}

#[derive(Serialize)]
pub struct BulkOutcome {
    pub success: bool,
    pub count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<String>>,
}

/// Imports rows one transaction each so a bad row never sinks the batch.
pub fn bulk_add_terms(
    conn: &mut SqliteConnection,
    rows: &[BulkTermInput],
) -> QueryResult<BulkOutcome> {
    let pos_map: HashMap<String, i32> = parts_of_speech::table
        .select((parts_of_speech::name, parts_of_speech::part_of_speech_id))
        .load::<(String, i32)>(conn)?
        .into_iter()
        .map(|(name, id)| (name.trim().to_lowercase(), id))
        .collect();

    let mut added = 0usize;
    let mut errors: Vec<String> = Vec::new();

    for row in rows {
        let pos_id = match pos_map.get(&row.part_of_speech.trim().to_lowercase()) {
            Some(id) => *id,
            None => {
                errors.push(format!(
                    "Row \"{}\": Unknown part of speech \"{}\"",
                    row.text, row.part_of_speech
                ));
                continue;
            }
        };

        let text = row.text.trim();
        let meaning = row.meaning.trim();
        let phonics = row.phonics.as_deref().map(str::trim).filter(|p| !p.is_empty());

        let inserted = conn.transaction::<_, DieselError, _>(|conn| {
            let concept_id = resolve_concept_by_gloss(conn, meaning)?;

            let mut domain_ids = Vec::new();
            for name in &row.domains {
                let name = name.trim();
                if name.is_empty() {
                    continue;
                }
                domain_ids.push(resolve_domain(conn, name)?);
            }

            diesel::insert_into(terms::table)
                .values((
                    terms::text.eq(text),
                    terms::meaning.eq(meaning),
                    terms::phonics.eq(phonics),
                    terms::language_id.eq(row.language_id),
                    terms::part_of_speech_id.eq(pos_id),
                    terms::concept_id.eq(concept_id),
                ))
                .execute(conn)?;
            let term_id = last_insert_rowid(conn)?;

            for domain_id in domain_ids {
                diesel::insert_into(domains_terms::table)
                    .values((
                        domains_terms::domain_id.eq(domain_id),
                        domains_terms::term_id.eq(term_id),
                    ))
                    .execute(conn)?;
            }

            Ok(())
        });

        match inserted {
            Ok(()) => added += 1,
            Err(DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _)) => {
                errors.push(format!("Row \"{}\": Already exists in the database.", row.text));
            }
            Err(e) => {
                errors.push(format!("Row \"{}\": Failed to insert. {}", row.text, e));
            }
        }
    }

    Ok(BulkOutcome {
        success: true,
        count: added,
        errors: if errors.is_empty() { None } else { Some(errors) },
    })
}

pub fn count_terms(conn: &mut SqliteConnection) -> QueryResult<i64> {
    terms::table.count().get_result(conn)
}

pub async fn get_admin_terms(
    State(pool): State<DbPool>,
    session: Session,
    Query(params): Query<ListParams>,
) -> Result<Json<Value>, AuthError> {
    let mut conn = pool
        .get()
        .map_err(|e| AuthError::SessionError(format!("Failed to get DB connection: {}", e)))?;
    auth::require_permission(&session, &mut conn, auth::VIEW_ADMIN).await?;

    match list_terms(
        &mut conn,
        params.skip,
        params.take,
        &params.search,
        params.language_id,
    ) {
        Ok((terms, total)) => Ok(Json(
            json!({ "success": true, "terms": terms, "total": total }),
        )),
        Err(e) => {
            log::error!("Failed to get admin terms: {}", e);
            Ok(Json(
                json!({ "success": false, "error": "Failed to fetch terms" }),
            ))
        }
    }
}

pub async fn create_admin_term(
    State(pool): State<DbPool>,
    session: Session,
    Form(form): Form<TermForm>,
) -> Result<Json<SaveOutcome>, AuthError> {
    let mut conn = pool
        .get()
        .map_err(|e| AuthError::SessionError(format!("Failed to get DB connection: {}", e)))?;
    auth::require_permission(&session, &mut conn, auth::VIEW_ADMIN).await?;

    let input = TermInput::from_form(form);
    if let Err(errors) = input.validate() {
        return Ok(Json(SaveOutcome::fields(flatten_validation_errors(&errors))));
    }

    match create_term(&mut conn, &input) {
        Ok(outcome) => Ok(Json(outcome)),
        Err(e) => {
            log::error!("Failed to create term: {}", e);
            Ok(Json(SaveOutcome::message(
                "Database error while creating term",
            )))
        }
    }
}

pub async fn update_admin_term(
    State(pool): State<DbPool>,
    session: Session,
    Path(id): Path<i32>,
    Form(form): Form<TermForm>,
) -> Result<Json<SaveOutcome>, AuthError> {
    let mut conn = pool
        .get()
        .map_err(|e| AuthError::SessionError(format!("Failed to get DB connection: {}", e)))?;
    auth::require_permission(&session, &mut conn, auth::VIEW_ADMIN).await?;

    let input = TermInput::from_form(form);
    if let Err(errors) = input.validate() {
        return Ok(Json(SaveOutcome::fields(flatten_validation_errors(&errors))));
    }

    match update_term(&mut conn, id, &input) {
        Ok(outcome) => Ok(Json(outcome)),
        Err(e) => {
            log::error!("Failed to update term: {}", e);
            Ok(Json(SaveOutcome::message(
                "Database error while updating term",
            )))
        }
    }
}

pub async fn delete_admin_term(
    State(pool): State<DbPool>,
    session: Session,
    Path(id): Path<i32>,
) -> Result<Json<SaveOutcome>, AuthError> {
    let mut conn = pool
        .get()
        .map_err(|e| AuthError::SessionError(format!("Failed to get DB connection: {}", e)))?;
    auth::require_permission(&session, &mut conn, auth::VIEW_ADMIN).await?;

    match delete_term(&mut conn, id) {
        Ok(outcome) => Ok(Json(outcome)),
        Err(e) => {
            log::error!("Failed to delete term: {}", e);
            Ok(Json(SaveOutcome::message("Failed to delete term")))
        }
    }
}

pub async fn bulk_add_admin_terms(
    State(pool): State<DbPool>,
    session: Session,
    Json(rows): Json<Vec<BulkTermInput>>,
) -> Result<Json<Value>, AuthError> {
    let mut conn = pool
        .get()
        .map_err(|e| AuthError::SessionError(format!("Failed to get DB connection: {}", e)))?;
    auth::require_permission(&session, &mut conn, auth::VIEW_ADMIN).await?;

    match bulk_add_terms(&mut conn, &rows) {
        Ok(outcome) => Ok(Json(json!(outcome))),
        Err(e) => {
            log::error!("Failed to bulk add terms: {}", e);
            Ok(Json(
                json!({ "success": false, "error": "Database error during bulk import" }),
            ))
        }
    }
}

pub async fn get_total_term_count(
    State(pool): State<DbPool>,
    session: Session,
) -> Result<Json<Value>, AuthError> {
    let mut conn = pool
        .get()
        .map_err(|e| AuthError::SessionError(format!("Failed to get DB connection: {}", e)))?;
    auth::require_permission(&session, &mut conn, auth::VIEW_ADMIN).await?;

    match count_terms(&mut conn) {
        Ok(count) => Ok(Json(json!({ "success": true, "count": count }))),
        Err(e) => {
            log::error!("Failed to get total term count: {}", e);
            Ok(Json(json!({ "success": false, "count": 0 })))
        }
    }
}

pub fn admin_router(pool: DbPool) -> Router {
    Router::new()
        .route("/", get(get_admin_terms).post(create_admin_term))
        .route("/count", get(get_total_term_count))
        .route("/bulk", post(bulk_add_admin_terms))
        .route("/{id}", post(update_admin_term).delete(delete_admin_term))
        .with_state(pool)
}
