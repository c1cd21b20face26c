use std::collections::HashMap;

use axum::{
    extract::{Form, Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use chrono::NaiveDateTime;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tower_sessions::Session;
use validator::Validate;

use crate::{
    auth::{self, AuthError},
    db::{lower, DbPool},
    schema::{concepts, terms},
    utils::{flatten_validation_errors, SaveOutcome},
};

#[derive(Serialize)]
pub struct AdminConcept {
    pub id: i32,
    pub gloss: String,
    pub created_at: NaiveDateTime,
    pub term_count: i64,
}

#[derive(Deserialize)]
pub struct ListParams {
    #[serde(default)]
    pub skip: i64,
    #[serde(default = "default_take")]
    pub take: i64,
    #[serde(default)]
    pub search: String,
}

fn default_take() -> i64 {
    50
}

#[derive(Debug, Deserialize, Validate)]
pub struct ConceptForm {
    #[validate(length(min = 1, message = "Gloss is required"))]
    pub gloss: String,
}

pub fn list_concepts(
    conn: &mut SqliteConnection,
    skip: i64,
    take: i64,
    search: &str,
) -> QueryResult<(Vec<AdminConcept>, i64)> {
    let mut query = concepts::table
        .select((concepts::concept_id, concepts::gloss, concepts::created_at))
        .order(concepts::created_at.desc())
        .into_boxed();
    let mut count_query = concepts::table.count().into_boxed();

    if !search.is_empty() {
        let pattern = format!("%{}%", search.to_lowercase());
        query = query.filter(lower(concepts::gloss).like(pattern.clone()));
        count_query = count_query.filter(lower(concepts::gloss).like(pattern));
    }

    let rows: Vec<(i32, String, NaiveDateTime)> =
        query.offset(skip).limit(take).load(conn)?;

    let total: i64 = count_query.get_result(conn)?;

    let ids: Vec<i32> = rows.iter().map(|(id, _, _)| *id).collect();
    let counts: HashMap<i32, i64> = terms::table
        .filter(terms::concept_id.eq_any(&ids))
        .group_by(terms::concept_id)
        .select((terms::concept_id, diesel::dsl::count_star()))
        .load::<(i32, i64)>(conn)?
        .into_iter()
        .collect();

    let concepts = rows
        .into_iter()
        .map(|(id, gloss, created_at)| AdminConcept {
            id,
            gloss,
            created_at,
            term_count: counts.get(&id).copied().unwrap_or(0),
        })
        .collect();

    Ok((concepts, total))
}

pub fn create_concept(conn: &mut SqliteConnection, gloss: &str) -> QueryResult<SaveOutcome> {
    let existing: Option<i32> = concepts::table
        .filter(lower(concepts::gloss).eq(gloss.to_lowercase()))
        .select(concepts::concept_id)
        .first(conn)
        .optional()?;

    if existing.is_some() {
        return Ok(SaveOutcome::field_error(
            "gloss",
            "A concept with this gloss already exists.",
        ));
    }

    diesel::insert_into(concepts::table)
        .values(concepts::gloss.eq(gloss))
        .execute(conn)?;

    Ok(SaveOutcome::ok())
}

pub fn update_concept(
    conn: &mut SqliteConnection,
    id: i32,
    gloss: &str,
) -> QueryResult<SaveOutcome> {
    let existing: Option<i32> = concepts::table
        .filter(concepts::concept_id.ne(id))
        .filter(lower(concepts::gloss).eq(gloss.to_lowercase()))
        .select(concepts::concept_id)
        .first(conn)
        .optional()?;

    if existing.is_some() {
        return Ok(SaveOutcome::field_error(
            "gloss",
            "Another concept with this gloss already exists.",
        ));
    }

    diesel::update(concepts::table.find(id))
        .set(concepts::gloss.eq(gloss))
        .execute(conn)?;

    Ok(SaveOutcome::ok())
}

pub fn delete_concept(conn: &mut SqliteConnection, id: i32) -> QueryResult<SaveOutcome> {
    let found: Option<i32> = concepts::table
        .find(id)
        .select(concepts::concept_id)
        .first(conn)
        .optional()?;

    if found.is_none() {
        return Ok(SaveOutcome::message("Concept not found"));
    }

    let term_count: i64 = terms::table
        .filter(terms::concept_id.eq(id))
        .count()
        .get_result(conn)?;

    if term_count > 0 {
        return Ok(SaveOutcome::message(format!(
            "Cannot delete concept because it has {} term(s) attached. Please delete or reassign those terms first.",
            term_count
        )));
    }

    diesel::delete(concepts::table.find(id)).execute(conn)?;

    Ok(SaveOutcome::ok())
}

pub async fn get_admin_concepts(
    State(pool): State<DbPool>,
    session: Session,
    Query(params): Query<ListParams>,
) -> Result<Json<Value>, AuthError> {
    let mut conn = pool
        .get()
        .map_err(|e| AuthError::SessionError(format!("Failed to get DB connection: {}", e)))?;
    auth::require_permission(&session, &mut conn, auth::VIEW_ADMIN).await?;

    match list_concepts(&mut conn, params.skip, params.take, &params.search) {
        Ok((concepts, total)) => Ok(Json(
            json!({ "success": true, "concepts": concepts, "total": total }),
        )),
        Err(e) => {
            log::error!("Failed to get admin concepts: {}", e);
            Ok(Json(
                json!({ "success": false, "error": "Failed to fetch concepts" }),
            ))
        }
    }
}

pub async fn create_admin_concept(
    State(pool): State<DbPool>,
    session: Session,
    Form(form): Form<ConceptForm>,
) -> Result<Json<SaveOutcome>, AuthError> {
    let mut conn = pool
        .get()
        .map_err(|e| AuthError::SessionError(format!("Failed to get DB connection: {}", e)))?;
    auth::require_permission(&session, &mut conn, auth::VIEW_ADMIN).await?;

    if let Err(errors) = form.validate() {
        return Ok(Json(SaveOutcome::fields(flatten_validation_errors(&errors))));
    }

    match create_concept(&mut conn, form.gloss.trim()) {
        Ok(outcome) => Ok(Json(outcome)),
        Err(e) => {
            log::error!("Failed to create concept: {}", e);
            Ok(Json(SaveOutcome::message(
                "Database error while creating concept",
            )))
        }
    }
}

pub async fn update_admin_concept(
    State(pool): State<DbPool>,
    session: Session,
    Path(id): Path<i32>,
    Form(form): Form<ConceptForm>,
) -> Result<Json<SaveOutcome>, AuthError> {
    let mut conn = pool
        .get()
        .map_err(|e| AuthError::SessionError(format!("Failed to get DB connection: {}", e)))?;
    auth::require_permission(&session, &mut conn, auth::VIEW_ADMIN).await?;

    if let Err(errors) = form.validate() {
        return Ok(Json(SaveOutcome::fields(flatten_validation_errors(&errors))));
    }

    match update_concept(&mut conn, id, form.gloss.trim()) {
        Ok(outcome) => Ok(Json(outcome)),
        Err(e) => {
            log::error!("Failed to update concept: {}", e);
            Ok(Json(SaveOutcome::message(
                "Database error while updating concept",
            )))
        }
    }
}

pub async fn delete_admin_concept(
    State(pool): State<DbPool>,
    session: Session,
    Path(id): Path<i32>,
) -> Result<Json<SaveOutcome>, AuthError> {
    let mut conn = pool
        .get()
        .map_err(|e| AuthError::SessionError(format!("Failed to get DB connection: {}", e)))?;
    auth::require_permission(&session, &mut conn, auth::VIEW_ADMIN).await?;

    match delete_concept(&mut conn, id) {
        Ok(outcome) => Ok(Json(outcome)),
        Err(e) => {
            log::error!("Failed to delete concept: {}", e);
            Ok(Json(SaveOutcome::message("Failed to delete concept")))
        }
    }
}

pub fn admin_router(pool: DbPool) -> Router {
    Router::new()
        .route("/", get(get_admin_concepts).post(create_admin_concept))
        .route(
            "/{id}",
            post(update_admin_concept).delete(delete_admin_concept),
        )
        .with_state(pool)
}
