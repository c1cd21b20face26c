use std::collections::HashMap;

use axum::{
    extract::{Form, Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tower_sessions::Session;
use validator::Validate;

use crate::{
    auth::{self, AuthError},
    db::{lower, DbPool},
    schema::{domains, domains_terms, request_domains},
    utils::{flatten_validation_errors, SaveOutcome},
};

#[derive(Serialize)]
pub struct AdminDomain {
    pub id: i32,
    pub name: String,
    pub term_count: i64,
    pub request_count: i64,
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
pub struct DomainForm {
    #[validate(length(min = 1, max = 100, message = "Domain name is required"))]
    pub name: String,
}

/// Find-or-create by name, exact match first, then case-insensitive.
/// Shared by term editing, bulk import and request submission.
pub fn resolve_domain(conn: &mut SqliteConnection, name: &str) -> QueryResult<i32> {
    let exact: Option<i32> = domains::table
        .filter(domains::name.eq(name))
        .select(domains::domain_id)
        .first(conn)
        .optional()?;

    if let Some(id) = exact {
        return Ok(id);
    }

    let insensitive: Option<i32> = domains::table
        .filter(lower(domains::name).eq(name.to_lowercase()))
        .select(domains::domain_id)
        .first(conn)
        .optional()?;

    if let Some(id) = insensitive {
        return Ok(id);
    }

    diesel::insert_into(domains::table)
        .values(domains::name.eq(name))
        .execute(conn)?;

    domains::table
        .filter(domains::name.eq(name))
        .select(domains::domain_id)
        .first(conn)
}

pub fn list_domains(
    conn: &mut SqliteConnection,
    skip: i64,
    take: i64,
    search: &str,
) -> QueryResult<(Vec<AdminDomain>, i64)> {
    let mut query = domains::table
        .select((domains::domain_id, domains::name))
        .order(domains::name.asc())
        .into_boxed();
    let mut count_query = domains::table.count().into_boxed();

    if !search.is_empty() {
        let pattern = format!("%{}%", search.to_lowercase());
        query = query.filter(lower(domains::name).like(pattern.clone()));
        count_query = count_query.filter(lower(domains::name).like(pattern));
    }

    let rows: Vec<(i32, String)> = query.offset(skip).limit(take).load(conn)?;

    let total: i64 = count_query.get_result(conn)?;

    let ids: Vec<i32> = rows.iter().map(|(id, _)| *id).collect();
    let term_counts: HashMap<i32, i64> = domains_terms::table
        .filter(domains_terms::domain_id.eq_any(&ids))
        .group_by(domains_terms::domain_id)
        .select((domains_terms::domain_id, diesel::dsl::count_star()))
        .load::<(i32, i64)>(conn)?
        .into_iter()
        .collect();
    let request_counts: HashMap<i32, i64> = request_domains::table
        .filter(request_domains::domain_id.eq_any(&ids))
        .group_by(request_domains::domain_id)
        .select((request_domains::domain_id, diesel::dsl::count_star()))
        .load::<(i32, i64)>(conn)?
        .into_iter()
        .collect();

    let domains = rows
        .into_iter()
        .map(|(id, name)| AdminDomain {
            id,
            name,
            term_count: term_counts.get(&id).copied().unwrap_or(0),
            request_count: request_counts.get(&id).copied().unwrap_or(0),
        })
        .collect();

    Ok((domains, total))
}

pub fn create_domain(conn: &mut SqliteConnection, name: &str) -> QueryResult<SaveOutcome> {
    let existing: Option<i32> = domains::table
        .filter(lower(domains::name).eq(name.to_lowercase()))
        .select(domains::domain_id)
        .first(conn)
        .optional()?;

    if existing.is_some() {
        return Ok(SaveOutcome::field_error(
            "name",
            "Domain with this name already exists.",
        ));
    }

    diesel::insert_into(domains::table)
        .values(domains::name.eq(name))
        .execute(conn)?;

    Ok(SaveOutcome::ok())
}

pub fn update_domain(conn: &mut SqliteConnection, id: i32, name: &str) -> QueryResult<SaveOutcome> {
    let existing: Option<i32> = domains::table
        .filter(domains::domain_id.ne(id))
        .filter(lower(domains::name).eq(name.to_lowercase()))
        .select(domains::domain_id)
        .first(conn)
        .optional()?;

    if existing.is_some() {
        return Ok(SaveOutcome::field_error(
            "name",
            "Another domain with this name already exists.",
        ));
    }

    diesel::update(domains::table.find(id))
        .set(domains::name.eq(name))
        .execute(conn)?;

    Ok(SaveOutcome::ok())
}

pub fn delete_domain(conn: &mut SqliteConnection, id: i32) -> QueryResult<SaveOutcome> {
    let found: Option<i32> = domains::table
        .find(id)
        .select(domains::domain_id)
        .first(conn)
        .optional()?;

    if found.is_none() {
        return Ok(SaveOutcome::message("Domain not found"));
    }

    let term_count: i64 = domains_terms::table
        .filter(domains_terms::domain_id.eq(id))
        .count()
        .get_result(conn)?;
    let request_count: i64 = request_domains::table
        .filter(request_domains::domain_id.eq(id))
        .count()
        .get_result(conn)?;

    if term_count > 0 || request_count > 0 {
        return Ok(SaveOutcome::message(format!(
            "Cannot delete: Domain is used in {} term(s) and {} request(s).",
            term_count, request_count
        )));
    }

    diesel::delete(domains::table.find(id)).execute(conn)?;

    Ok(SaveOutcome::ok())
}

pub async fn get_admin_domains(
    State(pool): State<DbPool>,
    session: Session,
    Query(params): Query<ListParams>,
) -> Result<Json<Value>, AuthError> {
    let mut conn = pool
        .get()
        .map_err(|e| AuthError::SessionError(format!("Failed to get DB connection: {}", e)))?;
    auth::require_permission(&session, &mut conn, auth::VIEW_ADMIN).await?;

    match list_domains(&mut conn, params.skip, params.take, &params.search) {
        Ok((domains, total)) => Ok(Json(
            json!({ "success": true, "domains": domains, "total": total }),
        )),
        Err(e) => {
            log::error!("Failed to get admin domains: {}", e);
            Ok(Json(
                json!({ "success": false, "error": "Failed to fetch domains" }),
            ))
        }
    }
}

pub async fn create_admin_domain(
    State(pool): State<DbPool>,
    session: Session,
    Form(form): Form<DomainForm>,
) -> Result<Json<SaveOutcome>, AuthError> {
    let mut conn = pool
        .get()
        .map_err(|e| AuthError::SessionError(format!("Failed to get DB connection: {}", e)))?;
    auth::require_permission(&session, &mut conn, auth::VIEW_ADMIN).await?;

    if let Err(errors) = form.validate() {
        return Ok(Json(SaveOutcome::fields(flatten_validation_errors(&errors))));
    }

    match create_domain(&mut conn, form.name.trim()) {
        Ok(outcome) => Ok(Json(outcome)),
        Err(e) => {
            log::error!("Failed to create domain: {}", e);
            Ok(Json(SaveOutcome::message(
                "Database error while creating domain",
            )))
        }
    }
}

pub async fn update_admin_domain(
    State(pool): State<DbPool>,
    session: Session,
    Path(id): Path<i32>,
    Form(form): Form<DomainForm>,
) -> Result<Json<SaveOutcome>, AuthError> {
    let mut conn = pool
        .get()
        .map_err(|e| AuthError::SessionError(format!("Failed to get DB connection: {}", e)))?;
    auth::require_permission(&session, &mut conn, auth::VIEW_ADMIN).await?;

    if let Err(errors) = form.validate() {
        return Ok(Json(SaveOutcome::fields(flatten_validation_errors(&errors))));
    }

    match update_domain(&mut conn, id, form.name.trim()) {
        Ok(outcome) => Ok(Json(outcome)),
        Err(e) => {
            log::error!("Failed to update domain: {}", e);
            Ok(Json(SaveOutcome::message(
                "Database error while updating domain",
            )))
        }
    }
}

pub async fn delete_admin_domain(
    State(pool): State<DbPool>,
    session: Session,
    Path(id): Path<i32>,
) -> Result<Json<SaveOutcome>, AuthError> {
    let mut conn = pool
        .get()
        .map_err(|e| AuthError::SessionError(format!("Failed to get DB connection: {}", e)))?;
    auth::require_permission(&session, &mut conn, auth::VIEW_ADMIN).await?;

    match delete_domain(&mut conn, id) {
        Ok(outcome) => Ok(Json(outcome)),
        Err(e) => {
            log::error!("Failed to delete domain: {}", e);
            Ok(Json(SaveOutcome::message("Failed to delete domain")))
        }
    }
}

pub fn admin_router(pool: DbPool) -> Router {
    Router::new()
        .route("/", get(get_admin_domains).post(create_admin_domain))
        .route("/{id}", post(update_admin_domain).delete(delete_admin_domain))
        .with_state(pool)
}
