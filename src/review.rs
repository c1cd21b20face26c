use axum::{
    extract::{Form, Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use chrono::NaiveDateTime;
use diesel::prelude::*;
use diesel::result::Error as DieselError;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tower_sessions::Session;

use crate::{
    audit::log_audit,
    auth::{self, AuthError},
    db::{lower, lower_nullable, DbPool},
    model::TranslationRequest,
    schema::{
        concepts, domains_terms, languages, parts_of_speech, request_domains, terms,
        translation_requests, users,
    },
    utils::SaveOutcome,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
}

impl RequestStatus {
    pub fn parse(s: &str) -> Option<RequestStatus> {
        match s {
            "PENDING" => Some(RequestStatus::Pending),
            "APPROVED" => Some(RequestStatus::Approved),
            "REJECTED" => Some(RequestStatus::Rejected),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "PENDING",
            RequestStatus::Approved => "APPROVED",
            RequestStatus::Rejected => "REJECTED",
        }
    }
}

#[derive(Serialize)]
pub struct UserRef {
    pub id: i32,
    pub username: String,
}

#[derive(Serialize)]
pub struct LanguageRef {
    pub id: i32,
    pub name: String,
}

#[derive(Serialize)]
pub struct RequestView {
    pub id: i32,
    pub word: String,
    pub meaning: Option<String>,
    pub status: String,
    pub rejection_reason: Option<String>,
    pub created_at: NaiveDateTime,
    pub user: UserRef,
    pub source_language: LanguageRef,
    pub target_language: LanguageRef,
    pub part_of_speech: LanguageRef,
    pub reviewed_by: Option<UserRef>,
}

#[derive(Deserialize)]
pub struct ListParams {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
    #[serde(default)]
    pub search: String,
}

fn default_limit() -> i64 {
    10
}

fn hydrate_views(
    conn: &mut SqliteConnection,
    rows: Vec<TranslationRequest>,
) -> QueryResult<Vec<RequestView>> {
    use std::collections::HashMap;

    let mut user_ids: Vec<i32> = rows.iter().map(|r| r.user_id).collect();
    user_ids.extend(rows.iter().filter_map(|r| r.reviewed_by_id));
    let language_ids: Vec<i32> = rows
        .iter()
        .flat_map(|r| [r.source_language_id, r.target_language_id])
        .collect();
    let pos_ids: Vec<i32> = rows.iter().map(|r| r.part_of_speech_id).collect();

    let usernames: HashMap<i32, String> = users::table
        .filter(users::user_id.eq_any(&user_ids))
        .select((users::user_id, users::username))
        .load::<(i32, String)>(conn)?
        .into_iter()
        .collect();
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

    let named = |map: &HashMap<i32, String>, id: i32| LanguageRef {
        id,
        name: map.get(&id).cloned().unwrap_or_default(),
    };

    Ok(rows
        .into_iter()
        .map(|r| RequestView {
            id: r.request_id,
            word: r.word,
            meaning: r.meaning,
            status: r.status,
            rejection_reason: r.rejection_reason,
            created_at: r.created_at,
            user: UserRef {
                id: r.user_id,
                username: usernames.get(&r.user_id).cloned().unwrap_or_default(),
            },
            source_language: named(&language_names, r.source_language_id),
            target_language: named(&language_names, r.target_language_id),
            part_of_speech: named(&pos_names, r.part_of_speech_id),
            reviewed_by: r.reviewed_by_id.map(|id| UserRef {
                id,
                username: usernames.get(&id).cloned().unwrap_or_default(),
            }),
        })
        .collect())
}

pub fn pending_requests(
    conn: &mut SqliteConnection,
    limit: i64,
    offset: i64,
) -> QueryResult<Vec<RequestView>> {
    let rows: Vec<TranslationRequest> = translation_requests::table
        .filter(translation_requests::status.eq(RequestStatus::Pending.as_str()))
        .order(translation_requests::created_at.desc())
        .offset(offset)
        .limit(limit)
        .select(TranslationRequest::as_select())
        .load(conn)?;

    hydrate_views(conn, rows)
}

pub fn all_requests(
    conn: &mut SqliteConnection,
    limit: i64,
    offset: i64,
    search: &str,
) -> QueryResult<Vec<RequestView>> {
    let mut query = translation_requests::table
        .inner_join(users::table.on(translation_requests::user_id.eq(users::user_id)))
        .select(TranslationRequest::as_select())
        .order(translation_requests::created_at.desc())
        .into_boxed();

    if !search.is_empty() {
        let pattern = format!("%{}%", search.to_lowercase());
        query = query.filter(
            lower(translation_requests::word)
                .like(pattern.clone())
                .nullable()
                .or(lower_nullable(translation_requests::meaning).like(pattern.clone()))
                .or(lower(users::username).like(pattern.clone()).nullable())
                .or(lower_nullable(translation_requests::rejection_reason).like(pattern)),
        );
    }

    let rows: Vec<TranslationRequest> = query.offset(offset).limit(limit).load(conn)?;

    hydrate_views(conn, rows)
}

pub fn pending_count(conn: &mut SqliteConnection) -> QueryResult<i64> {
    translation_requests::table
        .filter(translation_requests::status.eq(RequestStatus::Pending.as_str()))
        .count()
        .get_result(conn)
}

/// PENDING -> APPROVED promotes the request into a Concept + Term; PENDING ->
/// REJECTED records the reason. Both transitions are terminal.
pub fn review_request(
    conn: &mut SqliteConnection,
    reviewer_id: i32,
    request_id: i32,
    status: RequestStatus,
    reason: Option<&str>,
) -> QueryResult<SaveOutcome> {
    if status == RequestStatus::Pending {
        return Ok(SaveOutcome::message("Invalid review status"));
    }

    let request: Option<TranslationRequest> = translation_requests::table
        .find(request_id)
        .select(TranslationRequest::as_select())
        .first(conn)
        .optional()?;

    let Some(request) = request else {
        return Ok(SaveOutcome::message("Request not found"));
    };

    if request.status != RequestStatus::Pending.as_str() {
        return Ok(SaveOutcome::message("Request has already been reviewed"));
    }

    if status == RequestStatus::Approved {
        conn.transaction::<_, DieselError, _>(|conn| {
            let domain_ids: Vec<i32> = request_domains::table
                .filter(request_domains::request_id.eq(request_id))
                .select(request_domains::domain_id)
                .load(conn)?;

            // Meaning doubles as the gloss of the new language-agnostic anchor.
            let gloss = request.meaning.as_deref().unwrap_or(&request.word);
            diesel::insert_into(concepts::table)
                .values(concepts::gloss.eq(gloss))
                .execute(conn)?;
            let concept_id: i32 = diesel::select(diesel::dsl::sql::<
                diesel::sql_types::Integer,
            >("last_insert_rowid()"))
            .get_result(conn)?;

            diesel::insert_into(terms::table)
                .values((
                    terms::text.eq(&request.word),
                    terms::meaning.eq(request.meaning.as_deref().unwrap_or(&request.word)),
                    terms::language_id.eq(request.source_language_id),
                    terms::part_of_speech_id.eq(request.part_of_speech_id),
                    terms::concept_id.eq(concept_id),
                ))
                .execute(conn)?;
            let term_id: i32 = diesel::select(diesel::dsl::sql::<diesel::sql_types::Integer>(
                "last_insert_rowid()",
            ))
            .get_result(conn)?;

            for domain_id in domain_ids {
                diesel::insert_into(domains_terms::table)
                    .values((
                        domains_terms::domain_id.eq(domain_id),
                        domains_terms::term_id.eq(term_id),
                    ))
                    .execute(conn)?;
            }

            diesel::update(translation_requests::table.find(request_id))
                .set((
                    translation_requests::status.eq(RequestStatus::Approved.as_str()),
                    translation_requests::reviewed_by_id.eq(reviewer_id),
                ))
                .execute(conn)?;

            Ok(())
        })?;

        log_audit(
            conn,
            reviewer_id,
            "review:request:approved",
            &request_id.to_string(),
            json!({}),
        );
    } else {
        diesel::update(translation_requests::table.find(request_id))
            .set((
                translation_requests::status.eq(RequestStatus::Rejected.as_str()),
                translation_requests::rejection_reason.eq(reason),
                translation_requests::reviewed_by_id.eq(reviewer_id),
            ))
            .execute(conn)?;

        log_audit(
            conn,
            reviewer_id,
            "review:request:rejected",
            &request_id.to_string(),
            json!({ "reason": reason }),
        );
    }

    Ok(SaveOutcome::ok())
}

pub fn update_request(
    conn: &mut SqliteConnection,
    reviewer_id: i32,
    request_id: i32,
    word: &str,
    meaning: Option<&str>,
    part_of_speech_id: i32,
) -> QueryResult<SaveOutcome> {
    let updated = diesel::update(translation_requests::table.find(request_id))
        .set((
            translation_requests::word.eq(word),
            translation_requests::meaning.eq(meaning),
            translation_requests::part_of_speech_id.eq(part_of_speech_id),
        ))
        .execute(conn)?;

    if updated == 0 {
        return Ok(SaveOutcome::message("Request not found"));
    }

    log_audit(
        conn,
        reviewer_id,
        "review:request:edited",
        &request_id.to_string(),
        json!({ "word": word, "part_of_speech_id": part_of_speech_id }),
    );

    Ok(SaveOutcome::ok())
}

pub fn delete_request(
    conn: &mut SqliteConnection,
    reviewer_id: i32,
    request_id: i32,
) -> QueryResult<SaveOutcome> {
    let deleted = conn.transaction::<_, DieselError, _>(|conn| {
        diesel::delete(
            request_domains::table.filter(request_domains::request_id.eq(request_id)),
        )
        .execute(conn)?;
        diesel::delete(translation_requests::table.find(request_id)).execute(conn)
    })?;

    if deleted == 0 {
        return Ok(SaveOutcome::message("Request not found"));
    }

    log_audit(
        conn,
        reviewer_id,
        "review:request:deleted",
        &request_id.to_string(),
        json!({}),
    );

    Ok(SaveOutcome::ok())
}

pub async fn get_pending_requests(
    State(pool): State<DbPool>,
    session: Session,
    Query(params): Query<ListParams>,
) -> Result<Json<Value>, AuthError> {
    let mut conn = pool
        .get()
        .map_err(|e| AuthError::SessionError(format!("Failed to get DB connection: {}", e)))?;
    auth::require_permission(&session, &mut conn, auth::REVIEW_REQUESTS).await?;

    match pending_requests(&mut conn, params.limit, params.offset) {
        Ok(data) => Ok(Json(json!({ "success": true, "data": data }))),
        Err(e) => {
            log::error!("Failed to fetch pending requests: {}", e);
            Ok(Json(
                json!({ "success": false, "error": "Failed to fetch requests" }),
            ))
        }
    }
}

pub async fn get_all_requests(
    State(pool): State<DbPool>,
    session: Session,
    Query(params): Query<ListParams>,
) -> Result<Json<Value>, AuthError> {
    let mut conn = pool
        .get()
        .map_err(|e| AuthError::SessionError(format!("Failed to get DB connection: {}", e)))?;
    auth::require_permission(&session, &mut conn, auth::REVIEW_REQUESTS).await?;

    match all_requests(&mut conn, params.limit, params.offset, &params.search) {
        Ok(data) => Ok(Json(json!({ "success": true, "data": data }))),
        Err(e) => {
            log::error!("Failed to fetch all requests: {}", e);
            Ok(Json(
                json!({ "success": false, "error": "Failed to fetch requests" }),
            ))
        }
    }
}

pub async fn get_pending_reviews_count(
    State(pool): State<DbPool>,
    session: Session,
) -> Result<Json<Value>, AuthError> {
    let mut conn = pool
        .get()
        .map_err(|e| AuthError::SessionError(format!("Failed to get DB connection: {}", e)))?;
    auth::require_permission(&session, &mut conn, auth::REVIEW_REQUESTS).await?;

    match pending_count(&mut conn) {
        Ok(count) => Ok(Json(json!({ "success": true, "count": count }))),
        Err(e) => {
            log::error!("Failed to fetch pending reviews count: {}", e);
            Ok(Json(json!({ "success": false, "count": 0 })))
        }
    }
}

#[derive(Deserialize)]
pub struct ReviewForm {
    pub status: String,
    pub reason: Option<String>,
}

pub async fn handle_review_request(
    State(pool): State<DbPool>,
    session: Session,
    Path(id): Path<i32>,
    Form(form): Form<ReviewForm>,
) -> Result<Json<SaveOutcome>, AuthError> {
    let mut conn = pool
        .get()
        .map_err(|e| AuthError::SessionError(format!("Failed to get DB connection: {}", e)))?;
    let ctx = auth::require_permission(&session, &mut conn, auth::REVIEW_REQUESTS).await?;

    let Some(status) = RequestStatus::parse(&form.status) else {
        return Ok(Json(SaveOutcome::message("Invalid review status")));
    };

    match review_request(
        &mut conn,
        ctx.user.user_id,
        id,
        status,
        form.reason.as_deref(),
    ) {
        Ok(outcome) => Ok(Json(outcome)),
        Err(e) => {
            log::error!("Failed to review request: {}", e);
            Ok(Json(SaveOutcome::message("Failed to update request status")))
        }
    }
}

#[derive(Deserialize)]
pub struct EditRequestForm {
    pub word: String,
    pub meaning: Option<String>,
    pub part_of_speech_id: i32,
}

pub async fn handle_update_request(
    State(pool): State<DbPool>,
    session: Session,
    Path(id): Path<i32>,
    Form(form): Form<EditRequestForm>,
) -> Result<Json<SaveOutcome>, AuthError> {
    let mut conn = pool
        .get()
        .map_err(|e| AuthError::SessionError(format!("Failed to get DB connection: {}", e)))?;
    let ctx = auth::require_permission(&session, &mut conn, auth::REVIEW_REQUESTS).await?;

    match update_request(
        &mut conn,
        ctx.user.user_id,
        id,
        &form.word,
        form.meaning.as_deref(),
        form.part_of_speech_id,
    ) {
        Ok(outcome) => Ok(Json(outcome)),
        Err(e) => {
            log::error!("Failed to update request: {}", e);
            Ok(Json(SaveOutcome::message("Failed to update request")))
        }
    }
}

pub async fn handle_delete_request(
    State(pool): State<DbPool>,
    session: Session,
    Path(id): Path<i32>,
) -> Result<Json<SaveOutcome>, AuthError> {
    let mut conn = pool
        .get()
        .map_err(|e| AuthError::SessionError(format!("Failed to get DB connection: {}", e)))?;
    let ctx = auth::require_permission(&session, &mut conn, auth::REVIEW_REQUESTS).await?;

    match delete_request(&mut conn, ctx.user.user_id, id) {
        Ok(outcome) => Ok(Json(outcome)),
        Err(e) => {
            log::error!("Failed to delete request: {}", e);
            Ok(Json(SaveOutcome::message("Failed to delete request")))
        }
    }
}

pub fn review_router(pool: DbPool) -> Router {
    Router::new()
        .route("/pending", get(get_pending_requests))
        .route("/all", get(get_all_requests))
        .route("/pending-count", get(get_pending_reviews_count))
        .route(
            "/{id}",
            post(handle_review_request).delete(handle_delete_request),
        )
        .route("/{id}/edit", post(handle_update_request))
        .with_state(pool)
}
