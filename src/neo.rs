use std::collections::{BTreeMap, HashMap, HashSet};

use axum::{
    extract::{Form, Query, State},
    routing::{get, post},
    Json, Router,
};
use diesel::prelude::*;
use diesel::result::Error as DieselError;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tower_sessions::Session;

use crate::{
    auth::{self, AuthError},
    db::DbPool,
    model::Neo,
    schema::{concepts, neo_ratings, neos, parts_of_speech, terms},
    utils::{round2, FieldErrors},
};

lazy_static! {
    // Suggestion rows arrive flattened: suggestions[0].type, suggestions[0].text, ...
    static ref SUGGESTION_FIELD_RE: Regex =
        Regex::new(r"^suggestions\[(\d+)\]\.(type|text)$").unwrap();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NeoType {
    Popular,
    Adoptive,
    Functional,
    Root,
    Creative,
}

impl NeoType {
    pub fn parse(s: &str) -> Option<NeoType> {
        match s {
            "POPULAR" => Some(NeoType::Popular),
            "ADOPTIVE" => Some(NeoType::Adoptive),
            "FUNCTIONAL" => Some(NeoType::Functional),
            "ROOT" => Some(NeoType::Root),
            "CREATIVE" => Some(NeoType::Creative),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            NeoType::Popular => "POPULAR",
            NeoType::Adoptive => "ADOPTIVE",
            NeoType::Functional => "FUNCTIONAL",
            NeoType::Root => "ROOT",
            NeoType::Creative => "CREATIVE",
        }
    }
}

#[derive(Debug)]
pub struct SuggestionRow {
    pub index: usize,
    pub neo_type: String,
    pub text: String,
}

/// Reassembles the flattened `suggestions[i].*` form fields into rows.
pub fn collect_suggestion_rows(fields: &HashMap<String, String>) -> Vec<SuggestionRow> {
    let mut rows: BTreeMap<usize, (String, String)> = BTreeMap::new();

    for (key, value) in fields {
        if let Some(caps) = SUGGESTION_FIELD_RE.captures(key) {
            let index: usize = caps[1].parse().unwrap_or(0);
            let entry = rows.entry(index).or_default();
            match &caps[2] {
                "type" => entry.0 = value.clone(),
                _ => entry.1 = value.clone(),
            }
        }
    }

    rows.into_iter()
        .map(|(index, (neo_type, text))| SuggestionRow { index, neo_type, text })
        .collect()
}

#[derive(Debug, Serialize)]
pub struct FailedSuggestion {
    pub index: usize,
    pub neo_type: String,
    pub text: String,
    pub errors: FieldErrors,
}

#[derive(Debug, Serialize)]
pub struct CurateState {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_suggestions: Option<Vec<FailedSuggestion>>,
}

fn validate_suggestion(row: &SuggestionRow) -> FieldErrors {
    let mut errors = FieldErrors::new();

    if NeoType::parse(&row.neo_type).is_none() {
        errors.insert(
            "type".to_string(),
            vec![format!("Unknown suggestion type \"{}\"", row.neo_type)],
        );
    }

    if row.text.trim().is_empty() {
        errors.insert(
            "text".to_string(),
            vec!["Suggestion text is required".to_string()],
        );
    } else if row.text.len() > 100 {
        errors.insert(
            "text".to_string(),
            vec!["Suggestion text must be at most 100 characters".to_string()],
        );
    }

    errors
}

/// Creates a Neo per valid row and reports invalid rows back alongside the
/// rows that succeeded. Partial success, not all-or-nothing.
pub fn curate_neo(
    conn: &mut SqliteConnection,
    user_id: i32,
    term_id: i32,
    rows: &[SuggestionRow],
) -> QueryResult<CurateState> {
    let mut failed: Vec<FailedSuggestion> = Vec::new();

    for row in rows {
        let errors = validate_suggestion(row);
        if !errors.is_empty() {
            failed.push(FailedSuggestion {
                index: row.index,
                neo_type: row.neo_type.clone(),
                text: row.text.clone(),
                errors,
            });
            continue;
        }

        diesel::insert_into(neos::table)
            .values((
                neos::term_id.eq(term_id),
                neos::user_id.eq(user_id),
                neos::text.eq(row.text.trim()),
                neos::neo_type.eq(&row.neo_type),
            ))
            .execute(conn)?;
    }

    if failed.is_empty() {
        Ok(CurateState {
            success: true,
            message: "Neos curated successfully!".to_string(),
            failed_suggestions: None,
        })
    } else {
        Ok(CurateState {
            success: false,
            message: "Some suggestions could not be saved.".to_string(),
            failed_suggestions: Some(failed),
        })
    }
}

#[derive(Serialize)]
pub struct CurationTerm {
    pub id: i32,
    pub text: String,
    pub meaning: String,
    pub phonics: Option<String>,
    pub gloss: String,
    pub part_of_speech: String,
    pub neo_count: i64,
}

/// Terms of a language with their suggestion counts. Without a caller id the
/// listing is restricted to terms that already have suggestions (the voting
/// queue); with one it covers the whole language (the curation view).
pub fn curation_terms(
    conn: &mut SqliteConnection,
    language_id: i32,
    user_id: Option<i32>,
) -> QueryResult<Vec<CurationTerm>> {
    let neo_counts: HashMap<i32, i64> = neos::table
        .group_by(neos::term_id)
        .select((neos::term_id, diesel::dsl::count_star()))
        .load::<(i32, i64)>(conn)?
        .into_iter()
        .collect();

    let rows: Vec<(i32, String, String, Option<String>, i32, i32)> = terms::table
        .filter(terms::language_id.eq(language_id))
        .order(terms::text.asc())
        .select((
            terms::term_id,
            terms::text,
            terms::meaning,
            terms::phonics,
            terms::part_of_speech_id,
            terms::concept_id,
        ))
        .load(conn)?;

    let pos_ids: Vec<i32> = rows.iter().map(|r| r.4).collect();
    let concept_ids: Vec<i32> = rows.iter().map(|r| r.5).collect();

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

    Ok(rows
        .into_iter()
        .filter(|(id, ..)| user_id.is_some() || neo_counts.contains_key(id))
        .map(|(id, text, meaning, phonics, pos_id, concept_id)| CurationTerm {
            id,
            text,
            meaning,
            phonics,
            gloss: glosses.get(&concept_id).cloned().unwrap_or_default(),
            part_of_speech: pos_names.get(&pos_id).cloned().unwrap_or_default(),
            neo_count: neo_counts.get(&id).copied().unwrap_or(0),
        })
        .collect())
}

#[derive(Serialize)]
pub struct NeoView {
    pub id: i32,
    pub term_id: i32,
    pub text: String,
    pub neo_type: String,
    pub audio_url: Option<String>,
    pub rating_count: i32,
    pub rating_score: f64,
    pub reject_count: i32,
}

/// Suggestions for a term, never the caller's own. `rated` selects between
/// the already-rated list (minus neos the caller has rated, best first) and
/// the to-rate queue (unrated, minus neos rejected three times).
pub fn term_neos(
    conn: &mut SqliteConnection,
    term_id: i32,
    rated: bool,
    user_id: Option<i32>,
) -> QueryResult<Vec<NeoView>> {
    let mut query = neos::table
        .select(Neo::as_select())
        .filter(neos::term_id.eq(term_id))
        .into_boxed();
    if let Some(uid) = user_id {
        query = query.filter(neos::user_id.ne(uid));
    }

    let mut rows: Vec<Neo> = query.load(conn)?;

    let rated_by_me: HashSet<i32> = match user_id {
        Some(uid) => neo_ratings::table
            .filter(neo_ratings::user_id.eq(uid))
            .filter(neo_ratings::neo_id.eq_any(rows.iter().map(|n| n.neo_id).collect::<Vec<_>>()))
            .select(neo_ratings::neo_id)
            .load::<i32>(conn)?
            .into_iter()
            .collect(),
        None => HashSet::new(),
    };

    if rated {
        rows.retain(|n| n.rating_count > 0 && !rated_by_me.contains(&n.neo_id));
        rows.sort_by(|a, b| {
            b.rating_score
                .partial_cmp(&a.rating_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
    } else {
        rows.retain(|n| n.rating_count == 0 && n.reject_count < 3);
        rows.sort_by_key(|n| n.created_at);
    }

    Ok(rows
        .into_iter()
        .map(|n| NeoView {
            id: n.neo_id,
            term_id: n.term_id,
            text: n.text,
            neo_type: n.neo_type,
            audio_url: n.audio_url,
            rating_count: n.rating_count,
            rating_score: n.rating_score,
            reject_count: n.reject_count,
        })
        .collect())
}

#[derive(Serialize)]
pub struct RatedPair {
    pub neo_id: i32,
    pub value: i32,
}

pub fn neos_rated_by_me(
    conn: &mut SqliteConnection,
    user_id: i32,
    neo_ids: Option<&[i32]>,
) -> QueryResult<Vec<RatedPair>> {
    let mut query = neo_ratings::table
        .select((neo_ratings::neo_id, neo_ratings::value))
        .filter(neo_ratings::user_id.eq(user_id))
        .into_boxed();

    if let Some(ids) = neo_ids {
        query = query.filter(neo_ratings::neo_id.eq_any(ids.to_vec()));
    }

    let rows: Vec<(i32, i32)> = query.load(conn)?;

    Ok(rows
        .into_iter()
        .map(|(neo_id, value)| RatedPair { neo_id, value })
        .collect())
}

#[derive(Serialize)]
pub struct RateOutcome {
    pub success: bool,
    pub message: String,
}

/// Upserts the caller's rating and recomputes the neo's aggregates in the
/// same transaction so concurrent raters cannot lose updates.
pub fn rate_neo(
    conn: &mut SqliteConnection,
    user_id: i32,
    neo_id: i32,
    value: i32,
    rejection_reason: Option<&str>,
) -> QueryResult<RateOutcome> {
    conn.transaction::<_, DieselError, _>(|conn| {
        diesel::insert_into(neo_ratings::table)
            .values((
                neo_ratings::neo_id.eq(neo_id),
                neo_ratings::user_id.eq(user_id),
                neo_ratings::value.eq(value),
                neo_ratings::rejection_reason.eq(rejection_reason),
            ))
            .on_conflict((neo_ratings::neo_id, neo_ratings::user_id))
            .do_update()
            .set((
                neo_ratings::value.eq(value),
                neo_ratings::rejection_reason.eq(rejection_reason),
            ))
            .execute(conn)?;

        let rating_count: i64 = neo_ratings::table
            .filter(neo_ratings::neo_id.eq(neo_id))
            .count()
            .get_result(conn)?;
        let rating_sum: Option<i64> = neo_ratings::table
            .filter(neo_ratings::neo_id.eq(neo_id))
            .select(diesel::dsl::sum(neo_ratings::value))
            .get_result(conn)?;
        let reject_count: i64 = neo_ratings::table
            .filter(neo_ratings::neo_id.eq(neo_id))
            .filter(neo_ratings::rejection_reason.is_not_null())
            .count()
            .get_result(conn)?;

        let rating_score = if rating_count > 0 {
            round2(rating_sum.unwrap_or(0) as f64 / rating_count as f64)
        } else {
            0.0
        };

        diesel::update(neos::table.find(neo_id))
            .set((
                neos::rating_count.eq(rating_count as i32),
                neos::rating_score.eq(rating_score),
                neos::reject_count.eq(reject_count as i32),
            ))
            .execute(conn)?;

        Ok(())
    })?;

    Ok(RateOutcome {
        success: true,
        message: "Neo rated successfully".to_string(),
    })
}

pub async fn handle_curate_neo(
    State(pool): State<DbPool>,
    session: Session,
    Form(fields): Form<HashMap<String, String>>,
) -> Result<Json<CurateState>, AuthError> {
    let mut conn = pool
        .get()
        .map_err(|e| AuthError::SessionError(format!("Failed to get DB connection: {}", e)))?;
    let ctx = auth::require_permission(&session, &mut conn, auth::CURATE_NEOS).await?;

    let Some(term_id) = fields.get("term_id").and_then(|v| v.parse::<i32>().ok()) else {
        return Ok(Json(CurateState {
            success: false,
            message: "A term is required to curate suggestions.".to_string(),
            failed_suggestions: None,
        }));
    };

    let rows = collect_suggestion_rows(&fields);

    match curate_neo(&mut conn, ctx.user.user_id, term_id, &rows) {
        Ok(state) => Ok(Json(state)),
        Err(e) => {
            log::error!("Failed to curate neos: {}", e);
            Ok(Json(CurateState {
                success: false,
                message: "An error occurred while saving your suggestions. Please try again."
                    .to_string(),
                failed_suggestions: None,
            }))
        }
    }
}

#[derive(Deserialize)]
pub struct CurationTermsParams {
    pub language_id: i32,
}

pub async fn get_curation_terms(
    State(pool): State<DbPool>,
    session: Session,
    Query(params): Query<CurationTermsParams>,
) -> Json<Vec<CurationTerm>> {
    let mut conn = match pool.get() {
        Ok(conn) => conn,
        Err(e) => {
            log::error!("Failed to get DB connection: {}", e);
            return Json(Vec::new());
        }
    };

    let user_id = auth::auth_context(&session, &mut conn)
        .await
        .map(|ctx| ctx.user.user_id);

    match curation_terms(&mut conn, params.language_id, user_id) {
        Ok(terms) => Json(terms),
        Err(e) => {
            log::error!("Failed to fetch curation terms: {}", e);
            Json(Vec::new())
        }
    }
}

#[derive(Deserialize)]
pub struct TermNeosParams {
    pub term_id: i32,
    #[serde(default)]
    pub rated: bool,
}

pub async fn get_term_neos(
    State(pool): State<DbPool>,
    session: Session,
    Query(params): Query<TermNeosParams>,
) -> Result<Json<Vec<NeoView>>, (axum::http::StatusCode, String)> {
    let mut conn = pool.get().map_err(|e| {
        (
            axum::http::StatusCode::INTERNAL_SERVER_ERROR,
            format!("Database error: {}", e),
        )
    })?;

    let user_id = auth::auth_context(&session, &mut conn)
        .await
        .map(|ctx| ctx.user.user_id);

    let neos = term_neos(&mut conn, params.term_id, params.rated, user_id).map_err(|e| {
        (
            axum::http::StatusCode::INTERNAL_SERVER_ERROR,
            format!("Database error: {}", e),
        )
    })?;

    Ok(Json(neos))
}

#[derive(Deserialize)]
pub struct RatedByMeParams {
    /// Comma-separated neo ids; absent means all of the caller's ratings.
    pub neo_ids: Option<String>,
}

pub async fn get_neos_rated_by_me(
    State(pool): State<DbPool>,
    session: Session,
    Query(params): Query<RatedByMeParams>,
) -> Result<Json<Vec<RatedPair>>, AuthError> {
    let mut conn = pool
        .get()
        .map_err(|e| AuthError::SessionError(format!("Failed to get DB connection: {}", e)))?;
    let user = auth::require_auth(&session, &mut conn).await?;

    let neo_ids: Option<Vec<i32>> = params.neo_ids.as_deref().map(|raw| {
        raw.split(',')
            .filter_map(|part| part.trim().parse::<i32>().ok())
            .collect()
    });

    match neos_rated_by_me(&mut conn, user.user_id, neo_ids.as_deref()) {
        Ok(pairs) => Ok(Json(pairs)),
        Err(e) => {
            log::error!("Failed to fetch rated neos: {}", e);
            Ok(Json(Vec::new()))
        }
    }
}

#[derive(Deserialize)]
pub struct RateForm {
    pub neo_id: i32,
    pub value: i32,
    pub rejection_reason: Option<String>,
}

pub async fn handle_rate_neo(
    State(pool): State<DbPool>,
    session: Session,
    Form(form): Form<RateForm>,
) -> Result<Json<RateOutcome>, AuthError> {
    let mut conn = pool
        .get()
        .map_err(|e| AuthError::SessionError(format!("Failed to get DB connection: {}", e)))?;
    let ctx = auth::require_permission(&session, &mut conn, auth::RATE_NEOS).await?;

    match rate_neo(
        &mut conn,
        ctx.user.user_id,
        form.neo_id,
        form.value,
        form.rejection_reason.as_deref().filter(|r| !r.is_empty()),
    ) {
        Ok(outcome) => Ok(Json(outcome)),
        Err(e) => {
            log::error!("Failed to rate neo: {}", e);
            Ok(Json(RateOutcome {
                success: false,
                message: "Failed to rate neo".to_string(),
            }))
        }
    }
}

pub fn neo_router(pool: DbPool) -> Router {
    Router::new()
        .route("/curate", post(handle_curate_neo))
        .route("/terms", get(get_curation_terms))
        .route("/neos", get(get_term_neos))
        .route("/rated-by-me", get(get_neos_rated_by_me))
        .route("/rate", post(handle_rate_neo))
        .with_state(pool)
}
