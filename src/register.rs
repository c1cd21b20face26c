use axum::{
    extract::{Form, State},
    routing::post,
    Json, Router,
};
use bcrypt::{hash, DEFAULT_COST};
use diesel::prelude::*;
use tower_sessions::Session;
use validator::Validate;

use crate::{
    auth::{set_user_session, RegisterError, RegisterForm, Role},
    db::DbPool,
    login::{LoginResponse, SessionUser},
    model::{NewUser, User},
    schema::users,
};

#[axum::debug_handler]
pub async fn handle_register(
    State(pool): State<DbPool>,
    session: Session,
    Form(form): Form<RegisterForm>,
) -> Result<Json<LoginResponse>, RegisterError> {
    form.validate()?;

    let mut conn = pool
        .get()
        .map_err(|_| RegisterError::SessionError("Failed to get DB connection".into()))?;

    let existing_user = users::table
        .filter(users::email.eq(&form.email))
        .select(User::as_select())
        .first(&mut conn)
        .optional()?;

    if existing_user.is_some() {
        return Err(RegisterError::EmailTaken);
    }

    let hashed_password = hash(&form.password, DEFAULT_COST)?;

    diesel::insert_into(users::table)
        .values(&NewUser {
            email: &form.email,
            username: &form.username,
            password: &hashed_password,
            role: Role::Explorer.as_str(),
        })
        .execute(&mut conn)?;

    let user = users::table
        .filter(users::email.eq(&form.email))
        .select(User::as_select())
        .first(&mut conn)?;

    set_user_session(&session, user.user_id, &user.email).await?;

    Ok(Json(LoginResponse {
        success: true,
        user: SessionUser {
            id: user.user_id,
            email: user.email,
            username: user.username,
            role: user.role,
        },
    }))
}

pub fn auth_router(pool: DbPool) -> Router {
    Router::new()
        .route("/register", post(handle_register))
        .with_state(pool)
}
