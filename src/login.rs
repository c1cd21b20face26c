use axum::{
    extract::{Form, State},
    routing::{get, post},
    Json, Router,
};
use bcrypt::verify;
use diesel::prelude::*;
use serde::Serialize;
use tower_sessions::Session;

use crate::{
    auth::{set_user_session, LoginError, LoginForm},
    db::DbPool,
    model::User,
    schema::users,
};

#[derive(Serialize)]
pub struct SessionUser {
    pub id: i32,
    pub email: String,
    pub username: String,
    pub role: String,
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub success: bool,
    pub user: SessionUser,
}

#[axum::debug_handler]
pub async fn login(
    State(pool): State<DbPool>,
    session: Session,
    Form(form): Form<LoginForm>,
) -> Result<Json<LoginResponse>, LoginError> {
    let mut conn = pool
        .get()
        .map_err(|_| LoginError::SessionError("Failed to get DB connection".into()))?;

    let user = users::table
        .filter(users::email.eq(&form.email))
        .select(User::as_select())
        .first(&mut conn)
        .optional()?;

    if let Some(user) = user {
        if verify(&form.password, &user.password)? {
            set_user_session(&session, user.user_id, &user.email).await?;
            return Ok(Json(LoginResponse {
                success: true,
                user: SessionUser {
                    id: user.user_id,
                    email: user.email,
                    username: user.username,
                    role: user.role,
                },
            }));
        }
    }

    Err(LoginError::InvalidCredentials)
}

#[axum::debug_handler]
pub async fn logout(session: Session) -> Result<Json<serde_json::Value>, LoginError> {
    session.flush().await?;
    Ok(Json(serde_json::json!({ "success": true })))
}

pub fn auth_router(pool: DbPool) -> Router {
    Router::new()
        .route("/login", post(login))
        .route("/logout", get(logout))
        .with_state(pool)
}
