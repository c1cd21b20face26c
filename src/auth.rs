use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use bcrypt::BcryptError;
use diesel::prelude::*;
use diesel::result::Error as DieselError;
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tower_sessions::session::Error as SessionError;
use tower_sessions::Session;
use validator::{Validate, ValidationErrors};

use crate::model::User;
use crate::schema::users;
use crate::utils::{flatten_validation_errors, FieldErrors};

// Permission names checked against the static role table below.
pub const VIEW_DICTIONARY: &str = "view:dictionary";
pub const CREATE_REQUESTS: &str = "create:requests";
pub const CURATE_NEOS: &str = "curate:neos";
pub const RATE_NEOS: &str = "rate:neos";
pub const REVIEW_REQUESTS: &str = "review:requests";
pub const VIEW_ADMIN: &str = "view:admin";
pub const MANAGE_TERMS: &str = "manage:terms";
pub const MANAGE_USERS: &str = "manage:users";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Explorer,
    Contributor,
    Juror,
    Admin,
}

impl Role {
    /// Unknown role strings fall back to the least-privileged role.
    pub fn from_name(name: &str) -> Role {
        match name {
            "ADMIN" => Role::Admin,
            "JUROR" => Role::Juror,
            "CONTRIBUTOR" => Role::Contributor,
            _ => Role::Explorer,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Explorer => "EXPLORER",
            Role::Contributor => "CONTRIBUTOR",
            Role::Juror => "JUROR",
            Role::Admin => "ADMIN",
        }
    }

    /// Roles are cumulative: each tier keeps everything below it.
    pub fn permissions(&self) -> &'static [&'static str] {
        match self {
            Role::Explorer => &[VIEW_DICTIONARY],
            Role::Contributor => &[VIEW_DICTIONARY, CREATE_REQUESTS, CURATE_NEOS],
            Role::Juror => &[
                VIEW_DICTIONARY,
                CREATE_REQUESTS,
                CURATE_NEOS,
                RATE_NEOS,
                REVIEW_REQUESTS,
            ],
            Role::Admin => &[
                VIEW_DICTIONARY,
                CREATE_REQUESTS,
                CURATE_NEOS,
                RATE_NEOS,
                REVIEW_REQUESTS,
                VIEW_ADMIN,
                MANAGE_TERMS,
                MANAGE_USERS,
            ],
        }
    }

    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions().contains(&permission)
    }
}

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Unauthorized: No user session")]
    NoSession,
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Database error")]
    DatabaseError(#[from] DieselError),
    #[error("Session error: {0}")]
    SessionError(String),
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AuthError::NoSession => (StatusCode::UNAUTHORIZED, self.to_string()),
            AuthError::Forbidden(_) => (StatusCode::FORBIDDEN, self.to_string()),
            AuthError::DatabaseError(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Database error: {}", e),
            ),
            AuthError::SessionError(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Session error: {}", e),
            ),
        };

        let body = json!({
            "error": message,
            "status": status.as_u16()
        });

        (status, axum::Json(body)).into_response()
    }
}

impl From<SessionError> for AuthError {
    fn from(err: SessionError) -> Self {
        AuthError::SessionError(err.to_string())
    }
}

// Errors specific to login
#[derive(Error, Debug)]
pub enum LoginError {
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("Database error")]
    DatabaseError(#[from] DieselError),
    #[error("Hashing error")]
    HashingError(#[from] BcryptError),
    #[error("Session error: {0}")]
    SessionError(String),
}

// Errors specific to registration
#[derive(Error, Debug)]
pub enum RegisterError {
    #[error("Email already registered")]
    EmailTaken,
    #[error("Validation failed")]
    ValidationError(FieldErrors),
    #[error("Database error")]
    DatabaseError(#[from] DieselError),
    #[error("Hashing error")]
    HashingError(#[from] BcryptError),
    #[error("Session error: {0}")]
    SessionError(String),
}

impl IntoResponse for LoginError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            LoginError::InvalidCredentials => (StatusCode::UNAUTHORIZED, self.to_string()),
            LoginError::DatabaseError(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Database error: {}", e),
            ),
            LoginError::HashingError(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Hashing error: {}", e),
            ),
            LoginError::SessionError(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Session error: {}", e),
            ),
        };

        let body = json!({
            "error": message,
            "status": status.as_u16()
        });

        (status, axum::Json(body)).into_response()
    }
}

impl IntoResponse for RegisterError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            RegisterError::EmailTaken => (
                StatusCode::CONFLICT,
                json!({
                    "error": { "email": ["Email already registered"] },
                    "status": StatusCode::CONFLICT.as_u16()
                }),
            ),
            RegisterError::ValidationError(fields) => (
                StatusCode::BAD_REQUEST,
                json!({
                    "error": fields,
                    "status": StatusCode::BAD_REQUEST.as_u16()
                }),
            ),
            RegisterError::DatabaseError(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({
                    "error": format!("Database error: {}", e),
                    "status": StatusCode::INTERNAL_SERVER_ERROR.as_u16()
                }),
            ),
            RegisterError::HashingError(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({
                    "error": format!("Hashing error: {}", e),
                    "status": StatusCode::INTERNAL_SERVER_ERROR.as_u16()
                }),
            ),
            RegisterError::SessionError(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({
                    "error": format!("Session error: {}", e),
                    "status": StatusCode::INTERNAL_SERVER_ERROR.as_u16()
                }),
            ),
        };

        (status, axum::Json(body)).into_response()
    }
}

impl From<SessionError> for LoginError {
    fn from(err: SessionError) -> Self {
        LoginError::SessionError(err.to_string())
    }
}

impl From<SessionError> for RegisterError {
    fn from(err: SessionError) -> Self {
        RegisterError::SessionError(err.to_string())
    }
}

impl From<ValidationErrors> for RegisterError {
    fn from(err: ValidationErrors) -> Self {
        RegisterError::ValidationError(flatten_validation_errors(&err))
    }
}

// Form structs
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterForm {
    #[validate(email(message = "A valid email address is required"))]
    pub email: String,
    #[validate(length(min = 3, max = 32, message = "Username must be 3-32 characters"))]
    pub username: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

/// The resolved caller of a guarded action.
pub struct AuthContext {
    pub user: User,
    pub role: Role,
}

pub async fn set_user_session(
    session: &Session,
    user_id: i32,
    email: &str,
) -> Result<(), SessionError> {
    session.insert("logged_in", true).await?;
    session.insert("user_id", user_id).await?;
    session.insert("user_email", email).await?;
    Ok(())
}

pub async fn is_logged_in(session: &Session) -> bool {
    session.get::<i32>("user_id").await.unwrap_or(None).is_some()
}

pub async fn get_current_user_id(session: &Session) -> Option<i32> {
    if !is_logged_in(session).await {
        return None;
    }

    match session.get::<i32>("user_id").await {
        Ok(Some(user_id)) => Some(user_id),
        Ok(None) => {
            log::warn!("Session has logged_in=true but no user_id");
            None
        }
        Err(e) => {
            log::error!("Failed to get user_id from session: {}", e);
            None
        }
    }
}

/// Resolves the session user, failing when nobody is signed in.
pub async fn require_auth(
    session: &Session,
    conn: &mut SqliteConnection,
) -> Result<User, AuthError> {
    let user_id = get_current_user_id(session)
        .await
        .ok_or(AuthError::NoSession)?;

    users::table
        .find(user_id)
        .select(User::as_select())
        .first(conn)
        .optional()?
        .ok_or(AuthError::NoSession)
}

pub fn get_user_role(conn: &mut SqliteConnection, user_id: i32) -> Result<Role, AuthError> {
    let role: Option<String> = users::table
        .find(user_id)
        .select(users::role)
        .first(conn)
        .optional()?;

    Ok(role.as_deref().map(Role::from_name).unwrap_or(Role::Explorer))
}

pub async fn require_permission(
    session: &Session,
    conn: &mut SqliteConnection,
    permission: &str,
) -> Result<AuthContext, AuthError> {
    let user = require_auth(session, conn).await?;
    let role = Role::from_name(&user.role);

    if !role.has_permission(permission) {
        return Err(AuthError::Forbidden(format!(
            "Missing permission '{}'",
            permission
        )));
    }

    Ok(AuthContext { user, role })
}

pub async fn require_any_permission(
    session: &Session,
    conn: &mut SqliteConnection,
    permissions: &[&str],
) -> Result<AuthContext, AuthError> {
    let user = require_auth(session, conn).await?;
    let role = Role::from_name(&user.role);

    if !permissions.iter().any(|p| role.has_permission(p)) {
        return Err(AuthError::Forbidden(format!(
            "Missing any of required permissions: {}",
            permissions.join(", ")
        )));
    }

    Ok(AuthContext { user, role })
}

pub async fn require_all_permissions(
    session: &Session,
    conn: &mut SqliteConnection,
    permissions: &[&str],
) -> Result<AuthContext, AuthError> {
    let user = require_auth(session, conn).await?;
    let role = Role::from_name(&user.role);

    let missing: Vec<&str> = permissions
        .iter()
        .filter(|p| !role.has_permission(p))
        .copied()
        .collect();

    if !missing.is_empty() {
        return Err(AuthError::Forbidden(format!(
            "Missing required permissions: {}",
            missing.join(", ")
        )));
    }

    Ok(AuthContext { user, role })
}

/// Like `require_auth` but never fails: signed-out callers get `None`.
pub async fn auth_context(
    session: &Session,
    conn: &mut SqliteConnection,
) -> Option<AuthContext> {
    match require_auth(session, conn).await {
        Ok(user) => {
            let role = Role::from_name(&user.role);
            Some(AuthContext { user, role })
        }
        Err(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_role_names_fall_back_to_explorer() {
        assert_eq!(Role::from_name("WIZARD"), Role::Explorer);
        assert_eq!(Role::from_name(""), Role::Explorer);
        assert_eq!(Role::from_name("ADMIN"), Role::Admin);
    }

    #[test]
    fn role_tiers_are_cumulative() {
        assert!(Role::Explorer.has_permission(VIEW_DICTIONARY));
        assert!(!Role::Explorer.has_permission(CREATE_REQUESTS));

        assert!(Role::Contributor.has_permission(CREATE_REQUESTS));
        assert!(!Role::Contributor.has_permission(REVIEW_REQUESTS));

        assert!(Role::Juror.has_permission(REVIEW_REQUESTS));
        assert!(!Role::Juror.has_permission(MANAGE_USERS));

        for p in Role::Juror.permissions() {
            assert!(Role::Admin.has_permission(p));
        }
        assert!(Role::Admin.has_permission(MANAGE_USERS));
    }
}
