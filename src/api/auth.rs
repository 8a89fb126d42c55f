// 🔐 Authentication endpoints

use super::extract::{ApiJson, CurrentUser};
use super::AppState;
use crate::auth::{self, hash_token, TokenResponse};
use crate::db::users::{self, NewUser, UserPublic};
use crate::error::{AppError, AppResult};
use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 3, max = 100))]
    pub login: String,
    #[validate(length(min = 8))]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    /// Email or login
    pub identifier: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
        .route("/auth/refresh", post(refresh))
        .route("/auth/me", get(me))
}

/// POST /auth/register
async fn register(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<RegisterRequest>,
) -> AppResult<(StatusCode, Json<UserPublic>)> {
    body.validate()?;
    let password_hash = auth::hash_password(&body.password)?;

    let user = {
        let conn = state.db();
        users::create_user(
            &conn,
            &NewUser {
                email: body.email.trim().to_string(),
                login: body.login.trim().to_string(),
                password_hash,
            },
        )?
    };

    tracing::info!(user_id = %user.id, login = %user.login, "user registered");
    Ok((StatusCode::CREATED, Json(UserPublic::from(&user))))
}

/// POST /auth/login
async fn login(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<LoginRequest>,
) -> AppResult<Json<TokenResponse>> {
    let invalid = || AppError::Unauthorized("Invalid credentials".to_string());

    let user = {
        let conn = state.db();
        users::find_by_identifier(&conn, body.identifier.trim())?
    }
    .filter(|user| user.is_active)
    .ok_or_else(invalid)?;

    if !auth::verify_password(&body.password, &user.password_hash) {
        tracing::warn!(identifier = %body.identifier, "failed login attempt");
        return Err(invalid());
    }

    let response = {
        let conn = state.db();
        auth::start_session(&conn, &state.issuer, &user, state.settings.max_active_sessions)?
    };
    tracing::info!(user_id = %user.id, "user logged in");
    Ok(Json(response))
}

/// POST /auth/logout
async fn logout(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<RefreshRequest>,
) -> AppResult<Json<Value>> {
    let revoked = {
        let conn = state.db();
        users::revoke_refresh_token_by_hash(&conn, &hash_token(&body.refresh_token))?
    };
    tracing::debug!(revoked, "logout");
    Ok(Json(json!({ "message": "The user has been logged out." })))
}

/// POST /auth/refresh
async fn refresh(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<RefreshRequest>,
) -> AppResult<Json<TokenResponse>> {
    let response = {
        let conn = state.db();
        auth::rotate_session(&conn, &state.issuer, &body.refresh_token)?
    };
    Ok(Json(response))
}

/// GET /auth/me
async fn me(CurrentUser(user): CurrentUser) -> Json<UserPublic> {
    Json(UserPublic::from(&user))
}
