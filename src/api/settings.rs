// ⚙️ Meal settings endpoints

use super::extract::{ApiJson, CurrentUser};
use super::AppState;
use crate::db::settings::{self, MealSettings, MealSettingsUpdate};
use crate::error::AppResult;
use crate::seed;
use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use validator::Validate;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/settings/meals/", get(get_settings).patch(update_settings))
        .route("/settings/meals/setup-defaults", post(setup_defaults))
}

async fn get_settings(State(state): State<AppState>, CurrentUser(user): CurrentUser) -> AppResult<Json<MealSettings>> {
    let conn = state.db();
    Ok(Json(settings::get_or_create_settings(&conn, user.id)?))
}

async fn update_settings(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiJson(body): ApiJson<MealSettingsUpdate>,
) -> AppResult<Json<MealSettings>> {
    body.validate()?;
    let conn = state.db();
    Ok(Json(settings::update_settings(&conn, user.id, &body)?))
}

async fn setup_defaults(State(state): State<AppState>, CurrentUser(user): CurrentUser) -> AppResult<Json<Value>> {
    let conn = state.db();
    let outcome = seed::setup_defaults(&conn, user.id)?;
    Ok(Json(json!({ "status": outcome, "message": outcome.message() })))
}
