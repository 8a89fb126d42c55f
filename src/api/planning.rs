// 📅 Meal planning endpoints - weekly calendar, proposals, month view

use super::extract::{ApiJson, ApiPath, CurrentUser};
use super::AppState;
use crate::db::planner::{self, MonthView, NewWeekMeal, WeekPlan};
use crate::error::AppResult;
use crate::planner::ProposalEntry;
use axum::{
    extract::State,
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use chrono::NaiveDate;
use serde_json::{json, Value};
use validator::Validate;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/planning/add-meal", post(add_meal))
        .route("/planning/week/:date", get(week_plan).delete(clear_week))
        .route("/planning/day/:date", delete(remove_day))
        .route("/planning/set-out-of-home/:date", post(set_out_of_home))
        .route("/planning/generate-proposal/:date", get(generate_proposal))
        .route("/planning/accept-proposal", post(accept_proposal))
        .route("/planning/month/:year/:month", get(month_view))
}

async fn add_meal(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiJson(body): ApiJson<NewWeekMeal>,
) -> AppResult<(StatusCode, Json<Value>)> {
    body.validate()?;
    let conn = state.db();
    let monday = planner::add_meal_to_plan(&conn, user.id, &body)?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Meal added to schedule", "start_date": monday })),
    ))
}

async fn week_plan(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiPath(monday): ApiPath<NaiveDate>,
) -> AppResult<Json<WeekPlan>> {
    let conn = state.db();
    Ok(Json(planner::week_plan(&conn, user.id, monday)?))
}

async fn clear_week(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiPath(monday): ApiPath<NaiveDate>,
) -> AppResult<Json<Value>> {
    let conn = state.db();
    let removed = planner::clear_week(&conn, user.id, monday)?;
    tracing::debug!(user_id = %user.id, removed, "week cleared");
    Ok(Json(json!({
        "message": format!("Entire week starting from {} has been cleared", planner::monday_of(monday)?)
    })))
}

async fn remove_day(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiPath(date): ApiPath<NaiveDate>,
) -> AppResult<Json<Value>> {
    let conn = state.db();
    planner::remove_day(&conn, user.id, date)?;
    Ok(Json(json!({ "message": format!("Meal plan for {} has been cleared", date) })))
}

async fn set_out_of_home(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiPath(date): ApiPath<NaiveDate>,
) -> AppResult<Json<Value>> {
    let conn = state.db();
    planner::set_out_of_home(&conn, user.id, date)?;
    Ok(Json(json!({ "message": "Marked as out-of-home" })))
}

async fn generate_proposal(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiPath(monday): ApiPath<NaiveDate>,
) -> AppResult<Json<Vec<ProposalEntry>>> {
    let conn = state.db();
    let mut rng = rand::thread_rng();
    Ok(Json(planner::generate_week_proposal(&conn, user.id, monday, &mut rng)?))
}

async fn accept_proposal(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiJson(entries): ApiJson<Vec<NewWeekMeal>>,
) -> AppResult<Json<Value>> {
    for entry in &entries {
        entry.validate()?;
    }
    let conn = state.db();
    let saved = planner::accept_proposal(&conn, user.id, &entries)?;
    Ok(Json(json!({ "message": format!("Saved {} items to the plan", saved) })))
}

async fn month_view(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiPath((year, month)): ApiPath<(i32, u32)>,
) -> AppResult<Json<MonthView>> {
    let conn = state.db();
    Ok(Json(planner::month_view(&conn, user.id, year, month)?))
}
